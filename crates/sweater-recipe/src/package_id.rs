//! Package Ids
//!
//! The binary-compatibility fingerprint of a package: a hash over the
//! settings, options and requirements that affect the built artifact.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::os::TargetOs;
use crate::recipe::Recipe;

/// Build settings of a consumer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub os: Option<TargetOs>,
    pub arch: Option<String>,
    pub compiler: Option<String>,
    pub compiler_version: Option<String>,
    pub build_type: Option<String>,
}

impl Settings {
    /// Settings for `os` only
    pub fn for_os(os: TargetOs) -> Self {
        Self {
            os: Some(os),
            ..Self::default()
        }
    }

    /// Non-empty settings as `name -> value`
    pub fn values(&self) -> BTreeMap<&'static str, String> {
        let mut values = BTreeMap::new();
        if let Some(os) = self.os {
            values.insert("os", os.to_string());
        }
        let optional = [
            ("arch", &self.arch),
            ("compiler", &self.compiler),
            ("compiler.version", &self.compiler_version),
            ("build_type", &self.build_type),
        ];
        for (name, value) in optional {
            if let Some(value) = value {
                values.insert(name, value.clone());
            }
        }
        values
    }
}

/// Everything that feeds into a package id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageInfo {
    pub settings: BTreeMap<String, String>,
    pub options: BTreeMap<String, String>,
    pub requires: Vec<String>,
}

impl PackageInfo {
    /// Info for building `recipe` with `settings`. Only settings the
    /// recipe declares are kept.
    pub fn new(recipe: &Recipe, settings: &Settings) -> Self {
        let settings = settings
            .values()
            .into_iter()
            .filter(|(name, _)| {
                let root = name.split('.').next().unwrap_or_default();
                recipe.settings.iter().any(|declared| declared == root)
            })
            .map(|(name, value)| (name.to_string(), value))
            .collect();

        let requires = match settings_os(&settings) {
            Some(os) => recipe
                .requirements(os)
                .iter()
                .map(|r| r.to_string())
                .collect(),
            None => recipe.requires.iter().map(|r| r.to_string()).collect(),
        };

        let mut info = Self {
            settings,
            options: BTreeMap::new(),
            requires,
        };
        if recipe.header_only {
            info.header_only();
        }
        info
    }

    /// Drop everything binary compatibility would otherwise depend on
    pub fn header_only(&mut self) {
        self.settings.clear();
        self.options.clear();
        self.requires.clear();
    }

    /// Canonical text the id is hashed from
    pub fn canonical(&self) -> String {
        let mut text = String::from("[settings]\n");
        for (name, value) in &self.settings {
            let _ = writeln!(text, "    {name}={value}");
        }
        text.push_str("\n[options]\n");
        for (name, value) in &self.options {
            let _ = writeln!(text, "    {name}={value}");
        }
        text.push_str("\n[requires]\n");
        for requirement in &self.requires {
            let _ = writeln!(text, "    {requirement}");
        }
        text
    }

    /// Hex SHA-256 of the canonical text
    pub fn package_id(&self) -> String {
        let digest = Sha256::digest(self.canonical().as_bytes());
        digest.iter().fold(String::with_capacity(64), |mut hex, byte| {
            let _ = write!(hex, "{byte:02x}");
            hex
        })
    }
}

fn settings_os(settings: &BTreeMap<String, String>) -> Option<TargetOs> {
    settings.get("os").and_then(|os| os.parse().ok())
}

/// Package id of `recipe` built with `settings`
pub fn package_id(recipe: &Recipe, settings: &Settings) -> String {
    let id = PackageInfo::new(recipe, settings).package_id();
    tracing::debug!(package = %recipe.reference(), %id, "Computed package id");
    id
}
