//! Package Recipe
//!
//! Declarative description of how Sweater is fetched, packaged and
//! identified by the package manager.

use serde::{Deserialize, Serialize};

use crate::generator::Generator;
use crate::os::TargetOs;
use crate::reference::Reference;
use crate::scm::Scm;
use crate::version::Version;

/// Pattern of the files the package ships
pub const HEADER_PATTERN: &str = "include/*.hpp";

/// Requirement that only applies to some target OSes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionalRequirement {
    pub reference: Reference,
    /// Target OSes the requirement is dropped for
    pub excluded_os: Vec<TargetOs>,
}

impl ConditionalRequirement {
    /// Whether the requirement applies when building for `os`
    pub fn applies_to(&self, os: TargetOs) -> bool {
        !self.excluded_os.contains(&os)
    }
}

/// Package recipe
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub version: Version,
    pub license: String,
    pub url: String,
    /// Settings the recipe reads (only `os` for Sweater)
    pub settings: Vec<String>,
    pub generators: Vec<Generator>,
    pub scm: Scm,
    /// Sources are used in place instead of being copied to the build folder
    pub no_copy_source: bool,
    /// Requirements on every target
    pub requires: Vec<Reference>,
    pub conditional_requires: Vec<ConditionalRequirement>,
    /// Patterns of the files copied into the package
    pub exports: Vec<String>,
    /// Package id ignores settings, options and requirements
    pub header_only: bool,
}

impl Recipe {
    /// The Sweater recipe
    pub fn sweater() -> Self {
        let minimum = Version::new(1, 0, 0);
        Self {
            name: "Sweater".to_string(),
            version: Version::new(1, 0, 1),
            license: "MIT".to_string(),
            url: "https://github.com/microblink/functionoid".to_string(),
            settings: vec!["os".to_string()],
            generators: vec![Generator::Cmake],
            scm: Scm::auto_git(),
            no_copy_source: true,
            requires: vec![
                Reference::at_least("Functionoid", minimum, "microblink", "master"),
                Reference::at_least("ConfigEx", minimum, "microblink", "master"),
            ],
            conditional_requires: vec![ConditionalRequirement {
                reference: Reference::at_least("ConcurrentQueue", minimum, "microblink", "master"),
                excluded_os: vec![TargetOs::Ios, TargetOs::Macos],
            }],
            exports: vec![HEADER_PATTERN.to_string()],
            header_only: true,
        }
    }

    /// Requirements in effect when building for `os`
    pub fn requirements(&self, os: TargetOs) -> Vec<Reference> {
        let conditional = self
            .conditional_requires
            .iter()
            .filter(|c| c.applies_to(os))
            .map(|c| c.reference.clone());

        let requirements: Vec<Reference> = self.requires.iter().cloned().chain(conditional).collect();
        tracing::debug!(
            os = %os,
            count = requirements.len(),
            "Resolved requirements"
        );
        requirements
    }

    /// `name/version`
    pub fn reference(&self) -> String {
        format!("{}/{}", self.name, self.version)
    }
}

/// Recipe plus the requirements resolved for one OS, as printed by the CLI
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRecipe<'a> {
    #[serde(flatten)]
    pub recipe: &'a Recipe,
    pub os: TargetOs,
    pub resolved_requires: Vec<Reference>,
}

impl<'a> ResolvedRecipe<'a> {
    pub fn new(recipe: &'a Recipe, os: TargetOs) -> Self {
        Self {
            recipe,
            os,
            resolved_requires: recipe.requirements(os),
        }
    }
}
