//! Packaging
//!
//! Selects the files matching the recipe's export patterns and copies them
//! into the package folder, keeping their relative layout.

use std::fs;
use std::path::{Path, PathBuf};

use glob::{MatchOptions, Pattern};
use walkdir::WalkDir;

use crate::error::{RecipeError, Result};
use crate::recipe::Recipe;

/// `*` also crosses directory separators, so `include/*.hpp` picks headers
/// at any depth below `include/`.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: false,
    require_literal_leading_dot: false,
};

/// Compiled export patterns
#[derive(Debug, Clone)]
pub struct FileSelector {
    patterns: Vec<Pattern>,
}

impl FileSelector {
    pub fn new<I, S>(patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| Pattern::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Selector for a recipe's exports
    pub fn for_recipe(recipe: &Recipe) -> Result<Self> {
        Self::new(&recipe.exports)
    }

    /// Whether a path relative to the source root is selected
    pub fn matches(&self, relative: &Path) -> bool {
        let normalized = normalize(relative);
        self.patterns
            .iter()
            .any(|p| p.matches_with(&normalized, MATCH_OPTIONS))
    }

    /// Selected files below `root`, relative to it, in sorted order
    pub fn select(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let mut selected = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|err| {
                let path = err.path().unwrap_or(root).to_path_buf();
                RecipeError::io(path, err.into())
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = match entry.path().strip_prefix(root) {
                Ok(relative) => relative,
                Err(_) => continue,
            };
            if self.matches(relative) {
                selected.push(relative.to_path_buf());
            }
        }
        selected.sort();
        Ok(selected)
    }
}

/// Forward-slash form of a relative path, as patterns are written
fn normalize(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Copy every exported file from `source` into `destination`.
///
/// Returns the copied paths, relative to both roots.
pub fn package(recipe: &Recipe, source: &Path, destination: &Path) -> Result<Vec<PathBuf>> {
    let selector = FileSelector::for_recipe(recipe)?;
    let files = selector.select(source)?;

    for relative in &files {
        let target = destination.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| RecipeError::io(parent, err))?;
        }
        fs::copy(source.join(relative), &target).map_err(|err| RecipeError::io(&target, err))?;
    }

    tracing::info!(
        "Packaged {} files of {} into {}",
        files.len(),
        recipe.reference(),
        destination.display()
    );
    Ok(files)
}
