//! Build-system generators

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{RecipeError, Result};
use crate::recipe::Recipe;

/// Build-system integration a consumer asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Generator {
    Cmake,
}

impl Generator {
    /// File the generator writes
    pub fn file_name(self) -> &'static str {
        match self {
            Self::Cmake => "conanbuildinfo.cmake",
        }
    }

    /// Build info for `recipe` installed at `package_root`
    pub fn render(self, recipe: &Recipe, package_root: &Path) -> String {
        match self {
            Self::Cmake => render_cmake(recipe, package_root),
        }
    }

    /// Write the build info into `out_dir`, returning the written file
    pub fn write(self, recipe: &Recipe, package_root: &Path, out_dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(out_dir).map_err(|err| RecipeError::io(out_dir, err))?;
        let path = out_dir.join(self.file_name());
        fs::write(&path, self.render(recipe, package_root))
            .map_err(|err| RecipeError::io(&path, err))?;
        tracing::info!("Wrote {} for {}", path.display(), recipe.reference());
        Ok(path)
    }
}

impl fmt::Display for Generator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cmake => f.write_str("cmake"),
        }
    }
}

/// CMake paths always use forward slashes
fn cmake_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}

fn render_cmake(recipe: &Recipe, package_root: &Path) -> String {
    let upper = recipe.name.to_ascii_uppercase();
    let include_dir = cmake_path(&package_root.join("include"));
    let root = cmake_path(package_root);

    format!(
        "set(CONAN_{upper}_ROOT \"{root}\")\n\
         set(CONAN_INCLUDE_DIRS_{upper} \"{include_dir}\")\n\
         set(CONAN_PACKAGE_NAME_{upper} \"{name}\")\n\
         set(CONAN_PACKAGE_VERSION_{upper} \"{version}\")\n\
         \n\
         set(CONAN_INCLUDE_DIRS \"{include_dir}\" ${{CONAN_INCLUDE_DIRS}})\n",
        name = recipe.name,
        version = recipe.version,
    )
}
