//! Sweater Recipe
//!
//! Package manager recipe of the Sweater headers: identity, requirements
//! per target OS, header packaging, package ids, SCM metadata and the CMake
//! build info handed to consumers.

pub mod error;
pub mod generator;
pub mod os;
pub mod package;
pub mod package_id;
pub mod recipe;
pub mod reference;
pub mod scm;
pub mod version;

pub use error::{RecipeError, Result};
pub use generator::Generator;
pub use os::TargetOs;
pub use package::{FileSelector, package};
pub use package_id::{PackageInfo, Settings, package_id};
pub use recipe::{ConditionalRequirement, HEADER_PATTERN, Recipe, ResolvedRecipe};
pub use reference::Reference;
pub use scm::{Scm, ScmKind, ScmValue};
pub use version::{Constraint, Op, Version, VersionRange};
