//! Integration tests for sweater-recipe
//!
//! Packaging a source tree, per-OS requirements and package ids.

use std::fs;
use std::path::{Path, PathBuf};

use sweater_recipe::*;
use tempfile::TempDir;

fn source_tree() -> TempDir {
    let dir = TempDir::new().unwrap();
    let files = [
        "include/boost/sweater/sweater.hpp",
        "include/boost/sweater/detail/apple.hpp",
        "include/boost/sweater/detail/android.hpp",
        "include/boost/sweater/detail/generic.cpp",
        "include/README.md",
        "test/main.cpp",
        "test/helpers.hpp",
        "conanfile.py",
        "CMakeLists.txt",
    ];
    for file in files {
        let path = dir.path().join(file);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, file).unwrap();
    }
    dir
}

// ============================================================================
// PACKAGING
// ============================================================================

#[test]
fn test_package_copies_only_headers() {
    let source = source_tree();
    let dest = TempDir::new().unwrap();

    let files = package(&Recipe::sweater(), source.path(), dest.path()).unwrap();
    assert_eq!(
        files,
        vec![
            PathBuf::from("include/boost/sweater/detail/android.hpp"),
            PathBuf::from("include/boost/sweater/detail/apple.hpp"),
            PathBuf::from("include/boost/sweater/sweater.hpp"),
        ]
    );

    for file in &files {
        let copied = fs::read_to_string(dest.path().join(file)).unwrap();
        assert_eq!(Path::new(&copied), file.as_path());
    }
    assert!(!dest.path().join("test/helpers.hpp").exists());
    assert!(!dest.path().join("conanfile.py").exists());
    assert!(!dest.path().join("include/README.md").exists());
}

#[test]
fn test_package_empty_tree() {
    let source = TempDir::new().unwrap();
    let dest = TempDir::new().unwrap();
    let files = package(&Recipe::sweater(), source.path(), dest.path()).unwrap();
    assert!(files.is_empty());
}

#[test]
fn test_package_missing_source() {
    let dest = TempDir::new().unwrap();
    let missing = dest.path().join("does-not-exist");
    let err = package(&Recipe::sweater(), &missing, dest.path()).unwrap_err();
    assert!(matches!(err, RecipeError::Io { .. }));
}

// ============================================================================
// REQUIREMENTS
// ============================================================================

#[test]
fn test_requirements_per_os() {
    let recipe = Recipe::sweater();
    for os in TargetOs::ALL {
        let names: Vec<String> = recipe.requirements(os).into_iter().map(|r| r.name).collect();
        let apple = matches!(os, TargetOs::Ios | TargetOs::Macos);
        assert_eq!(names.contains(&"ConcurrentQueue".to_string()), !apple, "{os}");
        assert!(names.starts_with(&["Functionoid".to_string(), "ConfigEx".to_string()]));
    }
}

#[test]
fn test_requirement_strings_parse_back() {
    for requirement in Recipe::sweater().requirements(TargetOs::Linux) {
        let parsed: Reference = requirement.to_string().parse().unwrap();
        assert_eq!(parsed, requirement);
        assert!(parsed.accepts(&Version::new(1, 0, 0)));
    }
}

// ============================================================================
// PACKAGE ID
// ============================================================================

#[test]
fn test_package_id_is_invariant_across_settings() {
    let recipe = Recipe::sweater();
    let baseline = package_id(&recipe, &Settings::for_os(TargetOs::Linux));

    let variants = [
        ("gcc", "9", "Release", "x86_64", TargetOs::Linux),
        ("clang", "15", "Debug", "armv8", TargetOs::Android),
        ("apple-clang", "14", "Release", "armv8", TargetOs::Ios),
        ("Visual Studio", "16", "Debug", "x86", TargetOs::Windows),
    ];
    for (compiler, version, build_type, arch, os) in variants {
        let settings = Settings {
            os: Some(os),
            arch: Some(arch.to_string()),
            compiler: Some(compiler.to_string()),
            compiler_version: Some(version.to_string()),
            build_type: Some(build_type.to_string()),
        };
        assert_eq!(package_id(&recipe, &settings), baseline, "{compiler} on {os}");
    }
}

// ============================================================================
// GENERATOR
// ============================================================================

#[test]
fn test_generate_after_package() {
    let source = source_tree();
    let dest = TempDir::new().unwrap();
    let recipe = Recipe::sweater();
    package(&recipe, source.path(), dest.path()).unwrap();

    let out = TempDir::new().unwrap();
    let path = Generator::Cmake.write(&recipe, dest.path(), out.path()).unwrap();
    let text = fs::read_to_string(path).unwrap();
    assert!(text.contains("CONAN_INCLUDE_DIRS_SWEATER"));
    assert!(text.contains("CONAN_PACKAGE_NAME_SWEATER \"Sweater\""));
}
