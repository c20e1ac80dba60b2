//! Data loading and validation.
//!
//! A data directory holds `rules/*.ron` rule libraries and
//! `scenarios/*.ron` scenarios. Files are read in name order so reports
//! are stable across platforms.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use skirmish_core::error::EngineError;
use skirmish_core::rules::RuleLibrary;
use thiserror::Error;

use crate::scenario::Scenario;

/// Errors that can occur while loading data files.
#[derive(Error, Debug)]
pub enum LoadError {
    /// Directory not found.
    #[error("Directory not found: {0}")]
    DirectoryNotFound(String),
    /// Failed to read a file or directory.
    #[error("IO error reading '{path}': {source}")]
    Io {
        /// Path being read.
        path: String,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },
    /// A file parsed but failed validation.
    #[error("Invalid data in '{path}': {source}")]
    Invalid {
        /// Offending file.
        path: String,
        /// Validation error.
        #[source]
        source: EngineError,
    },
}

/// Outcome of validating a data directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    /// Rule libraries loaded.
    pub libraries: usize,
    /// Rules across all libraries.
    pub rules: usize,
    /// Scenarios checked.
    pub scenarios: usize,
    /// Problems found, one line each.
    pub errors: Vec<String>,
}

impl ValidationReport {
    /// Whether no problems were found.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// `.ron` files directly inside `dir`, sorted by path.
fn ron_files(dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let io = |source| LoadError::Io {
        path: dir.display().to_string(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(io)? {
        let path = entry.map_err(io)?.path();
        if path.extension().is_some_and(|e| e == "ron") {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Load and validate one RON rule library.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the library is invalid.
pub fn load_rule_library(path: &Path) -> Result<RuleLibrary, LoadError> {
    let content = fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    RuleLibrary::from_ron_str(&content).map_err(|source| LoadError::Invalid {
        path: path.display().to_string(),
        source,
    })
}

/// Load every rule library in a directory, skipping files that fail.
///
/// # Errors
///
/// Returns an error if the directory does not exist or cannot be listed.
pub fn load_rule_libraries(dir: &Path) -> Result<Vec<RuleLibrary>, LoadError> {
    if !dir.exists() {
        return Err(LoadError::DirectoryNotFound(dir.display().to_string()));
    }
    let mut libraries = Vec::new();
    for path in ron_files(dir)? {
        match load_rule_library(&path) {
            Ok(library) => libraries.push(library),
            Err(e) => tracing::warn!("Failed to load rule library from {:?}: {}", path, e),
        }
    }
    Ok(libraries)
}

/// Validate all RON data files in a directory.
///
/// Checks for:
/// - Rule libraries that fail to parse or validate
/// - Rule ids defined by more than one library
/// - Scenarios that fail to parse, reference unknown units or rules, or
///   cannot prepare their declared attack
///
/// # Errors
///
/// Returns an error only if the directory itself cannot be read; problems
/// with individual files are collected in the report.
pub fn validate_data_directory(path: &Path) -> Result<ValidationReport, LoadError> {
    if !path.exists() {
        return Err(LoadError::DirectoryNotFound(path.display().to_string()));
    }
    let mut report = ValidationReport::default();

    let mut libraries = Vec::new();
    let rules_dir = path.join("rules");
    if rules_dir.exists() {
        let mut owners: BTreeMap<String, String> = BTreeMap::new();
        for file in ron_files(&rules_dir)? {
            match load_rule_library(&file) {
                Ok(library) => {
                    for rule in &library.rules {
                        if let Some(first) = owners.insert(rule.id.clone(), library.name.clone()) {
                            report.errors.push(format!(
                                "Rule '{}' is defined in both '{first}' and '{}'",
                                rule.id, library.name
                            ));
                        }
                    }
                    tracing::debug!(library = %library.name, rules = library.rules.len(), "Loaded rule library");
                    report.rules += library.rules.len();
                    libraries.push(library);
                }
                Err(e) => report.errors.push(e.to_string()),
            }
        }
    }
    report.libraries = libraries.len();

    let scenarios_dir = path.join("scenarios");
    if scenarios_dir.exists() {
        for file in ron_files(&scenarios_dir)? {
            report.scenarios += 1;
            let scenario = match Scenario::load(&file) {
                Ok(s) => s,
                Err(e) => {
                    report.errors.push(format!("{}: {e}", file.display()));
                    continue;
                }
            };
            let problems = scenario.validate();
            if !problems.is_empty() {
                report
                    .errors
                    .extend(problems.into_iter().map(|p| format!("{}: {p}", file.display())));
                continue;
            }
            if let Err(e) = scenario.prepare(&libraries) {
                report.errors.push(format!("{}: {e}", file.display()));
            }
        }
    }

    Ok(report)
}
