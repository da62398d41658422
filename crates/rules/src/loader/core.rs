//! Core [`RuleLoader`] struct: filesystem-backed rule loading and initialization.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::rule::{InitError, Rule};
use crate::schema::{parse_rule_file, RuleDefinition};

use super::error::{LoadResult, LoadStatus, Result, RuleError};

/// A parsed rule definition together with the file it came from.
#[derive(Debug, Clone)]
pub struct LoadedDefinition {
    pub definition: RuleDefinition,
    pub source: PathBuf,
}

/// A rule that was loaded but failed initialization.
#[derive(Debug)]
pub struct InitFailure {
    pub rule: String,
    pub source: PathBuf,
    pub error: InitError,
}

/// Outcome of initializing every loaded definition.
#[derive(Debug, Default)]
pub struct InitReport {
    /// Rules eligible for scheduling, sorted by name.
    pub rules: Vec<Rule>,
    /// Rules excluded because initialization failed.
    pub failures: Vec<InitFailure>,
}

/// Filesystem-backed rule loader.
///
/// `path` may name a single YAML file or a directory. Directories are scanned
/// recursively for `*.yml` / `*.yaml` files; every file may hold one rule or a
/// list of rules. Loaded definitions are kept in an in-memory map keyed by
/// rule name.
pub struct RuleLoader {
    /// Rule file or root directory containing rule YAML files.
    path: PathBuf,
    /// In-memory store of all rule definitions keyed by name.
    definitions: Arc<RwLock<HashMap<String, LoadedDefinition>>>,
}

impl RuleLoader {
    /// Create a new loader for the given file or directory.
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            definitions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Load every rule file under the configured path.
    ///
    /// Dotfiles (filenames starting with `.`) and non-YAML files are skipped.
    /// Subdirectories are scanned recursively.
    /// Parse errors are reported per-file but do not abort the scan.
    pub fn load_all(&self) -> Result<Vec<LoadResult>> {
        let mut results = Vec::new();
        if self.path.is_dir() {
            self.scan_dir_recursive(&self.path, &mut results)?;
        } else if self.path.is_file() {
            self.load_into(&self.path.clone(), &mut results);
        } else {
            return Err(RuleError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("rule path not found: {}", self.path.display()),
            )));
        }
        Ok(results)
    }

    /// Recursively scan a directory for YAML rule files.
    fn scan_dir_recursive(&self, dir: &Path, results: &mut Vec<LoadResult>) -> Result<()> {
        let mut paths = fs::read_dir(dir)?
            .map(|entry| entry.map(|e| e.path()))
            .collect::<std::io::Result<Vec<_>>>()?;
        // Deterministic order so duplicate detection is reproducible.
        paths.sort();

        for path in paths {
            // Skip dotfiles/dotdirs
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                if name.starts_with('.') {
                    if path.is_file() {
                        results.push(LoadResult {
                            path,
                            status: LoadStatus::Skipped {
                                reason: "dotfile".to_string(),
                            },
                        });
                    }
                    continue;
                }
            }

            // Recurse into subdirectories
            if path.is_dir() {
                self.scan_dir_recursive(&path, results)?;
                continue;
            }

            if !is_yaml(&path) {
                results.push(LoadResult {
                    path,
                    status: LoadStatus::Skipped {
                        reason: "not a YAML file".to_string(),
                    },
                });
                continue;
            }

            self.load_into(&path, results);
        }

        Ok(())
    }

    /// Load one file and record its outcome; duplicate names get their own failure entry.
    fn load_into(&self, path: &Path, results: &mut Vec<LoadResult>) {
        let definitions = match self.load_file(path) {
            Ok(defs) => defs,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load rule file");
                results.push(LoadResult {
                    path: path.to_path_buf(),
                    status: LoadStatus::Failed {
                        error: e.to_string(),
                    },
                });
                return;
            }
        };

        let mut rule_names = Vec::with_capacity(definitions.len());
        for definition in definitions {
            let name = definition.name.clone();
            match self.insert_definition(definition, path) {
                Ok(()) => {
                    info!(rule = %name, path = %path.display(), "loaded rule");
                    rule_names.push(name);
                }
                Err(e) => {
                    warn!(rule = %name, path = %path.display(), error = %e, "rejected rule");
                    results.push(LoadResult {
                        path: path.to_path_buf(),
                        status: LoadStatus::Failed {
                            error: e.to_string(),
                        },
                    });
                }
            }
        }

        results.push(LoadResult {
            path: path.to_path_buf(),
            status: LoadStatus::Loaded { rule_names },
        });
    }

    /// Parse a single YAML file into its rule definitions.
    pub fn load_file(&self, path: &Path) -> Result<Vec<RuleDefinition>> {
        let contents = fs::read_to_string(path)?;
        Ok(parse_rule_file(&contents)?)
    }

    fn insert_definition(&self, definition: RuleDefinition, source: &Path) -> Result<()> {
        let mut definitions = self
            .definitions
            .write()
            .expect("definitions lock poisoned");
        if let Some(existing) = definitions.get(&definition.name) {
            return Err(RuleError::Validation(format!(
                "duplicate rule name '{}' (first defined in {})",
                definition.name,
                existing.source.display()
            )));
        }
        definitions.insert(
            definition.name.clone(),
            LoadedDefinition {
                definition,
                source: source.to_path_buf(),
            },
        );
        Ok(())
    }

    /// Snapshot of every loaded definition, sorted by rule name.
    pub fn definitions(&self) -> Vec<LoadedDefinition> {
        let mut defs: Vec<_> = self
            .definitions
            .read()
            .expect("definitions lock poisoned")
            .values()
            .cloned()
            .collect();
        defs.sort_by(|a, b| a.definition.name.cmp(&b.definition.name));
        defs
    }

    /// Initialize every loaded definition.
    ///
    /// A rule that fails initialization is excluded and reported once; it
    /// never affects the other rules.
    pub fn initialize(&self) -> InitReport {
        let mut report = InitReport::default();
        for loaded in self.definitions() {
            let name = loaded.definition.name.clone();
            let base_dir = loaded.source.parent();
            match Rule::init(loaded.definition, base_dir) {
                Ok(rule) => report.rules.push(rule),
                Err(error) => {
                    warn!(rule = %name, path = %loaded.source.display(), error = %error, "rule failed to initialize, excluded");
                    report.failures.push(InitFailure {
                        rule: name,
                        source: loaded.source,
                        error,
                    });
                }
            }
        }
        report
    }

    /// Get the configured rule path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e == "yml" || e == "yaml")
        .unwrap_or(false)
}
