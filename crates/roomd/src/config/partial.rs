use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use toml::Spanned;

use super::LogLevel;
use super::diagnostics::Diagnostic;
use super::diagnostics::Error;
use super::diagnostics::LoadError;
use super::diagnostics::MergeConflictLocation;
use super::diagnostics::MergeError;
use super::diagnostics::SourceInfo;
use super::diagnostics::Warning;

#[derive(Debug, Default, Deserialize)]
pub struct PartialConfig {
    #[serde(default)]
    pub imports: Vec<String>,

    pub logging: Option<PartialLoggingConfig>,
    pub http: Option<PartialHttpConfig>,
    pub room: Option<PartialRoomConfig>,

    /// Source information for error reporting (not serialized)
    #[serde(skip)]
    pub source: Option<SourceInfo>,

    /// Where each merged field was defined, keyed by field path
    #[serde(skip)]
    pub origins: HashMap<String, MergeConflictLocation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialLoggingConfig {
    pub level: Option<Spanned<LogLevel>>,
    pub overrides: Option<HashMap<String, Spanned<LogLevel>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialHttpConfig {
    pub listen: Option<Spanned<String>>,
    pub port: Option<Spanned<u16>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PartialRoomConfig {
    pub auto_mode: Option<Spanned<bool>>,
    pub temp_threshold: Option<Spanned<f64>>,
    pub light_threshold: Option<Spanned<i64>>,
}

impl PartialConfig {
    /// Load a single config file without processing imports
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
            path: path.to_path_buf(),
            error: e,
        })?;

        let mut config: PartialConfig = toml::from_str(&content).map_err(|e| LoadError::Parse {
            path: path.to_path_buf(),
            error: e,
        })?;

        config.source = Some(SourceInfo {
            file_path: path.to_path_buf(),
            content,
        });

        Ok(config)
    }

    /// Load config files with import resolution
    ///
    /// Each config file is loaded, then its imports are recursively processed.
    /// Cycle detection prevents infinite loops.
    ///
    /// Returns a Vec of all loaded configs in order (imports first, then parent)
    pub fn load_with_imports(paths: &[PathBuf]) -> Result<Vec<Self>, LoadError> {
        let mut visited = HashSet::new();
        let mut all_configs = Vec::new();

        for path in paths {
            Self::load_recursive(path, &mut visited, &mut all_configs)?;
        }

        Ok(all_configs)
    }

    fn load_recursive(
        path: &Path,
        visited: &mut HashSet<PathBuf>,
        configs: &mut Vec<Self>,
    ) -> Result<(), LoadError> {
        let canonical_path = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf());

        if visited.contains(&canonical_path) {
            return Err(LoadError::ImportCycle {
                path: canonical_path,
                cycle: visited.iter().cloned().collect(),
            });
        }

        visited.insert(canonical_path.clone());

        let config = Self::from_file(path)?;

        // Imports are relative to the file that names them
        for import in &config.imports {
            let import_path = PathBuf::from(import);
            let resolved = if import_path.is_absolute() {
                import_path
            } else {
                path.parent().unwrap_or_else(|| Path::new(".")).join(import_path)
            };

            Self::load_recursive(&resolved, visited, configs)?;
        }

        configs.push(config);

        // Siblings may import the same file; only ancestors form a cycle
        visited.remove(&canonical_path);

        Ok(())
    }

    fn is_empty(&self) -> bool {
        self.logging.is_none() && self.http.is_none() && self.room.is_none() && self.imports.is_empty()
    }

    /// Merge multiple partial configs together
    ///
    /// Uses first-wins semantics: the first occurrence of a field is kept.
    /// A field set in more than one file is recorded as a conflict, but merging
    /// continues so every conflict is reported at once.
    ///
    /// Returns (merged, diagnostics) where diagnostics may contain warnings and errors
    pub fn merge<I>(configs: I) -> (Self, Vec<Diagnostic>)
    where
        I: IntoIterator<Item = Self>,
    {
        let mut result = PartialConfig::default();
        let mut merger = Merger::default();
        let mut imports = Vec::new();

        for config in configs {
            imports.extend(config.imports.iter().cloned());

            let source = config.source.clone().unwrap_or_else(|| SourceInfo {
                file_path: PathBuf::from("<unknown>"),
                content: String::new(),
            });

            if config.is_empty() {
                merger.diagnostics.push(Diagnostic::Warning(Warning::EmptyConfig {
                    file_path: source.file_path.clone(),
                }));
            }

            if let Some(logging) = config.logging {
                let target = result.logging.get_or_insert_with(Default::default);

                merger.field(
                    "logging.level",
                    "Logging level",
                    &mut target.level,
                    logging.level,
                    &source,
                );

                if let Some(overrides) = logging.overrides {
                    let target_overrides = target.overrides.get_or_insert_with(HashMap::new);
                    for (key, value) in overrides {
                        let mut slot = target_overrides.remove(&key);
                        merger.field(
                            &format!("logging.overrides.{}", key),
                            &format!("Logging override for '{}'", key),
                            &mut slot,
                            Some(value),
                            &source,
                        );
                        if let Some(kept) = slot {
                            target_overrides.insert(key, kept);
                        }
                    }
                }
            }

            if let Some(http) = config.http {
                let target = result.http.get_or_insert_with(Default::default);
                merger.field("http.listen", "Listen address", &mut target.listen, http.listen, &source);
                merger.field("http.port", "Port", &mut target.port, http.port, &source);
            }

            if let Some(room) = config.room {
                let target = result.room.get_or_insert_with(Default::default);
                merger.field("room.auto_mode", "Auto mode", &mut target.auto_mode, room.auto_mode, &source);
                merger.field(
                    "room.temp_threshold",
                    "Temperature threshold",
                    &mut target.temp_threshold,
                    room.temp_threshold,
                    &source,
                );
                merger.field(
                    "room.light_threshold",
                    "Light threshold",
                    &mut target.light_threshold,
                    room.light_threshold,
                    &source,
                );
            }
        }

        result.imports = imports;
        result.origins = merger.first_seen;

        (result, merger.diagnostics)
    }
}

/// Tracks where each field was first defined so later definitions can be
/// reported as conflicts.
#[derive(Default)]
struct Merger {
    first_seen: HashMap<String, MergeConflictLocation>,
    diagnostics: Vec<Diagnostic>,
}

impl Merger {
    fn field<T>(
        &mut self,
        field_path: &str,
        what: &str,
        slot: &mut Option<Spanned<T>>,
        incoming: Option<Spanned<T>>,
        source: &SourceInfo,
    ) {
        let Some(incoming) = incoming else {
            return;
        };

        let location = MergeConflictLocation {
            file_path: source.file_path.clone(),
            span: incoming.span(),
            content: source.content.clone(),
        };

        if let Some(first) = self.first_seen.get(field_path) {
            self.diagnostics.push(Diagnostic::Error(Error::Merge(MergeError {
                field_path: field_path.to_string(),
                message: format!("{} defined in multiple config files", what),
                conflicts: vec![first.clone(), location],
            })));
        } else {
            *slot = Some(incoming);
            self.first_seen.insert(field_path.to_string(), location);
        }
    }
}
