use std::ops::Range;
use std::path::PathBuf;

/// Source information for where a diagnostic came from
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub file_path: PathBuf,
    pub content: String,
}

/// A diagnostic message that can be either a warning or an error
#[derive(Debug, Clone)]
pub enum Diagnostic {
    Warning(Warning),
    Error(Error),
}

/// Warning messages that don't prevent config loading
#[derive(Debug, Clone)]
pub enum Warning {
    EmptyConfig {
        file_path: PathBuf,
    },

    /// The light threshold lies outside the LDR's 0-4095 range, so the LED
    /// is either always or never on in auto mode.
    LightThresholdOutOfRange {
        value: i64,
        file_path: Option<PathBuf>,
    },
}

/// Error messages that indicate problems with the config
#[derive(Debug, Clone)]
pub enum Error {
    Merge(MergeError),
    Validation(ValidationError),
}

/// Error type for merge conflicts
#[derive(Debug, Clone)]
pub struct MergeError {
    pub field_path: String,
    pub message: String,
    pub conflicts: Vec<MergeConflictLocation>,
}

#[derive(Debug, Clone)]
pub struct MergeConflictLocation {
    pub file_path: PathBuf,
    pub span: Range<usize>,
    pub content: String,
}

/// Error type for validation failures
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field_path: String,
    pub message: String,
    pub span: Option<Range<usize>>,
    pub source: Option<SourceInfo>,
}

/// Error type for config loading failures
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to read '{}': {error}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("Failed to parse '{}': {error}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        error: toml::de::Error,
    },

    #[error("Import cycle detected at '{}': involves {} file(s)", .path.display(), .cycle.len())]
    ImportCycle { path: PathBuf, cycle: Vec<PathBuf> },
}

impl Diagnostic {
    /// Returns true if this diagnostic is an error
    pub fn is_error(&self) -> bool {
        matches!(self, Diagnostic::Error(_))
    }

    /// Returns true if this diagnostic is a warning
    pub fn is_warning(&self) -> bool {
        matches!(self, Diagnostic::Warning(_))
    }
}

/// Format all diagnostics for display using Ariadne
pub fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    use std::io::Write;

    use ariadne::Color;
    use ariadne::Label;
    use ariadne::Report;
    use ariadne::ReportKind;
    use ariadne::Source;

    let mut output = Vec::new();

    for diagnostic in diagnostics {
        match diagnostic {
            Diagnostic::Warning(warning) => match warning {
                Warning::EmptyConfig { file_path } => {
                    writeln!(
                        &mut output,
                        "Warning: Config file '{}' is empty and has no effect",
                        file_path.display()
                    )
                    .ok();
                }
                Warning::LightThresholdOutOfRange { value, file_path } => {
                    let location = file_path
                        .as_ref()
                        .map(|p| format!(" (in '{}')", p.display()))
                        .unwrap_or_default();
                    writeln!(
                        &mut output,
                        "Warning: room.light_threshold = {} is outside the sensor range 0-4095{}",
                        value, location
                    )
                    .ok();
                }
            },
            Diagnostic::Error(error) => match error {
                Error::Merge(merge_error) => {
                    // Build a report with the first conflict's span
                    let first_conflict = &merge_error.conflicts[0];
                    let mut report = Report::build(
                        ReportKind::Error,
                        (
                            first_conflict.file_path.to_string_lossy().to_string(),
                            first_conflict.span.clone(),
                        ),
                    )
                    .with_message(format!("Merge conflict in field '{}'", merge_error.field_path))
                    .with_note(&merge_error.message);

                    for (idx, conflict) in merge_error.conflicts.iter().enumerate() {
                        let label_msg = if idx == 0 {
                            "first definition here"
                        } else {
                            "conflicts with this definition"
                        };

                        report = report.with_label(
                            Label::new((
                                conflict.file_path.to_string_lossy().to_string(),
                                conflict.span.clone(),
                            ))
                            .with_message(label_msg)
                            .with_color(if idx == 0 { Color::Red } else { Color::Yellow }),
                        );
                    }

                    let finished_report = report.finish();

                    // Write once per unique source file
                    let mut written_files = std::collections::HashSet::new();
                    for conflict in &merge_error.conflicts {
                        let file_id = conflict.file_path.to_string_lossy().to_string();
                        if written_files.insert(file_id.clone()) {
                            let source = Source::from(conflict.content.clone());
                            finished_report.write((file_id, source), &mut output).ok();
                        }
                    }
                }
                Error::Validation(validation_error) => {
                    if let (Some(span), Some(source_info)) =
                        (&validation_error.span, &validation_error.source)
                    {
                        let file_id = source_info.file_path.to_string_lossy().to_string();
                        let report =
                            Report::build(ReportKind::Error, (file_id.clone(), span.clone()))
                                .with_message(format!(
                                    "Validation error in '{}'",
                                    validation_error.field_path
                                ))
                                .with_label(
                                    Label::new((file_id.clone(), span.clone()))
                                        .with_message(&validation_error.message)
                                        .with_color(Color::Red),
                                )
                                .finish();

                        let source = Source::from(source_info.content.clone());
                        report.write((file_id, source), &mut output).ok();
                    } else {
                        writeln!(
                            &mut output,
                            "Validation error in '{}': {}",
                            validation_error.field_path, validation_error.message
                        )
                        .ok();
                    }
                }
            },
        }
    }

    String::from_utf8_lossy(&output).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diagnostic_kinds() {
        let warning = Diagnostic::Warning(Warning::EmptyConfig {
            file_path: PathBuf::from("empty.toml"),
        });
        assert!(warning.is_warning());
        assert!(!warning.is_error());

        let error = Diagnostic::Error(Error::Validation(ValidationError {
            field_path: "http.port".to_string(),
            message: "port must be non-zero".to_string(),
            span: None,
            source: None,
        }));
        assert!(error.is_error());
        assert!(!error.is_warning());
    }

    #[test]
    fn test_format_plain_messages() {
        let diagnostics = vec![
            Diagnostic::Warning(Warning::EmptyConfig {
                file_path: PathBuf::from("/tmp/empty.toml"),
            }),
            Diagnostic::Warning(Warning::LightThresholdOutOfRange {
                value: 5000,
                file_path: None,
            }),
            Diagnostic::Error(Error::Validation(ValidationError {
                field_path: "http.port".to_string(),
                message: "port must be non-zero".to_string(),
                span: None,
                source: None,
            })),
        ];

        let output = format_diagnostics(&diagnostics);
        assert_eq!(
            output,
            "Warning: Config file '/tmp/empty.toml' is empty and has no effect\n\
             Warning: room.light_threshold = 5000 is outside the sensor range 0-4095\n\
             Validation error in 'http.port': port must be non-zero\n"
        );
    }

    #[test]
    fn test_format_merge_error_mentions_field_and_note() {
        let diagnostics = vec![Diagnostic::Error(Error::Merge(MergeError {
            field_path: "room.auto_mode".to_string(),
            message: "Auto mode defined in multiple config files".to_string(),
            conflicts: vec![
                MergeConflictLocation {
                    file_path: PathBuf::from("/tmp/base.toml"),
                    span: 7..23,
                    content: "[room]\nauto_mode = true\n".to_string(),
                },
                MergeConflictLocation {
                    file_path: PathBuf::from("/tmp/override.toml"),
                    span: 7..24,
                    content: "[room]\nauto_mode = false\n".to_string(),
                },
            ],
        }))];

        let output = format_diagnostics(&diagnostics);
        assert!(output.contains("Merge conflict in field 'room.auto_mode'"));
        assert!(output.contains("/tmp/base.toml"));
        assert!(output.contains("/tmp/override.toml"));
        assert!(output.contains("first definition here"));
    }

    #[test]
    fn test_format_validation_error_with_span() {
        let content = "[http]\nlisten = \"not-an-ip\"\n";
        let diagnostics = vec![Diagnostic::Error(Error::Validation(ValidationError {
            field_path: "http.listen".to_string(),
            message: "invalid IP address".to_string(),
            span: Some(16..27),
            source: Some(SourceInfo {
                file_path: PathBuf::from("/tmp/roomd.toml"),
                content: content.to_string(),
            }),
        }))];

        let output = format_diagnostics(&diagnostics);
        assert!(output.contains("Validation error in 'http.listen'"));
        assert!(output.contains("/tmp/roomd.toml"));
        assert!(output.contains("invalid IP address"));
    }

    #[test]
    fn test_load_error_display() {
        let error = LoadError::ImportCycle {
            path: PathBuf::from("/tmp/a.toml"),
            cycle: vec![PathBuf::from("/tmp/a.toml"), PathBuf::from("/tmp/b.toml")],
        };
        let display = error.to_string();
        assert!(display.contains("Import cycle detected"));
        assert!(display.contains("/tmp/a.toml"));
        assert!(display.contains("2 file(s)"));
    }
}
