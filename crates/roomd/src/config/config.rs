use std::collections::HashMap;
use std::net::IpAddr;
use std::net::Ipv4Addr;
use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;

use super::diagnostics::Diagnostic;
use super::diagnostics::Error;
use super::diagnostics::LoadError;
use super::diagnostics::MergeConflictLocation;
use super::diagnostics::SourceInfo;
use super::diagnostics::ValidationError;
use super::diagnostics::Warning;
use super::diagnostics::format_diagnostics;
use super::partial::PartialConfig;
use crate::engine::RoomState;
use crate::engine::Thresholds;

/// Highest reading the LDR's ADC produces.
const LIGHT_SENSOR_MAX: i64 = 4095;

#[derive(Debug, Default)]
pub struct Config {
    pub logging: LoggingConfig,
    pub http: HttpConfig,
    pub room: RoomConfig,
}

// LogLevel needs Deserialize because it's used in PartialLoggingConfig with toml::Spanned
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: LogLevel,

    /// Per-target levels, e.g. `"roomd::engine" = "debug"`
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Build the subscriber filter for this configuration.
    pub fn targets(&self) -> Targets {
        self.overrides.iter().fold(
            Targets::new().with_default(LevelFilter::from(self.level)),
            |targets, (target, level)| targets.with_target(target.clone(), LevelFilter::from(*level)),
        )
    }
}

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Address to bind; the device firmware expects every interface
    pub listen: IpAddr,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 5000,
        }
    }
}

impl HttpConfig {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen, self.port)
    }
}

/// Initial values for the room state fields that are configurable.
#[derive(Debug, Clone, PartialEq)]
pub struct RoomConfig {
    pub auto_mode: bool,
    pub temp_threshold: f64,
    pub light_threshold: i64,
}

impl Default for RoomConfig {
    fn default() -> Self {
        let state = RoomState::default();
        Self {
            auto_mode: state.auto_mode,
            temp_threshold: state.thresholds.temp_threshold,
            light_threshold: state.thresholds.light_threshold,
        }
    }
}

impl RoomConfig {
    /// The room state the engine starts from.
    pub fn initial_state(&self) -> RoomState {
        RoomState {
            auto_mode: self.auto_mode,
            thresholds: Thresholds {
                temp_threshold: self.temp_threshold,
                light_threshold: self.light_threshold,
            },
            ..RoomState::default()
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("{}", format_diagnostics(.0))]
    Invalid(Vec<Diagnostic>),
}

impl Config {
    /// Load configuration from multiple TOML files with import resolution
    ///
    /// Supports:
    /// - Multiple config files (e.g., base + site overrides)
    /// - `imports` within config files, resolved relative to the importing file
    /// - Conflict detection across all sources
    /// - Validation with all errors and warnings reported together
    ///
    /// With no paths the defaults are returned. Returns Ok((Config, diagnostics))
    /// where diagnostics only holds warnings; any error yields `ConfigError`.
    pub fn from_files(paths: &[PathBuf]) -> Result<(Self, Vec<Diagnostic>), ConfigError> {
        let configs = PartialConfig::load_with_imports(paths)?;

        // Merge with first-wins semantics, collecting diagnostics
        let (partial, diagnostics) = PartialConfig::merge(configs);

        Self::from_partial(partial, diagnostics)
    }

    /// Convert a PartialConfig to a Config, validating all fields
    ///
    /// Takes diagnostics from the merge step and adds validation diagnostics.
    pub fn from_partial(
        partial: PartialConfig,
        mut diagnostics: Vec<Diagnostic>,
    ) -> Result<(Self, Vec<Diagnostic>), ConfigError> {
        let origins = &partial.origins;

        let logging = partial
            .logging
            .map(|logging| LoggingConfig {
                level: logging.level.map(|s| s.into_inner()).unwrap_or_default(),
                overrides: logging
                    .overrides
                    .map(|hm| hm.into_iter().map(|(k, v)| (k, v.into_inner())).collect())
                    .unwrap_or_default(),
            })
            .unwrap_or_default();

        let mut http = HttpConfig::default();
        if let Some(partial_http) = partial.http {
            if let Some(listen) = partial_http.listen {
                match listen.get_ref().parse::<IpAddr>() {
                    Ok(addr) => http.listen = addr,
                    Err(e) => diagnostics.push(validation_error(
                        origins,
                        "http.listen",
                        format!("'{}' is not an IP address: {}", listen.get_ref(), e),
                    )),
                }
            }
            if let Some(port) = partial_http.port {
                if *port.get_ref() == 0 {
                    diagnostics.push(validation_error(
                        origins,
                        "http.port",
                        "port must be non-zero".to_string(),
                    ));
                } else {
                    http.port = port.into_inner();
                }
            }
        }

        let mut room = RoomConfig::default();
        if let Some(partial_room) = partial.room {
            if let Some(auto_mode) = partial_room.auto_mode {
                room.auto_mode = auto_mode.into_inner();
            }
            if let Some(temp_threshold) = partial_room.temp_threshold {
                let value = temp_threshold.into_inner();
                if value.is_finite() {
                    room.temp_threshold = value;
                } else {
                    diagnostics.push(validation_error(
                        origins,
                        "room.temp_threshold",
                        format!("temperature threshold must be a finite number, got {}", value),
                    ));
                }
            }
            if let Some(light_threshold) = partial_room.light_threshold {
                let value = light_threshold.into_inner();
                if !(0..=LIGHT_SENSOR_MAX).contains(&value) {
                    diagnostics.push(Diagnostic::Warning(Warning::LightThresholdOutOfRange {
                        value,
                        file_path: origins
                            .get("room.light_threshold")
                            .map(|origin| origin.file_path.clone()),
                    }));
                }
                room.light_threshold = value;
            }
        }

        let config = Config {
            logging,
            http,
            room,
        };

        if diagnostics.iter().any(|d| d.is_error()) {
            Err(ConfigError::Invalid(diagnostics))
        } else {
            Ok((config, diagnostics))
        }
    }
}

/// Build a validation error pointing at where `field_path` was defined.
fn validation_error(
    origins: &HashMap<String, MergeConflictLocation>,
    field_path: &str,
    message: String,
) -> Diagnostic {
    let origin = origins.get(field_path);
    Diagnostic::Error(Error::Validation(ValidationError {
        field_path: field_path.to_string(),
        message,
        span: origin.map(|o| o.span.clone()),
        source: origin.map(|o| SourceInfo {
            file_path: o.file_path.clone(),
            content: o.content.clone(),
        }),
    }))
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use tempfile::TempDir;
    use tracing::Level;

    use super::*;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_no_files_yields_defaults() {
        let (config, diagnostics) = Config::from_files(&[]).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.http.socket_addr(), "0.0.0.0:5000".parse().unwrap());
        assert_eq!(config.room, RoomConfig::default());
        assert_eq!(config.room.initial_state(), RoomState::default());
    }

    #[test]
    fn test_full_config() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(
            temp_dir.path(),
            "roomd.toml",
            r#"
[logging]
level = "debug"

[logging.overrides]
"roomd::api" = "trace"

[http]
listen = "127.0.0.1"
port = 8080

[room]
auto_mode = false
temp_threshold = 22.5
light_threshold = 1800
"#,
        );

        let (config, diagnostics) = Config::from_files(&[path]).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(
            config.logging.overrides.get("roomd::api"),
            Some(&LogLevel::Trace)
        );
        assert_eq!(config.http.socket_addr(), "127.0.0.1:8080".parse().unwrap());

        let state = config.room.initial_state();
        assert!(!state.auto_mode);
        assert_eq!(state.thresholds.temp_threshold, 22.5);
        assert_eq!(state.thresholds.light_threshold, 1800);
        assert_eq!(state.sensors.temperature, 20.0);
    }

    #[test]
    fn test_merge_non_overlapping_configs() {
        let temp_dir = TempDir::new().unwrap();
        let base = write(
            temp_dir.path(),
            "base.toml",
            r#"
[room]
temp_threshold = 27.0
"#,
        );
        let site = write(
            temp_dir.path(),
            "site.toml",
            r#"
[room]
light_threshold = 1500

[http]
port = 9000
"#,
        );

        let (config, diagnostics) = Config::from_files(&[base, site]).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(config.room.temp_threshold, 27.0);
        assert_eq!(config.room.light_threshold, 1500);
        assert_eq!(config.http.port, 9000);
    }

    #[test]
    fn test_conflict_detection() {
        let temp_dir = TempDir::new().unwrap();
        let base = write(temp_dir.path(), "base.toml", "[room]\nauto_mode = true\n");
        let other = write(temp_dir.path(), "other.toml", "[room]\nauto_mode = false\n");

        let err = Config::from_files(&[base, other]).unwrap_err();
        let ConfigError::Invalid(diagnostics) = err else {
            panic!("Expected invalid config");
        };
        assert_eq!(diagnostics.len(), 1);
        match &diagnostics[0] {
            Diagnostic::Error(Error::Merge(merge_error)) => {
                assert_eq!(merge_error.field_path, "room.auto_mode");
                assert_eq!(merge_error.conflicts.len(), 2);
            }
            other => panic!("Expected merge error, got {:?}", other),
        }
    }

    #[test]
    fn test_override_conflict_detection() {
        let temp_dir = TempDir::new().unwrap();
        let a = write(
            temp_dir.path(),
            "a.toml",
            "[logging.overrides]\n\"roomd::engine\" = \"debug\"\n",
        );
        let b = write(
            temp_dir.path(),
            "b.toml",
            "[logging.overrides]\n\"roomd::engine\" = \"warn\"\n\"roomd::api\" = \"warn\"\n",
        );

        let err = Config::from_files(&[a, b]).unwrap_err();
        let ConfigError::Invalid(diagnostics) = err else {
            panic!("Expected invalid config");
        };
        assert_eq!(diagnostics.len(), 1);
        assert!(format_diagnostics(&diagnostics).contains("logging.overrides.roomd::engine"));
    }

    #[test]
    fn test_imports_resolved_relative_to_importer() {
        let temp_dir = TempDir::new().unwrap();
        fs::create_dir(temp_dir.path().join("conf.d")).unwrap();
        write(
            &temp_dir.path().join("conf.d"),
            "room.toml",
            "[room]\nlight_threshold = 2500\n",
        );
        let main = write(
            temp_dir.path(),
            "roomd.toml",
            "imports = [\"conf.d/room.toml\"]\n\n[http]\nport = 5001\n",
        );

        let (config, diagnostics) = Config::from_files(&[main]).unwrap();
        assert!(diagnostics.is_empty());
        assert_eq!(config.room.light_threshold, 2500);
        assert_eq!(config.http.port, 5001);
    }

    #[test]
    fn test_import_cycle() {
        let temp_dir = TempDir::new().unwrap();
        write(temp_dir.path(), "a.toml", "imports = [\"b.toml\"]\n");
        write(temp_dir.path(), "b.toml", "imports = [\"a.toml\"]\n");

        let err = Config::from_files(&[temp_dir.path().join("a.toml")]).unwrap_err();
        assert!(
            matches!(err, ConfigError::Load(LoadError::ImportCycle { .. })),
            "{:?}",
            err
        );
    }

    #[test]
    fn test_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let err = Config::from_files(&[temp_dir.path().join("nope.toml")]).unwrap_err();
        assert!(matches!(err, ConfigError::Load(LoadError::Io { .. })));
    }

    #[test]
    fn test_parse_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(temp_dir.path(), "bad.toml", "[room]\nlight_threshold = \"dim\"\n");
        let err = Config::from_files(&[path]).unwrap_err();
        assert!(matches!(err, ConfigError::Load(LoadError::Parse { .. })));
    }

    #[test]
    fn test_empty_config_warning() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(temp_dir.path(), "empty.toml", "");

        let (_, diagnostics) = Config::from_files(&[path]).unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(matches!(
            diagnostics[0],
            Diagnostic::Warning(Warning::EmptyConfig { .. })
        ));
    }

    #[test]
    fn test_invalid_listen_address_points_at_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(temp_dir.path(), "roomd.toml", "[http]\nlisten = \"kitchen\"\n");

        let err = Config::from_files(&[path.clone()]).unwrap_err();
        let ConfigError::Invalid(diagnostics) = err else {
            panic!("Expected invalid config");
        };
        match &diagnostics[0] {
            Diagnostic::Error(Error::Validation(validation)) => {
                assert_eq!(validation.field_path, "http.listen");
                assert!(validation.span.is_some());
                assert_eq!(validation.source.as_ref().unwrap().file_path, path);
            }
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_port_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(temp_dir.path(), "roomd.toml", "[http]\nport = 0\n");
        assert!(matches!(
            Config::from_files(&[path]),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_non_finite_temp_threshold_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(temp_dir.path(), "roomd.toml", "[room]\ntemp_threshold = nan\n");

        let err = Config::from_files(&[path]).unwrap_err();
        assert!(err.to_string().contains("room.temp_threshold"), "{}", err);
    }

    #[test]
    fn test_light_threshold_out_of_range_warns() {
        let temp_dir = TempDir::new().unwrap();
        let path = write(temp_dir.path(), "roomd.toml", "[room]\nlight_threshold = 5000\n");

        let (config, diagnostics) = Config::from_files(&[path]).unwrap();
        assert_eq!(config.room.light_threshold, 5000);
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].is_warning());
    }

    #[test]
    fn test_logging_targets() {
        let logging = LoggingConfig {
            level: LogLevel::Warn,
            overrides: HashMap::from([("roomd::engine".to_string(), LogLevel::Debug)]),
        };
        let targets = logging.targets();
        assert!(targets.would_enable("roomd::engine", &Level::DEBUG));
        assert!(!targets.would_enable("roomd::api", &Level::INFO));
        assert!(targets.would_enable("roomd::api", &Level::WARN));
    }
}
