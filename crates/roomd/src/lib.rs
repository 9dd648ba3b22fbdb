pub mod api;
pub mod config;
pub mod engine;

pub use config::Config;
pub use config::Diagnostic;
pub use config::LogLevel;
pub use config::format_diagnostics;
pub use engine::ControlCommand;
pub use engine::ControlSnapshot;
pub use engine::Engine;
pub use engine::Mode;
pub use engine::RoomState;
pub use engine::SensorReading;
pub use engine::ThresholdUpdate;
