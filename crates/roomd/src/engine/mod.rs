#[allow(clippy::module_inception)]
mod engine;
pub mod message;
pub mod policy;
pub mod state;

pub use engine::Engine;
pub use message::ControlCommand;
pub use message::MessageError;
pub use message::SensorReading;
pub use message::ThresholdUpdate;
pub use state::Actuators;
pub use state::ControlSnapshot;
pub use state::Mode;
pub use state::RoomState;
pub use state::SensorState;
pub use state::Thresholds;
