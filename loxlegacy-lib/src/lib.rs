pub mod actor;
pub mod config;
pub mod constants;
pub mod dispatch;
pub mod error;
pub mod extension;
pub mod firmware;
pub mod fragment;
pub mod frame;
pub mod lifecycle;
pub mod liveness;
pub mod platform;

pub use config::DeviceConfig;
pub use error::LegacyError;
// Re-export the extension for easy access
pub use extension::LegacyExtension;
pub use frame::{Address, DeviceType, Direction, Frame, LegacyCommand};
