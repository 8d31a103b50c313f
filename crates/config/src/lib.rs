// Configuration loading

pub mod ai;
pub mod error;
pub mod queries;
pub mod settings;

pub use error::ConfigError;
pub use settings::{AIProvider, AISettings, LockSettings, Settings, SourceMode, SourceSettings};
