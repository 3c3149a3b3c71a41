pub mod charms;
pub mod config;
pub mod engine;
pub mod lifecycle;
pub mod orchestrator;
pub mod registry;
pub mod types;

pub use config::Config;
pub use registry::{CharmRegistry, RegistryError};
pub use types::*;
