pub mod deploy;
pub mod install;
pub mod relations;
pub mod watcher;

pub use deploy::DeployQueue;
pub use install::{InstallReport, Installer};
pub use watcher::RelationWatcher;

use std::collections::BTreeMap;

use crate::lifecycle::CharmProgress;

/// Progress of every charm in an install, keyed by charm name.
pub type ProgressBook = BTreeMap<String, CharmProgress>;
