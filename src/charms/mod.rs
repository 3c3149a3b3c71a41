pub mod cinder;

pub use cinder::cinder_descriptor;

use anyhow::Result;

use crate::types::CharmDescriptor;

/// Descriptors compiled into the binary. Plugin directories add to these.
pub fn builtin_charms() -> Result<Vec<CharmDescriptor>> {
    Ok(vec![cinder_descriptor()?])
}
