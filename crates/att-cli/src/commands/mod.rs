//! CLI subcommand implementations.

pub mod device;
pub mod directory;
pub mod explain;
pub mod punches;
pub mod reconcile;
pub mod sessions;
pub mod stage;
pub mod status;
pub mod sync;
mod util;

#[cfg(test)]
pub(crate) mod test_support;
