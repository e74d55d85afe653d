// casesync/src/load/mod.rs
pub(crate) mod logic;
pub(crate) mod store;
#[cfg(test)]
pub(crate) mod memory;

pub use logic::{reconcile, ReconcileReport};
pub use store::{PgTargetStore, TargetStore};
