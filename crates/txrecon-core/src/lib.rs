pub mod canonical;
pub mod compare;
pub mod error;
pub mod hashes;
pub mod precision;
pub mod providers;
pub mod reconcile;
#[cfg(test)]
mod test_util;
pub mod types;

pub use error::CoreError;
pub use reconcile::{Reconciler, ReconciliationReport};
pub use types::{Source, TxFilter};
