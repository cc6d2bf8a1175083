/// Monitoring engine module - runs the per-site checks
///
/// This module is responsible for:
/// - Probing a single site over HTTP/HTTPS
/// - Running each probe as its own task
/// - Fanning out all configured sites and joining on the full set
pub mod checker;
pub mod probe;
pub mod runner;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use checker::CompletedCheck;
pub use probe::{HttpProbe, SiteProbe};
pub use runner::ConcurrentRunner;
pub use types::CheckOutcome;
