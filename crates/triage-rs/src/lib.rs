//! Public SDK surface for support-ticket triage.
//!
//! This crate re-exports the core building blocks and provides a small
//! initialization helper to keep consumer setup consistent.

/// Re-export for convenience.
pub use triage_rs_config as config;
pub use triage_rs_core as core;
/// Re-export for convenience.
pub use triage_rs_index as index;
/// Re-export for convenience.
pub use triage_rs_protocol as protocol;

pub use triage_rs_config::TriageConfig;
pub use triage_rs_core::{Analyzer, TriageError};
pub use triage_rs_protocol::{AnalysisResult, AnalysisSource, ResolutionEstimate};

#[inline]
/// Initialize logging using env_logger if the "logging" feature is enabled.
///
/// This is a no-op if the feature is not enabled. Safe to call more than once.
pub fn init_logging() {
    #[cfg(feature = "logging")]
    {
        if env_logger::try_init().is_err() {
            log::debug!("logger already initialized");
        }
    }
}
