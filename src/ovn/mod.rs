//! Northbound database access
//!
//! The pipeline only ever talks to the database through [`CommandExecutor`]:
//! hand it an `ovn-nbctl` command line, get the captured output back.
//!
//! - [`kubectl`] - runs commands inside the nbdb container via `kubectl exec`

pub mod kubectl;

pub use kubectl::KubectlExecutor;

use std::future::Future;

/// Runs one command against the northbound database.
///
/// No retries and no streaming: one captured blob of stdout, or an error.
pub trait CommandExecutor {
    fn execute(&self, args: &[String]) -> impl Future<Output = anyhow::Result<String>> + Send;
}

impl<T: CommandExecutor + Sync> CommandExecutor for &T {
    fn execute(&self, args: &[String]) -> impl Future<Output = anyhow::Result<String>> + Send {
        (**self).execute(args)
    }
}
