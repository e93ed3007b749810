//! Helpers shared by the drivers.

mod tls;

use std::future::Future;
use std::time::Duration;

pub use tls::{make_tls_connector, SslMode};

use crate::error::{ReconcileError, Result};

/// Run a fallible database future under the statement timeout.
///
/// Elapsed time maps to [`ReconcileError::Timeout`]; driver errors convert
/// through `From`.
pub async fn with_timeout<T, E, F>(limit: Duration, operation: &str, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, E>>,
    ReconcileError: From<E>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(ReconcileError::from),
        Err(_) => Err(ReconcileError::timeout(operation, limit.as_secs())),
    }
}
