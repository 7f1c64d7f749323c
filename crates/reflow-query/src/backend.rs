//! The remote reactive-backend capability.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::QueryError;

/// Narrow interface to the remote reactive backend.
///
/// This layer never talks to the network directly; everything goes
/// through these two calls. Live subscription pushes are delivered
/// out-of-band by writing straight into the cache store and are not part
/// of this trait. Cancellation is ignore-the-response, not transport
/// abort, so implementors need no abort support.
#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Execute a named query with JSON arguments.
    async fn invoke_query(&self, name: &str, args: Value) -> Result<Value, QueryError>;

    /// Execute a named mutation with JSON arguments.
    async fn invoke_mutation(&self, name: &str, args: Value) -> Result<Value, QueryError>;
}
