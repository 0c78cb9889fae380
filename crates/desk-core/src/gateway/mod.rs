//! Remote gateway contract.
//!
//! The sync engine talks to the backend only through [`RemoteGateway`]. Each
//! failure says whether the request was never delivered, may have been
//! delivered, or was refused; the engine retries the first two and drops the
//! operation on the third.

mod http;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{CreatedRecord, ProcessingOptions, RemoteSnapshot, RemoteStatus};

pub use http::HttpGateway;

/// Failure of one gateway call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// The request never reached the backend
    #[error("backend unreachable: {0}")]
    Unreachable(String),

    /// The request may have reached the backend but no answer arrived
    #[error("outcome unknown: {0}")]
    Indeterminate(String),

    /// The backend refused the request
    #[error("backend rejected request with HTTP {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The local recording could not be read
    #[error("recording unavailable: {0}")]
    MissingAsset(String),

    /// The backend answered with a body we could not understand
    #[error("unexpected response: {0}")]
    InvalidPayload(String),

    #[error("invalid gateway configuration: {0}")]
    InvalidConfiguration(String),
}

impl GatewayError {
    /// Whether the operation should stay queued and be retried later
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Unreachable(_) | Self::Indeterminate(_) | Self::InvalidPayload(_)
        )
    }
}

/// Typed interface to the backend
#[async_trait]
pub trait RemoteGateway: Send + Sync + 'static {
    /// Create a remote meeting with no audio yet
    async fn create_record(&self) -> Result<CreatedRecord, GatewayError>;

    /// Upload the recording for an existing remote meeting
    async fn upload_asset(
        &self,
        remote_id: &str,
        recording_ref: &str,
    ) -> Result<RemoteStatus, GatewayError>;

    /// Fetch the authoritative state of one meeting
    async fn fetch_details(&self, remote_id: &str) -> Result<RemoteSnapshot, GatewayError>;

    /// Ask the backend to process (transcribe) an uploaded meeting
    async fn request_processing(
        &self,
        remote_id: &str,
        options: &ProcessingOptions,
    ) -> Result<RemoteStatus, GatewayError>;

    /// List every meeting the backend holds, as summaries
    async fn list_records(&self) -> Result<Vec<RemoteSnapshot>, GatewayError>;
}
