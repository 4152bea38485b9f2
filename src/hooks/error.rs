use thiserror::Error;

use crate::rpc::RpcError;

#[derive(Debug, Error)]
pub enum MutationError {
    #[error(transparent)]
    Rpc(#[from] RpcError),
    #[error("failed to decode backend reply: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("invalid redirect url: {0}")]
    Url(#[from] url::ParseError),
}

impl MutationError {
    /// The backend refused the request.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Rpc(RpcError::Rejected { .. }))
    }
}
