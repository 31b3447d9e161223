use fundbridge_core::error::DecodeError;
use thiserror::Error;

use crate::abi::AbiError;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("RPC transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("malformed RPC response: {0}")]
    MalformedResponse(String),

    #[error("ABI error: {0}")]
    Abi(#[from] AbiError),

    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("no signing key configured")]
    NoSender,

    #[error("invalid private key: {0}")]
    InvalidKey(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

impl ChainError {
    /// The node executed the call and the contract rejected it, e.g. an unknown id.
    pub fn is_revert(&self) -> bool {
        match self {
            Self::Rpc { code, message } => *code == 3 || message.to_ascii_lowercase().contains("revert"),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn revert_detection() {
        let revert = ChainError::Rpc { code: -32000, message: "execution reverted: Campaign does not exist".into() };
        assert!(revert.is_revert());
        assert!(ChainError::Rpc { code: 3, message: String::new() }.is_revert());
        assert!(!ChainError::Rpc { code: -32601, message: "method not found".into() }.is_revert());
        assert!(!ChainError::NoSender.is_revert());
    }
}
