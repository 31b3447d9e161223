use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use fundbridge_chain::ChainError;
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

/// Failure talking to Stripe, Pinata, QPay or the price feed.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{service} request failed: {source}")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} returned {status}: {message}")]
    Upstream {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error("{service} response malformed: {message}")]
    Malformed {
        service: &'static str,
        message: String,
    },
}

impl ServiceError {
    pub fn transport(service: &'static str) -> impl FnOnce(reqwest::Error) -> Self {
        move |source| Self::Transport { service, source }
    }

    pub fn malformed(service: &'static str, message: impl Into<String>) -> Self {
        Self::Malformed {
            service,
            message: message.into(),
        }
    }
}

/// Checks the status of an upstream response, turning non-2xx into `ServiceError::Upstream`.
pub async fn check_status(service: &'static str, resp: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let message = resp.text().await.unwrap_or_default();
    Err(ServiceError::Upstream {
        service,
        status: status.as_u16(),
        message: message.chars().take(300).collect(),
    })
}

/// Every handler error. Renders as `{"error": "<message>"}`.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("authentication required")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0} is not configured on this server")]
    NotConfigured(&'static str),

    #[error(transparent)]
    Chain(#[from] ChainError),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::NotConfigured(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Chain(ChainError::Abi(_) | ChainError::InvalidAddress(_)) => StatusCode::BAD_REQUEST,
            Self::Chain(_) | Self::Service(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Chain(e) if status == StatusCode::BAD_GATEWAY => {
                warn!("Chain request failed: {}", e);
                "blockchain request failed".to_string()
            }
            Self::Service(e) => {
                warn!("Upstream service failed: {}", e);
                match e {
                    ServiceError::Transport { service, .. }
                    | ServiceError::Upstream { service, .. }
                    | ServiceError::Malformed { service, .. } => format!("{} request failed", service),
                }
            }
            Self::Internal(e) => {
                error!("Internal error: {:#}", e);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
