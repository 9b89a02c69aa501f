// HTTP boundary error type and the mapping from component errors onto
// status codes. Internal failures collapse into a generic message; details
// stay in the logs, never in the response body.

use actix_web::{http::StatusCode, HttpResponse, ResponseError};
use log::error;
use thiserror::Error;

use aegis_common::api::ApiResponse;
use aegis_vault::VaultError;

use crate::{
    byoa::{BinderError, RegistryError, RouterError},
    orchestrator::OrchestratorError,
    strategy::StrategyError,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),
    #[error("missing or invalid bearer token")]
    Unauthorized,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Unprocessable(String),
    #[error("internal server error")]
    Internal,
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(ApiResponse::<()>::err(self.to_string()))
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(error: OrchestratorError) -> Self {
        match error {
            OrchestratorError::AgentNotFound(id) => {
                ApiError::NotFound(format!("agent '{}' not found", id))
            }
            OrchestratorError::Capacity(_) => ApiError::Unprocessable(error.to_string()),
            OrchestratorError::AlreadyRunning(_)
            | OrchestratorError::Disabled(_)
            | OrchestratorError::InvalidSettings(_)
            | OrchestratorError::Strategy(_) => ApiError::BadRequest(error.to_string()),
            OrchestratorError::Vault(vault_error) => vault_error.into(),
        }
    }
}

impl From<VaultError> for ApiError {
    fn from(error: VaultError) -> Self {
        match error {
            VaultError::WalletNotFound(id) => {
                ApiError::NotFound(format!("wallet '{}' not found", id))
            }
            VaultError::Policy(violation) => ApiError::Unprocessable(violation.to_string()),
            other => {
                error!("vault failure at the http boundary: {}", other);
                ApiError::Internal
            }
        }
    }
}

impl From<StrategyError> for ApiError {
    fn from(error: StrategyError) -> Self {
        match error {
            StrategyError::UnknownStrategy(name) => {
                ApiError::NotFound(format!("strategy '{}' not found", name))
            }
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<RegistryError> for ApiError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::AgentNotFound(id) => {
                ApiError::NotFound(format!("external agent '{}' not found", id))
            }
            RegistryError::Capacity(_) => ApiError::Unprocessable(error.to_string()),
            RegistryError::AuthenticationFailed => ApiError::Unauthorized,
            RegistryError::AgentRevoked => ApiError::Forbidden(error.to_string()),
            other => ApiError::BadRequest(other.to_string()),
        }
    }
}

impl From<BinderError> for ApiError {
    fn from(error: BinderError) -> Self {
        match error {
            BinderError::Registry(registry_error) => registry_error.into(),
            BinderError::Vault(vault_error) => vault_error.into(),
        }
    }
}

impl From<RouterError> for ApiError {
    fn from(error: RouterError) -> Self {
        match error {
            RouterError::Auth => ApiError::Unauthorized,
            RouterError::Revoked => ApiError::Unauthorized,
            RouterError::Inactive => ApiError::Forbidden(error.to_string()),
            RouterError::TargetMismatch(_) => ApiError::Forbidden(error.to_string()),
        }
    }
}
