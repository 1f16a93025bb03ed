//! Error types for the engine.

use crate::config::ConfigError;
use crate::gateway::GatewayError;
use stockroom_core::ValidationError;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// True when the failure was caught before any network call.
    pub fn is_validation(&self) -> bool {
        matches!(self, EngineError::Validation(_))
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
