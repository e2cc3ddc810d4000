use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use geolens_protocol::{ChatTurn, ModelDecision};
use thiserror::Error;

use crate::context::ModelContext;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("model returned malformed output: {0}")]
    Malformed(String),
}

/// The language-model collaborator. It consumes the bounded context and
/// the caller-held history, and returns one structured decision.
#[async_trait]
pub trait ModelClient: Send + Sync {
    async fn decide(
        &self,
        context: &ModelContext,
        history: &[ChatTurn],
    ) -> Result<ModelDecision, ModelError>;
}

/// Replays a fixed decision list. Used by tests and offline CLI runs.
#[derive(Debug, Default)]
pub struct ScriptedModel {
    decisions: Mutex<VecDeque<ModelDecision>>,
}

impl ScriptedModel {
    pub fn new(decisions: Vec<ModelDecision>) -> Self {
        Self {
            decisions: Mutex::new(decisions.into()),
        }
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    async fn decide(
        &self,
        _context: &ModelContext,
        _history: &[ChatTurn],
    ) -> Result<ModelDecision, ModelError> {
        let mut decisions = self
            .decisions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        decisions
            .pop_front()
            .ok_or_else(|| ModelError::Unavailable("scripted model exhausted".to_string()))
    }
}
