use common::{CorrelationId, OwnerId};

/// Who asked for an operation and which causal chain it belongs to.
///
/// The correlation id is copied onto every integration event the operation
/// stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OperationContext {
    pub correlation_id: CorrelationId,
    pub actor: Option<OwnerId>,
}

impl OperationContext {
    /// Starts a new causal chain with no known actor.
    pub fn new() -> Self {
        Self {
            correlation_id: CorrelationId::new(),
            actor: None,
        }
    }

    /// Continues an existing causal chain.
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    pub fn with_actor(mut self, actor: OwnerId) -> Self {
        self.actor = Some(actor);
        self
    }
}

impl Default for OperationContext {
    fn default() -> Self {
        Self::new()
    }
}
