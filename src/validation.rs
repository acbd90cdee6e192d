//! Validation Module
//!
//! Structural checks applied to each payload before it is merged.

use crate::error::ValidationError;

// == Validator ==
/// Pure, synchronous check of a single payload.
pub trait Validator<M>: Send + Sync {
    fn validate(&self, payload: &M) -> Result<(), ValidationError>;
}

/// Accepts every payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl<M> Validator<M> for AcceptAll {
    fn validate(&self, _payload: &M) -> Result<(), ValidationError> {
        Ok(())
    }
}

impl<M, F> Validator<M> for F
where
    F: Fn(&M) -> Result<(), ValidationError> + Send + Sync,
{
    fn validate(&self, payload: &M) -> Result<(), ValidationError> {
        self(payload)
    }
}
