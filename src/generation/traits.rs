use anyhow::Result;

use super::types::{Generation, GenerationRequest};

/// The external text-generation capability
///
/// Calls are expensive, synchronous and may fail. Implementations must be
/// shareable across the scheduler's worker threads.
#[cfg_attr(test, mockall::automock)]
pub trait Generator: Send + Sync {
    /// Run one generation request
    fn generate(&self, request: &GenerationRequest) -> Result<Generation>;
}

impl<F> Generator for F
where
    F: Fn(&GenerationRequest) -> Result<Generation> + Send + Sync,
{
    fn generate(&self, request: &GenerationRequest) -> Result<Generation> {
        self(request)
    }
}
