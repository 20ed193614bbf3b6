// Gateway module for generation - follows the Train Station Pattern
// All external access must go through this gateway

mod cached;
mod traits;
mod types;

pub use cached::CachedGenerator;
#[cfg(test)]
pub use traits::MockGenerator;
pub use traits::Generator;
pub use types::{Generation, GenerationRequest};
