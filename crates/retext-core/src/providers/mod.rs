//! Model gateway: the single network seam of the pipeline.

use std::future::Future;

pub mod openrouter;
pub mod shared;

pub use openrouter::{OpenRouterConfig, OpenRouterGateway};
pub use shared::{GatewayError, GatewayErrorKind, GatewayResult, resolve_api_key, resolve_base_url};

/// Sends one `(system prompt, source text)` pair to a model and returns the
/// generated text.
///
/// Implementations make exactly one attempt per call. Retry policy belongs to
/// callers.
pub trait ModelGateway {
    fn transform(
        &self,
        source_text: &str,
        system_prompt: &str,
    ) -> impl Future<Output = GatewayResult<String>> + Send;
}

impl<G: ModelGateway + Sync> ModelGateway for &G {
    fn transform(
        &self,
        source_text: &str,
        system_prompt: &str,
    ) -> impl Future<Output = GatewayResult<String>> + Send {
        (**self).transform(source_text, system_prompt)
    }
}
