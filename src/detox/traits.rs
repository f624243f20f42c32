// Detoxifier trait — the strategy seam.
//
// Both strategies (standalone rewriting and pivot backtranslation) expose
// this contract, and backtranslation nests any other Detoxifier for its
// pivot-language stage, so strategies compose to arbitrary depth.

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::lang::Language;

/// Trait for detoxification strategies. Implementations must be async
/// because the model backends underneath are.
#[async_trait]
pub trait Detoxifier: Send + Sync {
    /// Detoxify a single text.
    /// Default implementation delegates to `detoxify_batch`.
    async fn detoxify(&self, text: &str, language: Language) -> Result<String> {
        let results = self
            .detoxify_batch(std::slice::from_ref(&text.to_string()), &[language])
            .await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("detoxify_batch returned no result for a single input"))
    }

    /// Detoxify a batch of texts, one language tag per text.
    ///
    /// Order- and length-preserving: position i of the result corresponds
    /// to position i of the input, whatever grouping happens inside.
    async fn detoxify_batch(
        &self,
        texts: &[String],
        languages: &[Language],
    ) -> Result<Vec<String>>;
}
