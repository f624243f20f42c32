// Generative backend trait — the swap-ready abstraction.
//
// One contract over two execution models: local batched tensor generation
// (ONNX seq2seq) and one-request-per-batch hosted APIs. Strategies only
// ever see this trait; which backend serves which role is decided by the
// model registry at load time.

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Device;
use crate::models::batch::{Batch, BatchOutcome};

/// Trait for generative text backends. Implementations must be async
/// because hosted providers require HTTP calls; the local backend offloads
/// its CPU-bound generation to a blocking thread.
///
/// A backend instance is not safe for concurrent forward calls — the
/// pipeline is batch-sequential by design, and a local session holds one
/// device context.
#[async_trait]
pub trait TextModel: Send + Sync {
    /// Run one batch through the model, returning outputs in unit order.
    ///
    /// Transport, auth, and configuration failures are `Err` and abort the
    /// batch. Content-shape failures (a hosted model answering with
    /// something unparseable) are *not* errors: they come back as
    /// `BatchOutcome::FellBack` carrying the original texts.
    async fn forward(&self, batch: &Batch) -> Result<BatchOutcome>;

    /// Move the underlying model to a device.
    ///
    /// Hosted backends have nothing to move and accept any device; the
    /// local backend rebuilds its sessions against the new execution
    /// provider.
    fn move_to(&mut self, _device: Device) -> Result<()> {
        Ok(())
    }
}
