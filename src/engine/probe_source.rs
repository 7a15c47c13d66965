//! The engine's view of [`crate::prober::StreamProber`] — just enough to
//! run pass 1.5 (probe-on-sort) without the engine depending on the
//! prober's internal ramp/retry machinery.

use async_trait::async_trait;

use crate::upstream::Stream;

#[async_trait]
pub trait QualityProbe: Send + Sync {
    /// Probe one stream and return its resolution height, if the probe
    /// succeeded. Probe-on-sort only cares about this one field.
    async fn probe_resolution(&self, stream: &Stream) -> Option<u32>;
}
