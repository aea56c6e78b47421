//! Highpass, compression and presence shelf

use super::{Stage, StageKind};
use crate::config::ToneConfig;
use crate::core::WaveformBuffer;
use crate::error::StageResult;
use crate::filter::{Compressor, Filter, ToneFilter};

/// Highpass, then compressor, then high shelf. The shelf's boost is never
/// seen by the compressor.
pub struct DynamicsShaper {
    config: ToneConfig,
}

impl DynamicsShaper {
    /// Create the shaper
    pub fn new(config: ToneConfig) -> Self {
        DynamicsShaper { config }
    }
}

impl Stage for DynamicsShaper {
    fn kind(&self) -> StageKind {
        StageKind::DynamicsShaper
    }

    fn apply(&mut self, input: &WaveformBuffer) -> StageResult<WaveformBuffer> {
        if input.is_empty() {
            return Ok(input.clone());
        }

        let rate = input.sample_rate();
        let comp = &self.config.compressor;

        let mut highpass = ToneFilter::highpass(rate, self.config.highpass_hz)?;
        let mut compressor = Compressor::new(
            rate,
            comp.threshold_db,
            comp.ratio,
            comp.attack_ms,
            comp.release_ms,
        )?;
        let mut shelf =
            ToneFilter::high_shelf(rate, self.config.shelf_cutoff_hz, self.config.shelf_gain_db)?;

        let filtered = highpass.process(input)?;
        let compressed = compressor.process(&filtered)?;
        let output = shelf.process(&compressed)?;

        log::debug!(
            "compressor max gain reduction {:.1} dB",
            compressor.max_reduction_db()
        );
        Ok(output)
    }
}
