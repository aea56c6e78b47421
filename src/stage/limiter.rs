//! Final peak ceiling

use super::{Stage, StageKind};
use crate::config::LimiterConfig;
use crate::core::WaveformBuffer;
use crate::error::StageResult;
use crate::filter::{Filter, Limiter};

/// Terminal peak ceiling
pub struct FinalLimiter {
    config: LimiterConfig,
}

impl FinalLimiter {
    /// Create the limiter stage
    pub fn new(config: LimiterConfig) -> Self {
        FinalLimiter { config }
    }
}

impl Stage for FinalLimiter {
    fn kind(&self) -> StageKind {
        StageKind::FinalLimiter
    }

    fn apply(&mut self, input: &WaveformBuffer) -> StageResult<WaveformBuffer> {
        if input.is_empty() {
            return Ok(input.clone());
        }

        let mut limiter = Limiter::new(
            input.sample_rate(),
            self.config.ceiling_db,
            self.config.lookahead_ms,
            self.config.release_ms,
        )?;
        let output = limiter.process(input)?;

        if limiter.max_reduction() < 1.0 {
            log::debug!(
                "limiter reduced peaks by up to {:.2} dB",
                -crate::core::linear_to_db(limiter.max_reduction())
            );
        }
        Ok(output)
    }
}
