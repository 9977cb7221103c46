//! Per-character round-trip estimate.
//!
//! A probe cycle stamps each character with a nonce and send time, then the
//! gateway delivers a ping. The matching pong folds the measured round trip
//! into a smoothed estimate. The cycle runs on its own cadence and only ever
//! touches the probed character's own [`LatencyState`].

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingProbe {
    pub nonce: u32,
    pub sent_at_ms: u64,
}

/// Why a pong was not folded into the estimate.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ProbeError {
    #[error("no probe outstanding")]
    Unsolicited,
    #[error("nonce does not match outstanding probe")]
    NonceMismatch,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyState {
    estimate_ms: Option<f32>,
    pending: Option<PendingProbe>,
}

impl LatencyState {
    /// Current estimate rounded to whole milliseconds; 0 before any sample.
    pub fn ping_ms(&self) -> u64 {
        self.estimate_ms.map(|v| v.round() as u64).unwrap_or(0)
    }

    pub fn estimate_ms(&self) -> Option<f32> {
        self.estimate_ms
    }

    pub fn pending(&self) -> Option<PendingProbe> {
        self.pending
    }

    /// Stamp a new probe. Returns false while a younger probe is still in
    /// flight; a probe older than `timeout_ms` is considered lost and replaced.
    pub fn begin_probe(&mut self, nonce: u32, now_ms: u64, timeout_ms: u64) -> bool {
        if let Some(pending) = self.pending {
            if now_ms.saturating_sub(pending.sent_at_ms) < timeout_ms {
                return false;
            }
        }
        self.pending = Some(PendingProbe {
            nonce,
            sent_at_ms: now_ms,
        });
        true
    }

    /// Complete the outstanding probe and return the measured round trip.
    pub fn complete_probe(
        &mut self,
        nonce: u32,
        now_ms: u64,
        smoothing: f32,
    ) -> Result<u64, ProbeError> {
        let pending = self.pending.ok_or(ProbeError::Unsolicited)?;
        if pending.nonce != nonce {
            return Err(ProbeError::NonceMismatch);
        }
        self.pending = None;

        let rtt = now_ms.saturating_sub(pending.sent_at_ms);
        let sample = rtt as f32;
        self.estimate_ms = Some(match self.estimate_ms {
            Some(prev) => prev + smoothing * (sample - prev),
            None => sample,
        });
        Ok(rtt)
    }
}
