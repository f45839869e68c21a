//! Pane stabilizer: hysteresis against activity flapping.
//!
//! Tracks the capture signature per (target, pane) and suppresses spurious
//! `idle` readings until the output has been still for the hysteresis
//! window `max(4s, 2 * poll_interval)`.

use std::collections::HashMap;

use chrono::{DateTime, TimeDelta, Utc};

use crate::activity::{ActivityHint, ActivityInference};
use crate::types::PaneKey;

/// Minimum idle confirmation window in seconds.
pub const IDLE_WINDOW_MIN_SECS: u64 = 4;

/// Entries unseen for this many windows are pruned by the sweep.
const SWEEP_WINDOW_MULTIPLIER: i32 = 3;

#[derive(Debug, Clone, Copy)]
struct PaneTrack {
    signature: u64,
    last_change: DateTime<Utc>,
    last_seen: DateTime<Utc>,
}

/// Per-pane signature tracker with idle hysteresis.
#[derive(Debug, Clone)]
pub struct PaneStabilizer {
    poll_interval_secs: u64,
    tracks: HashMap<PaneKey, PaneTrack>,
}

impl PaneStabilizer {
    pub fn new(poll_interval_secs: u64) -> Self {
        Self {
            poll_interval_secs,
            tracks: HashMap::new(),
        }
    }

    /// Hysteresis window: `max(4s, 2 * poll_interval)`.
    pub fn idle_window(&self) -> TimeDelta {
        let doubled = self.poll_interval_secs.saturating_mul(2);
        TimeDelta::seconds(doubled.max(IDLE_WINDOW_MIN_SECS) as i64)
    }

    /// Fold a fresh inference into the per-pane track and return the
    /// stabilized hint.
    pub fn observe(
        &mut self,
        key: &PaneKey,
        inference: &ActivityInference,
        now: DateTime<Utc>,
    ) -> ActivityHint {
        // No agent: forget the pane entirely.
        if inference.hint == ActivityHint::NoAgent {
            self.tracks.remove(key);
            return ActivityHint::NoAgent;
        }

        // No output: nothing to compare, pass the inference through.
        let Some(signature) = inference.signature else {
            if let Some(track) = self.tracks.get_mut(key) {
                track.last_seen = now;
            }
            return inference.hint;
        };

        match self.tracks.get_mut(key) {
            // First observation: seed the track. Idle on the very first
            // tick is untrustworthy (the pane may have been mid-burst).
            None => {
                self.tracks.insert(
                    key.clone(),
                    PaneTrack {
                        signature,
                        last_change: now,
                        last_seen: now,
                    },
                );
                if inference.hint == ActivityHint::Idle {
                    ActivityHint::Unknown
                } else {
                    inference.hint
                }
            }

            Some(track) if track.signature != signature => {
                // Output moved.
                track.signature = signature;
                track.last_change = now;
                track.last_seen = now;
                match inference.hint {
                    ActivityHint::Idle | ActivityHint::Unknown => ActivityHint::Running,
                    other => other,
                }
            }

            Some(track) => {
                track.last_seen = now;
                if inference.hint == ActivityHint::Idle {
                    let still_for = now.signed_duration_since(track.last_change);
                    if still_for >= self.idle_window() {
                        ActivityHint::Idle
                    } else {
                        ActivityHint::Unknown
                    }
                } else {
                    inference.hint
                }
            }
        }
    }

    /// Drop tracks that have not been observed for three idle windows.
    /// Returns the number of pruned entries.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> usize {
        let horizon = self.idle_window() * SWEEP_WINDOW_MULTIPLIER;
        let before = self.tracks.len();
        self.tracks
            .retain(|_, track| now.signed_duration_since(track.last_seen) < horizon);
        before - self.tracks.len()
    }

    #[cfg(test)]
    fn tracked(&self, key: &PaneKey) -> bool {
        self.tracks.contains_key(key)
    }
}

// ─── Tests ────────────────────────────────────────────────────────
