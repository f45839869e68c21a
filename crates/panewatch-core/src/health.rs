//! Target health finite state machine.
//!
//! Derives `ok` / `degraded` / `down` from executor outcomes. Pure and
//! side-effect-free; [`transition_target_health`] is the single entry point
//! for all state changes.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::types::TargetHealth;

/// Executor outcome fed into the FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecOutcome {
    Success,
    Failure,
}

/// Configurable thresholds for target health transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Consecutive in-window failures before `down`.
    pub down_failures: u32,
    /// Rolling window within which failures count toward `down`.
    pub down_window: TimeDelta,
    /// Consecutive successes before returning to `ok`.
    pub recover_successes: u32,
}

impl HealthPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            down_failures: config.target_down_failures,
            down_window: TimeDelta::seconds(config.target_down_window_secs as i64),
            recover_successes: config.target_recover_successes,
        }
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self {
            down_failures: 3,
            down_window: TimeDelta::seconds(60),
            recover_successes: 2,
        }
    }
}

/// Health tracking state for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetHealthState {
    pub health: TargetHealth,
    pub failure_streak: u32,
    pub success_streak: u32,
    /// Anchor for the rolling failure window.
    pub window_started_at: Option<DateTime<Utc>>,
    pub last_transition_at: DateTime<Utc>,
}

impl TargetHealthState {
    /// Initial `ok` state.
    pub fn ok(now: DateTime<Utc>) -> Self {
        Self {
            health: TargetHealth::Ok,
            failure_streak: 0,
            success_streak: 0,
            window_started_at: None,
            last_transition_at: now,
        }
    }
}

/// Pure state machine: transition target health on an executor outcome.
#[must_use]
pub fn transition_target_health(
    prev: &TargetHealthState,
    outcome: ExecOutcome,
    policy: &HealthPolicy,
    now: DateTime<Utc>,
) -> TargetHealthState {
    // Thresholds of zero would promote/demote instantly; clamp to 1.
    let down_failures = policy.down_failures.max(1);
    let recover_successes = policy.recover_successes.max(1);

    match (prev.health, outcome) {
        // ── ok ──────────────────────────────────────────────────
        (TargetHealth::Ok, ExecOutcome::Success) => TargetHealthState {
            failure_streak: 0,
            success_streak: 0,
            ..prev.clone()
        },
        (TargetHealth::Ok, ExecOutcome::Failure) => TargetHealthState {
            health: TargetHealth::Degraded,
            failure_streak: 1,
            success_streak: 0,
            window_started_at: Some(now),
            last_transition_at: now,
        },

        // ── degraded / down + success ───────────────────────────
        (TargetHealth::Degraded | TargetHealth::Down, ExecOutcome::Success) => {
            let success_streak = prev.success_streak.saturating_add(1);
            if success_streak >= recover_successes {
                TargetHealthState::ok(now)
            } else {
                TargetHealthState {
                    success_streak,
                    ..prev.clone()
                }
            }
        }

        // ── degraded + failure ──────────────────────────────────
        (TargetHealth::Degraded, ExecOutcome::Failure) => {
            let within_window = prev
                .window_started_at
                .is_some_and(|start| now.signed_duration_since(start) <= policy.down_window);

            if within_window {
                let failure_streak = prev.failure_streak.saturating_add(1);
                if failure_streak >= down_failures {
                    TargetHealthState {
                        health: TargetHealth::Down,
                        failure_streak,
                        success_streak: 0,
                        window_started_at: prev.window_started_at,
                        last_transition_at: now,
                    }
                } else {
                    TargetHealthState {
                        failure_streak,
                        success_streak: 0,
                        ..prev.clone()
                    }
                }
            } else {
                // Failures spanning longer than the window restart the count.
                TargetHealthState {
                    health: TargetHealth::Degraded,
                    failure_streak: 1,
                    success_streak: 0,
                    window_started_at: Some(now),
                    last_transition_at: prev.last_transition_at,
                }
            }
        }

        // ── down + failure ──────────────────────────────────────
        (TargetHealth::Down, ExecOutcome::Failure) => TargetHealthState {
            failure_streak: prev.failure_streak.saturating_add(1),
            success_streak: 0,
            ..prev.clone()
        },
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid RFC3339 timestamp")
            .with_timezone(&Utc)
    }

    fn t0() -> DateTime<Utc> {
        ts("2026-03-01T00:00:00Z")
    }

    #[test]
    fn ok_plus_failure_becomes_degraded() {
        let prev = TargetHealthState::ok(t0());
        let next = transition_target_health(&prev, ExecOutcome::Failure, &HealthPolicy::default(), t0());
        assert_eq!(next.health, TargetHealth::Degraded);
        assert_eq!(next.failure_streak, 1);
        assert_eq!(next.window_started_at, Some(t0()));
        assert_eq!(next.last_transition_at, t0());
    }

    #[test]
    fn ok_plus_success_stays_ok() {
        let prev = TargetHealthState::ok(t0());
        let next = transition_target_health(&prev, ExecOutcome::Success, &HealthPolicy::default(), t0());
        assert_eq!(next.health, TargetHealth::Ok);
        assert_eq!(next.last_transition_at, t0());
    }

    #[test]
    fn three_in_window_failures_reach_down() {
        let policy = HealthPolicy::default();
        let mut state = TargetHealthState::ok(t0());

        state = transition_target_health(&state, ExecOutcome::Failure, &policy, t0());
        assert_eq!(state.health, TargetHealth::Degraded);

        let t1 = t0() + TimeDelta::seconds(5);
        state = transition_target_health(&state, ExecOutcome::Failure, &policy, t1);
        assert_eq!(state.health, TargetHealth::Degraded);
        assert_eq!(state.failure_streak, 2);

        let t2 = t0() + TimeDelta::seconds(10);
        state = transition_target_health(&state, ExecOutcome::Failure, &policy, t2);
        assert_eq!(state.health, TargetHealth::Down);
        assert_eq!(state.failure_streak, 3);
        assert_eq!(state.last_transition_at, t2);
    }

    #[test]
    fn failure_outside_window_resets_streak() {
        let policy = HealthPolicy {
            down_failures: 2,
            down_window: TimeDelta::seconds(10),
            recover_successes: 2,
        };
        let mut state = TargetHealthState::ok(t0());
        state = transition_target_health(&state, ExecOutcome::Failure, &policy, t0());
        assert_eq!(state.failure_streak, 1);

        // Second failure lands outside the 10 s window: count restarts at 1
        // instead of escalating to down.
        let late = t0() + TimeDelta::seconds(30);
        state = transition_target_health(&state, ExecOutcome::Failure, &policy, late);
        assert_eq!(state.health, TargetHealth::Degraded);
        assert_eq!(state.failure_streak, 1);
        assert_eq!(state.window_started_at, Some(late));

        // A third failure within the new window now reaches down.
        let t3 = late + TimeDelta::seconds(5);
        state = transition_target_health(&state, ExecOutcome::Failure, &policy, t3);
        assert_eq!(state.health, TargetHealth::Down);
    }

    #[test]
    fn down_plus_failure_stays_down() {
        let policy = HealthPolicy::default();
        let prev = TargetHealthState {
            health: TargetHealth::Down,
            failure_streak: 3,
            success_streak: 0,
            window_started_at: Some(t0()),
            last_transition_at: t0(),
        };
        let next = transition_target_health(&prev, ExecOutcome::Failure, &policy, t0());
        assert_eq!(next.health, TargetHealth::Down);
        assert_eq!(next.failure_streak, 4);
    }

    #[test]
    fn recovery_requires_configured_successes() {
        let policy = HealthPolicy {
            down_failures: 2,
            down_window: TimeDelta::seconds(60),
            recover_successes: 2,
        };
        let down = TargetHealthState {
            health: TargetHealth::Down,
            failure_streak: 2,
            success_streak: 0,
            window_started_at: Some(t0()),
            last_transition_at: t0(),
        };

        let one = transition_target_health(&down, ExecOutcome::Success, &policy, t0());
        assert_eq!(one.health, TargetHealth::Down);
        assert_eq!(one.success_streak, 1);

        let t1 = t0() + TimeDelta::seconds(2);
        let two = transition_target_health(&one, ExecOutcome::Success, &policy, t1);
        assert_eq!(two.health, TargetHealth::Ok);
        assert_eq!(two.failure_streak, 0);
        assert_eq!(two.success_streak, 0);
        assert_eq!(two.last_transition_at, t1);
    }

    #[test]
    fn degraded_recovers_too() {
        let policy = HealthPolicy {
            down_failures: 3,
            down_window: TimeDelta::seconds(60),
            recover_successes: 1,
        };
        let degraded = TargetHealthState {
            health: TargetHealth::Degraded,
            failure_streak: 1,
            success_streak: 0,
            window_started_at: Some(t0()),
            last_transition_at: t0(),
        };
        let next = transition_target_health(&degraded, ExecOutcome::Success, &policy, t0());
        assert_eq!(next.health, TargetHealth::Ok);
    }

    #[test]
    fn failure_resets_success_streak() {
        let policy = HealthPolicy {
            down_failures: 5,
            down_window: TimeDelta::seconds(60),
            recover_successes: 3,
        };
        let prev = TargetHealthState {
            health: TargetHealth::Degraded,
            failure_streak: 1,
            success_streak: 2,
            window_started_at: Some(t0()),
            last_transition_at: t0(),
        };
        let next = transition_target_health(&prev, ExecOutcome::Failure, &policy, t0());
        assert_eq!(next.success_streak, 0);
    }

    #[test]
    fn policy_from_config() {
        let config = Config {
            target_down_failures: 7,
            target_down_window_secs: 120,
            target_recover_successes: 4,
            ..Config::default()
        };
        let policy = HealthPolicy::from_config(&config);
        assert_eq!(policy.down_failures, 7);
        assert_eq!(policy.down_window, TimeDelta::seconds(120));
        assert_eq!(policy.recover_successes, 4);
    }
}
