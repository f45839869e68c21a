//! Evidence scoring for the state projection.
//!
//! Adapters and heuristics emit evidence tuples; the projection selects a
//! winner by state precedence, then aggregated weight x confidence, then
//! recency. Expired evidence never competes.

use chrono::{DateTime, TimeDelta, Utc};

use crate::types::{ActivityState, AgentType, Confidence, EventSource};

// ─── Weights & TTLs ───────────────────────────────────────────────

/// Source weight: hook wrappers report agent lifecycle directly.
pub const WEIGHT_HOOK: f64 = 1.00;

/// Source weight: notify wrappers (payload-inspected).
pub const WEIGHT_NOTIFY: f64 = 0.90;

/// Source weight: wrapper start/exit markers.
pub const WEIGHT_WRAPPER: f64 = 0.80;

/// Source weight: capture-heuristic poller.
pub const WEIGHT_POLLER: f64 = 0.60;

/// Default evidence lifetime in seconds.
pub const DEFAULT_EVIDENCE_TTL_SECS: i64 = 90;

/// Weight of an event source's evidence.
pub fn source_weight(source: EventSource) -> f64 {
    match source {
        EventSource::Hook => WEIGHT_HOOK,
        EventSource::Notify => WEIGHT_NOTIFY,
        EventSource::Wrapper => WEIGHT_WRAPPER,
        EventSource::Poller => WEIGHT_POLLER,
    }
}

// ─── Evidence ─────────────────────────────────────────────────────

/// A (state, weight, confidence, TTL, reason) tuple competing for the
/// projected pane state.
#[derive(Debug, Clone, PartialEq)]
pub struct Evidence {
    pub state: ActivityState,
    pub weight: f64,
    pub confidence: Confidence,
    pub ttl: TimeDelta,
    pub reason: String,
    pub event_time: DateTime<Utc>,
}

impl Evidence {
    pub fn new(
        state: ActivityState,
        weight: f64,
        confidence: Confidence,
        reason: impl Into<String>,
        event_time: DateTime<Utc>,
    ) -> Self {
        Self {
            state,
            weight,
            confidence,
            ttl: TimeDelta::seconds(DEFAULT_EVIDENCE_TTL_SECS),
            reason: reason.into(),
            event_time,
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: TimeDelta) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        self.event_time + self.ttl
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at()
    }

    /// Tie-break score among evidence of equal precedence.
    pub fn score(&self) -> f64 {
        self.weight * self.confidence.factor()
    }
}

/// Select the winning evidence among unexpired candidates.
///
/// Highest state precedence wins; ties break on `weight x confidence`,
/// then on the most recent `event_time`.
pub fn select_winner<'a>(candidates: &'a [Evidence], now: DateTime<Utc>) -> Option<&'a Evidence> {
    let mut winner: Option<&Evidence> = None;

    for candidate in candidates {
        if candidate.is_expired(now) {
            continue;
        }
        let beats = match winner {
            None => true,
            Some(current) => {
                let (cp, wp) = (
                    candidate.state.precedence(),
                    current.state.precedence(),
                );
                if cp != wp {
                    cp > wp
                } else if (candidate.score() - current.score()).abs() > f64::EPSILON {
                    candidate.score() > current.score()
                } else {
                    candidate.event_time > current.event_time
                }
            }
        };
        if beats {
            winner = Some(candidate);
        }
    }

    winner
}

// ─── Heuristics ───────────────────────────────────────────────────

/// Claude-specific de-dup: a poller-only "running" with no running token
/// in the capture is a spurious promotion (cursor noise, redraws) and must
/// be reported as idle instead.
pub fn claude_poller_demotion(
    agent_type: AgentType,
    source: EventSource,
    state: ActivityState,
    has_running_token: bool,
) -> bool {
    agent_type == AgentType::Claude
        && source == EventSource::Poller
        && state == ActivityState::Running
        && !has_running_token
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
        ts("2026-03-01T12:00:00Z")
    }

    fn evidence(state: ActivityState, weight: f64, confidence: Confidence) -> Evidence {
        Evidence::new(state, weight, confidence, "test", t0())
    }

    #[test]
    fn precedence_beats_weight() {
        let weak_error = evidence(ActivityState::Error, 0.1, Confidence::Low);
        let strong_running = evidence(ActivityState::Running, 1.0, Confidence::High);
        let candidates = vec![strong_running, weak_error];

        let winner = select_winner(&candidates, t0()).expect("winner");
        assert_eq!(winner.state, ActivityState::Error);
    }

    #[test]
    fn full_precedence_chain() {
        let states = ActivityState::PRECEDENCE_DESC;
        for pair in states.windows(2) {
            let higher = evidence(pair[0], 0.1, Confidence::Low);
            let lower = evidence(pair[1], 1.0, Confidence::High);
            let candidates = vec![lower, higher];
            let winner = select_winner(&candidates, t0()).expect("winner");
            assert_eq!(winner.state, pair[0], "{:?} should beat {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn equal_precedence_breaks_on_score() {
        let weak = evidence(ActivityState::Running, WEIGHT_POLLER, Confidence::Medium);
        let strong = evidence(ActivityState::Running, WEIGHT_HOOK, Confidence::High);
        let candidates = vec![weak, strong.clone()];

        let winner = select_winner(&candidates, t0()).expect("winner");
        assert_eq!(winner.reason, strong.reason);
        assert!((winner.score() - strong.score()).abs() < f64::EPSILON);
    }

    #[test]
    fn equal_score_breaks_on_recency() {
        let older = Evidence::new(
            ActivityState::Running,
            WEIGHT_HOOK,
            Confidence::High,
            "older",
            t0(),
        );
        let newer = Evidence::new(
            ActivityState::Running,
            WEIGHT_HOOK,
            Confidence::High,
            "newer",
            t0() + TimeDelta::seconds(3),
        );
        let candidates = vec![older, newer];

        let winner = select_winner(&candidates, t0() + TimeDelta::seconds(5)).expect("winner");
        assert_eq!(winner.reason, "newer");
    }

    #[test]
    fn expired_evidence_is_ignored() {
        let expired = Evidence::new(
            ActivityState::Error,
            WEIGHT_HOOK,
            Confidence::High,
            "expired",
            t0(),
        )
        .with_ttl(TimeDelta::seconds(10));
        let live = Evidence::new(
            ActivityState::Idle,
            WEIGHT_POLLER,
            Confidence::Medium,
            "live",
            t0() + TimeDelta::seconds(60),
        );
        let candidates = vec![expired, live];

        let winner = select_winner(&candidates, t0() + TimeDelta::seconds(70)).expect("winner");
        assert_eq!(winner.state, ActivityState::Idle);
    }

    #[test]
    fn all_expired_yields_none() {
        let expired = Evidence::new(
            ActivityState::Running,
            WEIGHT_HOOK,
            Confidence::High,
            "expired",
            t0(),
        )
        .with_ttl(TimeDelta::seconds(1));
        assert!(select_winner(&[expired], t0() + TimeDelta::seconds(5)).is_none());
    }

    #[test]
    fn empty_candidates_yields_none() {
        assert!(select_winner(&[], t0()).is_none());
    }

    #[test]
    fn source_weights_descend() {
        assert!(source_weight(EventSource::Hook) > source_weight(EventSource::Notify));
        assert!(source_weight(EventSource::Notify) > source_weight(EventSource::Wrapper));
        assert!(source_weight(EventSource::Wrapper) > source_weight(EventSource::Poller));
    }

    #[test]
    fn claude_poller_running_without_token_demotes() {
        assert!(claude_poller_demotion(
            AgentType::Claude,
            EventSource::Poller,
            ActivityState::Running,
            false,
        ));
    }

    #[test]
    fn claude_demotion_requires_all_conditions() {
        // Token present: real running.
        assert!(!claude_poller_demotion(
            AgentType::Claude,
            EventSource::Poller,
            ActivityState::Running,
            true,
        ));
        // Not Claude.
        assert!(!claude_poller_demotion(
            AgentType::Codex,
            EventSource::Poller,
            ActivityState::Running,
            false,
        ));
        // Not poller-sourced.
        assert!(!claude_poller_demotion(
            AgentType::Claude,
            EventSource::Hook,
            ActivityState::Running,
            false,
        ));
        // Not running.
        assert!(!claude_poller_demotion(
            AgentType::Claude,
            EventSource::Poller,
            ActivityState::Idle,
            false,
        ));
    }

}
