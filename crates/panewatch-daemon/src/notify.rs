//! Subscription notifications: diffing snapshots into `state_changed`,
//! `pane_added`, `pane_removed` and `summary` messages fanned out over a
//! broadcast channel.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use panewatch_core::types::{ActivityState, Confidence, PaneKey};

use crate::view::PaneView;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Notification {
    StateChanged { pane: PaneView },
    PaneAdded { pane: PaneView },
    PaneRemoved { target_id: String, pane_id: String },
    Summary(Summary),
}

/// Per-state pane counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    pub total: usize,
    pub running: usize,
    pub waiting_input: usize,
    pub waiting_approval: usize,
    pub completed: usize,
    pub error: usize,
    pub idle: usize,
    pub unknown: usize,
}

impl Summary {
    pub fn of(views: &[PaneView]) -> Self {
        let mut summary = Self {
            total: views.len(),
            ..Self::default()
        };
        for view in views {
            match view.state {
                ActivityState::Running => summary.running += 1,
                ActivityState::WaitingInput => summary.waiting_input += 1,
                ActivityState::WaitingApproval => summary.waiting_approval += 1,
                ActivityState::Completed => summary.completed += 1,
                ActivityState::Error => summary.error += 1,
                ActivityState::Idle => summary.idle += 1,
                _ => summary.unknown += 1,
            }
        }
        summary
    }
}

/// Subscriber-side filter (from the subscribe request).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubscribeFilter {
    #[serde(default)]
    pub pane_ids: Option<Vec<String>>,
    #[serde(default)]
    pub attention_only: bool,
    #[serde(default)]
    pub min_confidence: Option<Confidence>,
}

impl SubscribeFilter {
    /// Whether a notification passes this filter. Summaries always pass.
    pub fn admits(&self, notification: &Notification) -> bool {
        let pane = match notification {
            Notification::Summary(_) => return true,
            Notification::PaneRemoved { pane_id, .. } => {
                return self
                    .pane_ids
                    .as_ref()
                    .is_none_or(|ids| ids.iter().any(|id| id == pane_id));
            }
            Notification::StateChanged { pane } | Notification::PaneAdded { pane } => pane,
        };

        if let Some(ids) = &self.pane_ids
            && !ids.iter().any(|id| id == &pane.pane_id)
        {
            return false;
        }
        if self.attention_only && !pane.needs_attention() {
            return false;
        }
        if let Some(min) = self.min_confidence
            && pane.confidence < min
        {
            return false;
        }
        true
    }
}

/// Tracks the last published snapshot and produces notifications for the
/// next one.
#[derive(Debug, Default)]
pub struct SnapshotDiffer {
    versions: HashMap<PaneKey, i64>,
    last_summary: Option<Summary>,
}

impl SnapshotDiffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn diff(&mut self, views: &[PaneView]) -> Vec<Notification> {
        let mut notifications = Vec::new();
        let mut seen: HashSet<PaneKey> = HashSet::new();

        for view in views {
            let key = PaneKey::new(view.target_id.clone(), view.pane_id.clone());
            seen.insert(key.clone());
            match self.versions.get(&key) {
                None => {
                    notifications.push(Notification::PaneAdded { pane: view.clone() });
                }
                Some(version) if *version != view.state_version => {
                    notifications.push(Notification::StateChanged { pane: view.clone() });
                }
                Some(_) => {}
            }
            self.versions.insert(key, view.state_version);
        }

        let removed: Vec<PaneKey> = self
            .versions
            .keys()
            .filter(|key| !seen.contains(*key))
            .cloned()
            .collect();
        for key in removed {
            self.versions.remove(&key);
            notifications.push(Notification::PaneRemoved {
                target_id: key.target_id,
                pane_id: key.pane_id,
            });
        }

        let summary = Summary::of(views);
        if self.last_summary.as_ref() != Some(&summary) {
            self.last_summary = Some(summary.clone());
            notifications.push(Notification::Summary(summary));
        }

        notifications
    }
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use panewatch_core::types::AgentType;

    fn view(pane_id: &str, state: ActivityState, version: i64) -> PaneView {
        PaneView {
            target_id: "local".into(),
            pane_id: pane_id.into(),
            session_name: "main".into(),
            window_name: "dev".into(),
            title: String::new(),
            current_cmd: "codex".into(),
            agent_type: AgentType::Codex,
            state,
            reason_code: "active".into(),
            confidence: Confidence::Medium,
            state_version: version,
            runtime_id: None,
            last_seen_at: None,
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn first_snapshot_emits_added_and_summary() {
        let mut differ = SnapshotDiffer::new();
        let notifications = differ.diff(&[view("%0", ActivityState::Running, 1)]);
        assert!(matches!(notifications[0], Notification::PaneAdded { .. }));
        assert!(matches!(notifications[1], Notification::Summary(_)));
    }

    #[test]
    fn version_bump_emits_state_changed() {
        let mut differ = SnapshotDiffer::new();
        differ.diff(&[view("%0", ActivityState::Running, 1)]);
        let notifications = differ.diff(&[view("%0", ActivityState::Idle, 2)]);
        assert!(
            notifications
                .iter()
                .any(|n| matches!(n, Notification::StateChanged { .. }))
        );
    }

    #[test]
    fn unchanged_snapshot_is_quiet() {
        let mut differ = SnapshotDiffer::new();
        differ.diff(&[view("%0", ActivityState::Running, 1)]);
        let notifications = differ.diff(&[view("%0", ActivityState::Running, 1)]);
        assert!(notifications.is_empty());
    }

    #[test]
    fn vanished_pane_emits_removed() {
        let mut differ = SnapshotDiffer::new();
        differ.diff(&[view("%0", ActivityState::Running, 1)]);
        let notifications = differ.diff(&[]);
        assert!(notifications.iter().any(|n| matches!(
            n,
            Notification::PaneRemoved { pane_id, .. } if pane_id == "%0"
        )));
    }

    #[test]
    fn summary_counts_states() {
        let views = [
            view("%0", ActivityState::Running, 1),
            view("%1", ActivityState::Running, 1),
            view("%2", ActivityState::WaitingApproval, 1),
        ];
        let summary = Summary::of(&views);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.running, 2);
        assert_eq!(summary.waiting_approval, 1);
        assert_eq!(summary.idle, 0);
    }

    #[test]
    fn filter_by_pane_ids() {
        let filter = SubscribeFilter {
            pane_ids: Some(vec!["%1".into()]),
            ..Default::default()
        };
        let hit = Notification::StateChanged {
            pane: view("%1", ActivityState::Running, 1),
        };
        let miss = Notification::StateChanged {
            pane: view("%0", ActivityState::Running, 1),
        };
        assert!(filter.admits(&hit));
        assert!(!filter.admits(&miss));
    }

    #[test]
    fn filter_attention_only() {
        let filter = SubscribeFilter {
            attention_only: true,
            ..Default::default()
        };
        assert!(filter.admits(&Notification::StateChanged {
            pane: view("%0", ActivityState::WaitingApproval, 1),
        }));
        assert!(!filter.admits(&Notification::StateChanged {
            pane: view("%0", ActivityState::Running, 1),
        }));
        // Summaries always pass.
        assert!(filter.admits(&Notification::Summary(Summary::default())));
    }

    #[test]
    fn filter_min_confidence() {
        let filter = SubscribeFilter {
            min_confidence: Some(Confidence::High),
            ..Default::default()
        };
        let mut high = view("%0", ActivityState::Running, 1);
        high.confidence = Confidence::High;
        assert!(filter.admits(&Notification::StateChanged { pane: high }));
        assert!(!filter.admits(&Notification::StateChanged {
            pane: view("%0", ActivityState::Running, 1),
        }));
    }
}
