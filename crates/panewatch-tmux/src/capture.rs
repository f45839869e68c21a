//! Pane capture: the fixed-depth `capture-pane` wrapper.

use tokio_util::sync::CancellationToken;

use panewatch_core::types::Target;

use crate::error::TmuxError;
use crate::executor::{CommandSpawner, TargetExecutor};

/// Fixed scan depth for activity inference. Tuning constant; kept fixed
/// for reproducibility.
pub const CAPTURE_DEPTH_LINES: u32 = 80;

/// Capture the last [`CAPTURE_DEPTH_LINES`] lines of a pane.
pub async fn capture_pane<S: CommandSpawner>(
    executor: &TargetExecutor<S>,
    target: &Target,
    pane_id: &str,
    cancel: &CancellationToken,
) -> Result<Vec<String>, TmuxError> {
    let argv = vec![
        "tmux".to_string(),
        "capture-pane".to_string(),
        "-p".to_string(),
        "-t".to_string(),
        pane_id.to_string(),
        "-S".to_string(),
        format!("-{CAPTURE_DEPTH_LINES}"),
    ];
    let output = executor.run(target, &argv, cancel).await?;
    Ok(output.output_text.lines().map(String::from).collect())
}

// ─── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use panewatch_core::types::TargetKind;
    use std::sync::Mutex;
    use std::time::Duration;

    struct MockSpawner {
        output: String,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl CommandSpawner for MockSpawner {
        async fn spawn(
            &self,
            argv: &[String],
            _deadline: Duration,
        ) -> Result<String, TmuxError> {
            self.calls.lock().expect("lock").push(argv.to_vec());
            Ok(self.output.clone())
        }
    }

    fn local_target() -> Target {
        Target {
            target_id: "local".into(),
            name: "local".into(),
            kind: TargetKind::Local,
            connection: None,
            health: Default::default(),
            is_default: true,
            last_seen_at: None,
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn capture_passes_depth_and_pane() {
        let spawner = MockSpawner {
            output: "line 1\nline 2\n".into(),
            calls: Mutex::new(Vec::new()),
        };
        let executor = TargetExecutor::new(spawner, Duration::from_secs(1), 5, &[]);
        let cancel = CancellationToken::new();

        let lines = capture_pane(&executor, &local_target(), "%4", &cancel)
            .await
            .expect("capture");
        assert_eq!(lines, vec!["line 1".to_string(), "line 2".to_string()]);

        let calls = executor.spawner.calls.lock().expect("lock");
        assert_eq!(
            calls[0],
            vec![
                "tmux".to_string(),
                "capture-pane".to_string(),
                "-p".to_string(),
                "-t".to_string(),
                "%4".to_string(),
                "-S".to_string(),
                "-80".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn capture_empty_pane() {
        let spawner = MockSpawner {
            output: String::new(),
            calls: Mutex::new(Vec::new()),
        };
        let executor = TargetExecutor::new(spawner, Duration::from_secs(1), 5, &[]);
        let lines = capture_pane(&executor, &local_target(), "%0", &CancellationToken::new())
            .await
            .expect("capture");
        assert!(lines.is_empty());
    }
}
