//! panewatch-tmux: target/tmux IO boundary.
//!
//! Subprocess execution against local and ssh targets (with retry, timeout
//! and cancellation), pane listing and parsing, pane capture, and the TTY
//! process probe for agent classification. No business logic.

pub mod capture;
pub mod classify;
pub mod error;
pub mod executor;
pub mod pane_info;

pub use capture::{CAPTURE_DEPTH_LINES, capture_pane};
pub use classify::{agent_token_in, classify_agent, is_known_shell, is_wrapper_runtime};
pub use error::TmuxError;
pub use executor::{CommandSpawner, ExecOutput, ProcessSpawner, TargetExecutor};
pub use pane_info::{LIST_PANES_FORMAT, PaneRow, list_panes, parse_list_panes_output};
