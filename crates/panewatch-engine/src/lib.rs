//! panewatch-engine: the state-inference and event-resolution engine.
//!
//! Composes the pure core machines with the store and the tmux backend:
//! event ingest and projection, the pending-bind inbox resolver, the
//! reconciler backstop, and the topology observer.

pub mod error;
pub mod ingest;
pub mod inbox;
pub mod reconcile;
pub mod topology;

pub use error::EngineError;
pub use ingest::{IngestEngine, IngestOutcome};
pub use inbox::{InboxResolver, ResolveStats};
pub use reconcile::Reconciler;
pub use topology::TopologyObserver;
