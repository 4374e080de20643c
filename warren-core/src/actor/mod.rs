//! Stateful actors
//!
//! Each actor is one tokio task that owns its state and drains an
//! unbounded mailbox one command at a time, so a provider's message
//! handler never runs concurrently with itself for the same actor. An idle
//! timer, re-armed by every message, ends the actor when it goes quiet.
//!
//! ```text
//! ActorRef --Command--> mailbox --> ActorProcess::run
//!    ^                                  |
//!    +---------- oneshot reply ---------+
//! ```

mod handle;
mod lifecycle;
mod process;

pub use handle::{ActorMetadata, ActorRef, ActorSnapshot};
pub use lifecycle::{ActorStatus, InvalidTransition, LifecycleEvent};
pub use process::{spawn, ActorExit, ActorOptions, ActorSettings, ExitReason};

pub(crate) use process::{ActorProcess, Resume};
