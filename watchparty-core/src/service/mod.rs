//! Room engines.
//!
//! Each engine owns a disjoint slice of room state: the registry owns the
//! room table, membership owns `members`, failover owns the host role,
//! playback owns `video_state` and content, polls own `polls`. Engines are
//! plain functions over `&mut Room` that return the deliveries to make.

pub mod chat;
pub mod failover;
pub mod membership;
pub mod password;
pub mod playback;
pub mod poll;
pub mod registry;
pub mod timers;

pub use failover::{FailoverOutcome, HostLeavePolicy};
pub use membership::{Credential, JoinKind, JoinOutcome};
pub use password::{hash_password, validate_room_password, verify_password};
pub use playback::{can_control_playback, ContentUpdate, PlaybackCommand, PlaybackPolicy};
pub use registry::RoomRegistry;
pub use timers::{DeferredAction, DeferredActions};
