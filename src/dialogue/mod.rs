//! The dialogue core: inbound events, per-user conversation state and the
//! controller driving the auth/upload state machine.

/// The dialogue controller state machine
pub mod controller;
/// Inbound event types
pub mod event;
/// Outbound chat-transport port
pub mod port;
/// Conversation state and state table
pub mod state;
/// Unauthorized-denial cooldown cache
pub mod unauthorized;
/// Upload orchestration (transfer + progress announcer)
mod upload_flow;

pub use controller::DialogueController;
pub use event::{Command, Event, Inbound};
pub use port::{ChatPort, MessageRef};
pub use state::{ConversationState, PendingFile, StateTable, Step};
pub use unauthorized::UnauthorizedCache;
