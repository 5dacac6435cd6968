//! Wire protocol between clients and the sync engine.

pub mod codec;
pub mod inbound;
pub mod outbound;
pub mod outbox;

pub use codec::{decode, encode};
pub use inbound::ClientEvent;
pub use outbound::{ChatMessage, ContentChange, Reaction, ServerEvent};
pub use outbox::{Delivery, Outbox};
