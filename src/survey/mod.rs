// src/survey/mod.rs
pub mod conversation;
pub mod event;
pub mod router;

pub use conversation::{run_sweeper, ConversationRecord, ConversationState, ConversationTable};
pub use event::{classify, Classified, DomainEvent};
pub use router::EventRouter;
