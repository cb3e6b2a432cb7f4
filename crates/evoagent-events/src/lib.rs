pub mod event;
pub mod ledger;
pub mod message;
pub mod store;
pub mod views;

pub use event::{ConversationEvent, EventKind, EventRole};
pub use ledger::{InvocationLedger, ToolInvocation, ToolInvocationStatus};
pub use message::Message;
pub use store::EventStore;
pub use views::build_messages;
