pub mod conversation;
pub mod message;
pub mod repair;

pub use conversation::{ChatEvent, Conversation, Step};
pub use message::{InputKind, Message, Sender};
pub use repair::{RepairInfo, RepairIssue, RepairStatus};
