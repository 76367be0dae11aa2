//! Conversation state machine: tour mode / interactive mode, message
//! lifecycle and response merging.

pub mod reply;
mod service;
mod state;


pub use service::ChatService;
pub use state::ChatState;
