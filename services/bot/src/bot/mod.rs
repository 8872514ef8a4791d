pub mod conversation;
pub mod directory;
pub mod dispatcher;
pub mod feedback;
pub mod protocol;
pub mod replies;
pub mod router;
pub mod state;

#[cfg(test)]
mod test_support;

// Re-export what the binary needs to wire the bot together.
pub use conversation::ConversationEngine;
pub use state::AppState;
