//! crates/feedback_desk_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of the storage medium and the chat protocol.

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

use crate::domain::{
    DirectorySummary, Employee, FeedbackEntry, FeedbackStats, InboundMessage, OutboundMessage,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (filesystem, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The backing storage could not be read or written. Nothing was changed.
    #[error("Storage unavailable: {0}")]
    Storage(String),
    /// The operation has nothing to work on (e.g. exporting an empty journal).
    #[error("Nothing to process: {0}")]
    Empty(String),
    /// A tabular source lacks columns the loader depends on.
    #[error("Source is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    /// The chat transport failed to deliver or receive a message.
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

/// The stream of inbound messages produced by a chat transport.
pub type InboundStream = Pin<Box<dyn Stream<Item = PortResult<InboundMessage>> + Send>>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The feedback journal together with its statistics projection.
///
/// Every operation is atomic with respect to every other operation on the same store.
#[async_trait]
pub trait FeedbackRepository: Send + Sync {
    /// Appends an entry and bumps the statistics in one read-modify-write.
    async fn add_feedback(&self, entry: FeedbackEntry) -> PortResult<()>;

    async fn get_stats(&self) -> PortResult<FeedbackStats>;

    /// Renders the whole journal as CSV. Fails with [`PortError::Empty`] when there is
    /// no feedback at all.
    async fn export_csv(&self) -> PortResult<Bytes>;

    /// Drops every entry and zeroes the statistics. Irreversible.
    async fn clear(&self) -> PortResult<()>;
}

/// Read access to the employee directory, plus an explicit refresh.
#[async_trait]
pub trait EmployeeDirectoryService: Send + Sync {
    /// Re-reads the source and swaps in the new records. Returns how many were loaded.
    async fn reload(&self) -> PortResult<usize>;

    async fn summarize(&self) -> PortResult<DirectorySummary>;

    /// Case-insensitive match against name or role.
    async fn search(&self, query: &str, limit: usize) -> PortResult<Vec<Employee>>;

    /// Case-insensitive match against the department.
    async fn by_department(&self, department: &str, limit: usize) -> PortResult<Vec<Employee>>;

    /// Case-insensitive match against the name, without a limit.
    async fn find_email(&self, name_query: &str) -> PortResult<Vec<Employee>>;
}

#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Opens the stream of inbound messages. Errors are yielded as items; the stream
    /// only ends when the transport is shut down.
    fn inbound(&self) -> InboundStream;

    /// Sends a single message to a chat.
    async fn send(&self, chat_id: i64, message: OutboundMessage) -> PortResult<()>;
}
