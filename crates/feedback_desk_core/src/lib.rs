pub mod domain;
pub mod ports;

pub use domain::{
    DirectorySummary, Employee, Envelope, FeedbackEntry, FeedbackStats, InboundMessage,
    OutboundMessage, Purpose, Sender, UserCount,
};
pub use ports::{
    ChatTransport, EmployeeDirectoryService, FeedbackRepository, InboundStream, PortError,
    PortResult,
};
