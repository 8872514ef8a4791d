pub mod employee_directory;
pub mod feedback_store;
pub mod telegram;

pub use employee_directory::EmployeeDirectory;
pub use feedback_store::FeedbackStore;
pub use telegram::TelegramTransport;
