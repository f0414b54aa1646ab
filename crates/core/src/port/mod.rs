// Port Layer - Interfaces for external dependencies

pub mod id_provider; // For deterministic testing
pub mod notifier;
pub mod task_store;
pub mod time_provider;
pub mod transaction;

// Re-exports
pub use id_provider::IdProvider;
pub use notifier::Notifier;
pub use task_store::{TaskStore, TaskStoreTransaction};
pub use time_provider::TimeProvider;
pub use transaction::Transaction;
