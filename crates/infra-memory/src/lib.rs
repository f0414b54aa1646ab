// Taskpipe Infra (in-process) - TaskStore and Notifier adapters
//
// The production relational store and SMTP transport live in the
// surrounding service; these adapters back the same ports with in-process
// state so the pipeline can be wired and exercised end to end.

mod notifier;
mod task_store;

pub use notifier::TracingNotifier;
pub use task_store::InMemoryTaskStore;
