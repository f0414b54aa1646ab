// Application Layer - Pipeline use cases

pub mod constants;
pub mod queue;
pub mod retry;
pub mod status_update;
pub mod sweep;
pub mod tasks;
pub mod trigger;
pub mod worker;

// Re-exports
pub use queue::{EnqueueOptions, JobHandle, JobQueue, QueueStats};
pub use status_update::StatusUpdateHandler;
pub use sweep::OverdueSweepHandler;
pub use tasks::TaskService;
pub use trigger::SweepTrigger;
pub use worker::{shutdown_channel, ShutdownSender, ShutdownToken, Worker, WorkerPool};
