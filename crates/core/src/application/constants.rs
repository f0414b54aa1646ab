// Pipeline constants (no magic values)

use std::time::Duration;

/// Number of concurrent worker slots in the pool
pub const DEFAULT_WORKER_COUNT: usize = 5;

/// Default attempt budget for enqueued jobs
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default exponential backoff base delay (1s)
pub const DEFAULT_BACKOFF_BASE_DELAY_MS: u64 = 1000;

/// Page size used by the overdue sweep's batch scan
pub const SWEEP_PAGE_SIZE: u32 = 100;

/// Cadence of the overdue sweep trigger (hourly)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);
