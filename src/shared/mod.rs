pub mod fs_atomic;
pub mod logging;
pub mod retry;

pub use fs_atomic::atomic_write_file;
pub use logging::{new_run_id, LogLevel, RunLog};
pub use retry::{retry_with_policy, RetryPolicy};
