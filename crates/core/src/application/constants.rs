// Supervisor constants (no magic values)

/// Buffered task events per subscriber before the oldest are dropped
pub const TASK_EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Buffered notifications per subscriber
pub const NOTIFICATION_CHANNEL_CAPACITY: usize = 64;

/// Capacity of the bounded game-output side channel (lines)
pub const DEFAULT_OUTPUT_BUFFER: usize = 256;

/// Graceful process shutdown timeout (5 seconds) before SIGKILL
pub const DEFAULT_TERMINATE_GRACE_MS: i64 = 5000;

/// Reason recorded on a launch task that was cancelled
pub const TERMINATED_BY_USER: &str = "terminated by user";
