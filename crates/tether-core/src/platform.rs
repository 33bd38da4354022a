//! Platform abstraction for the host scheduler.
//!
//! The engine never drives its own event loop. It queues deferred work on the
//! [`Runtime`](crate::Runtime) and asks the host, through this trait, to come
//! back for another turn once the current commit is finished.

/// Schedules work for the Tether runtime.
///
/// Implementations must be safe to share across threads even though the
/// runtime itself is single-threaded; hosts commonly wake an event loop from
/// another thread.
pub trait RuntimeScheduler: Send + Sync {
    /// Request that the host run another scheduler turn after the current commit.
    fn schedule_frame(&self);
}
