//! Optional platform tuning hooks, exposed as a capability trait.
//!
//! Thread priority / affinity adjustments are advisory only: correctness of
//! the pipeline never depends on them succeeding, so every hook is
//! best-effort and swallows its own errors. Mirrors the `numa` feature gate
//! pattern the ring buffer crate's own workspace uses for optional,
//! `libc`-backed, non-load-bearing tuning.

/// Platform-specific tuning a stage may attempt on its own thread. No
/// method here may be relied on for correctness; every implementation,
/// including the default, is allowed to do nothing.
pub trait PlatformHooks {
    /// Attempts to raise the calling thread's scheduling priority.
    fn raise_thread_priority(&self);
}

/// Does nothing. Used on platforms, or builds, where no tuning hook is
/// available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopHooks;

impl PlatformHooks for NoopHooks {
    fn raise_thread_priority(&self) {}
}

#[cfg(all(target_os = "linux", feature = "priority-hooks"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct LinuxHooks;

#[cfg(all(target_os = "linux", feature = "priority-hooks"))]
impl PlatformHooks for LinuxHooks {
    fn raise_thread_priority(&self) {
        // SAFETY: `pthread_self` and `sched_get_priority_max` are plain
        // platform queries with no preconditions; `pthread_setschedparam`
        // only mutates the calling thread's own scheduling parameters.
        unsafe {
            let max = libc::sched_get_priority_max(libc::SCHED_FIFO);
            if max < 0 {
                return;
            }
            let params = libc::sched_param {
                sched_priority: max,
            };
            // Best-effort: most processes lack CAP_SYS_NICE, so this
            // commonly fails with EPERM. Expected, and not reported.
            let _ = libc::pthread_setschedparam(libc::pthread_self(), libc::SCHED_FIFO, &params);
        }
    }
}

/// The hook set this build was compiled with: [`LinuxHooks`] when the
/// `priority-hooks` feature is enabled on Linux, [`NoopHooks`] otherwise.
#[cfg(all(target_os = "linux", feature = "priority-hooks"))]
pub fn default_hooks() -> impl PlatformHooks {
    LinuxHooks
}

#[cfg(not(all(target_os = "linux", feature = "priority-hooks")))]
pub fn default_hooks() -> impl PlatformHooks {
    NoopHooks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noop_hooks_never_panics() {
        NoopHooks.raise_thread_priority();
    }

    #[test]
    fn default_hooks_never_panics() {
        default_hooks().raise_thread_priority();
    }
}
