//! Process-shared synchronization over raw pthread objects.
//!
//! The objects live inside the mapped region, so everything here works on
//! raw pointers. The mutex is robust: when a process dies while holding it,
//! the next `lock` reports [`LockOutcome::OwnerDead`] instead of deadlocking,
//! which is what makes the subscriber's crash-recovery loop possible.

use std::mem::MaybeUninit;
use std::time::Duration;

use crate::error::{ShmError, ShmResult};

/// Result of acquiring the region mutex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockOutcome {
    /// Acquired normally.
    Acquired,
    /// Acquired, but the previous owner died while holding it; the protected
    /// state must be treated as suspect.
    OwnerDead,
    /// The mutex is unusable (typically: destroyed by the creator).
    Invalid,
}

/// Result of a timed condition wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Woken by a signal (or spuriously); re-check the predicate.
    Signaled,
    /// The deadline passed.
    TimedOut,
    /// The condition variable is unusable.
    Invalid,
}

/// Initialize a robust process-shared mutex in place.
///
/// # Safety
///
/// `mutex` must point into a writable mapping and must not be locked or
/// in use by any other thread or process.
pub unsafe fn init_robust_mutex(mutex: *mut libc::pthread_mutex_t) -> ShmResult<()> {
    let mut attr = MaybeUninit::<libc::pthread_mutexattr_t>::uninit();
    // SAFETY: attr is a plain attribute object on our stack; the mutex
    // pointer is valid per the caller's contract.
    unsafe {
        if libc::pthread_mutexattr_init(attr.as_mut_ptr()) != 0 {
            return Err(ShmError::SyncInit { what: "mutex" });
        }
        libc::pthread_mutexattr_setpshared(attr.as_mut_ptr(), libc::PTHREAD_PROCESS_SHARED);
        libc::pthread_mutexattr_setrobust(attr.as_mut_ptr(), libc::PTHREAD_MUTEX_ROBUST);
        let rc = libc::pthread_mutex_init(mutex, attr.as_ptr());
        libc::pthread_mutexattr_destroy(attr.as_mut_ptr());
        if rc != 0 {
            return Err(ShmError::SyncInit { what: "mutex" });
        }
    }
    Ok(())
}

/// Initialize a process-shared condition variable in place.
///
/// # Safety
///
/// `cond` must point into a writable mapping and must not be in use.
pub unsafe fn init_shared_cond(cond: *mut libc::pthread_cond_t) -> ShmResult<()> {
    let mut attr = MaybeUninit::<libc::pthread_condattr_t>::uninit();
    // SAFETY: as for the mutex attribute above.
    unsafe {
        if libc::pthread_condattr_init(attr.as_mut_ptr()) != 0 {
            return Err(ShmError::SyncInit { what: "condvar" });
        }
        libc::pthread_condattr_setpshared(attr.as_mut_ptr(), libc::PTHREAD_PROCESS_SHARED);
        let rc = libc::pthread_cond_init(cond, attr.as_ptr());
        libc::pthread_condattr_destroy(attr.as_mut_ptr());
        if rc != 0 {
            return Err(ShmError::SyncInit { what: "condvar" });
        }
    }
    Ok(())
}

/// Acquire the mutex, classifying the robust-mutex outcomes.
///
/// # Safety
///
/// `mutex` must point at an initialized process-shared mutex.
pub unsafe fn lock(mutex: *mut libc::pthread_mutex_t) -> LockOutcome {
    // SAFETY: valid per the caller's contract.
    match unsafe { libc::pthread_mutex_lock(mutex) } {
        0 => LockOutcome::Acquired,
        libc::EOWNERDEAD => LockOutcome::OwnerDead,
        _ => LockOutcome::Invalid,
    }
}

/// Mark an owner-dead mutex consistent so it stays usable.
///
/// # Safety
///
/// Must be called while holding the mutex after [`LockOutcome::OwnerDead`].
pub unsafe fn mark_consistent(mutex: *mut libc::pthread_mutex_t) {
    // SAFETY: valid per the caller's contract.
    unsafe {
        libc::pthread_mutex_consistent(mutex);
    }
}

/// Release the mutex.
///
/// # Safety
///
/// `mutex` must be held by the calling thread.
pub unsafe fn unlock(mutex: *mut libc::pthread_mutex_t) {
    // SAFETY: valid per the caller's contract.
    unsafe {
        libc::pthread_mutex_unlock(mutex);
    }
}

/// Wake one waiter on `cond`.
///
/// # Safety
///
/// `cond` must point at an initialized process-shared condition variable.
pub unsafe fn signal(cond: *mut libc::pthread_cond_t) {
    // SAFETY: valid per the caller's contract.
    unsafe {
        libc::pthread_cond_signal(cond);
    }
}

/// Wait on `cond` with a deadline `timeout` from now (`CLOCK_REALTIME`).
///
/// # Safety
///
/// `cond` must be initialized and `mutex` held by the calling thread.
pub unsafe fn timed_wait(
    cond: *mut libc::pthread_cond_t,
    mutex: *mut libc::pthread_mutex_t,
    timeout: Duration,
) -> WaitOutcome {
    let mut now = libc::timespec {
        tv_sec: 0,
        tv_nsec: 0,
    };
    // SAFETY: now is a valid out-pointer; cond/mutex valid per contract.
    unsafe {
        libc::clock_gettime(libc::CLOCK_REALTIME, &mut now);
        let mut nsec = now.tv_nsec + timeout.subsec_nanos() as libc::c_long;
        // Clamp to a year so absurd timeouts cannot overflow time_t.
        let mut sec = now.tv_sec + timeout.as_secs().min(31_536_000) as libc::time_t;
        if nsec >= 1_000_000_000 {
            sec += nsec / 1_000_000_000;
            nsec %= 1_000_000_000;
        }
        let deadline = libc::timespec {
            tv_sec: sec,
            tv_nsec: nsec,
        };
        match libc::pthread_cond_timedwait(cond, mutex, &deadline) {
            0 => WaitOutcome::Signaled,
            libc::ETIMEDOUT => WaitOutcome::TimedOut,
            _ => WaitOutcome::Invalid,
        }
    }
}

/// Destroy the mutex.
///
/// # Safety
///
/// No thread or process may use the mutex afterwards.
pub unsafe fn destroy_mutex(mutex: *mut libc::pthread_mutex_t) {
    // SAFETY: valid per the caller's contract.
    unsafe {
        libc::pthread_mutex_destroy(mutex);
    }
}

/// Destroy a condition variable.
///
/// # Safety
///
/// No thread or process may use the condition variable afterwards.
pub unsafe fn destroy_cond(cond: *mut libc::pthread_cond_t) {
    // SAFETY: valid per the caller's contract.
    unsafe {
        libc::pthread_cond_destroy(cond);
    }
}
