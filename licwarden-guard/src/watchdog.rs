//! Deadline watchdog.
//!
//! Two states: dormant (no thread) and armed (one polling thread per
//! process). Arming happens the first time the host is classified
//! self-licensed. A forked child does not inherit the thread, so the
//! post-fork hook calls [`Watchdog::after_fork`], which spawns a fresh one.
//!
//! Each tick recomputes the effective deadline and, once it has passed,
//! hands control to the [`Terminator`]. In production that is a `SIGKILL`
//! to the own process: there is no graceful path.

use licwarden_license::{Deadline, DeadlineTracker, InstallEpoch, LicensePaths, SignatureVerifier};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicI32, AtomicI64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};
use std::thread;
use std::time::Duration;
use tracing::{debug, warn};

/// Default polling interval.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

/// Final enforcement action.
pub trait Terminator: Send + Sync {
    /// Called once the deadline has passed. The production implementation
    /// does not return.
    fn terminate(&self, deadline: i64, now: i64);
}

/// Kills the whole process with `SIGKILL`.
#[derive(Debug, Clone, Copy, Default)]
pub struct KillProcess;

impl Terminator for KillProcess {
    fn terminate(&self, deadline: i64, now: i64) {
        warn!(deadline, now, "license deadline passed, terminating");
        // SAFETY: signalling our own pid has no memory-safety preconditions.
        unsafe {
            libc::kill(libc::getpid(), libc::SIGKILL);
        }
    }
}

/// Outcome of one watchdog tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Alive(Deadline),
    Expired(Deadline),
}

/// Refreshes the tracker and compares against `now`.
pub fn tick(tracker: &mut DeadlineTracker, now: i64) -> Tick {
    let deadline = tracker.refresh();
    if deadline.is_expired(now) {
        Tick::Expired(deadline)
    } else {
        Tick::Alive(deadline)
    }
}

/// What the watchdog last observed, published for status reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WatchdogReport {
    pub checked_at: i64,
    pub deadline: Deadline,
    pub epoch: Option<InstallEpoch>,
}

struct Inner {
    paths: LicensePaths,
    verifier: Arc<dyn SignatureVerifier>,
    terminator: Arc<dyn Terminator>,
    interval: Duration,
    armed: AtomicBool,
    armed_at: AtomicI64,
    running_pid: AtomicI32,
    report: Mutex<Option<WatchdogReport>>,
}

/// Handle to the per-process watchdog.
#[derive(Clone)]
pub struct Watchdog {
    inner: Arc<Inner>,
}

impl Watchdog {
    pub fn new(
        paths: LicensePaths,
        verifier: Arc<dyn SignatureVerifier>,
        terminator: Arc<dyn Terminator>,
        interval: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                paths,
                verifier,
                terminator,
                interval,
                armed: AtomicBool::new(false),
                armed_at: AtomicI64::new(0),
                running_pid: AtomicI32::new(0),
                report: Mutex::new(None),
            }),
        }
    }

    /// Transitions dormant → armed and starts the polling thread.
    /// Idempotent.
    pub fn arm(&self) {
        if !self.inner.armed.swap(true, Ordering::AcqRel) {
            self.inner.armed_at.store(now(), Ordering::Release);
            debug!("watchdog armed");
        }
        self.ensure_running();
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.inner.armed.load(Ordering::Acquire)
    }

    /// Starts the polling thread if this process does not have one yet.
    ///
    /// The owning pid is recorded, so after a fork the child sees a foreign
    /// pid and starts its own thread.
    pub fn ensure_running(&self) {
        if !self.is_armed() {
            return;
        }
        // SAFETY: getpid has no preconditions.
        let pid = unsafe { libc::getpid() };
        if self.inner.running_pid.load(Ordering::Acquire) == pid
            || self.inner.running_pid.swap(pid, Ordering::AcqRel) == pid
        {
            return;
        }

        let inner = Arc::clone(&self.inner);
        let spawned = thread::Builder::new()
            .name("licwarden-watchdog".to_string())
            .spawn(move || run(&inner));
        if let Err(e) = spawned {
            warn!(error = %e, "failed to start watchdog thread");
            self.inner.running_pid.store(0, Ordering::Release);
        }
    }

    /// Post-fork hook for the child process.
    pub fn after_fork(&self) {
        self.ensure_running();
    }

    /// The most recent tick's observations.
    #[must_use]
    pub fn report(&self) -> Option<WatchdogReport> {
        self.inner
            .report
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl std::fmt::Debug for Watchdog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Watchdog")
            .field("armed", &self.is_armed())
            .field("interval", &self.inner.interval)
            .finish()
    }
}

fn run(inner: &Inner) {
    let fallback = inner.armed_at.load(Ordering::Acquire);
    let mut tracker = DeadlineTracker::new(inner.paths.clone(), Arc::clone(&inner.verifier), fallback);

    loop {
        let now = now();
        let outcome = tick(&mut tracker, now);
        let deadline = match outcome {
            Tick::Alive(d) | Tick::Expired(d) => d,
        };

        publish(
            inner,
            WatchdogReport {
                checked_at: now,
                deadline,
                epoch: tracker.epoch().cloned(),
            },
        );

        if let Tick::Expired(d) = outcome {
            inner.terminator.terminate(d.effective(), now);
            return;
        }

        thread::sleep(inner.interval);
    }
}

/// Stores `report` unless the slot is held elsewhere.
///
/// Never blocks: a fork can leave the child with a mutex some other thread
/// of the parent was holding, and enforcement must not wait on it.
fn publish(inner: &Inner, report: WatchdogReport) {
    match inner.report.try_lock() {
        Ok(mut slot) => *slot = Some(report),
        Err(TryLockError::Poisoned(poisoned)) => *poisoned.into_inner() = Some(report),
        Err(TryLockError::WouldBlock) => debug!("report slot busy, skipping update"),
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
mod tests {
    use super::*;
    use licwarden_license::LicenseResult;
    use std::path::Path;
    use std::sync::mpsc;
    use std::time::{SystemTime, UNIX_EPOCH};

    struct Accepting;

    impl SignatureVerifier for Accepting {
        fn verify(&self, _path: &Path) -> LicenseResult<()> {
            Ok(())
        }
    }

    /// Exits with status 42 from any process other than `parent`.
    struct ExitInChild {
        parent: libc::pid_t,
    }

    impl Terminator for ExitInChild {
        fn terminate(&self, _deadline: i64, _now: i64) {
            if unsafe { libc::getpid() } != self.parent {
                unsafe { libc::_exit(42) };
            }
        }
    }

    #[test]
    fn forked_child_is_terminated_while_report_slot_is_held() {
        let dir = tempfile::TempDir::new().unwrap();
        let paths = LicensePaths::rooted_at(dir.path());
        std::fs::write(&paths.epoch, "0123456789abcdef0123456789abcdef\n").unwrap();
        let epoch = std::fs::File::options().write(true).open(&paths.epoch).unwrap();
        epoch
            .set_modified(UNIX_EPOCH + Duration::from_secs(1_600_000_000))
            .unwrap();
        assert!(SystemTime::now() > UNIX_EPOCH + Duration::from_secs(1_600_000_000 + 31 * 86_400));

        let parent = unsafe { libc::getpid() };
        let dog = Watchdog::new(
            paths,
            Arc::new(Accepting),
            Arc::new(ExitInChild { parent }),
            Duration::from_millis(20),
        );
        // Armed, but with no thread in this process.
        dog.inner.armed.store(true, Ordering::Release);

        let (held_tx, held_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder = {
            let inner = Arc::clone(&dog.inner);
            thread::spawn(move || {
                let _slot = inner.report.lock().unwrap();
                held_tx.send(()).unwrap();
                release_rx.recv().unwrap();
            })
        };
        held_rx.recv().unwrap();

        let pid = unsafe { libc::fork() };
        assert!(pid >= 0);
        if pid == 0 {
            dog.after_fork();
            thread::sleep(Duration::from_secs(2));
            unsafe { libc::_exit(7) };
        }

        release_tx.send(()).unwrap();
        holder.join().unwrap();

        let mut status = 0;
        assert_eq!(unsafe { libc::waitpid(pid, &mut status, 0) }, pid);
        assert!(libc::WIFEXITED(status));
        assert_eq!(libc::WEXITSTATUS(status), 42);
    }

    #[test]
    fn publish_skips_a_held_slot() {
        let dog = Watchdog::new(
            LicensePaths::rooted_at("/nonexistent"),
            Arc::new(Accepting),
            Arc::new(KillProcess),
            DEFAULT_INTERVAL,
        );
        let report = WatchdogReport {
            checked_at: 1,
            deadline: DeadlineTracker::new(
                LicensePaths::rooted_at("/nonexistent"),
                Arc::new(Accepting),
                0,
            )
            .refresh(),
            epoch: None,
        };

        {
            let _slot = dog.inner.report.lock().unwrap();
            publish(&dog.inner, report.clone());
        }
        assert!(dog.report().is_none());

        publish(&dog.inner, report.clone());
        assert_eq!(dog.report(), Some(report));
    }
}
