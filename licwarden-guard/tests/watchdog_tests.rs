mod common;

use common::{AcceptingVerifier, DAY, Install, RecordingTerminator, set_mtime};
use licwarden_guard::{Terminator, Tick, Watchdog, tick};
use licwarden_license::{DeadlineTracker, LicenseStatus};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

const T0: i64 = 1_600_000_000;
const INTERVAL: Duration = Duration::from_millis(50);

fn watchdog(install: &Install, terminator: Arc<RecordingTerminator>) -> Watchdog {
    Watchdog::new(
        install.paths.clone(),
        Arc::new(AcceptingVerifier),
        terminator,
        INTERVAL,
    )
}

#[test]
fn tick_expires_one_day_past_grace() {
    let install = Install::new();
    set_mtime(&install.paths.epoch, T0);
    let mut tracker = DeadlineTracker::new(install.paths.clone(), Arc::new(AcceptingVerifier), 0);

    assert!(matches!(tick(&mut tracker, T0 + 29 * DAY), Tick::Alive(_)));
    match tick(&mut tracker, T0 + 31 * DAY) {
        Tick::Expired(d) => assert_eq!(d.effective(), T0 + 30 * DAY),
        other => panic!("expected expiry, got {other:?}"),
    }
}

#[test]
fn dormant_watchdog_never_fires() {
    let install = Install::new();
    set_mtime(&install.paths.epoch, T0);
    let terminator = Arc::new(RecordingTerminator::default());
    let dog = watchdog(&install, terminator.clone());

    dog.ensure_running();
    assert!(!dog.is_armed());
    assert!(!terminator.wait(INTERVAL * 4));
    assert!(dog.report().is_none());
}

#[test]
fn armed_watchdog_terminates_after_expiry() {
    let install = Install::new();
    set_mtime(&install.paths.epoch, T0);
    let terminator = Arc::new(RecordingTerminator::default());
    let dog = watchdog(&install, terminator.clone());

    dog.arm();
    assert!(terminator.wait(Duration::from_secs(5)));
    assert_eq!(terminator.deadline.load(Ordering::SeqCst), T0 + 30 * DAY);

    let report = dog.report().unwrap();
    assert_eq!(report.deadline.default, T0 + 30 * DAY);
    assert_eq!(
        report.epoch.unwrap().identifier,
        "0123456789abcdef0123456789abcdef"
    );
}

#[test]
fn fresh_install_keeps_running() {
    let install = Install::new();
    let terminator = Arc::new(RecordingTerminator::default());
    let dog = watchdog(&install, terminator.clone());

    dog.arm();
    dog.arm();
    assert!(!terminator.wait(INTERVAL * 4));

    let report = dog.report().unwrap();
    assert!(matches!(
        report.deadline.status(report.checked_at),
        LicenseStatus::Trial { days_remaining: 29 | 30, .. }
    ));
}

#[test]
fn missing_epoch_anchors_at_arm_time() {
    let install = Install::new();
    std::fs::remove_file(&install.paths.epoch).unwrap();
    let terminator = Arc::new(RecordingTerminator::default());
    let dog = watchdog(&install, terminator.clone());

    dog.arm();
    assert!(!terminator.wait(INTERVAL * 4));
    let report = dog.report().unwrap();
    assert!(report.epoch.is_none());
    assert!(report.deadline.default >= report.checked_at + 30 * DAY - 5);
}

/// Exits with status 42 when asked to terminate from a forked child,
/// records the request in the test process itself.
struct ExitInChild {
    parent: libc::pid_t,
    recorder: RecordingTerminator,
}

impl Terminator for ExitInChild {
    fn terminate(&self, deadline: i64, now: i64) {
        if unsafe { libc::getpid() } != self.parent {
            unsafe { libc::_exit(42) };
        }
        self.recorder.terminate(deadline, now);
    }
}

#[test]
fn forked_child_rearms_and_is_terminated() {
    let install = Install::new();
    set_mtime(&install.paths.epoch, T0);
    let terminator = Arc::new(ExitInChild {
        parent: unsafe { libc::getpid() },
        recorder: RecordingTerminator::default(),
    });
    let dog = Watchdog::new(
        install.paths.clone(),
        Arc::new(AcceptingVerifier),
        terminator.clone(),
        INTERVAL,
    );

    dog.arm();
    assert!(terminator.recorder.wait(Duration::from_secs(5)));

    let pid = unsafe { libc::fork() };
    assert!(pid >= 0);
    if pid == 0 {
        // The parent's watchdog thread does not exist here.
        dog.after_fork();
        std::thread::sleep(Duration::from_secs(2));
        unsafe { libc::_exit(7) };
    }

    let mut status = 0;
    assert_eq!(unsafe { libc::waitpid(pid, &mut status, 0) }, pid);
    assert!(libc::WIFEXITED(status));
    assert_eq!(libc::WEXITSTATUS(status), 42);
}

#[test]
fn dormant_watchdog_stays_dormant_in_forked_child() {
    let install = Install::new();
    set_mtime(&install.paths.epoch, T0);
    let terminator = Arc::new(ExitInChild {
        parent: unsafe { libc::getpid() },
        recorder: RecordingTerminator::default(),
    });
    let dog = Watchdog::new(
        install.paths.clone(),
        Arc::new(AcceptingVerifier),
        terminator,
        INTERVAL,
    );

    let pid = unsafe { libc::fork() };
    assert!(pid >= 0);
    if pid == 0 {
        dog.after_fork();
        std::thread::sleep(INTERVAL * 6);
        unsafe { libc::_exit(7) };
    }

    let mut status = 0;
    assert_eq!(unsafe { libc::waitpid(pid, &mut status, 0) }, pid);
    assert!(libc::WIFEXITED(status));
    assert_eq!(libc::WEXITSTATUS(status), 7);
}
