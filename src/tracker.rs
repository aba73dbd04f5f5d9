//! Tracking of the processes of the job currently in the foreground.

use nix::sys::signal::{Signal, killpg};
use nix::unistd::{Pid, getpgid, getpgrp};
use parking_lot::Mutex;
use std::sync::Arc;

/// Processes started for the running job and not yet waited for.
///
/// Cloning yields another handle to the same set. The job runner adds and removes
/// pids; the interrupt forwarder only reads them.
#[derive(Debug, Clone, Default)]
pub struct RunningProcesses {
    inner: Arc<Mutex<Vec<Pid>>>,
}

impl RunningProcesses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly spawned process.
    pub fn track(&self, pid: Pid) {
        self.inner.lock().push(pid);
    }

    /// Stop tracking a process once it has been reaped.
    pub fn untrack(&self, pid: Pid) {
        self.inner.lock().retain(|p| *p != pid);
    }

    pub fn clear(&self) {
        self.inner.lock().clear();
    }

    /// Snapshot of the tracked pids.
    #[cfg(test)]
    pub(crate) fn pids(&self) -> Vec<Pid> {
        self.inner.lock().clone()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Sends `signal` to the process group of every tracked process.
    ///
    /// Stages of one pipeline share a group, which is signalled once. The shell's own
    /// group is never signalled. The lock is held while signalling so a concurrent
    /// `clear` can't race with delivery. Returns the number of groups signalled.
    pub fn signal_all(&self, signal: Signal) -> usize {
        let pids = self.inner.lock();
        let own_group = getpgrp();
        let mut groups: Vec<Pid> = Vec::with_capacity(pids.len());
        for pid in pids.iter() {
            match getpgid(Some(*pid)) {
                Ok(group) if group != own_group && !groups.contains(&group) => groups.push(group),
                Ok(_) => {}
                Err(errno) => tracing::debug!(pid = pid.as_raw(), %errno, "no group to signal"),
            }
        }

        let mut delivered = 0;
        for group in groups {
            match killpg(group, signal) {
                Ok(()) => delivered += 1,
                Err(errno) => {
                    tracing::warn!(group = group.as_raw(), %errno, ?signal, "failed to forward signal")
                }
            }
        }
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::process::{CommandExt, ExitStatusExt};
    use std::process::Command;

    #[test]
    fn test_tracker_operations() {
        let tracker = RunningProcesses::new();
        assert!(tracker.is_empty());

        tracker.track(Pid::from_raw(100));
        tracker.track(Pid::from_raw(200));
        assert_eq!(tracker.pids(), vec![Pid::from_raw(100), Pid::from_raw(200)]);

        tracker.untrack(Pid::from_raw(100));
        assert_eq!(tracker.pids(), vec![Pid::from_raw(200)]);

        tracker.clear();
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_tracker_clone_shares_state() {
        let tracker1 = RunningProcesses::new();
        let tracker2 = tracker1.clone();
        tracker2.track(Pid::from_raw(300));
        assert_eq!(tracker1.pids(), vec![Pid::from_raw(300)]);
    }

    #[test]
    fn test_signal_all_on_empty_set_is_noop() {
        assert_eq!(RunningProcesses::new().signal_all(Signal::SIGINT), 0);
    }

    #[test]
    fn test_signal_all_interrupts_process_group() {
        let mut child = Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .unwrap();
        let tracker = RunningProcesses::new();
        tracker.track(Pid::from_raw(child.id() as i32));

        assert_eq!(tracker.signal_all(Signal::SIGINT), 1);

        let status = child.wait().unwrap();
        assert_eq!(status.signal(), Some(Signal::SIGINT as i32));
    }

    #[test]
    fn test_signal_all_signals_shared_group_once() {
        let mut leader = Command::new("sleep")
            .arg("30")
            .process_group(0)
            .spawn()
            .unwrap();
        let mut member = Command::new("sleep")
            .arg("30")
            .process_group(leader.id() as i32)
            .spawn()
            .unwrap();
        let tracker = RunningProcesses::new();
        tracker.track(Pid::from_raw(leader.id() as i32));
        tracker.track(Pid::from_raw(member.id() as i32));

        assert_eq!(tracker.signal_all(Signal::SIGINT), 1);

        assert_eq!(leader.wait().unwrap().signal(), Some(Signal::SIGINT as i32));
        assert_eq!(member.wait().unwrap().signal(), Some(Signal::SIGINT as i32));
    }

    #[test]
    fn test_signal_all_skips_shell_group() {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        let tracker = RunningProcesses::new();
        tracker.track(Pid::from_raw(child.id() as i32));

        assert_eq!(tracker.signal_all(Signal::SIGINT), 0);

        assert!(child.try_wait().unwrap().is_none(), "child must still be running");
        child.kill().unwrap();
        child.wait().unwrap();
    }
}
