//! Foreground control of the shell's terminal.

use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd::{self, Pid};
use std::os::fd::{AsRawFd, OwnedFd, RawFd};

/// The controlling terminal, when the shell reads from one.
///
/// While a job runs its process group is the terminal's foreground group: it may read
/// from the terminal and gets Ctrl+C from it directly. Afterwards the shell takes the
/// terminal back, which it may do from the background because it ignores SIGTTOU.
#[derive(Debug)]
pub struct Terminal {
    fd: OwnedFd,
    shell_group: Pid,
}

impl Terminal {
    /// Takes charge of the terminal behind `fd`. The shell's current process group is
    /// the one handed the terminal back after each job.
    pub fn new(fd: OwnedFd) -> nix::Result<Self> {
        // SAFETY: SIG_IGN installs no handler.
        unsafe { signal::signal(Signal::SIGTTOU, SigHandler::SigIgn) }?;
        Ok(Self {
            fd,
            shell_group: unistd::getpgrp(),
        })
    }

    pub(crate) fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Makes `group` the foreground group until the returned guard is dropped.
    pub(crate) fn foreground(&self, group: Pid) -> Foreground<'_> {
        if let Err(errno) = unistd::tcsetpgrp(&self.fd, group) {
            tracing::warn!(group = group.as_raw(), %errno, "cannot hand the terminal to job");
        }
        Foreground { terminal: self }
    }

    fn reclaim(&self) {
        if let Err(errno) = unistd::tcsetpgrp(&self.fd, self.shell_group) {
            tracing::warn!(%errno, "cannot take the terminal back");
        }
    }
}

/// Returns the terminal to the shell when dropped.
pub(crate) struct Foreground<'a> {
    terminal: &'a Terminal,
}

impl Drop for Foreground<'_> {
    fn drop(&mut self) {
        self.terminal.reclaim();
    }
}
