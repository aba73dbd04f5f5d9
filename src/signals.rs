//! Forwarding of interrupts to the foreground job.
//!
//! The shell never reacts to SIGINT itself. The signal is blocked on every thread and
//! picked up synchronously by a dedicated forwarder thread, which re-sends it to the
//! process groups of the job that is running at that moment. On a terminal, Ctrl+C
//! also reaches the job directly, since its group is in the foreground.

use crate::tracker::RunningProcesses;
use nix::sys::signal::{SigSet, Signal};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};

fn interrupt_set() -> SigSet {
    let mut set = SigSet::empty();
    set.add(Signal::SIGINT);
    set
}

/// Blocks SIGINT on the calling thread.
///
/// Threads spawned afterwards inherit the mask, so the binary calls this first thing in
/// `main`. Children inherit it too; external commands unblock SIGINT again between
/// fork and exec.
pub fn block_interrupt() -> nix::Result<()> {
    interrupt_set().thread_block()
}

/// Handle on the running forwarder thread.
#[derive(Debug)]
pub struct Forwarder {
    thread: JoinHandle<()>,
    handled: Arc<AtomicUsize>,
}

impl Forwarder {
    /// Number of interrupts taken off the queue so far, idle ones included.
    pub fn handled(&self) -> usize {
        self.handled.load(Ordering::Acquire)
    }

    pub fn thread(&self) -> &JoinHandle<()> {
        &self.thread
    }
}

/// Starts the forwarder thread and returns once it is listening.
///
/// The thread runs for the rest of the process. It reads `running` under its lock on
/// every SIGINT and never modifies it.
pub fn spawn_forwarder(running: RunningProcesses) -> io::Result<Forwarder> {
    let (ready_tx, ready_rx) = mpsc::channel();
    let handled = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&handled);
    let thread = thread::Builder::new()
        .name("sigint-forwarder".into())
        .spawn(move || {
            let set = interrupt_set();
            if let Err(errno) = set.thread_block() {
                tracing::error!(%errno, "cannot block SIGINT in forwarder");
                return;
            }
            let _ = ready_tx.send(());
            forward_interrupts(&set, &running, &counter);
        })?;
    ready_rx
        .recv()
        .map_err(|_| io::Error::other("signal forwarder exited during startup"))?;
    Ok(Forwarder { thread, handled })
}

fn forward_interrupts(set: &SigSet, running: &RunningProcesses, handled: &AtomicUsize) {
    loop {
        match set.wait() {
            Ok(signal) => {
                let groups = running.signal_all(signal);
                handled.fetch_add(1, Ordering::Release);
                tracing::debug!(?signal, groups, "forwarded interrupt");
            }
            Err(errno) => {
                tracing::error!(%errno, "sigwait failed; interrupts are no longer forwarded");
                return;
            }
        }
    }
}
