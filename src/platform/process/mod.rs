//! Process control behind a capability seam.
//!
//! The reconciler only talks to [`ProcessSupervisor`], which in turn only
//! talks to a [`ProcessTable`] and a [`Clock`]. Production wires the native
//! implementations; tests wire the fakes from `testing`.

mod native;
mod supervisor;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use native::{NativeProcessTable, SystemClock};
pub use supervisor::{
    ProcessSignature, ProcessSupervisor, SupervisorSettings, TerminationReport, WorkerCommand,
};

use chrono::{DateTime, Utc};
use std::future::Future;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum Signal {
    #[strum(serialize = "SIGTERM")]
    Terminate,
    #[strum(serialize = "SIGKILL")]
    Kill,
}

/// A program to start detached from the calling process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl LaunchSpec {
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// View of the OS process table.
pub trait ProcessTable {
    /// Argument vector of `pid` if it is running; zombies count as not
    /// running.
    fn argv(&self, pid: u32) -> Option<Vec<String>>;

    /// Sends `signal` to `pid`. A process that is already gone is not an error.
    fn signal(&self, pid: u32, signal: Signal) -> io::Result<()>;

    /// Starts `spec` in its own session so it outlives the caller.
    fn spawn_detached(&self, spec: &LaunchSpec) -> io::Result<u32>;
}

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()>;
}

impl<T: ProcessTable + ?Sized> ProcessTable for Arc<T> {
    fn argv(&self, pid: u32) -> Option<Vec<String>> {
        (**self).argv(pid)
    }

    fn signal(&self, pid: u32, signal: Signal) -> io::Result<()> {
        (**self).signal(pid, signal)
    }

    fn spawn_detached(&self, spec: &LaunchSpec) -> io::Result<u32> {
        (**self).spawn_detached(spec)
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        (**self).sleep(duration)
    }
}
