//! In-memory process table and clock for exercising supervision without
//! real processes or real time.

use super::{Clock, LaunchSpec, ProcessTable, Signal};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::future::Future;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const FIRST_SPAWNED_PID: u32 = 4000;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Clock whose `sleep` advances time instantly.
#[derive(Debug)]
pub struct FakeClock {
    now: Mutex<DateTime<Utc>>,
    slept: Mutex<Vec<Duration>>,
}

impl FakeClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
            slept: Mutex::new(Vec::new()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let by = chrono::Duration::from_std(by).unwrap_or_else(|_| chrono::Duration::zero());
        let mut now = lock(&self.now);
        *now = now.checked_add_signed(by).unwrap_or(*now);
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *lock(&self.now) = at;
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.slept).clone()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *lock(&self.now)
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        lock(&self.slept).push(duration);
        self.advance(duration);
        std::future::ready(())
    }
}

#[derive(Debug, Clone)]
struct FakeProcess {
    argv: Vec<String>,
    ignores_terminate: bool,
    ignores_kill: bool,
    exits_at: Option<DateTime<Utc>>,
    alive: bool,
}

impl FakeProcess {
    fn running(command_line: &str) -> Self {
        Self {
            argv: command_line.split_whitespace().map(str::to_string).collect(),
            ignores_terminate: false,
            ignores_kill: false,
            exits_at: None,
            alive: true,
        }
    }
}

#[derive(Debug, Default)]
struct TableState {
    processes: BTreeMap<u32, FakeProcess>,
    next_pid: u32,
    launches: Vec<LaunchSpec>,
    signals: Vec<(u32, Signal)>,
    failing_spawns: u32,
}

/// Process table driven by the paired [`FakeClock`].
#[derive(Debug)]
pub struct FakeProcessTable {
    clock: Arc<FakeClock>,
    state: Mutex<TableState>,
}

impl FakeProcessTable {
    pub fn new(clock: Arc<FakeClock>) -> Self {
        Self {
            clock,
            state: Mutex::new(TableState {
                next_pid: FIRST_SPAWNED_PID,
                ..TableState::default()
            }),
        }
    }

    /// A process that exits on SIGTERM.
    pub fn insert(&self, pid: u32, command_line: &str) {
        self.put(pid, FakeProcess::running(command_line));
    }

    /// A process that ignores SIGTERM but not SIGKILL.
    pub fn insert_stubborn(&self, pid: u32, command_line: &str) {
        self.put(
            pid,
            FakeProcess {
                ignores_terminate: true,
                ..FakeProcess::running(command_line)
            },
        );
    }

    /// A process no signal can end.
    pub fn insert_unkillable(&self, pid: u32, command_line: &str) {
        self.put(
            pid,
            FakeProcess {
                ignores_terminate: true,
                ignores_kill: true,
                ..FakeProcess::running(command_line)
            },
        );
    }

    /// A process that finishes by itself at `at`.
    pub fn insert_exiting_at(&self, pid: u32, command_line: &str, at: DateTime<Utc>) {
        self.put(
            pid,
            FakeProcess {
                exits_at: Some(at),
                ..FakeProcess::running(command_line)
            },
        );
    }

    pub fn exit(&self, pid: u32) {
        if let Some(process) = lock(&self.state).processes.get_mut(&pid) {
            process.alive = false;
        }
    }

    pub fn is_running(&self, pid: u32) -> bool {
        self.argv(pid).is_some()
    }

    pub fn launches(&self) -> Vec<LaunchSpec> {
        lock(&self.state).launches.clone()
    }

    pub fn signals(&self) -> Vec<(u32, Signal)> {
        lock(&self.state).signals.clone()
    }

    /// Makes the next `count` spawns fail.
    pub fn fail_next_spawns(&self, count: u32) {
        lock(&self.state).failing_spawns = count;
    }

    fn put(&self, pid: u32, process: FakeProcess) {
        lock(&self.state).processes.insert(pid, process);
    }
}

impl ProcessTable for FakeProcessTable {
    fn argv(&self, pid: u32) -> Option<Vec<String>> {
        let now = self.clock.now();
        let state = lock(&self.state);
        let process = state.processes.get(&pid)?;
        let finished = process.exits_at.is_some_and(|at| now >= at);
        (process.alive && !finished).then(|| process.argv.clone())
    }

    fn signal(&self, pid: u32, signal: Signal) -> io::Result<()> {
        let mut state = lock(&self.state);
        state.signals.push((pid, signal));
        if let Some(process) = state.processes.get_mut(&pid) {
            let ignored = match signal {
                Signal::Terminate => process.ignores_terminate,
                Signal::Kill => process.ignores_kill,
            };
            if !ignored {
                process.alive = false;
            }
        }
        Ok(())
    }

    fn spawn_detached(&self, spec: &LaunchSpec) -> io::Result<u32> {
        let mut state = lock(&self.state);
        if state.failing_spawns > 0 {
            state.failing_spawns -= 1;
            return Err(io::Error::other("spawn refused"));
        }
        let pid = state.next_pid;
        state.next_pid += 1;
        state.launches.push(spec.clone());
        let argv = std::iter::once(spec.program.display().to_string())
            .chain(spec.args.iter().cloned())
            .collect();
        state.processes.insert(
            pid,
            FakeProcess {
                argv,
                ..FakeProcess::running("")
            },
        );
        Ok(pid)
    }
}
