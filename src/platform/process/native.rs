use super::{Clock, LaunchSpec, ProcessTable, Signal};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::io;
use std::process::{Command, Stdio};
use std::time::Duration;

/// The real process table of this machine.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeProcessTable;

impl ProcessTable for NativeProcessTable {
    fn argv(&self, pid: u32) -> Option<Vec<String>> {
        if pid == 0 {
            return None;
        }
        platform_argv(pid)
    }

    fn signal(&self, pid: u32, signal: Signal) -> io::Result<()> {
        if pid == 0 || pid == std::process::id() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("refusing to signal pid {pid}"),
            ));
        }
        let raw_pid = libc::pid_t::try_from(pid).map_err(|_| {
            io::Error::new(io::ErrorKind::InvalidInput, format!("pid {pid} out of range"))
        })?;
        let raw_signal = match signal {
            Signal::Terminate => libc::SIGTERM,
            Signal::Kill => libc::SIGKILL,
        };

        // SAFETY: kill(2) takes plain integers and has no memory-safety
        // requirements.
        let rc = unsafe { libc::kill(raw_pid, raw_signal) };
        if rc == 0 {
            return Ok(());
        }
        let error = io::Error::last_os_error();
        if error.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(error)
    }

    fn spawn_detached(&self, spec: &LaunchSpec) -> io::Result<u32> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // SAFETY: setsid is async-signal-safe and touches no Rust state
            // between fork and exec.
            unsafe {
                command.pre_exec(|| {
                    if libc::setsid() == -1 {
                        return Err(io::Error::last_os_error());
                    }
                    Ok(())
                });
            }
        }

        let child = command.spawn()?;
        Ok(child.id())
    }
}

#[cfg(target_os = "linux")]
fn platform_argv(pid: u32) -> Option<Vec<String>> {
    let stat = std::fs::read_to_string(format!("/proc/{pid}/stat")).ok()?;
    // The state field follows the parenthesised comm, which may itself
    // contain spaces or parentheses.
    let state = stat
        .rsplit_once(')')
        .and_then(|(_, rest)| rest.split_whitespace().next())?;
    if matches!(state, "Z" | "X" | "x") {
        return None;
    }

    let raw = std::fs::read(format!("/proc/{pid}/cmdline")).ok()?;
    Some(
        raw.split(|byte| *byte == 0)
            .filter(|part| !part.is_empty())
            .map(|part| String::from_utf8_lossy(part).into_owned())
            .collect(),
    )
}

#[cfg(not(target_os = "linux"))]
fn platform_argv(pid: u32) -> Option<Vec<String>> {
    let output = Command::new("ps")
        .args(["-o", "stat=,command=", "-p", &pid.to_string()])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout);
    let (state, command_line) = text.trim().split_once(char::is_whitespace)?;
    if state.starts_with('Z') {
        return None;
    }
    // ps joins arguments with spaces; splitting again is the best it offers.
    Some(command_line.split_whitespace().map(str::to_string).collect())
}

/// Wall clock backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> {
        tokio::time::sleep(duration)
    }
}
