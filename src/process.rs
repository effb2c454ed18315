// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::{
    io,
    process::{Child, ExitStatus},
    thread,
    time::{Duration, Instant},
};

use tracing::{debug, warn};

use crate::error::Error;

/// How often an exiting child is polled during the grace period.
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Asks the child to exit with SIGTERM. A child that has already gone away is not an error.
#[cfg(unix)]
fn signal_terminate(child: &mut Child) -> io::Result<()> {
    let pid = child.id() as libc::pid_t;
    if pid <= 0 {
        return Ok(());
    }

    // SAFETY: `kill` has no memory-safety preconditions. The pid belongs to a child we
    // haven't reaped yet, so it can't have been recycled for another process.
    if unsafe { libc::kill(pid, libc::SIGTERM) } == 0 {
        return Ok(());
    }

    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::ESRCH) {
        return Ok(());
    }
    Err(err)
}

#[cfg(not(unix))]
fn signal_terminate(child: &mut Child) -> io::Result<()> {
    child.kill()
}

/// Terminates the child process: a graceful signal first, then a forced kill once
/// the grace period expires. The child is always reaped before returning, and a
/// child that has already exited is simply reaped, so calling this twice is harmless.
pub fn terminate(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Ok(Some(status)) = child.try_wait() {
        return Ok(status);
    }

    if let Err(e) = signal_terminate(child) {
        warn!(pid = child.id(), err = e.to_string(), "Unable to signal process.");
    }

    let deadline = Instant::now() + grace;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(e) => {
                warn!(pid = child.id(), err = e.to_string(), "Error polling process.");
                break;
            }
        }
        if Instant::now() >= deadline {
            let timeout = Error::ProcessTimeout {
                pid: child.id(),
                grace,
            };
            warn!(err = timeout.to_string(), "Escalating to a forced kill.");
            break;
        }
        thread::sleep(EXIT_POLL_INTERVAL.min(grace));
    }

    if let Err(e) = child.kill() {
        // The child may have exited between the last poll and the kill.
        debug!(pid = child.id(), err = e.to_string(), "Kill failed.");
    }
    child.wait()
}
