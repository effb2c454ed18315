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
use std::{io, path::PathBuf, time::Duration};

/// Errors raised by the installation's components. None of these halt the
/// gesture scheduler or the playback worker; each is handled by the component
/// that owns the failing resource.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The capture or playback command could not be launched.
    #[error("{command} is unavailable: {source}")]
    HardwareUnavailable {
        command: String,
        #[source]
        source: io::Error,
    },

    /// A recording was requested while one is already running.
    #[error("a recording is already active")]
    AlreadyActive,

    /// A recording stop was requested while nothing is recording.
    #[error("no recording is active")]
    NotRecording,

    /// The recording was shorter than the minimum duration and was discarded.
    #[error("clip rejected: recorded {elapsed:?}, minimum is {minimum:?}")]
    RejectedClip { elapsed: Duration, minimum: Duration },

    /// The capture process exited but left no clip behind.
    #[error("clip {0} is missing after capture")]
    MissingClip(PathBuf),

    /// A process ignored the graceful signal and had to be killed.
    #[error("process {pid} did not exit within {grace:?}")]
    ProcessTimeout { pid: u32, grace: Duration },

    /// A file could not be removed or rewritten.
    #[error("filesystem failure on {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A command template has no program to run.
    #[error("command template is empty")]
    EmptyCommand,
}

impl Error {
    /// Wraps an IO failure on the given path.
    pub fn filesystem(path: impl Into<PathBuf>, source: io::Error) -> Error {
        Error::Filesystem {
            path: path.into(),
            source,
        }
    }
}
