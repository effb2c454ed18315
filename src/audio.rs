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
use std::{fmt, path::Path, sync::Arc, time::Duration};

use crate::error::Error;

pub mod command;
pub mod mock;

/// Launches audio captures into clip files.
pub trait Capture: fmt::Display + Send + Sync {
    /// Starts capturing into the given path. The returned handle owns the capture
    /// until it is stopped.
    fn start(&self, target: &Path) -> Result<Box<dyn Capturing>, Error>;
}

/// A capture that is currently running.
pub trait Capturing: Send {
    /// Stops the capture and reaps it, returning how it exited.
    fn stop(self: Box<Self>) -> CaptureExit;
}

/// The result of a stopped capture.
#[derive(Debug, Default)]
pub struct CaptureExit {
    /// The exit code, if the capture exited on its own terms.
    pub code: Option<i32>,
    /// Anything the capture wrote to stderr.
    pub stderr: String,
}

/// Plays clip files asynchronously.
pub trait Playback: fmt::Display + Send + Sync {
    /// Starts playing the given path and returns immediately.
    fn start(&self, path: &Path) -> Result<Box<dyn Playing>, Error>;
}

/// A playback that may still be running.
pub trait Playing: Send {
    /// Returns true until the playback has finished.
    fn is_running(&mut self) -> bool;

    /// Stops the playback. Terminating a finished playback does nothing.
    fn terminate(&mut self);
}

/// Gets the capture device described by the given command template. A template whose
/// program starts with "mock" gets the mock device.
pub fn get_capture(template: &[String], grace: Duration) -> Result<Arc<dyn Capture>, Error> {
    let template = command::Template::new(template)?;
    if template.program().starts_with("mock") {
        return Ok(Arc::new(mock::Capture::get(template.program())));
    }

    Ok(Arc::new(command::Capture::new(template, grace)))
}

/// Gets the playback device described by the given command template. A template whose
/// program starts with "mock" gets the mock device.
pub fn get_playback(template: &[String], grace: Duration) -> Result<Arc<dyn Playback>, Error> {
    let template = command::Template::new(template)?;
    if template.program().starts_with("mock") {
        return Ok(Arc::new(mock::Playback::get(template.program())));
    }

    Ok(Arc::new(command::Playback::new(template, grace)))
}
