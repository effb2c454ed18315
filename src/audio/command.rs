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
    fmt,
    io::Read,
    path::Path,
    process::{Child, Command, Stdio},
    time::Duration,
};

use tracing::{debug, info, warn};

use crate::{error::Error, process};

/// The placeholder replaced with the clip path in a command template.
const PATH_PLACEHOLDER: &str = "{path}";

/// An external command template such as `arecord -f cd -t wav`. The clip path replaces
/// any `{path}` token, or is appended when the template has none.
#[derive(Clone, Debug)]
pub struct Template {
    program: String,
    args: Vec<String>,
}

impl Template {
    /// Creates a template from its tokens. The first token is the program.
    pub fn new(tokens: &[String]) -> Result<Template, Error> {
        match tokens.split_first() {
            Some((program, args)) if !program.trim().is_empty() => Ok(Template {
                program: program.clone(),
                args: args.to_vec(),
            }),
            _ => Err(Error::EmptyCommand),
        }
    }

    /// The program this template runs.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Returns the arguments for the given clip path.
    pub fn args(&self, path: &Path) -> Vec<String> {
        let path = path.to_string_lossy();
        let mut substituted = false;
        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                if arg.contains(PATH_PLACEHOLDER) {
                    substituted = true;
                    arg.replace(PATH_PLACEHOLDER, &path)
                } else {
                    arg.clone()
                }
            })
            .collect();
        if !substituted {
            args.push(path.into_owned());
        }
        args
    }

    /// Spawns the template for the given path.
    fn spawn(&self, path: &Path, stderr: Stdio) -> Result<Child, Error> {
        Command::new(&self.program)
            .args(self.args(path))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr)
            .spawn()
            .map_err(|source| Error::HardwareUnavailable {
                command: self.program.clone(),
                source,
            })
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in self.args.iter() {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Captures audio by running an external recorder such as arecord.
pub struct Capture {
    template: Template,
    grace: Duration,
}

impl Capture {
    pub fn new(template: Template, grace: Duration) -> Capture {
        Capture { template, grace }
    }
}

impl super::Capture for Capture {
    fn start(&self, target: &Path) -> Result<Box<dyn super::Capturing>, Error> {
        let child = self.template.spawn(target, Stdio::piped())?;
        info!(
            pid = child.id(),
            command = self.template.to_string(),
            "Capture started."
        );
        Ok(Box::new(CaptureProcess {
            child: Some(child),
            grace: self.grace,
        }))
    }
}

impl fmt::Display for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.template)
    }
}

/// A running capture process.
struct CaptureProcess {
    child: Option<Child>,
    grace: Duration,
}

impl super::Capturing for CaptureProcess {
    fn stop(mut self: Box<Self>) -> super::CaptureExit {
        let mut child = match self.child.take() {
            Some(child) => child,
            None => return super::CaptureExit::default(),
        };

        let code = match process::terminate(&mut child, self.grace) {
            Ok(status) => status.code(),
            Err(e) => {
                warn!(err = e.to_string(), "Error reaping capture process.");
                None
            }
        };

        let mut stderr = String::new();
        if let Some(mut pipe) = child.stderr.take() {
            if let Err(e) = pipe.read_to_string(&mut stderr) {
                debug!(err = e.to_string(), "Unable to read capture stderr.");
            }
        }

        super::CaptureExit { code, stderr }
    }
}

impl Drop for CaptureProcess {
    fn drop(&mut self) {
        if let Some(mut child) = self.child.take() {
            if let Err(e) = process::terminate(&mut child, self.grace) {
                warn!(err = e.to_string(), "Error reaping abandoned capture process.");
            }
        }
    }
}

/// Plays clips by running an external player such as aplay.
pub struct Playback {
    template: Template,
    grace: Duration,
}

impl Playback {
    pub fn new(template: Template, grace: Duration) -> Playback {
        Playback { template, grace }
    }
}

impl super::Playback for Playback {
    fn start(&self, path: &Path) -> Result<Box<dyn super::Playing>, Error> {
        let child = self.template.spawn(path, Stdio::null())?;
        debug!(pid = child.id(), path = %path.display(), "Playback started.");
        Ok(Box::new(PlaybackProcess {
            child,
            grace: self.grace,
            finished: false,
        }))
    }
}

impl fmt::Display for Playback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.template)
    }
}

/// A running playback process.
struct PlaybackProcess {
    child: Child,
    grace: Duration,
    finished: bool,
}

impl super::Playing for PlaybackProcess {
    fn is_running(&mut self) -> bool {
        if self.finished {
            return false;
        }

        match self.child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                if !status.success() {
                    warn!(pid = self.child.id(), status = %status, "Playback exited abnormally.");
                }
                self.finished = true;
                false
            }
            Err(e) => {
                warn!(err = e.to_string(), "Error polling playback process.");
                self.terminate();
                false
            }
        }
    }

    fn terminate(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        if let Err(e) = process::terminate(&mut self.child, self.grace) {
            warn!(err = e.to_string(), "Error reaping playback process.");
        }
    }
}

impl Drop for PlaybackProcess {
    fn drop(&mut self) {
        super::Playing::terminate(self);
    }
}
