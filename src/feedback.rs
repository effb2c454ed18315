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
    error::Error,
    process::{Command as ProcessCommand, Stdio},
    thread,
};

use tracing::{debug, info, warn};

/// The cues an installation shows its visitors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cue {
    /// A recording is running.
    Recording,
    /// A fresh recording is being replayed for confirmation.
    Replay,
    /// The prompt is playing.
    Instruction,
    /// Nothing to show.
    Off,
}

pub type FeedbackResult = Result<(), Box<dyn Error + Send + Sync>>;

/// A visual or audible indicator driven by state transitions. Purely advisory.
pub trait Feedback: Send + Sync {
    fn recording_on(&self) -> FeedbackResult;
    fn replay_on(&self) -> FeedbackResult;
    fn instruction_on(&self) -> FeedbackResult;
    fn off(&self) -> FeedbackResult;
}

/// Shows the given cue. Failures are logged and never propagated.
pub fn show(feedback: &dyn Feedback, cue: Cue) {
    let result = match cue {
        Cue::Recording => feedback.recording_on(),
        Cue::Replay => feedback.replay_on(),
        Cue::Instruction => feedback.instruction_on(),
        Cue::Off => feedback.off(),
    };
    if let Err(e) = result {
        warn!(cue = format!("{:?}", cue), err = e.to_string(), "Unable to show cue.");
    }
}

/// Feedback that only logs.
pub struct Log {}

impl Log {
    pub fn new() -> Log {
        Log {}
    }
}

impl Feedback for Log {
    fn recording_on(&self) -> FeedbackResult {
        info!(cue = "recording", "Cue.");
        Ok(())
    }

    fn replay_on(&self) -> FeedbackResult {
        info!(cue = "replay", "Cue.");
        Ok(())
    }

    fn instruction_on(&self) -> FeedbackResult {
        info!(cue = "instruction", "Cue.");
        Ok(())
    }

    fn off(&self) -> FeedbackResult {
        info!(cue = "off", "Cue.");
        Ok(())
    }
}

/// Feedback that runs an external command per cue, for example a script driving an LED.
pub struct Command {
    recording: Vec<String>,
    replay: Vec<String>,
    instruction: Vec<String>,
    off: Vec<String>,
}

impl Command {
    pub fn new(
        recording: Vec<String>,
        replay: Vec<String>,
        instruction: Vec<String>,
        off: Vec<String>,
    ) -> Command {
        Command {
            recording,
            replay,
            instruction,
            off,
        }
    }

    /// Launches the command without waiting for it. A helper thread reaps it.
    fn run(tokens: &[String]) -> FeedbackResult {
        let Some((program, args)) = tokens.split_first() else {
            return Ok(());
        };

        let mut child = ProcessCommand::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;
        let program = program.clone();
        thread::Builder::new()
            .name("feedback reaper".to_string())
            .spawn(move || match child.wait() {
                Ok(status) if status.success() => {}
                Ok(status) => debug!(program, status = %status, "Feedback command failed."),
                Err(e) => debug!(program, err = e.to_string(), "Unable to reap feedback command."),
            })?;
        Ok(())
    }
}

impl Feedback for Command {
    fn recording_on(&self) -> FeedbackResult {
        Command::run(&self.recording)
    }

    fn replay_on(&self) -> FeedbackResult {
        Command::run(&self.replay)
    }

    fn instruction_on(&self) -> FeedbackResult {
        Command::run(&self.instruction)
    }

    fn off(&self) -> FeedbackResult {
        Command::run(&self.off)
    }
}

/// Feedback that remembers every cue it was asked to show.
#[cfg(test)]
pub mod mock {
    use parking_lot::Mutex;

    use super::{Cue, FeedbackResult};

    pub struct Feedback {
        cues: Mutex<Vec<Cue>>,
        fail: bool,
    }

    impl Feedback {
        pub fn new() -> Feedback {
            Feedback {
                cues: Mutex::new(Vec::new()),
                fail: false,
            }
        }

        /// A sink whose every cue fails after being recorded.
        pub fn failing() -> Feedback {
            Feedback {
                cues: Mutex::new(Vec::new()),
                fail: true,
            }
        }

        pub fn cues(&self) -> Vec<Cue> {
            self.cues.lock().clone()
        }

        pub fn last(&self) -> Option<Cue> {
            self.cues.lock().last().copied()
        }

        fn record(&self, cue: Cue) -> FeedbackResult {
            self.cues.lock().push(cue);
            if self.fail {
                return Err("indicator unplugged".into());
            }
            Ok(())
        }
    }

    impl super::Feedback for Feedback {
        fn recording_on(&self) -> FeedbackResult {
            self.record(Cue::Recording)
        }

        fn replay_on(&self) -> FeedbackResult {
            self.record(Cue::Replay)
        }

        fn instruction_on(&self) -> FeedbackResult {
            self.record(Cue::Instruction)
        }

        fn off(&self) -> FeedbackResult {
            self.record(Cue::Off)
        }
    }
}

#[cfg(test)]
mod test {
    use super::{mock, show, Command, Cue, Feedback};

    #[test]
    fn test_show_swallows_failures() {
        let feedback = mock::Feedback::failing();
        show(&feedback, Cue::Recording);
        show(&feedback, Cue::Off);
        assert_eq!(vec![Cue::Recording, Cue::Off], feedback.cues());
    }

    #[test]
    fn test_command_feedback() {
        let feedback = Command::new(
            vec![],
            vec!["definitely-not-an-led-binary".to_string()],
            vec![],
            vec![],
        );
        // An empty command shows nothing.
        assert!(feedback.recording_on().is_ok());
        // A missing command is an error for the caller to log.
        assert!(feedback.replay_on().is_err());
    }
}
