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
use std::sync::Arc;

use serde::Deserialize;

/// How cues are shown.
#[derive(Deserialize, Clone, Default)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Feedback {
    /// Cues are only logged.
    #[default]
    Log,
    /// Each cue runs a command.
    Command(CommandFeedback),
}

/// The command run for each cue.
#[derive(Deserialize, Clone)]
pub struct CommandFeedback {
    recording: Vec<String>,
    replay: Vec<String>,
    instruction: Vec<String>,
    off: Vec<String>,
}

impl Feedback {
    /// Creates the feedback sink.
    pub fn sink(&self) -> Arc<dyn crate::feedback::Feedback> {
        match self {
            Feedback::Log => Arc::new(crate::feedback::Log::new()),
            Feedback::Command(commands) => Arc::new(crate::feedback::Command::new(
                commands.recording.clone(),
                commands.replay.clone(),
                commands.instruction.clone(),
                commands.off.clone(),
            )),
        }
    }
}
