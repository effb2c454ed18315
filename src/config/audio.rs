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
use std::time::Duration;

use serde::Deserialize;

use super::{duration, error::ConfigError};

pub const DEFAULT_MIN_DURATION: Duration = Duration::from_millis(1500);
pub const DEFAULT_MAX_DURATION: Duration = Duration::from_secs(60);
pub const DEFAULT_GRACE: Duration = Duration::from_millis(200);
pub const DEFAULT_PROMPT_EVERY: usize = 7;
pub const DEFAULT_GAP: Duration = Duration::from_secs(2);

/// How clips are recorded.
#[derive(Deserialize, Clone)]
pub struct Capture {
    /// The capture command. `{path}` is replaced with the clip path, otherwise the path
    /// is appended.
    command: Vec<String>,
    /// Recordings shorter than this are thrown away.
    min_duration: Option<String>,
    /// Recordings are stopped after this.
    max_duration: Option<String>,
    /// The low-pass cutoff applied to accepted clips. Unset disables filtering.
    low_pass_hz: Option<f32>,
    /// How long the capture gets to exit before it's killed.
    grace: Option<String>,
}

impl Capture {
    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn min_duration(&self) -> Result<Duration, ConfigError> {
        duration("capture.min_duration", &self.min_duration, DEFAULT_MIN_DURATION)
    }

    pub fn max_duration(&self) -> Result<Duration, ConfigError> {
        duration("capture.max_duration", &self.max_duration, DEFAULT_MAX_DURATION)
    }

    pub fn low_pass_hz(&self) -> Option<f32> {
        self.low_pass_hz
    }

    pub fn grace(&self) -> Result<Duration, ConfigError> {
        duration("capture.grace", &self.grace, DEFAULT_GRACE)
    }
}

/// How clips are played.
#[derive(Deserialize, Clone)]
pub struct Playback {
    /// The playback command, templated like the capture command.
    command: Vec<String>,
    /// Every Nth loop turn plays the prompt. Zero disables it and one is rejected.
    prompt_every: Option<usize>,
    /// The pause between loop turns.
    gap: Option<String>,
    /// How long playback gets to exit before it's killed.
    grace: Option<String>,
}

impl Playback {
    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn prompt_every(&self) -> usize {
        self.prompt_every.unwrap_or(DEFAULT_PROMPT_EVERY)
    }

    pub fn gap(&self) -> Result<Duration, ConfigError> {
        duration("playback.gap", &self.gap, DEFAULT_GAP)
    }

    pub fn grace(&self) -> Result<Duration, ConfigError> {
        duration("playback.grace", &self.grace, DEFAULT_GRACE)
    }
}
