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

pub const DEFAULT_SHORT_PRESS: Duration = Duration::from_millis(150);
pub const DEFAULT_CONFIRM_HOLD: Duration = Duration::from_millis(2800);
pub const DEFAULT_CONFIRM_SHORT: Duration = Duration::from_millis(230);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Gesture timing thresholds.
#[derive(Deserialize, Clone, Default)]
pub struct Gestures {
    /// Presses released before this skip, longer ones record.
    short_press: Option<String>,
    /// Confirmation presses held this long keep the clip.
    confirm_hold: Option<String>,
    /// Confirmation presses released within this delete the clip.
    confirm_short: Option<String>,
    /// How often the buttons are sampled.
    poll_interval: Option<String>,
}

impl Gestures {
    pub fn short_press(&self) -> Result<Duration, ConfigError> {
        duration("gestures.short_press", &self.short_press, DEFAULT_SHORT_PRESS)
    }

    pub fn confirm_hold(&self) -> Result<Duration, ConfigError> {
        duration("gestures.confirm_hold", &self.confirm_hold, DEFAULT_CONFIRM_HOLD)
    }

    pub fn confirm_short(&self) -> Result<Duration, ConfigError> {
        duration("gestures.confirm_short", &self.confirm_short, DEFAULT_CONFIRM_SHORT)
    }

    pub fn poll_interval(&self) -> Result<Duration, ConfigError> {
        duration("gestures.poll_interval", &self.poll_interval, DEFAULT_POLL_INTERVAL)
    }
}
