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
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::{duration, error::ConfigError};

/// Buttons are usually wired to ground with a pull-up.
pub const DEFAULT_ACTIVE_LOW: bool = true;
pub const DEFAULT_BOUNCE: Duration = Duration::from_millis(100);

/// Selects how the buttons are read.
#[derive(Deserialize, Clone)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Buttons {
    /// Typed commands on stdin.
    Keyboard,
    /// GPIO lines through sysfs.
    Sysfs(SysfsButtons),
}

/// Two buttons wired to GPIO lines.
#[derive(Deserialize, Clone)]
pub struct SysfsButtons {
    /// The record/skip/confirm button.
    main: Pin,
    /// The reset button.
    reset: Pin,
    /// Whether a low level means pressed.
    active_low: Option<bool>,
    /// Level changes closer together than this are contact bounce.
    bounce: Option<String>,
}

/// A GPIO line, either by number or by the path of its value file. Relative paths are
/// relative to the config file.
#[derive(Deserialize, Clone)]
pub struct Pin {
    gpio: Option<u32>,
    path: Option<PathBuf>,
}

impl SysfsButtons {
    /// Creates the driver for these buttons.
    pub fn driver(
        &self,
        base: &Path,
        poll_interval: Duration,
    ) -> Result<crate::controller::sysfs::Driver, Box<dyn std::error::Error>> {
        let active_low = self.active_low();
        Ok(crate::controller::sysfs::Driver::new(
            self.main.pin(base, active_low)?,
            self.reset.pin(base, active_low)?,
            poll_interval,
            self.bounce()?,
        ))
    }

    pub fn active_low(&self) -> bool {
        self.active_low.unwrap_or(DEFAULT_ACTIVE_LOW)
    }

    pub fn bounce(&self) -> Result<Duration, ConfigError> {
        duration("bounce", &self.bounce, DEFAULT_BOUNCE)
    }
}

impl Pin {
    fn pin(
        &self,
        base: &Path,
        active_low: bool,
    ) -> Result<crate::controller::sysfs::Pin, Box<dyn std::error::Error>> {
        match (self.gpio, self.path.as_ref()) {
            (Some(line), None) => Ok(crate::controller::sysfs::Pin::gpio(line, active_low)?),
            (None, Some(path)) => Ok(crate::controller::sysfs::Pin::new(
                base.join(path),
                active_low,
            )),
            _ => Err(ConfigError::Invalid(
                "a pin needs exactly one of gpio or path".to_string(),
            )
            .into()),
        }
    }
}
