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
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::controller::Button;

/// A button that stays pressed for a set duration on the tokio clock, so paused-time
/// tests can hold it for seconds without waiting.
pub struct HeldButton {
    until: Mutex<Option<Instant>>,
}

impl HeldButton {
    pub fn new() -> HeldButton {
        HeldButton {
            until: Mutex::new(None),
        }
    }

    /// Presses the button now and releases it after the given duration.
    pub fn press_for(&self, held: Duration) {
        *self.until.lock() = Some(Instant::now() + held);
    }
}

impl Button for HeldButton {
    fn is_pressed(&self) -> bool {
        self.until
            .lock()
            .is_some_and(|until| Instant::now() < until)
    }
}

/// A button pressed and released by hand.
pub struct TestButton {
    pressed: AtomicBool,
}

impl TestButton {
    pub fn new() -> TestButton {
        TestButton {
            pressed: AtomicBool::new(false),
        }
    }

    pub fn set(&self, pressed: bool) {
        self.pressed.store(pressed, Ordering::Relaxed);
    }
}

impl Button for TestButton {
    fn is_pressed(&self) -> bool {
        self.pressed.load(Ordering::Relaxed)
    }
}
