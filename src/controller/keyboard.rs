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
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use duration_string::DurationString;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::{Button, Event};

const DOWN: &str = "down";
const UP: &str = "up";
const PRESS: &str = "press";
const RESET: &str = "reset";

/// The main button as seen by the keyboard.
struct Key {
    pressed: AtomicBool,
}

impl Button for Key {
    fn is_pressed(&self) -> bool {
        self.pressed.load(Ordering::Acquire)
    }
}

/// A driver that simulates the buttons with typed commands.
pub struct Driver {
    key: Arc<Key>,
}

impl Driver {
    pub fn new() -> Driver {
        Driver {
            key: Arc::new(Key {
                pressed: AtomicBool::new(false),
            }),
        }
    }

    /// Reads one command and acts on it. Returns false once the input is exhausted.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        key: &Arc<Key>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(
            writer,
            "Command ({}, {}, {} <duration>, {}): ",
            DOWN, UP, PRESS, RESET,
        )?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            return Ok(false);
        }

        let input = input.trim().to_lowercase();
        let mut words = input.split_whitespace();
        let result = match (words.next(), words.next()) {
            (Some(DOWN), None) => Self::press(events_tx, key),
            (Some(UP), None) => {
                key.pressed.store(false, Ordering::Release);
                Ok(())
            }
            (Some(PRESS), Some(held)) => match DurationString::from_string(held.to_string()) {
                Ok(held) => {
                    let held: Duration = held.into();
                    let result = Self::press(events_tx, key);
                    let key = key.clone();
                    thread::spawn(move || {
                        thread::sleep(held);
                        key.pressed.store(false, Ordering::Release);
                    });
                    result
                }
                Err(e) => {
                    warn!(input = input, err = e.to_string(), "Unrecognized duration");
                    Ok(())
                }
            },
            (Some(RESET), None) => events_tx.blocking_send(Event::ResetPressed),
            _ => {
                warn!(input = input, "Unrecognized input");
                Ok(())
            }
        };
        result.map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(true)
    }

    /// Presses the key. Pressing a key that's already down does nothing.
    fn press(
        events_tx: &Sender<Event>,
        key: &Key,
    ) -> Result<(), tokio::sync::mpsc::error::SendError<Event>> {
        if key.pressed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        events_tx.blocking_send(Event::MainPressed)
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let key = self.key.clone();
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, &key, io::stdin().lock(), io::stdout())? {}
            info!("Keyboard input closed.");
            Ok(())
        })
    }

    fn main_button(&self) -> Arc<dyn Button> {
        self.key.clone()
    }
}

#[cfg(test)]
mod test {
    use std::{
        io::{self, BufReader},
        sync::Arc,
    };

    use tokio::sync::mpsc;

    use crate::{
        controller::{Button, Driver as _, Event},
        testutil::eventually,
    };

    use super::{Driver, DOWN, RESET, UP};

    fn get_event(driver: &Driver, input: &str) -> Result<Option<Event>, io::Error> {
        let (sender, mut receiver) = mpsc::channel::<Event>(1);

        let reader = BufReader::new(input.as_bytes());
        let writer: Vec<u8> = Vec::new();
        assert!(Driver::monitor_io(&sender, &driver.key, reader, writer)?);

        // Force the sender to close.
        drop(sender);
        Ok(receiver.blocking_recv())
    }

    #[test]
    fn test_keyboard_events() -> Result<(), io::Error> {
        let driver = Driver::new();
        let button: Arc<dyn Button> = driver.main_button();

        assert_eq!(Some(Event::MainPressed), get_event(&driver, DOWN)?);
        assert!(button.is_pressed());
        // Already down.
        assert_eq!(None, get_event(&driver, DOWN)?);
        assert_eq!(None, get_event(&driver, UP)?);
        assert!(!button.is_pressed());
        assert_eq!(Some(Event::ResetPressed), get_event(&driver, RESET)?);
        assert_eq!(None, get_event(&driver, "unrecognized")?);
        assert_eq!(None, get_event(&driver, "press forever")?);
        Ok(())
    }

    #[test]
    fn test_keyboard_timed_press() -> Result<(), io::Error> {
        let driver = Driver::new();
        let button = driver.main_button();

        assert_eq!(Some(Event::MainPressed), get_event(&driver, "press 50ms")?);
        assert!(button.is_pressed());
        eventually(|| !button.is_pressed(), "Key was never released");
        Ok(())
    }

    #[test]
    fn test_keyboard_end_of_input() -> Result<(), io::Error> {
        let (sender, _receiver) = mpsc::channel::<Event>(1);
        let driver = Driver::new();
        let reader = BufReader::new("".as_bytes());
        assert!(!Driver::monitor_io(&sender, &driver.key, reader, Vec::new())?);
        Ok(())
    }
}
