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
    fs, io,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{debug, info, span, Level};

use super::{Button, Event};

/// Where the kernel exposes exported GPIO lines.
const GPIO_ROOT: &str = "/sys/class/gpio";

/// A GPIO line read through its sysfs value file.
pub struct Pin {
    path: PathBuf,
    active_low: bool,
}

impl Pin {
    /// A pin read from the given value file.
    pub fn new(path: PathBuf, active_low: bool) -> Pin {
        Pin { path, active_low }
    }

    /// The given GPIO line, exporting it as an input if it isn't exported yet.
    pub fn gpio(line: u32, active_low: bool) -> Result<Pin, io::Error> {
        let root = Path::new(GPIO_ROOT);
        let dir = root.join(format!("gpio{}", line));
        if !dir.exists() {
            fs::write(root.join("export"), line.to_string())?;
            fs::write(dir.join("direction"), "in")?;
        }
        Ok(Pin::new(dir.join("value"), active_low))
    }

    /// Reads the level, accounting for active-low wiring.
    pub fn read(&self) -> Result<bool, io::Error> {
        let high = match fs::read_to_string(&self.path)?.trim() {
            "1" => true,
            "0" => false,
            other => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("unexpected pin value {:?}", other),
                ))
            }
        };
        Ok(high != self.active_low)
    }
}

impl Button for Pin {
    fn is_pressed(&self) -> bool {
        match self.read() {
            Ok(pressed) => pressed,
            Err(e) => {
                debug!(path = %self.path.display(), err = e.to_string(), "Unable to read pin.");
                false
            }
        }
    }
}

/// A button level published by the polling driver after debouncing.
#[derive(Default)]
pub struct Debounced {
    pressed: AtomicBool,
}

impl Button for Debounced {
    fn is_pressed(&self) -> bool {
        self.pressed.load(Ordering::Acquire)
    }
}

/// Debounces sampled levels. A new level only counts once every sample has agreed on it
/// for the bounce window, so a single stray read never starts or ends a press.
struct Edge {
    pressed: bool,
    changing_since: Option<Instant>,
    bounce: Duration,
    level: Arc<Debounced>,
}

impl Edge {
    fn new(pressed: bool, bounce: Duration, level: Arc<Debounced>) -> Edge {
        level.pressed.store(pressed, Ordering::Release);
        Edge {
            pressed,
            changing_since: None,
            bounce,
            level,
        }
    }

    /// Takes a new sample. Returns true on a press that isn't bounce.
    fn update(&mut self, pressed: bool, now: Instant) -> bool {
        if pressed == self.pressed {
            self.changing_since = None;
            return false;
        }
        let since = *self.changing_since.get_or_insert(now);
        if now.duration_since(since) < self.bounce {
            return false;
        }
        self.pressed = pressed;
        self.changing_since = None;
        self.level.pressed.store(pressed, Ordering::Release);
        pressed
    }
}

/// A driver that polls two buttons wired to GPIO lines.
pub struct Driver {
    main: Arc<Pin>,
    reset: Arc<Pin>,
    /// The main button's level as last debounced by the polling loop.
    main_level: Arc<Debounced>,
    poll_interval: Duration,
    bounce: Duration,
}

impl Driver {
    pub fn new(main: Pin, reset: Pin, poll_interval: Duration, bounce: Duration) -> Driver {
        Driver {
            main: Arc::new(main),
            reset: Arc::new(reset),
            main_level: Arc::new(Debounced::default()),
            poll_interval,
            bounce,
        }
    }
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        let main = self.main.clone();
        let reset = self.reset.clone();
        let main_level = self.main_level.clone();
        let poll_interval = self.poll_interval;
        let bounce = self.bounce;

        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "sysfs driver");
            let _enter = span.enter();

            info!(
                main = %main.path.display(),
                reset = %reset.path.display(),
                "Sysfs driver started."
            );

            let mut main_edge = Edge::new(main.is_pressed(), bounce, main_level);
            let mut reset_edge =
                Edge::new(reset.is_pressed(), bounce, Arc::new(Debounced::default()));
            let ticker = crossbeam_channel::tick(poll_interval);
            for now in ticker.iter() {
                if events_tx.is_closed() {
                    break;
                }
                if main_edge.update(main.is_pressed(), now) {
                    events_tx
                        .blocking_send(Event::MainPressed)
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                }
                if reset_edge.update(reset.is_pressed(), now) {
                    events_tx
                        .blocking_send(Event::ResetPressed)
                        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                }
            }

            info!("Sysfs driver stopped.");
            Ok(())
        })
    }

    fn main_button(&self) -> Arc<dyn Button> {
        self.main_level.clone()
    }
}

#[cfg(test)]
mod test {
    use std::{
        fs,
        path::Path,
        sync::Arc,
        time::{Duration, Instant},
    };

    use tokio::{sync::mpsc, time::timeout};

    use crate::controller::{Button, Driver as _, Event};

    use super::{Debounced, Driver, Edge, Pin};

    #[test]
    fn test_pin_levels() -> Result<(), std::io::Error> {
        let dir = tempfile::tempdir()?;
        let value = dir.path().join("value");

        let pin = Pin::new(value.clone(), false);
        let inverted = Pin::new(value.clone(), true);

        fs::write(&value, "1\n")?;
        assert!(pin.read()?);
        assert!(!inverted.read()?);

        fs::write(&value, "0\n")?;
        assert!(!pin.read()?);
        assert!(inverted.is_pressed());

        fs::write(&value, "")?;
        assert!(pin.read().is_err());
        assert!(!inverted.is_pressed());

        fs::remove_file(&value)?;
        assert!(pin.read().is_err());
        assert!(!pin.is_pressed());
        Ok(())
    }

    #[test]
    fn test_edge_debounce() {
        let bounce = Duration::from_millis(100);
        let start = Instant::now();
        let at = |ms| start + Duration::from_millis(ms);
        let level = Arc::new(Debounced::default());
        let mut edge = Edge::new(false, bounce, level.clone());

        assert!(!edge.update(false, at(0)));
        // Contact bounce on the way down.
        assert!(!edge.update(true, at(10)));
        assert!(!edge.update(false, at(20)));
        assert!(!edge.update(true, at(30)));
        assert!(!edge.update(true, at(80)));
        assert!(!level.is_pressed());
        // Held down for the whole window.
        assert!(edge.update(true, at(130)));
        assert!(level.is_pressed());
        assert!(!edge.update(true, at(140)));

        // A stray read while held doesn't release the button.
        assert!(!edge.update(false, at(500)));
        assert!(!edge.update(true, at(510)));
        assert!(!edge.update(false, at(600)));
        assert!(!edge.update(true, at(690)));
        assert!(level.is_pressed());

        // A real release.
        assert!(!edge.update(false, at(800)));
        assert!(!edge.update(false, at(900)));
        assert!(!level.is_pressed());
    }

    #[test]
    fn test_held_at_startup_is_not_a_press() {
        let level = Arc::new(Debounced::default());
        let mut edge = Edge::new(true, Duration::ZERO, level.clone());
        assert!(level.is_pressed());
        assert!(!edge.update(true, Instant::now()));
    }

    /// Presses the active-low button at `path` until the driver reports `expected`. The
    /// driver may take its first reading after the first press, in which case it only
    /// sees the button held, so the press is repeated.
    async fn press_until_reported(
        path: &Path,
        events_rx: &mut mpsc::Receiver<Event>,
        expected: Event,
    ) -> Result<(), Box<dyn std::error::Error>> {
        for _ in 0..50 {
            fs::write(path, "1")?;
            tokio::time::sleep(Duration::from_millis(10)).await;
            fs::write(path, "0")?;
            match timeout(Duration::from_millis(100), events_rx.recv()).await {
                Ok(event) => {
                    assert_eq!(Some(expected), event);
                    return Ok(());
                }
                Err(_) => continue,
            }
        }
        Err(format!("{:?} was never reported", expected).into())
    }

    #[tokio::test]
    async fn test_driver_reports_presses() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let main = dir.path().join("main");
        let reset = dir.path().join("reset");
        fs::write(&main, "1")?;
        fs::write(&reset, "1")?;

        let driver = Driver::new(
            Pin::new(main.clone(), true),
            Pin::new(reset.clone(), true),
            Duration::from_millis(2),
            Duration::from_millis(6),
        );
        let (events_tx, mut events_rx) = mpsc::channel(4);
        let handle = driver.monitor_events(events_tx);

        press_until_reported(&main, &mut events_rx, Event::MainPressed).await?;
        assert!(driver.main_button().is_pressed());

        press_until_reported(&reset, &mut events_rx, Event::ResetPressed).await?;

        fs::write(&main, "1")?;
        timeout(Duration::from_secs(5), async {
            while driver.main_button().is_pressed() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await?;

        drop(events_rx);
        assert!(timeout(Duration::from_secs(5), handle).await??.is_ok());
        Ok(())
    }
}
