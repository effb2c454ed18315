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
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use hound::{SampleFormat, WavSpec, WavWriter};
use parking_lot::Mutex;
use tracing::info;

use crate::error::Error;

/// How long a mock clip plays unless told otherwise.
const DEFAULT_CLIP_DURATION: Duration = Duration::from_secs(1);

/// The sample rate of the clips written by the mock capture.
const MOCK_SAMPLE_RATE: u32 = 8000;

/// A mock capture device. Writes a short tone instead of recording anything.
#[derive(Clone)]
pub struct Capture {
    name: String,
    active: Arc<AtomicUsize>,
    captured: Arc<Mutex<Vec<PathBuf>>>,
}

impl Capture {
    /// Gets the given mock capture device.
    pub fn get(name: &str) -> Capture {
        Capture {
            name: name.to_string(),
            active: Arc::new(AtomicUsize::new(0)),
            captured: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Returns the number of captures that have been started but not stopped.
    #[cfg(test)]
    pub fn active(&self) -> usize {
        self.active.load(Ordering::Relaxed)
    }

    /// Returns every path a capture was started for.
    #[cfg(test)]
    pub fn captured(&self) -> Vec<PathBuf> {
        self.captured.lock().clone()
    }

    fn write_tone(target: &Path) -> Result<(), hound::Error> {
        let mut writer = WavWriter::create(
            target,
            WavSpec {
                channels: 1,
                sample_rate: MOCK_SAMPLE_RATE,
                bits_per_sample: 16,
                sample_format: SampleFormat::Int,
            },
        )?;
        for i in 0..MOCK_SAMPLE_RATE / 10 {
            let sample = if (i / 8) % 2 == 0 { 8000 } else { -8000 };
            writer.write_sample(sample as i16)?;
        }
        writer.finalize()
    }
}

impl super::Capture for Capture {
    fn start(&self, target: &Path) -> Result<Box<dyn super::Capturing>, Error> {
        Capture::write_tone(target).map_err(|e| {
            Error::filesystem(
                target,
                match e {
                    hound::Error::IoError(e) => e,
                    e => std::io::Error::other(e.to_string()),
                },
            )
        })?;

        info!(device = self.name, target = %target.display(), "Capturing (mock).");
        self.active.fetch_add(1, Ordering::Relaxed);
        self.captured.lock().push(target.to_path_buf());
        Ok(Box::new(Capturing {
            active: self.active.clone(),
            stopped: false,
        }))
    }
}

impl fmt::Display for Capture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

struct Capturing {
    active: Arc<AtomicUsize>,
    stopped: bool,
}

impl super::Capturing for Capturing {
    fn stop(mut self: Box<Self>) -> super::CaptureExit {
        self.stopped = true;
        self.active.fetch_sub(1, Ordering::Relaxed);
        super::CaptureExit {
            code: Some(0),
            stderr: String::new(),
        }
    }
}

impl Drop for Capturing {
    fn drop(&mut self) {
        if !self.stopped {
            self.active.fetch_sub(1, Ordering::Relaxed);
        }
    }
}

/// A mock playback device. Doesn't play anything, each clip simply "plays" for a fixed duration.
#[derive(Clone)]
pub struct Playback {
    name: String,
    clip_duration: Duration,
    now_playing: Arc<Mutex<Option<PathBuf>>>,
    played: Arc<Mutex<Vec<PathBuf>>>,
    terminations: Arc<AtomicUsize>,
}

impl Playback {
    /// Gets the given mock playback device.
    pub fn get(name: &str) -> Playback {
        Playback::with_clip_duration(name, DEFAULT_CLIP_DURATION)
    }

    /// Gets a mock playback device whose clips last for the given duration.
    pub fn with_clip_duration(name: &str, clip_duration: Duration) -> Playback {
        Playback {
            name: name.to_string(),
            clip_duration,
            now_playing: Arc::new(Mutex::new(None)),
            played: Arc::new(Mutex::new(Vec::new())),
            terminations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Returns the clip that is currently playing.
    #[cfg(test)]
    pub fn now_playing(&self) -> Option<PathBuf> {
        self.now_playing.lock().clone()
    }

    /// Returns every clip that has been started, in order.
    #[cfg(test)]
    pub fn played(&self) -> Vec<PathBuf> {
        self.played.lock().clone()
    }

    /// Returns how many playbacks were terminated before they finished.
    #[cfg(test)]
    pub fn terminations(&self) -> usize {
        self.terminations.load(Ordering::Relaxed)
    }
}

impl super::Playback for Playback {
    fn start(&self, path: &Path) -> Result<Box<dyn super::Playing>, Error> {
        info!(device = self.name, path = %path.display(), "Playing clip (mock).");
        *self.now_playing.lock() = Some(path.to_path_buf());
        self.played.lock().push(path.to_path_buf());
        Ok(Box::new(Playing {
            path: path.to_path_buf(),
            started: Instant::now(),
            duration: self.clip_duration,
            finished: false,
            now_playing: self.now_playing.clone(),
            terminations: self.terminations.clone(),
        }))
    }
}

impl fmt::Display for Playback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}

struct Playing {
    path: PathBuf,
    started: Instant,
    duration: Duration,
    finished: bool,
    now_playing: Arc<Mutex<Option<PathBuf>>>,
    terminations: Arc<AtomicUsize>,
}

impl Playing {
    fn finish(&mut self) {
        self.finished = true;
        let mut now_playing = self.now_playing.lock();
        if now_playing.as_deref() == Some(self.path.as_path()) {
            *now_playing = None;
        }
    }
}

impl super::Playing for Playing {
    fn is_running(&mut self) -> bool {
        if self.finished {
            return false;
        }
        if self.started.elapsed() >= self.duration {
            self.finish();
            return false;
        }
        true
    }

    fn terminate(&mut self) {
        if self.finished {
            return;
        }
        self.terminations.fetch_add(1, Ordering::Relaxed);
        self.finish();
    }
}
