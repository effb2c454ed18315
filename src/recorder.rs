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
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Local};
use parking_lot::Mutex;
use tracing::{debug, error, info, span, warn, Level, Span};

use crate::{
    audio::{self, Capturing},
    clips::Clip,
    error::Error,
    filter,
    util::duration_seconds_millis,
};

/// The capture that is currently running.
struct Active {
    capturing: Box<dyn Capturing>,
    target: PathBuf,
    created_at: DateTime<Local>,
}

/// Owns the lifecycle of one capture at a time: starting it, stopping it, and deciding
/// whether the result is long enough to keep.
pub struct RecordingSession {
    /// Where captures are written. Accepted clips stay here until they're confirmed.
    dir: PathBuf,
    /// The capture device.
    capture: Arc<dyn audio::Capture>,
    /// Captures shorter than this are thrown away.
    min_duration: Duration,
    /// The low-pass cutoff applied to accepted clips, if any.
    low_pass_hz: Option<f32>,
    /// The running capture. Held for the whole of start and stop so that only one
    /// capture process is ever outstanding.
    active: Mutex<Option<Active>>,
    /// The logging span.
    span: Span,
}

impl RecordingSession {
    /// Creates a new recording session.
    pub fn new(
        dir: &Path,
        capture: Arc<dyn audio::Capture>,
        min_duration: Duration,
        low_pass_hz: Option<f32>,
    ) -> RecordingSession {
        RecordingSession {
            dir: dir.to_path_buf(),
            capture,
            min_duration,
            low_pass_hz,
            active: Mutex::new(None),
            span: span!(Level::INFO, "recorder"),
        }
    }

    /// Returns true while a capture is running.
    #[cfg(test)]
    pub fn is_active(&self) -> bool {
        self.active.lock().is_some()
    }

    /// Starts capturing into a fresh timestamped file and returns its path. Does nothing
    /// if a capture is already running.
    pub fn start(&self) -> Result<PathBuf, Error> {
        let _enter = self.span.enter();

        let mut active = self.active.lock();
        if active.is_some() {
            info!("Already recording.");
            return Err(Error::AlreadyActive);
        }

        let created_at = Local::now();
        let target = Clip::path_for(&self.dir, &created_at);
        let capturing = match self.capture.start(&target) {
            Ok(capturing) => capturing,
            Err(e) => {
                error!(
                    device = self.capture.to_string(),
                    err = e.to_string(),
                    "Unable to start recording."
                );
                Self::remove_partial(&target);
                return Err(e);
            }
        };

        info!(target = %target.display(), "Recording started.");
        *active = Some(Active {
            capturing,
            target: target.clone(),
            created_at,
        });
        Ok(target)
    }

    /// Stops the running capture. `held` is how long the visitor held the button. A
    /// recording held for less than the minimum duration is deleted and rejected;
    /// otherwise it's filtered and returned as a clip awaiting confirmation. Stopping
    /// reaps the capture process and rewrites the file, so this blocks.
    pub fn stop(&self, held: Duration) -> Result<Arc<Clip>, Error> {
        let _enter = self.span.enter();

        let mut active = self.active.lock();
        let Active {
            capturing,
            target,
            created_at,
        } = match active.take() {
            Some(recording) => recording,
            None => {
                info!("Not currently recording.");
                return Err(Error::NotRecording);
            }
        };

        let exit = capturing.stop();
        info!(
            target = %target.display(),
            held = duration_seconds_millis(held),
            code = exit.code,
            "Recording stopped."
        );
        if !exit.stderr.trim().is_empty() {
            debug!(stderr = exit.stderr.trim(), "Capture output.");
        }

        if held < self.min_duration {
            Self::remove_partial(&target);
            let rejected = Error::RejectedClip {
                elapsed: held,
                minimum: self.min_duration,
            };
            info!(err = rejected.to_string(), "Discarded recording.");
            return Err(rejected);
        }

        if !target.is_file() {
            return Err(Error::MissingClip(target));
        }

        if let Some(cutoff_hz) = self.low_pass_hz {
            if let Err(e) = filter::low_pass_in_place(&target, cutoff_hz) {
                warn!(err = e.to_string(), "Unable to filter recording, keeping it as is.");
            }
        }

        Ok(Arc::new(Clip::new(target, created_at)))
    }

    /// Stops any running capture and deletes whatever it produced.
    pub fn abort(&self) {
        let _enter = self.span.enter();

        if let Some(active) = self.active.lock().take() {
            info!(target = %active.target.display(), "Aborting recording.");
            active.capturing.stop();
            Self::remove_partial(&active.target);
        }
    }

    /// Deletes an accepted clip that was never confirmed.
    pub fn discard(&self, clip: &Clip) -> Result<(), Error> {
        let _enter = self.span.enter();

        match fs::remove_file(clip.path()) {
            Ok(()) => {
                info!(clip = clip.name(), "Discarded clip.");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::filesystem(clip.path(), e)),
        }
    }

    fn remove_partial(target: &Path) {
        match fs::remove_file(target) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                target = %target.display(),
                err = e.to_string(),
                "Unable to remove partial recording."
            ),
        }
    }
}

#[cfg(test)]
mod test {
    use std::{path::Path, sync::Arc, time::Duration};

    use crate::{audio::mock, error::Error};

    use super::RecordingSession;

    const MIN_DURATION: Duration = Duration::from_millis(1500);

    fn session(dir: &Path) -> (RecordingSession, mock::Capture) {
        let capture = mock::Capture::get("mock-capture");
        let session =
            RecordingSession::new(dir, Arc::new(capture.clone()), MIN_DURATION, Some(3400.0));
        (session, capture)
    }

    #[test]
    fn test_accepts_long_recording() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (session, capture) = session(dir.path());

        let target = session.start().expect("start");
        assert!(session.is_active());
        assert_eq!(1, capture.active());

        let clip = session.stop(Duration::from_secs(2)).expect("accepted");
        assert_eq!(target, clip.path());
        assert!(clip.path().is_file());
        assert!(!session.is_active());
        assert_eq!(0, capture.active());
    }

    #[test]
    fn test_minimum_duration_boundary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (session, capture) = session(dir.path());

        for (held, accepted) in [
            (Duration::ZERO, false),
            (Duration::from_millis(100), false),
            (Duration::from_millis(1499), false),
            (Duration::from_millis(1500), true),
            (Duration::from_millis(1501), true),
            (Duration::from_secs(3), true),
        ] {
            let target = session.start().expect("start");
            match session.stop(held) {
                Ok(clip) => {
                    assert!(accepted, "{:?} should have been rejected", held);
                    assert!(clip.path().is_file());
                }
                Err(Error::RejectedClip { elapsed, minimum }) => {
                    assert!(!accepted, "{:?} should have been accepted", held);
                    assert_eq!(MIN_DURATION, minimum);
                    assert_eq!(held, elapsed);
                    assert!(!target.exists());
                }
                Err(e) => panic!("unexpected error {}", e),
            }
            assert_eq!(0, capture.active());
            // Clip names have millisecond resolution.
            std::thread::sleep(Duration::from_millis(2));
        }
    }

    #[test]
    fn test_start_while_active_is_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (session, capture) = session(dir.path());

        session.start().expect("start");
        assert!(matches!(session.start(), Err(Error::AlreadyActive)));
        assert_eq!(1, capture.active());
        assert_eq!(1, capture.captured().len());
    }

    #[test]
    fn test_stop_while_idle_is_noop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (session, _) = session(dir.path());
        assert!(matches!(
            session.stop(Duration::from_secs(2)),
            Err(Error::NotRecording)
        ));
    }

    #[test]
    fn test_abort_and_discard() {
        let dir = tempfile::tempdir().expect("tempdir");
        let (session, capture) = session(dir.path());

        let target = session.start().expect("start");
        session.abort();
        assert!(!target.exists());
        assert_eq!(0, capture.active());
        assert!(!session.is_active());

        session.start().expect("start");
        let clip = session.stop(Duration::from_secs(2)).expect("accepted");
        session.discard(&clip).expect("discard");
        assert!(!clip.path().exists());
        // Discarding twice is harmless.
        session.discard(&clip).expect("discard");
    }

    #[test]
    fn test_unavailable_capture() {
        let dir = tempfile::tempdir().expect("tempdir");
        let capture = crate::audio::get_capture(
            &["definitely-not-a-recorder-binary".to_string()],
            Duration::from_millis(100),
        )
        .expect("capture");
        let session = RecordingSession::new(dir.path(), capture, MIN_DURATION, None);

        assert!(matches!(
            session.start(),
            Err(Error::HardwareUnavailable { .. })
        ));
        assert!(!session.is_active());
        assert_eq!(
            0,
            std::fs::read_dir(dir.path()).expect("read dir").count()
        );
    }
}
