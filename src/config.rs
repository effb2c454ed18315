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
use std::error::Error;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use duration_string::DurationString;
use tracing::{info, warn};

use crate::{
    clips::ClipStore,
    controller::{self, Controller, Driver, GestureController},
    player::{self, PlaybackEngine},
    recorder::RecordingSession,
};

use self::buttons::Buttons;
pub use self::error::ConfigError;
pub use self::installation::Installation;

mod audio;
mod buttons;
mod error;
mod feedback;
mod gestures;
mod installation;
mod storage;

/// Parses an optional duration string, falling back to the default when unset.
fn duration(
    field: &'static str,
    value: &Option<String>,
    default: Duration,
) -> Result<Duration, ConfigError> {
    value.as_ref().map_or(Ok(default), |value| {
        DurationString::from_string(value.clone())
            .map(Into::into)
            .map_err(|source| ConfigError::Duration { field, source })
    })
}

/// Relative paths in the config are relative to the config file.
fn base_dir(path: &Path) -> PathBuf {
    path.parent().map(Path::to_path_buf).unwrap_or_default()
}

/// Opens the clip store described by the given config file.
pub fn init_store(path: &Path) -> Result<Arc<ClipStore>, Box<dyn Error>> {
    let installation = Installation::deserialize(path)?;
    let recordings = installation.storage().recordings(&base_dir(path));
    Ok(Arc::new(ClipStore::load(&recordings)?))
}

/// The running installation.
pub struct Running {
    pub store: Arc<ClipStore>,
    pub engine: Arc<PlaybackEngine>,
    pub controller: Controller,
    gestures: Arc<GestureController>,
    playback: thread::JoinHandle<()>,
}

impl Running {
    /// Stops handling presses, discards any recording in progress or awaiting
    /// confirmation and stops playback.
    pub fn shutdown(self) {
        info!("Shutting down.");
        self.controller.abort();
        self.gestures.shutdown();
        self.engine.stop();
        if self.playback.join().is_err() {
            warn!("Playback thread panicked.");
        }
    }
}

/// Initializes every component from the given config file, starts the playback worker and
/// starts listening to the buttons.
pub fn init_installation(path: &Path) -> Result<Running, Box<dyn Error>> {
    let installation = Installation::deserialize(path)?;
    let base = base_dir(path);
    let storage = installation.storage();
    let recordings = storage.recordings(&base);

    let store = Arc::new(ClipStore::load(&recordings)?);
    store.purge_pending();
    let capture_config = installation.capture();
    let capture = crate::audio::get_capture(capture_config.command(), capture_config.grace()?)?;
    let playback_config = installation.playback();
    let playback =
        crate::audio::get_playback(playback_config.command(), playback_config.grace()?)?;
    let feedback = installation.feedback().sink();
    let gestures = installation.gestures();
    let poll_interval = gestures.poll_interval()?;

    let prompt = storage.prompt(&base);
    if !prompt.is_file() {
        warn!(prompt = %prompt.display(), "Prompt clip is missing.");
    }

    let engine = Arc::new(PlaybackEngine::new(
        store.clone(),
        playback,
        feedback.clone(),
        player::Settings {
            prompt,
            confirm_prompt: storage.confirm_prompt(&base),
            cue: storage.cue(&base),
            prompt_every: playback_config.prompt_every(),
            gap: playback_config.gap()?,
            poll_interval,
        },
    ));
    let recorder = Arc::new(RecordingSession::new(
        &store.pending_dir(),
        capture,
        capture_config.min_duration()?,
        capture_config.low_pass_hz(),
    ));

    let driver: Arc<dyn Driver> = match installation.buttons() {
        Buttons::Keyboard => Arc::new(controller::keyboard::Driver::new()),
        Buttons::Sysfs(buttons) => Arc::new(buttons.driver(&base, poll_interval)?),
    };
    let gestures = Arc::new(GestureController::new(
        engine.clone(),
        recorder,
        store.clone(),
        feedback,
        driver.main_button(),
        controller::Settings {
            short_press: gestures.short_press()?,
            confirm_hold: gestures.confirm_hold()?,
            confirm_short: gestures.confirm_short()?,
            max_recording: capture_config.max_duration()?,
            poll_interval,
        },
    ));

    let playback = PlaybackEngine::spawn(engine.clone())?;
    let controller = Controller::new(gestures.clone(), driver)?;
    info!(
        recordings = %recordings.display(),
        clips = store.len(),
        "Installation started."
    );

    Ok(Running {
        store,
        engine,
        controller,
        gestures,
        playback,
    })
}

#[cfg(test)]
mod test {
    use std::{fs, time::Duration};

    use super::{duration, init_installation, init_store, ConfigError};

    #[test]
    fn test_duration() {
        let default = Duration::from_secs(1);
        assert_eq!(default, duration("field", &None, default).expect("default"));
        assert_eq!(
            Duration::from_millis(150),
            duration("field", &Some("150ms".to_string()), default).expect("parsed")
        );
        assert!(matches!(
            duration("field", &Some("later".to_string()), default),
            Err(ConfigError::Duration { field: "field", .. })
        ));
    }

    #[tokio::test]
    async fn test_init_installation() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("ohrgarten.yaml");
        fs::write(
            &path,
            r#"
buttons:
  kind: sysfs
  main:
    path: main-value
  reset:
    path: reset-value
storage:
  recordings: recordings
  prompt: prompt.wav
capture:
  command: [mock-capture]
playback:
  command: [mock-playback]
  gap: 0ms
"#,
        )?;
        fs::write(dir.path().join("main-value"), "1")?;
        fs::write(dir.path().join("reset-value"), "1")?;
        // Left behind by a run that stopped before the visitor decided.
        let stale = dir.path().join("recordings/pending/rec_20251231_235959_000.wav");
        fs::create_dir_all(dir.path().join("recordings/pending"))?;
        fs::write(&stale, b"RIFF")?;

        let running = init_installation(&path)?;
        assert!(dir.path().join("recordings").is_dir());
        assert!(!stale.exists());
        assert!(running.store.is_empty());
        assert!(!running.engine.is_paused());
        running.shutdown();

        fs::write(dir.path().join("recordings/rec_20260101_120000_000.wav"), b"RIFF")?;
        let store = init_store(&path)?;
        assert_eq!(1, store.len());
        Ok(())
    }
}
