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
use std::path::Path;

use config::{Config, File};
use serde::Deserialize;

use super::{
    audio::{Capture, Playback},
    buttons::Buttons,
    error::ConfigError,
    feedback::Feedback,
    gestures::Gestures,
    storage::Storage,
};

/// The configuration for the installation.
#[derive(Deserialize, Clone)]
pub struct Installation {
    /// How the buttons are read.
    buttons: Buttons,
    /// Where clips live.
    storage: Storage,
    /// How clips are recorded.
    capture: Capture,
    /// How clips are played.
    playback: Playback,
    /// Gesture timing.
    #[serde(default)]
    gestures: Gestures,
    /// How cues are shown.
    #[serde(default)]
    feedback: Feedback,
}

impl Installation {
    /// Parse an installation from a YAML file.
    pub fn deserialize(path: &Path) -> Result<Installation, ConfigError> {
        let installation = Config::builder()
            .add_source(File::from(path))
            .build()?
            .try_deserialize::<Installation>()?;
        installation.validate()?;
        Ok(installation)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.gestures.confirm_short()? >= self.gestures.confirm_hold()? {
            return Err(ConfigError::Invalid(
                "gestures.confirm_short must be shorter than gestures.confirm_hold".to_string(),
            ));
        }
        if self.capture.min_duration()? > self.capture.max_duration()? {
            return Err(ConfigError::Invalid(
                "capture.min_duration must not exceed capture.max_duration".to_string(),
            ));
        }
        if self.playback.prompt_every() == 1 {
            return Err(ConfigError::Invalid(
                "playback.prompt_every must be 0 or at least 2, 1 would only ever play the prompt"
                    .to_string(),
            ));
        }
        if self.gestures.poll_interval()?.is_zero() {
            return Err(ConfigError::Invalid(
                "gestures.poll_interval must not be zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn buttons(&self) -> &Buttons {
        &self.buttons
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn capture(&self) -> &Capture {
        &self.capture
    }

    pub fn playback(&self) -> &Playback {
        &self.playback
    }

    pub fn gestures(&self) -> &Gestures {
        &self.gestures
    }

    pub fn feedback(&self) -> &Feedback {
        &self.feedback
    }
}

#[cfg(test)]
mod test {
    use std::{fs, path::Path, time::Duration};

    use crate::config::{buttons::Buttons, error::ConfigError, feedback::Feedback};

    use super::Installation;

    fn write(dir: &Path, yaml: &str) -> std::path::PathBuf {
        let path = dir.join("ohrgarten.yaml");
        fs::write(&path, yaml).expect("write config");
        path
    }

    #[test]
    fn test_defaults() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = write(
            dir.path(),
            r#"
buttons:
  kind: keyboard
storage:
  recordings: recordings
  prompt: sfx/prompt.wav
capture:
  command: [arecord, -f, cd]
playback:
  command: [aplay, "{path}"]
"#,
        );

        let installation = Installation::deserialize(&path)?;
        assert!(matches!(installation.buttons(), Buttons::Keyboard));
        assert!(matches!(installation.feedback(), Feedback::Log));

        let gestures = installation.gestures();
        assert_eq!(Duration::from_millis(150), gestures.short_press()?);
        assert_eq!(Duration::from_millis(2800), gestures.confirm_hold()?);
        assert_eq!(Duration::from_millis(230), gestures.confirm_short()?);
        assert_eq!(Duration::from_millis(10), gestures.poll_interval()?);

        let capture = installation.capture();
        assert_eq!(vec!["arecord", "-f", "cd"], capture.command());
        assert_eq!(Duration::from_millis(1500), capture.min_duration()?);
        assert_eq!(Duration::from_secs(60), capture.max_duration()?);
        assert_eq!(None, capture.low_pass_hz());

        let playback = installation.playback();
        assert_eq!(7, playback.prompt_every());
        assert_eq!(Duration::from_secs(2), playback.gap()?);
        assert_eq!(Duration::from_millis(200), playback.grace()?);

        let storage = installation.storage();
        let base = dir.path();
        assert_eq!(base.join("recordings"), storage.recordings(base));
        assert_eq!(base.join("sfx/prompt.wav"), storage.confirm_prompt(base));
        assert_eq!(None, storage.cue(base));
        Ok(())
    }

    #[test]
    fn test_full() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = write(
            dir.path(),
            r#"
buttons:
  kind: sysfs
  main:
    gpio: 17
  reset:
    path: /tmp/reset-value
  active_low: false
  bounce: 50ms
storage:
  recordings: /srv/ohrgarten/recordings
  prompt: prompt.wav
  confirm_prompt: confirm.wav
  cue: beep.wav
capture:
  command: [arecord, "{path}"]
  min_duration: 2s
  max_duration: 30s
  low_pass_hz: 3000.0
playback:
  command: [aplay, "{path}"]
  prompt_every: 3
  gap: 500ms
gestures:
  short_press: 200ms
  confirm_hold: 3s
  confirm_short: 300ms
feedback:
  kind: command
  recording: [led, red]
  replay: [led, green]
  instruction: [led, blue]
  off: [led, off]
"#,
        );

        let installation = Installation::deserialize(&path)?;
        match installation.buttons() {
            Buttons::Sysfs(buttons) => {
                assert!(!buttons.active_low());
                assert_eq!(Duration::from_millis(50), buttons.bounce()?);
            }
            Buttons::Keyboard => panic!("expected sysfs buttons"),
        }
        assert!(matches!(installation.feedback(), Feedback::Command(_)));
        assert_eq!(Duration::from_millis(200), installation.gestures().short_press()?);
        assert_eq!(Duration::from_secs(3), installation.gestures().confirm_hold()?);
        assert_eq!(Duration::from_secs(2), installation.capture().min_duration()?);
        assert_eq!(Some(3000.0), installation.capture().low_pass_hz());
        assert_eq!(3, installation.playback().prompt_every());

        let base = dir.path();
        let storage = installation.storage();
        assert_eq!(
            Path::new("/srv/ohrgarten/recordings"),
            storage.recordings(base)
        );
        assert_eq!(base.join("confirm.wav"), storage.confirm_prompt(base));
        assert_eq!(Some(base.join("beep.wav")), storage.cue(base));
        Ok(())
    }

    #[test]
    fn test_invalid() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = write(
            dir.path(),
            r#"
buttons:
  kind: keyboard
storage:
  recordings: recordings
  prompt: prompt.wav
capture:
  command: [arecord]
playback:
  command: [aplay]
gestures:
  confirm_short: 3s
"#,
        );
        assert!(matches!(
            Installation::deserialize(&path),
            Err(ConfigError::Invalid(_))
        ));

        let path = write(
            dir.path(),
            r#"
buttons:
  kind: keyboard
storage:
  recordings: recordings
  prompt: prompt.wav
capture:
  command: [arecord]
playback:
  command: [aplay]
  gap: soon
"#,
        );
        assert!(matches!(
            Installation::deserialize(&path).and_then(|i| i.playback().gap()),
            Err(ConfigError::Duration { .. })
        ));

        let path = write(
            dir.path(),
            r#"
buttons:
  kind: keyboard
storage:
  recordings: recordings
  prompt: prompt.wav
capture:
  command: [arecord]
playback:
  command: [aplay]
  prompt_every: 1
"#,
        );
        assert!(matches!(
            Installation::deserialize(&path),
            Err(ConfigError::Invalid(_))
        ));

        assert!(matches!(
            Installation::deserialize(&dir.path().join("missing.yaml")),
            Err(ConfigError::Load(_))
        ));
        Ok(())
    }
}
