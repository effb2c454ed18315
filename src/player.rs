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
    path::PathBuf,
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};
use tracing::{error, info, span, Level, Span};

use crate::{
    audio,
    clips::{Clip, ClipStore, Mode},
    feedback::{self, Cue, Feedback},
};

/// How long to wait before trying again after playback couldn't start at all.
const FAILURE_BACKOFF: Duration = Duration::from_secs(1);

/// Fixed settings for the playback engine.
#[derive(Clone, Debug)]
pub struct Settings {
    /// The prompt played when there's nothing else to play and every `prompt_every` turns.
    pub prompt: PathBuf,
    /// The prompt alternated with a candidate during confirmation.
    pub confirm_prompt: PathBuf,
    /// An optional cue played once when confirmation begins.
    pub cue: Option<PathBuf>,
    /// Every Nth loop turn plays the prompt. Zero disables the periodic prompt.
    pub prompt_every: usize,
    /// The pause between loop turns.
    pub gap: Duration,
    /// How often in-flight playback is checked for completion.
    pub poll_interval: Duration,
}

/// Mutable engine state that isn't part of the clip sequence.
struct Control {
    /// Pause halts the loop until resumed.
    paused: bool,
    /// Stop ends the loop for good.
    stopped: bool,
    /// Bumped by every request that invalidates the in-flight playback.
    generation: u64,
    /// Loop turns that have been played or skipped, used to schedule the prompt.
    turns: u64,
    /// Position within the confirmation sub-mode's alternation.
    confirmation_step: u64,
}

/// What a turn plays.
#[derive(Debug)]
struct Turn {
    path: PathBuf,
    /// True for a stored clip, whose completion moves the cursor.
    from_store: bool,
    /// True for the loop prompt.
    prompt: bool,
    /// True for a confirmation sub-mode item.
    confirmation: bool,
}

/// How a turn ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Outcome {
    Completed,
    Interrupted,
    Failed,
}

/// Continuously loops over the stored clips on a dedicated thread, interleaving the
/// prompt, and hosts the confirmation sub-mode for freshly recorded clips.
pub struct PlaybackEngine {
    /// The clips and the cursor.
    store: Arc<ClipStore>,
    /// The playback device.
    playback: Arc<dyn audio::Playback>,
    /// Visitor feedback.
    feedback: Arc<dyn Feedback>,
    /// Fixed settings.
    settings: Settings,
    /// Pause, stop and the generation of the in-flight playback.
    control: Mutex<Control>,
    /// Wakes the worker when control changes.
    wake: Condvar,
    /// The logging span.
    span: Span,
}

impl PlaybackEngine {
    /// Creates a new playback engine. It doesn't play anything until `run` is called.
    pub fn new(
        store: Arc<ClipStore>,
        playback: Arc<dyn audio::Playback>,
        feedback: Arc<dyn Feedback>,
        settings: Settings,
    ) -> PlaybackEngine {
        PlaybackEngine {
            store,
            playback,
            feedback,
            settings,
            control: Mutex::new(Control {
                paused: false,
                stopped: false,
                generation: 0,
                turns: 0,
                confirmation_step: 0,
            }),
            wake: Condvar::new(),
            span: span!(Level::INFO, "player"),
        }
    }

    /// Runs the engine on its own thread.
    pub fn spawn(engine: Arc<PlaybackEngine>) -> io::Result<thread::JoinHandle<()>> {
        thread::Builder::new()
            .name("playback".to_string())
            .spawn(move || engine.run())
    }

    /// Loops until stopped, playing one turn at a time.
    pub fn run(&self) {
        let _enter = self.span.enter();
        info!(device = self.playback.to_string(), "Playback engine started.");

        loop {
            let generation = {
                let mut control = self.control.lock();
                while control.paused && !control.stopped {
                    self.wake.wait(&mut control);
                }
                if control.stopped {
                    break;
                }
                control.generation
            };

            let turn = self.select();
            if turn.prompt {
                feedback::show(self.feedback.as_ref(), Cue::Instruction);
            }
            let outcome = self.play(&turn, generation);
            if turn.prompt {
                feedback::show(self.feedback.as_ref(), Cue::Off);
            }

            if turn.confirmation {
                if outcome == Outcome::Completed {
                    self.control.lock().confirmation_step += 1;
                }
            } else {
                let played = self
                    .store
                    .lock()
                    .finish_turn(outcome == Outcome::Completed, turn.from_store);
                if played {
                    self.control.lock().turns += 1;
                }
            }

            match outcome {
                Outcome::Completed if !turn.confirmation => self.rest(generation, self.settings.gap),
                Outcome::Completed | Outcome::Interrupted => {}
                Outcome::Failed => self.rest(generation, self.settings.gap.max(FAILURE_BACKOFF)),
            }
        }

        info!("Playback engine stopped.");
    }

    /// Picks what the next turn plays.
    fn select(&self) -> Turn {
        let (turns, confirmation_step) = {
            let control = self.control.lock();
            (control.turns, control.confirmation_step)
        };

        let mut sequence = self.store.lock();
        sequence.begin_turn();

        if let Mode::Confirmation(candidate) = sequence.mode() {
            let step = match self.settings.cue.as_ref() {
                Some(cue) if confirmation_step == 0 => {
                    return Turn::confirmation(cue.clone());
                }
                Some(_) => confirmation_step - 1,
                None => confirmation_step,
            };
            return if step % 2 == 0 {
                Turn::confirmation(candidate.path().to_path_buf())
            } else {
                Turn::confirmation(self.settings.confirm_prompt.clone())
            };
        }

        let every = self.settings.prompt_every as u64;
        let prompt_turn = every > 0 && (turns + 1) % every == 0;
        match sequence.current() {
            Some(clip) if !prompt_turn => Turn {
                path: clip.path().to_path_buf(),
                from_store: true,
                prompt: false,
                confirmation: false,
            },
            _ => Turn {
                path: self.settings.prompt.clone(),
                from_store: false,
                prompt: true,
                confirmation: false,
            },
        }
    }

    /// Plays the turn until it finishes or is interrupted. Interrupted playback is
    /// terminated here, on the worker, so callers of the control operations never wait
    /// for a process to exit.
    fn play(&self, turn: &Turn, generation: u64) -> Outcome {
        let mut playing = match self.playback.start(&turn.path) {
            Ok(playing) => playing,
            Err(e) => {
                error!(
                    path = %turn.path.display(),
                    err = e.to_string(),
                    "Unable to start playback."
                );
                return Outcome::Failed;
            }
        };

        let mut control = self.control.lock();
        loop {
            if control.generation != generation || control.paused || control.stopped {
                drop(control);
                playing.terminate();
                return Outcome::Interrupted;
            }
            if !playing.is_running() {
                return Outcome::Completed;
            }
            self.wake
                .wait_for(&mut control, self.settings.poll_interval);
        }
    }

    /// Waits between turns. Any interruption ends the wait early.
    fn rest(&self, generation: u64, duration: Duration) {
        if duration.is_zero() {
            return;
        }

        let deadline = Instant::now() + duration;
        let mut control = self.control.lock();
        while control.generation == generation && !control.stopped {
            if self.wake.wait_until(&mut control, deadline).timed_out() {
                break;
            }
        }
    }

    /// Applies a control change and invalidates the in-flight playback. The worker notices
    /// and terminates it.
    fn interrupt<F>(&self, change: F)
    where
        F: FnOnce(&mut Control),
    {
        {
            let mut control = self.control.lock();
            change(&mut control);
            control.generation += 1;
        }
        self.wake.notify_all();
    }

    /// Stops the in-flight playback and halts the loop. Returns right away; the worker
    /// cuts the playback off. The cursor doesn't move, so resuming plays the same clip
    /// again.
    pub fn pause(&self) {
        let _enter = self.span.enter();
        info!("Pausing playback.");
        self.interrupt(|control| control.paused = true);
    }

    /// Resumes a paused loop at the unchanged cursor.
    pub fn resume(&self) {
        let _enter = self.span.enter();
        info!("Resuming playback.");
        self.control.lock().paused = false;
        self.wake.notify_all();
    }

    /// Ends the loop for good.
    pub fn stop(&self) {
        let _enter = self.span.enter();
        info!("Stopping playback.");
        self.interrupt(|control| control.stopped = true);
    }

    /// Moves the cursor to the next clip and cuts off whatever is playing. Does nothing
    /// during confirmation. Returns true if the skip happened.
    pub fn skip(&self) -> bool {
        let _enter = self.span.enter();
        {
            let mut sequence = self.store.lock();
            if let Mode::Confirmation(candidate) = sequence.mode() {
                info!(candidate = candidate.name(), "Ignoring skip during confirmation.");
                return false;
            }
            sequence.skip();
            info!(position = sequence.index(), "Skipping to the next clip.");
        }
        self.interrupt(|_| {});
        true
    }

    /// Inserts a confirmed clip right after the cursor so it plays next.
    pub fn insert_next(&self, clip: Arc<Clip>) -> usize {
        self.store.insert_next(clip)
    }

    /// Switches to the confirmation sub-mode, alternating the candidate with the prompt
    /// until `stop_confirmation`. Returns false if confirmation is already running.
    pub fn start_confirmation(&self, candidate: Arc<Clip>) -> bool {
        let _enter = self.span.enter();
        {
            let mut sequence = self.store.lock();
            if let Mode::Confirmation(running) = sequence.mode() {
                info!(
                    candidate = running.name(),
                    "Confirmation is already running."
                );
                return false;
            }
            info!(candidate = candidate.name(), "Starting confirmation.");
            sequence.set_mode(Mode::Confirmation(candidate));
        }
        self.interrupt(|control| control.confirmation_step = 0);
        true
    }

    /// Leaves the confirmation sub-mode and returns its candidate. The loop carries on at
    /// the unchanged cursor.
    pub fn stop_confirmation(&self) -> Option<Arc<Clip>> {
        let _enter = self.span.enter();
        let candidate = {
            let mut sequence = self.store.lock();
            match sequence.set_mode(Mode::Loop) {
                Mode::Confirmation(candidate) => candidate,
                Mode::Loop => return None,
            }
        };
        info!(candidate = candidate.name(), "Stopping confirmation.");
        self.interrupt(|_| {});
        Some(candidate)
    }

    /// True while the loop is paused.
    #[cfg(test)]
    pub fn is_paused(&self) -> bool {
        self.control.lock().paused
    }

    /// True while the confirmation sub-mode is active.
    #[cfg(test)]
    pub fn is_confirming(&self) -> bool {
        matches!(self.store.lock().mode(), Mode::Confirmation(_))
    }

    /// The cursor position.
    #[cfg(test)]
    pub fn cursor(&self) -> usize {
        self.store.lock().index()
    }
}

impl Turn {
    fn confirmation(path: PathBuf) -> Turn {
        Turn {
            path,
            from_store: false,
            prompt: false,
            confirmation: true,
        }
    }
}
