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
    error::Error,
    io,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use parking_lot::Mutex;
use tokio::{
    sync::mpsc::{self, Sender},
    task::JoinHandle,
    time::Instant,
};
use tracing::{debug, error, info, span, warn, Instrument, Level, Span};

use crate::{
    clips::{Clip, ClipStore, ResetReport},
    feedback::{self, Cue, Feedback},
    player::PlaybackEngine,
    recorder::RecordingSession,
    util::duration_seconds_millis,
};

pub mod keyboard;
pub mod sysfs;

/// Button events raised by a driver.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Event {
    /// The main button went down.
    MainPressed,

    /// The reset button went down.
    ResetPressed,
}

/// The level of a physical button.
pub trait Button: Send + Sync {
    /// Returns true while the button is held down.
    fn is_pressed(&self) -> bool;
}

pub trait Driver: Send + Sync + 'static {
    /// Watches the buttons and sends an event for every press.
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;

    /// The level of the main button, sampled to measure how long it's held.
    fn main_button(&self) -> Arc<dyn Button>;
}

/// Gesture timing thresholds.
#[derive(Clone, Debug)]
pub struct Settings {
    /// A press released before this is a skip, otherwise it records.
    pub short_press: Duration,
    /// A confirmation press held this long keeps the clip.
    pub confirm_hold: Duration,
    /// A confirmation press released within this deletes the clip.
    pub confirm_short: Duration,
    /// Recordings are stopped after this even if the button is still held.
    pub max_recording: Duration,
    /// How often the button level is sampled.
    pub poll_interval: Duration,
}

/// Where the controller is in a press cycle.
#[derive(Clone, Debug, PartialEq)]
pub enum State {
    /// Waiting for a press.
    Idle,
    /// Measuring a press to tell a skip from a recording.
    Classifying,
    /// Recording until the button is released.
    Recording,
    /// A clip was accepted and the next press decides its fate.
    AwaitConfirm(Arc<Clip>),
    /// Measuring the press that decides the clip's fate.
    Confirming(Arc<Clip>),
}

/// What a normal press means.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Gesture {
    Skip,
    Record,
}

/// What a press during confirmation means.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Confirm,
    Delete,
    Ignore,
}

/// How one press cycle was resolved.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution {
    /// Playback moved to the next clip.
    Skipped,
    /// A clip was recorded and now awaits confirmation.
    Recorded(Arc<Clip>),
    /// The recording was too short and was thrown away.
    Rejected,
    /// The clip joined the loop.
    Confirmed(Arc<Clip>),
    /// The clip was thrown away.
    Deleted,
    /// The press was inconclusive. The clip still awaits confirmation.
    Ignored,
    /// A reset abandoned the clip while the press was measured.
    Superseded,
    /// Recording couldn't happen, or the confirmed clip couldn't be kept.
    Failed,
}

/// The outcome of sampling a button.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Press {
    /// Released after the given duration.
    Released(Duration),
    /// Still held when the limit was reached.
    Held,
}

/// Classifies a normal press by how long it was held. The threshold itself records.
pub fn classify_press(held: Duration, short_press: Duration) -> Gesture {
    if held < short_press {
        Gesture::Skip
    } else {
        Gesture::Record
    }
}

/// Classifies a confirmation press by how long it was held.
pub fn classify_confirmation(held: Duration, settings: &Settings) -> Decision {
    if held >= settings.confirm_hold {
        Decision::Confirm
    } else if held <= settings.confirm_short {
        Decision::Delete
    } else {
        Decision::Ignore
    }
}

/// Turns presses of the main button into skips, recordings and confirmations, and presses
/// of the reset button into resets.
pub struct GestureController {
    engine: Arc<PlaybackEngine>,
    recorder: Arc<RecordingSession>,
    store: Arc<ClipStore>,
    feedback: Arc<dyn Feedback>,
    button: Arc<dyn Button>,
    settings: Settings,
    state: Mutex<State>,
    /// Closed while a press cycle is resolving.
    busy: AtomicBool,
    span: Span,
}

/// Opens the single-flight gate when the press cycle ends, however it ends.
struct Gate<'a>(&'a AtomicBool);

impl Drop for Gate<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl GestureController {
    /// Creates a new gesture controller in the idle state.
    pub fn new(
        engine: Arc<PlaybackEngine>,
        recorder: Arc<RecordingSession>,
        store: Arc<ClipStore>,
        feedback: Arc<dyn Feedback>,
        button: Arc<dyn Button>,
        settings: Settings,
    ) -> GestureController {
        GestureController {
            engine,
            recorder,
            store,
            feedback,
            button,
            settings,
            state: Mutex::new(State::Idle),
            busy: AtomicBool::new(false),
            span: span!(Level::INFO, "controller"),
        }
    }

    /// The current state.
    #[cfg(test)]
    pub fn state(&self) -> State {
        self.state.lock().clone()
    }

    /// Starts resolving a press of the main button. Returns None if the previous press is
    /// still resolving, in which case this press is dropped.
    pub fn on_main_press(self: &Arc<Self>) -> Option<JoinHandle<Resolution>> {
        let started = Instant::now();
        if self.busy.swap(true, Ordering::AcqRel) {
            let _enter = self.span.enter();
            debug!("Dropping press, the previous press is still resolving.");
            return None;
        }

        let controller = self.clone();
        let span = self.span.clone();
        Some(tokio::spawn(
            async move {
                let _gate = Gate(&controller.busy);
                controller.resolve(started).await
            }
            .instrument(span),
        ))
    }

    /// Deletes every clip right away. A clip awaiting confirmation is abandoned too.
    pub fn on_reset_press(&self) -> ResetReport {
        let _enter = self.span.enter();
        info!("Reset pressed.");

        let mut state = self.state.lock();
        let report = self.store.reset();
        for failure in &report.failures {
            warn!(err = failure.to_string(), "Reset left a clip behind.");
        }
        self.abandon_candidate(&mut state);

        report
    }

    /// Abandons whatever is in progress before the installation stops. A running capture
    /// and a clip awaiting confirmation are both deleted, so nothing unconfirmed outlives
    /// the process.
    pub fn shutdown(&self) {
        let _enter = self.span.enter();

        let mut state = self.state.lock();
        self.recorder.abort();
        self.abandon_candidate(&mut state);
        *state = State::Idle;
    }

    /// Deletes the clip awaiting confirmation, if any, and leaves the confirmation
    /// sub-mode. Called with the state lock held.
    fn abandon_candidate(&self, state: &mut State) {
        let clip = match &*state {
            State::AwaitConfirm(clip) | State::Confirming(clip) => clip.clone(),
            _ => return,
        };

        info!(clip = clip.name(), "Abandoning the clip awaiting confirmation.");
        self.engine.stop_confirmation();
        if let Err(e) = self.recorder.discard(&clip) {
            warn!(err = e.to_string(), "Unable to discard clip.");
        }
        feedback::show(self.feedback.as_ref(), Cue::Off);
        *state = State::Idle;
    }

    async fn resolve(&self, started: Instant) -> Resolution {
        let pending = match &*self.state.lock() {
            State::AwaitConfirm(clip) => Some(clip.clone()),
            _ => None,
        };

        let resolution = match pending {
            Some(clip) => self.confirm(clip, started).await,
            None => self.classify(started).await,
        };
        info!(resolution = format!("{:?}", resolution), "Press resolved.");
        resolution
    }

    /// Samples the button until it's released or the limit is reached. A release at
    /// exactly the limit counts as a release.
    async fn sample_press(&self, started: Instant, limit: Duration) -> Press {
        loop {
            let held = started.elapsed();
            if !self.button.is_pressed() {
                return Press::Released(held);
            }
            if held >= limit {
                return Press::Held;
            }
            tokio::time::sleep(self.settings.poll_interval).await;
        }
    }

    fn set_state(&self, state: State) {
        *self.state.lock() = state;
    }

    async fn classify(&self, started: Instant) -> Resolution {
        self.set_state(State::Classifying);

        let gesture = match self.sample_press(started, self.settings.short_press).await {
            Press::Released(held) => classify_press(held, self.settings.short_press),
            Press::Held => Gesture::Record,
        };

        match gesture {
            Gesture::Skip => {
                self.engine.skip();
                self.set_state(State::Idle);
                Resolution::Skipped
            }
            Gesture::Record => self.record(started).await,
        }
    }

    /// Records for as long as the press lasts. The recording's length is the whole press,
    /// measured from the press edge.
    async fn record(&self, started: Instant) -> Resolution {
        self.set_state(State::Recording);
        self.engine.pause();
        feedback::show(self.feedback.as_ref(), Cue::Recording);

        if let Err(e) = self.recorder.start() {
            error!(err = e.to_string(), "Unable to record.");
            self.abandon_recording();
            return Resolution::Failed;
        }

        let held = match self.sample_press(started, self.settings.max_recording).await {
            Press::Released(held) => held,
            Press::Held => {
                warn!(
                    max = duration_seconds_millis(self.settings.max_recording),
                    "Recording reached its maximum duration."
                );
                started.elapsed()
            }
        };

        // Stopping reaps the capture process and filters the clip.
        let recorder = self.recorder.clone();
        let stopped = match tokio::task::spawn_blocking(move || recorder.stop(held)).await {
            Ok(stopped) => stopped,
            Err(e) => {
                error!(err = e.to_string(), "Stopping the recording failed.");
                self.abandon_recording();
                return Resolution::Failed;
            }
        };

        match stopped {
            Ok(clip) => {
                self.engine.start_confirmation(clip.clone());
                self.engine.resume();
                feedback::show(self.feedback.as_ref(), Cue::Replay);
                self.set_state(State::AwaitConfirm(clip.clone()));
                Resolution::Recorded(clip)
            }
            Err(crate::error::Error::RejectedClip { .. }) => {
                self.abandon_recording();
                Resolution::Rejected
            }
            Err(e) => {
                error!(err = e.to_string(), "Unable to finish recording.");
                self.abandon_recording();
                Resolution::Failed
            }
        }
    }

    fn abandon_recording(&self) {
        feedback::show(self.feedback.as_ref(), Cue::Off);
        self.engine.resume();
        self.set_state(State::Idle);
    }

    async fn confirm(&self, clip: Arc<Clip>, started: Instant) -> Resolution {
        self.set_state(State::Confirming(clip.clone()));

        let decision = match self.sample_press(started, self.settings.confirm_hold).await {
            Press::Released(held) => classify_confirmation(held, &self.settings),
            Press::Held => Decision::Confirm,
        };

        let mut state = self.state.lock();
        match &*state {
            State::Confirming(current) if Arc::ptr_eq(current, &clip) => {}
            _ => return Resolution::Superseded,
        }

        match decision {
            Decision::Confirm => {
                self.engine.stop_confirmation();
                feedback::show(self.feedback.as_ref(), Cue::Off);
                *state = State::Idle;
                match self.store.admit(&clip) {
                    Ok(admitted) => {
                        let position = self.engine.insert_next(admitted.clone());
                        info!(clip = admitted.name(), position, "Clip confirmed.");
                        Resolution::Confirmed(admitted)
                    }
                    Err(e) => {
                        error!(err = e.to_string(), "Unable to keep the confirmed clip.");
                        if let Err(e) = self.recorder.discard(&clip) {
                            warn!(err = e.to_string(), "Unable to discard clip.");
                        }
                        Resolution::Failed
                    }
                }
            }
            Decision::Delete => {
                self.engine.stop_confirmation();
                if let Err(e) = self.recorder.discard(&clip) {
                    warn!(err = e.to_string(), "Unable to discard clip.");
                }
                feedback::show(self.feedback.as_ref(), Cue::Off);
                *state = State::Idle;
                Resolution::Deleted
            }
            Decision::Ignore => {
                *state = State::AwaitConfirm(clip);
                Resolution::Ignored
            }
        }
    }
}

/// Feeds button events from a driver into the gesture controller.
pub struct Controller {
    handle: JoinHandle<Result<(), io::Error>>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(
        gestures: Arc<GestureController>,
        driver: Arc<dyn Driver>,
    ) -> Result<Controller, Box<dyn Error>> {
        Ok(Controller {
            handle: tokio::spawn(async move { Controller::trigger_events(gestures, driver).await }),
        })
    }

    /// Join will block until the controller finishes. Fails if the controller panicked
    /// or the driver stopped with an error.
    pub async fn join(&mut self) -> Result<(), Box<dyn Error>> {
        (&mut self.handle).await??;
        Ok(())
    }

    /// Stops handling events.
    pub fn abort(&self) {
        self.handle.abort();
    }

    /// Triggers gestures by watching the driver and getting events from it.
    async fn trigger_events(
        gestures: Arc<GestureController>,
        driver: Arc<dyn Driver>,
    ) -> Result<(), io::Error> {
        let span = span!(Level::INFO, "controller");

        let (events_tx, mut events_rx) = mpsc::channel(16);
        let join_handle = driver.monitor_events(events_tx);

        span.in_scope(|| info!("Controller started."));

        while let Some(event) = events_rx.recv().await {
            span.in_scope(|| debug!(event = format!("{:?}", event), "Received event."));

            match event {
                Event::MainPressed => {
                    // The press resolves on its own task; a dropped press is logged there.
                    let _ = gestures.on_main_press();
                }
                Event::ResetPressed => {
                    gestures.on_reset_press();
                }
            }
        }

        span.in_scope(|| info!("Controller closing."));
        match join_handle.await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                span.in_scope(|| error!(err = e.to_string(), "Event monitor failed."));
                Err(e)
            }
            Err(e) => {
                span.in_scope(|| {
                    error!(err = e.to_string(), "Error waiting for event monitor to stop.")
                });
                Err(io::Error::other(e))
            }
        }
    }
}
