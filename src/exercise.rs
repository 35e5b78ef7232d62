//! Explicit event dispatch into the session state machine.
//!
//! [`Exercise`] owns the single current [`Session`] and is the only thing
//! that creates or replaces one. Loading or retrying builds a fresh session,
//! cancels the old one's timers and asks the [`SentenceLoader`] for a
//! sentence. The session stays `Idle` until the answer is dispatched back;
//! answers for a session that was replaced in the meantime are dropped.
//! Finished results are routed to the result queue and compared with the
//! stored best for the tier.

use crate::config::Durations;
use crate::difficulty::{Difficulty, Plan};
use crate::error::SessionError;
use crate::loader::{LoadReply, LoadRequest, SentenceLoader};
use crate::record::{BestStats, TypingResult};
use crate::session::{Keystroke, Session, SessionEvent, SessionSettings, Status};
use crate::store::LocalStore;
use crate::sync::ResultSink;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Everything the presentation layer can ask of the exercise
#[derive(Debug)]
pub enum Input {
    /// Replace the current session with a freshly loaded one
    Load,
    /// Arm now, or as soon as the pending sentence arrives
    Arm,
    Key(Keystroke),
    Tick,
    /// End the active session early
    Submit,
    /// Same as `Load`, offered after a finish or a failed load
    Retry,
    FocusLost,
    SetDifficulty(Difficulty),
    /// A sentence request finished
    Loaded(LoadReply),
}

/// Participant identity and per-tier durations used for new sessions
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub participant: String,
    pub plan: Plan,
    pub durations: Durations,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            participant: "Guest".into(),
            plan: Plan::Free,
            durations: Durations::default(),
        }
    }
}

impl Profile {
    pub fn settings(&self, difficulty: Difficulty) -> SessionSettings {
        SessionSettings::new(
            self.participant.clone(),
            self.plan,
            self.durations.duration(difficulty),
        )
    }
}

/// Outcome of the most recent finish, for the results screen
#[derive(Debug, Clone, PartialEq)]
pub struct FinishSummary {
    pub result: TypingResult,
    pub previous_best: BestStats,
    /// `(wpm, accuracy)` relative to the previous best
    pub delta: (i64, i64),
    pub new_best: bool,
    /// False if the result could not be written to the local queue
    pub queued: bool,
}

pub struct Exercise<L, K, B> {
    loader: L,
    sink: K,
    best_store: B,
    profile: Profile,
    difficulty: Difficulty,
    session: Option<Session>,
    summary: Option<FinishSummary>,
    arm_when_loaded: bool,
}

impl<L, K, B> Exercise<L, K, B>
where
    L: SentenceLoader,
    K: ResultSink,
    B: LocalStore,
{
    pub fn new(loader: L, sink: K, best_store: B, profile: Profile, difficulty: Difficulty) -> Self {
        Self {
            loader,
            sink,
            best_store,
            profile,
            difficulty,
            session: None,
            summary: None,
            arm_when_loaded: false,
        }
    }

    /// Route one input to the current session and return the events it produced.
    pub fn dispatch(&mut self, input: Input, now: Instant) -> Vec<SessionEvent> {
        match input {
            Input::Load | Input::Retry => self.replace_session(),
            Input::SetDifficulty(difficulty) => {
                self.difficulty = difficulty;
                self.replace_session();
            }
            Input::Arm => match self.session.as_mut() {
                Some(session) if session.is_loading() => self.arm_when_loaded = true,
                Some(session) => log_rejected(session.arm()),
                None => {}
            },
            Input::Key(key) => self.key(key, now),
            Input::Tick => {
                if let Some(session) = self.session.as_mut() {
                    session.poll(now);
                }
            }
            Input::Submit => {
                if let Some(session) = self.session.as_mut() {
                    log_rejected(session.finish(now));
                }
            }
            Input::FocusLost => {
                if let Some(session) = self.session.as_mut() {
                    session.focus_lost();
                }
            }
            Input::Loaded(reply) => self.apply_loaded(reply),
        }
        while let Some(reply) = self.loader.poll_reply() {
            self.apply_loaded(reply);
        }

        let events = self
            .session
            .as_mut()
            .map(Session::drain_events)
            .unwrap_or_default();
        for event in &events {
            if let SessionEvent::Finished(result) = event {
                self.record_finish(result.clone());
            }
        }
        events
    }

    fn replace_session(&mut self) {
        if let Some(mut old) = self.session.take() {
            old.cancel();
        }
        self.summary = None;

        self.arm_when_loaded = false;

        let mut session = Session::new(self.difficulty, self.profile.settings(self.difficulty));
        match session.begin_load() {
            Ok(()) => {
                debug!(session = session.id(), difficulty = %self.difficulty, "requesting sentence");
                self.loader.request(LoadRequest {
                    session: session.id(),
                    difficulty: self.difficulty,
                });
            }
            Err(e) => warn!(difficulty = %self.difficulty, error = %e, "could not load sentence"),
        }
        self.session = Some(session);
    }

    fn apply_loaded(&mut self, reply: LoadReply) {
        let Some(session) = self
            .session
            .as_mut()
            .filter(|session| session.id() == reply.session)
        else {
            debug!(session = reply.session, "dropping sentence for a replaced session");
            return;
        };
        match session.complete_load(reply.outcome) {
            Ok(()) => {
                info!(session = session.id(), difficulty = %reply.difficulty, "sentence loaded");
                if std::mem::take(&mut self.arm_when_loaded) {
                    log_rejected(session.arm());
                }
            }
            Err(e) if e.is_invalid_transition() => log_rejected::<()>(Err(e)),
            Err(e) => {
                self.arm_when_loaded = false;
                warn!(difficulty = %reply.difficulty, error = %e, "could not load sentence");
            }
        }
    }

    fn key(&mut self, key: Keystroke, now: Instant) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        if matches!(session.status(), Status::Loaded | Status::Armed) {
            match session.first_input(key, now) {
                Ok(true) => {}
                Ok(false) => return,
                Err(e) => {
                    log_rejected::<()>(Err(e));
                    return;
                }
            }
        }
        if key == Keystroke::Modifier {
            return;
        }
        let typed = key.apply(session.typed());
        log_rejected(session.update(&typed, now));
    }

    fn record_finish(&mut self, result: TypingResult) {
        let difficulty = result.difficulty;
        let previous_best = self.best_store.best_stats(difficulty).unwrap_or_else(|e| {
            error!(error = %e, "could not read best stats");
            BestStats::default()
        });

        let snapshot = result.snapshot();
        let delta = previous_best.delta(snapshot);
        let mut best = previous_best;
        let new_best = best.raise(snapshot);
        if new_best {
            if let Err(e) = self.best_store.save_best_stats(difficulty, &best) {
                error!(error = %e, "could not save best stats");
            }
        }

        let queued = match self.sink.enqueue(result.clone()) {
            Ok(()) => true,
            Err(e) => {
                error!(error = %e, "could not queue result");
                false
            }
        };

        self.summary = Some(FinishSummary {
            result,
            previous_best,
            delta,
            new_best,
            queued,
        });
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn summary(&self) -> Option<&FinishSummary> {
        self.summary.as_ref()
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn sink(&self) -> &K {
        &self.sink
    }

    pub fn best_store(&self) -> &B {
        &self.best_store
    }
}

fn log_rejected<T>(outcome: Result<T, SessionError>) {
    if let Err(e) = outcome {
        if e.is_invalid_transition() {
            warn!(error = %e, "ignored input");
        } else {
            error!(error = %e, "session error");
        }
    }
}
