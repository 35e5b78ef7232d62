//! Lifecycle of a single typing attempt.
//!
//! A [`Session`] moves `Idle -> Loaded -> Armed -> Active -> Finished` and is
//! never reused: the next attempt gets a new instance. Countdown and sampler
//! are fields of the session, so dropping or replacing a session cancels
//! them and a stale timer can never finish the wrong attempt.
//!
//! Every state-changing method validates the current status first and
//! returns [`SessionError::InvalidTransition`] without touching any field
//! when called out of order.

use crate::countdown::{Countdown, CountdownTick};
use crate::difficulty::{Difficulty, Plan};
use crate::error::{ProviderError, SessionError, SessionResult};
use crate::metrics::{char_states, CharState, MetricSnapshot};
use crate::provider::{request_fresh, RecentSentences, SentenceProvider};
use crate::record::{ResultStatus, TypingResult};
use crate::sampler::LiveSampler;
use chrono::Local;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Loaded,
    Armed,
    Active,
    Finished,
}

/// A key event as far as the session cares
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keystroke {
    Char(char),
    Backspace,
    /// Shift, Ctrl and other keys that produce no input on their own
    Modifier,
}

impl Keystroke {
    /// Whether this key may start the session
    pub fn qualifies(&self) -> bool {
        matches!(self, Keystroke::Char(_) | Keystroke::Backspace)
    }

    /// Apply the key to a typed buffer
    pub fn apply(&self, buffer: &str) -> String {
        let mut next = buffer.to_string();
        match self {
            Keystroke::Char(c) => next.push(*c),
            Keystroke::Backspace => {
                next.pop();
            }
            Keystroke::Modifier => {}
        }
        next
    }
}

/// Notifications for the presentation layer, drained after each dispatch
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    Transition { from: Status, to: Status },
    Metrics(MetricSnapshot),
    Countdown(CountdownTick),
    /// Emitted exactly once, when the session first reaches `Finished`
    Finished(TypingResult),
}

/// Who is typing and how long each attempt lasts
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub participant: String,
    pub plan: Plan,
    pub duration: Duration,
}

impl SessionSettings {
    pub fn new(participant: impl Into<String>, plan: Plan, duration: Duration) -> Self {
        Self {
            participant: participant.into(),
            plan,
            duration,
        }
    }

    /// Guest participant on the free plan with the tier's default duration
    pub fn guest(difficulty: Difficulty) -> Self {
        Self::new("Guest", Plan::Free, difficulty.default_duration())
    }
}

#[derive(Debug)]
pub struct Session {
    id: u64,
    difficulty: Difficulty,
    settings: SessionSettings,
    status: Status,
    target: String,
    typed: String,
    started_at: Option<Instant>,
    snapshot: MetricSnapshot,
    countdown: Countdown,
    sampler: LiveSampler,
    result: Option<TypingResult>,
    load_error: Option<String>,
    loading: bool,
    events: Vec<SessionEvent>,
}

impl Session {
    pub fn new(difficulty: Difficulty, settings: SessionSettings) -> Self {
        let countdown = Countdown::new(settings.duration);
        Self {
            id: NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed),
            difficulty,
            settings,
            status: Status::Idle,
            target: String::new(),
            typed: String::new(),
            started_at: None,
            snapshot: MetricSnapshot::default(),
            countdown,
            sampler: LiveSampler::new(),
            result: None,
            load_error: None,
            loading: false,
            events: Vec::new(),
        }
    }

    /// A session already `Loaded` with a known target, e.g. a custom prompt
    pub fn with_target(
        difficulty: Difficulty,
        settings: SessionSettings,
        target: impl Into<String>,
    ) -> Self {
        let mut session = Self::new(difficulty, settings);
        session.target = target.into();
        session.transition(Status::Loaded);
        session
    }

    /// Request a target sentence on the calling thread and enter `Loaded`.
    ///
    /// On failure the session stays `Idle` and the error is also kept for
    /// [`Session::load_error`].
    pub fn load<P: SentenceProvider + ?Sized>(
        &mut self,
        provider: &P,
        recent: &mut RecentSentences,
    ) -> SessionResult<()> {
        self.begin_load()?;
        let outcome = request_fresh(provider, self.difficulty, recent);
        self.complete_load(outcome)
    }

    /// Mark a sentence as requested. The session stays `Idle` until
    /// [`Session::complete_load`] hands it the answer.
    pub fn begin_load(&mut self) -> SessionResult<()> {
        self.expect_status("load", &[Status::Idle])?;
        if self.loading {
            return Err(SessionError::invalid("load", self.status));
        }

        if !self.settings.plan.allows(self.difficulty) {
            let err = SessionError::PlanRestricted {
                plan: self.settings.plan,
                difficulty: self.difficulty,
            };
            self.load_error = Some(err.to_string());
            return Err(err);
        }

        self.loading = true;
        self.load_error = None;
        Ok(())
    }

    /// Apply the provider's answer to an outstanding request.
    pub fn complete_load(&mut self, outcome: Result<String, ProviderError>) -> SessionResult<()> {
        self.expect_status("complete load", &[Status::Idle])?;
        if !self.loading {
            return Err(SessionError::invalid("complete load", self.status));
        }
        self.loading = false;

        match outcome {
            Ok(sentence) => {
                self.target = sentence;
                self.typed.clear();
                self.transition(Status::Loaded);
                Ok(())
            }
            Err(err) => {
                warn!(session = self.id, difficulty = %self.difficulty, error = %err, "sentence load failed");
                let err = SessionError::from(err);
                self.load_error = Some(err.to_string());
                Err(err)
            }
        }
    }

    /// A sentence has been requested and not answered yet
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    /// Enter the cosmetic pre-start phase
    pub fn arm(&mut self) -> SessionResult<()> {
        self.expect_status("arm", &[Status::Loaded])?;
        self.transition(Status::Armed);
        Ok(())
    }

    /// Start the attempt on the first qualifying key.
    ///
    /// Returns `Ok(true)` only for the call that started the session; later
    /// calls while active and non-qualifying keys are no-ops.
    pub fn first_input(&mut self, key: Keystroke, now: Instant) -> SessionResult<bool> {
        if !key.qualifies() || self.status == Status::Active {
            return Ok(false);
        }
        self.expect_status("start typing", &[Status::Loaded, Status::Armed])?;

        self.started_at = Some(now);
        self.countdown.start(now);
        self.sampler.start(now);
        self.transition(Status::Active);
        Ok(true)
    }

    /// Replace the typed buffer and recompute live metrics.
    ///
    /// Finishes the session when the trimmed buffer equals the trimmed
    /// target and returns the produced result in that case.
    pub fn update(&mut self, typed: &str, now: Instant) -> SessionResult<Option<TypingResult>> {
        self.expect_status("update", &[Status::Active])?;

        self.typed = typed.to_string();
        self.snapshot = MetricSnapshot::compute(&self.target, &self.typed, self.elapsed(now));
        self.events.push(SessionEvent::Metrics(self.snapshot));

        if self.typed.trim() == self.target.trim() {
            debug!(session = self.id, "target fully typed");
            return self.finish(now).map(Some);
        }
        Ok(None)
    }

    /// Advance the countdown and sampler.
    ///
    /// Returns the result if the countdown expired during this call.
    pub fn poll(&mut self, now: Instant) -> Option<TypingResult> {
        if self.status != Status::Active {
            return None;
        }

        if let Some(started_at) = self.started_at {
            self.sampler.poll(now, &self.typed, started_at);
        }

        let tick = self.countdown.poll(now)?;
        self.events.push(SessionEvent::Countdown(tick));
        if tick.expired {
            info!(session = self.id, "countdown expired");
            return self.finish(now).ok();
        }
        None
    }

    /// End the attempt and produce its result.
    ///
    /// Calling again after the session finished returns the same result and
    /// emits nothing.
    pub fn finish(&mut self, now: Instant) -> SessionResult<TypingResult> {
        if let Some(result) = &self.result {
            return Ok(result.clone());
        }
        self.expect_status("finish", &[Status::Active])?;

        self.countdown.stop();
        self.sampler.stop();

        let elapsed = self.elapsed(now);
        self.snapshot = MetricSnapshot::compute(&self.target, &self.typed, elapsed);
        let elapsed_seconds = (elapsed.as_millis() as f64 / 1000.0)
            .round()
            .min(self.countdown.total_secs() as f64) as u64;

        let result = TypingResult {
            participant: self.settings.participant.clone(),
            plan: self.settings.plan,
            difficulty: self.difficulty,
            wpm: self.snapshot.wpm,
            accuracy: self.snapshot.accuracy,
            elapsed_seconds,
            status: ResultStatus::Completed,
            created_at: Local::now(),
        };

        self.result = Some(result.clone());
        self.transition(Status::Finished);
        info!(
            session = self.id,
            wpm = result.wpm,
            accuracy = result.accuracy,
            elapsed_seconds,
            "session finished"
        );
        self.events.push(SessionEvent::Finished(result.clone()));
        Ok(result)
    }

    /// Input focus went away; sampling pauses but the attempt continues
    pub fn focus_lost(&mut self) {
        self.sampler.stop();
    }

    /// Stop every timer owned by this session
    pub fn cancel(&mut self) {
        if self.countdown.is_running() || self.sampler.is_running() {
            debug!(session = self.id, "cancelling session timers");
        }
        self.countdown.stop();
        self.sampler.stop();
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    fn elapsed(&self, now: Instant) -> Duration {
        self.started_at
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default()
    }

    fn expect_status(&self, action: &'static str, allowed: &[Status]) -> SessionResult<()> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(SessionError::invalid(action, self.status))
        }
    }

    fn transition(&mut self, to: Status) {
        let from = self.status;
        self.status = to;
        debug!(session = self.id, ?from, ?to, "transition");
        self.events.push(SessionEvent::Transition { from, to });
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn difficulty(&self) -> Difficulty {
        self.difficulty
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn typed(&self) -> &str {
        &self.typed
    }

    pub fn started_at(&self) -> Option<Instant> {
        self.started_at
    }

    pub fn snapshot(&self) -> MetricSnapshot {
        self.snapshot
    }

    pub fn countdown(&self) -> &Countdown {
        &self.countdown
    }

    pub fn sampler(&self) -> &LiveSampler {
        &self.sampler
    }

    pub fn result(&self) -> Option<&TypingResult> {
        self.result.as_ref()
    }

    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    pub fn char_states(&self) -> Vec<CharState> {
        char_states(&self.target, &self.typed)
    }

    pub fn is_finished(&self) -> bool {
        self.status == Status::Finished
    }
}
