//! Screen state and key bindings on top of [`Exercise`].

use crate::difficulty::Difficulty;
use crate::exercise::{Exercise, FinishSummary, Input};
use crate::loader::SentenceLoader;
use crate::session::{Keystroke, Session, Status};
use crate::store::LocalStore;
use crate::sync::{HistoryRow, QueueView, ResultSink, SyncStatus, HISTORY_VIEW_LIMIT};
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use std::time::Instant;
use tracing::error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppState {
    Typing,
    Results,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Everything the renderer needs, borrowed from the app
pub struct View<'a> {
    pub state: AppState,
    pub difficulty: Difficulty,
    pub session: Option<&'a Session>,
    pub summary: Option<&'a FinishSummary>,
    pub sync: SyncStatus,
    pub history: &'a [HistoryRow],
}

pub struct App<L, K, B> {
    exercise: Exercise<L, K, B>,
    state: AppState,
    sync: SyncStatus,
    history: Vec<HistoryRow>,
}

impl<L, K, B> App<L, K, B>
where
    L: SentenceLoader,
    K: ResultSink + QueueView,
    B: LocalStore,
{
    pub fn new(exercise: Exercise<L, K, B>) -> Self {
        Self {
            exercise,
            state: AppState::Typing,
            sync: SyncStatus::default(),
            history: Vec::new(),
        }
    }

    /// Load the first sentence
    pub fn start(&mut self, now: Instant) {
        self.new_session(Input::Load, now);
    }

    fn new_session(&mut self, input: Input, now: Instant) {
        self.exercise.dispatch(input, now);
        self.exercise.dispatch(Input::Arm, now);
        self.state = AppState::Typing;
    }

    pub fn on_tick(&mut self, now: Instant) {
        self.exercise.dispatch(Input::Tick, now);
        if let Some(status) = self.exercise.sink().latest_status() {
            self.sync = status;
            if self.state == AppState::History {
                self.refresh_history();
            }
        }
        self.follow_session();
    }

    pub fn on_focus_lost(&mut self, now: Instant) {
        self.exercise.dispatch(Input::FocusLost, now);
    }

    pub fn on_key(&mut self, key: KeyEvent, now: Instant) -> Flow {
        let ctrl_c =
            key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c');
        if key.code == KeyCode::Esc || ctrl_c {
            return Flow::Quit;
        }

        match self.state {
            AppState::Typing => self.typing_key(key, now),
            AppState::Results => match key.code {
                KeyCode::Char('r') | KeyCode::Char('n') | KeyCode::Enter => {
                    self.new_session(Input::Retry, now)
                }
                KeyCode::Tab => self.cycle_difficulty(now),
                KeyCode::Char('h') => self.show_history(),
                _ => {}
            },
            AppState::History => match key.code {
                KeyCode::Char('b') | KeyCode::Backspace => {
                    self.state = if self.exercise.summary().is_some() {
                        AppState::Results
                    } else {
                        AppState::Typing
                    };
                }
                KeyCode::Char('r') | KeyCode::Char('n') => self.new_session(Input::Retry, now),
                _ => {}
            },
        }
        Flow::Continue
    }

    fn typing_key(&mut self, key: KeyEvent, now: Instant) {
        let status = self.exercise.session().map(Session::status);
        match (status, key.code) {
            (Some(Status::Active), KeyCode::Enter) => {
                self.exercise.dispatch(Input::Submit, now);
            }
            (Some(Status::Active), KeyCode::Tab) => {}
            (_, KeyCode::Tab) => self.cycle_difficulty(now),
            (_, KeyCode::Left) => self.new_session(Input::Retry, now),
            // a failed load leaves nothing to type into
            (Some(Status::Idle) | None, KeyCode::Char('r')) => self.new_session(Input::Retry, now),
            (Some(Status::Idle) | None, KeyCode::Char('h')) => self.show_history(),
            (Some(Status::Idle) | None, _) => {}
            _ => {
                if let Some(stroke) = keystroke(key) {
                    self.exercise.dispatch(Input::Key(stroke), now);
                }
            }
        }
        self.follow_session();
    }

    fn cycle_difficulty(&mut self, now: Instant) {
        let next = self.exercise.difficulty().next();
        self.new_session(Input::SetDifficulty(next), now);
    }

    fn show_history(&mut self) {
        self.refresh_history();
        self.state = AppState::History;
    }

    fn refresh_history(&mut self) {
        match self.exercise.sink().history_view(HISTORY_VIEW_LIMIT) {
            Ok(rows) => self.history = rows,
            Err(e) => error!(error = %e, "could not read history"),
        }
    }

    fn follow_session(&mut self) {
        if self.state == AppState::Typing && self.exercise.summary().is_some() {
            self.state = AppState::Results;
        }
    }

    pub fn state(&self) -> AppState {
        self.state
    }

    pub fn exercise(&self) -> &Exercise<L, K, B> {
        &self.exercise
    }

    pub fn view(&self) -> View<'_> {
        View {
            state: self.state,
            difficulty: self.exercise.difficulty(),
            session: self.exercise.session(),
            summary: self.exercise.summary(),
            sync: self.sync,
            history: &self.history,
        }
    }
}

/// Map a terminal key to session input; `None` for keys the session ignores.
/// Characters chorded with Ctrl or Alt are shortcuts, not text.
pub fn keystroke(key: KeyEvent) -> Option<Keystroke> {
    match key.code {
        KeyCode::Char(_) if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) => {
            None
        }
        KeyCode::Char(c) => Some(Keystroke::Char(c)),
        KeyCode::Backspace => Some(Keystroke::Backspace),
        KeyCode::Modifier(_) | KeyCode::CapsLock => Some(Keystroke::Modifier),
        _ => None,
    }
}
