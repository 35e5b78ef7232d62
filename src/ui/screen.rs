use ratatui::{buffer::Buffer, layout::Rect};

use crate::app::{AppState, View};
use crate::ui::{render_history, render_results, render_typing};

/// A UI screen boundary: renders one application state
pub trait Screen {
    fn render(&self, view: &View<'_>, area: Rect, buf: &mut Buffer);
}

pub struct TypingScreen;

impl Screen for TypingScreen {
    fn render(&self, view: &View<'_>, area: Rect, buf: &mut Buffer) {
        render_typing(view, area, buf);
    }
}

pub struct ResultsScreen;

impl Screen for ResultsScreen {
    fn render(&self, view: &View<'_>, area: Rect, buf: &mut Buffer) {
        render_results(view, area, buf);
    }
}

pub struct HistoryScreen;

impl Screen for HistoryScreen {
    fn render(&self, view: &View<'_>, area: Rect, buf: &mut Buffer) {
        render_history(view, area, buf);
    }
}

/// Screen for the current state
pub fn current_screen(state: AppState) -> Box<dyn Screen> {
    match state {
        AppState::Typing => Box::new(TypingScreen),
        AppState::Results => Box::new(ResultsScreen),
        AppState::History => Box::new(HistoryScreen),
    }
}
