//! Sentence loading off the UI thread.
//!
//! The exercise asks a [`SentenceLoader`] for a sentence and picks the
//! answer up later with [`SentenceLoader::poll_reply`]. Replies carry the id
//! of the session that asked, so an answer for a session that has since been
//! replaced can be told apart and dropped.

use crate::difficulty::Difficulty;
use crate::error::ProviderError;
use crate::provider::{request_fresh, RecentSentences, SentenceProvider};
use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use tracing::{debug, error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadRequest {
    pub session: u64,
    pub difficulty: Difficulty,
}

#[derive(Debug)]
pub struct LoadReply {
    pub session: u64,
    pub difficulty: Difficulty,
    pub outcome: Result<String, ProviderError>,
}

pub trait SentenceLoader {
    /// Ask for a sentence. Never blocks on the provider.
    fn request(&mut self, request: LoadRequest);

    /// Next finished load, if any
    fn poll_reply(&mut self) -> Option<LoadReply>;
}

/// Answers on the calling thread. Fine for the embedded corpus and tests.
pub struct InlineLoader<P> {
    provider: P,
    recent: RecentSentences,
    ready: VecDeque<LoadReply>,
}

impl<P: SentenceProvider> InlineLoader<P> {
    pub fn new(provider: P) -> Self {
        Self {
            provider,
            recent: RecentSentences::new(),
            ready: VecDeque::new(),
        }
    }
}

impl<P: SentenceProvider> SentenceLoader for InlineLoader<P> {
    fn request(&mut self, request: LoadRequest) {
        let outcome = request_fresh(&self.provider, request.difficulty, &mut self.recent);
        self.ready.push_back(LoadReply {
            session: request.session,
            difficulty: request.difficulty,
            outcome,
        });
    }

    fn poll_reply(&mut self) -> Option<LoadReply> {
        self.ready.pop_front()
    }
}

/// Runs the provider on its own thread and hands replies back over a channel.
///
/// The thread exits once the loader is dropped and any request in progress
/// has returned.
pub struct BackgroundLoader {
    tx: Sender<LoadRequest>,
    rx: Receiver<LoadReply>,
    failed: VecDeque<LoadReply>,
}

impl BackgroundLoader {
    pub fn spawn<P: SentenceProvider + Send + 'static>(provider: P) -> Self {
        let (tx, requests) = mpsc::channel();
        let (replies, rx) = mpsc::channel();
        thread::spawn(move || run_loader(&provider, &requests, &replies));
        Self {
            tx,
            rx,
            failed: VecDeque::new(),
        }
    }
}

impl SentenceLoader for BackgroundLoader {
    fn request(&mut self, request: LoadRequest) {
        if self.tx.send(request).is_err() {
            error!(session = request.session, "sentence loader thread is gone");
            self.failed.push_back(LoadReply {
                session: request.session,
                difficulty: request.difficulty,
                outcome: Err(ProviderError::Transport("sentence loader stopped".into())),
            });
        }
    }

    fn poll_reply(&mut self) -> Option<LoadReply> {
        self.failed.pop_front().or_else(|| self.rx.try_recv().ok())
    }
}

fn run_loader<P: SentenceProvider + ?Sized>(
    provider: &P,
    requests: &Receiver<LoadRequest>,
    replies: &Sender<LoadReply>,
) {
    let mut recent = RecentSentences::new();
    while let Ok(mut request) = requests.recv() {
        // only the newest request still has a session waiting on it
        for newer in requests.try_iter() {
            debug!(session = request.session, "superseded sentence request");
            request = newer;
        }
        let outcome = request_fresh(provider, request.difficulty, &mut recent);
        let reply = LoadReply {
            session: request.session,
            difficulty: request.difficulty,
            outcome,
        };
        if replies.send(reply).is_err() {
            break;
        }
    }
    debug!("sentence loader stopped");
}
