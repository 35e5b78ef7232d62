use crate::difficulty::Difficulty;
use crate::error::ProviderError;
use crate::store::LocalStore;
use include_dir::{include_dir, Dir};
use rand::seq::SliceRandom;
use serde::Deserialize;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tracing::{debug, warn};

static CORPUS_DIR: Dir = include_dir!("$CARGO_MANIFEST_DIR/src/corpus");

/// How many recently shown sentences per difficulty are avoided
pub const RECENT_WINDOW: usize = 5;

/// Extra requests made when the provider keeps returning recent sentences
pub const MAX_REROLLS: usize = 3;

/// Supplies target sentences for a difficulty tier
pub trait SentenceProvider {
    fn request(&self, difficulty: Difficulty) -> Result<String, ProviderError>;
}

impl<P: SentenceProvider + ?Sized> SentenceProvider for Box<P> {
    fn request(&self, difficulty: Difficulty) -> Result<String, ProviderError> {
        (**self).request(difficulty)
    }
}

impl<P: SentenceProvider + ?Sized> SentenceProvider for &P {
    fn request(&self, difficulty: Difficulty) -> Result<String, ProviderError> {
        (**self).request(difficulty)
    }
}

/// Sentences bundled into the binary, grouped by difficulty
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct CorpusProvider {
    sentences: HashMap<Difficulty, Vec<String>>,
}

impl CorpusProvider {
    pub fn embedded() -> Result<Self, ProviderError> {
        let file = CORPUS_DIR
            .get_file("sentences.json")
            .ok_or_else(|| ProviderError::Transport("embedded corpus missing".into()))?;
        let contents = file
            .contents_utf8()
            .ok_or_else(|| ProviderError::Transport("embedded corpus is not UTF-8".into()))?;
        Self::from_json(contents)
    }

    pub fn from_json(json: &str) -> Result<Self, ProviderError> {
        serde_json::from_str(json).map_err(|e| ProviderError::Transport(e.to_string()))
    }

    pub fn from_sentences<I, S>(difficulty: Difficulty, sentences: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut map = HashMap::new();
        map.insert(difficulty, sentences.into_iter().map(Into::into).collect());
        Self { sentences: map }
    }

    pub fn count(&self, difficulty: Difficulty) -> usize {
        self.sentences.get(&difficulty).map_or(0, Vec::len)
    }
}

impl SentenceProvider for CorpusProvider {
    fn request(&self, difficulty: Difficulty) -> Result<String, ProviderError> {
        self.sentences
            .get(&difficulty)
            .and_then(|pool| pool.choose(&mut rand::thread_rng()))
            .cloned()
            .ok_or(ProviderError::Empty(difficulty))
    }
}

#[derive(Debug, Deserialize)]
struct SentenceResponse {
    sentence: String,
}

/// Fetches sentences from `GET {base}/api/sentences?difficulty=<tier>`
#[derive(Debug, Clone)]
pub struct HttpSentenceProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpSentenceProvider {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

impl SentenceProvider for HttpSentenceProvider {
    fn request(&self, difficulty: Difficulty) -> Result<String, ProviderError> {
        let url = format!("{}/api/sentences", self.base_url);
        let response = self
            .client
            .get(url)
            .query(&[("difficulty", difficulty.to_string())])
            .send()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ProviderError::Status(response.status().as_u16()));
        }

        let body: SentenceResponse = response
            .json()
            .map_err(|e| ProviderError::Transport(e.to_string()))?;
        if body.sentence.trim().is_empty() {
            return Err(ProviderError::Empty(difficulty));
        }
        Ok(body.sentence)
    }
}

/// Remembers the last good sentence per tier and serves it when the inner
/// provider fails.
pub struct CachingProvider<P, S> {
    inner: P,
    store: S,
}

impl<P, S> CachingProvider<P, S> {
    pub fn new(inner: P, store: S) -> Self {
        Self { inner, store }
    }
}

impl<P: SentenceProvider, S: LocalStore> SentenceProvider for CachingProvider<P, S> {
    fn request(&self, difficulty: Difficulty) -> Result<String, ProviderError> {
        match self.inner.request(difficulty) {
            Ok(sentence) => {
                if let Err(e) = self.store.save_last_sentence(difficulty, &sentence) {
                    warn!(error = %e, "could not cache sentence");
                }
                Ok(sentence)
            }
            Err(err) => match self.store.last_sentence(difficulty) {
                Ok(Some(cached)) => {
                    warn!(error = %err, %difficulty, "sentence provider failed, using cached sentence");
                    Ok(cached)
                }
                _ => Err(err),
            },
        }
    }
}

/// Sliding window of recently shown sentences, per difficulty
#[derive(Debug, Clone, Default)]
pub struct RecentSentences {
    shown: HashMap<Difficulty, VecDeque<String>>,
}

impl RecentSentences {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, difficulty: Difficulty, sentence: &str) -> bool {
        self.shown
            .get(&difficulty)
            .is_some_and(|recent| recent.iter().any(|s| s == sentence))
    }

    pub fn record(&mut self, difficulty: Difficulty, sentence: &str) {
        let recent = self.shown.entry(difficulty).or_default();
        recent.push_back(sentence.to_string());
        while recent.len() > RECENT_WINDOW {
            recent.pop_front();
        }
    }

    pub fn len(&self, difficulty: Difficulty) -> usize {
        self.shown.get(&difficulty).map_or(0, VecDeque::len)
    }
}

/// Request a sentence, re-requesting up to `MAX_REROLLS` times while the
/// provider returns one of the recently shown sentences. After the cap, or
/// when a re-request fails, the repeat already in hand is accepted. The
/// chosen sentence is recorded as shown.
pub fn request_fresh<P: SentenceProvider + ?Sized>(
    provider: &P,
    difficulty: Difficulty,
    recent: &mut RecentSentences,
) -> Result<String, ProviderError> {
    let mut sentence = provider.request(difficulty)?;
    let mut rerolls = 0;
    while recent.contains(difficulty, &sentence) && rerolls < MAX_REROLLS {
        debug!(%difficulty, rerolls, "duplicate sentence, requesting another");
        rerolls += 1;
        match provider.request(difficulty) {
            Ok(next) => sentence = next,
            Err(e) => {
                warn!(%difficulty, error = %e, "re-request failed, keeping the repeat");
                break;
            }
        }
    }
    recent.record(difficulty, &sentence);
    Ok(sentence)
}
