//! Remote result store contract and its HTTP implementation.

use crate::error::RemoteError;
use crate::record::{LegacyPayload, TypingResult};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

pub const PRIMARY_PATH: &str = "/save_result";
pub const LEGACY_PATH: &str = "/api/save_run";

/// Classified result of one delivery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
#[strum(serialize_all = "lowercase")]
pub enum DeliveryOutcome {
    Accepted,
    Rejected,
    Unreachable,
}

impl DeliveryOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, DeliveryOutcome::Accepted)
    }
}

/// Where finished results are delivered.
///
/// `Err(Unreachable)` means the request never got an answer;
/// `Err(Rejected)` means the service answered with a failure.
pub trait ResultStore {
    fn submit_primary(&self, result: &TypingResult) -> Result<(), RemoteError>;

    fn submit_fallback(&self, payload: &LegacyPayload) -> Result<(), RemoteError>;

    /// Cheap probe used by the connectivity monitor
    fn is_reachable(&self) -> bool;
}

impl<R: ResultStore + ?Sized> ResultStore for &R {
    fn submit_primary(&self, result: &TypingResult) -> Result<(), RemoteError> {
        (**self).submit_primary(result)
    }

    fn submit_fallback(&self, payload: &LegacyPayload) -> Result<(), RemoteError> {
        (**self).submit_fallback(payload)
    }

    fn is_reachable(&self) -> bool {
        (**self).is_reachable()
    }
}

impl<R: ResultStore + ?Sized> ResultStore for Box<R> {
    fn submit_primary(&self, result: &TypingResult) -> Result<(), RemoteError> {
        (**self).submit_primary(result)
    }

    fn submit_fallback(&self, payload: &LegacyPayload) -> Result<(), RemoteError> {
        (**self).submit_fallback(payload)
    }

    fn is_reachable(&self) -> bool {
        (**self).is_reachable()
    }
}

/// Try the primary endpoint, then the legacy one if the primary refused.
///
/// A transport failure on the primary endpoint is reported as unreachable
/// straight away, since the legacy endpoint lives on the same host.
pub fn deliver<R: ResultStore + ?Sized>(remote: &R, result: &TypingResult) -> DeliveryOutcome {
    match remote.submit_primary(result) {
        Ok(()) => DeliveryOutcome::Accepted,
        Err(RemoteError::Unreachable(reason)) => {
            warn!(%reason, "result service unreachable");
            DeliveryOutcome::Unreachable
        }
        Err(RemoteError::Rejected(reason)) => {
            debug!(%reason, "primary endpoint refused result, trying legacy endpoint");
            match remote.submit_fallback(&result.legacy_payload()) {
                Ok(()) => DeliveryOutcome::Accepted,
                Err(RemoteError::Unreachable(reason)) => {
                    warn!(%reason, "legacy endpoint unreachable");
                    DeliveryOutcome::Unreachable
                }
                Err(RemoteError::Rejected(reason)) => {
                    warn!(%reason, "legacy endpoint refused result");
                    DeliveryOutcome::Rejected
                }
            }
        }
    }
}

/// Used when no service is configured; every attempt stays queued
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineResultStore;

impl ResultStore for OfflineResultStore {
    fn submit_primary(&self, _result: &TypingResult) -> Result<(), RemoteError> {
        Err(RemoteError::Unreachable("no result service configured".into()))
    }

    fn submit_fallback(&self, _payload: &LegacyPayload) -> Result<(), RemoteError> {
        Err(RemoteError::Unreachable("no result service configured".into()))
    }

    fn is_reachable(&self) -> bool {
        false
    }
}

#[derive(Debug, Default, Deserialize)]
struct Ack {
    success: Option<bool>,
    ok: Option<bool>,
    message: Option<String>,
    error: Option<String>,
}

/// Decide whether a response acknowledges the submission.
///
/// The status must be a success and the body must not carry
/// `success: false` or `ok: false`. Bodies that are not JSON count as
/// acknowledged when the status is fine.
pub fn classify_ack(status: u16, body: &str) -> Result<(), RemoteError> {
    let ack: Ack = serde_json::from_str(body).unwrap_or_default();
    let flagged_failure = ack.success == Some(false) || ack.ok == Some(false);

    if (200..300).contains(&status) && !flagged_failure {
        return Ok(());
    }

    let reason = ack
        .message
        .or(ack.error)
        .unwrap_or_else(|| format!("status {status}"));
    Err(RemoteError::Rejected(reason))
}

/// Talks to the result service over HTTP with a per-request timeout
#[derive(Debug, Clone)]
pub struct HttpResultStore {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl HttpResultStore {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn post<T: serde::Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), RemoteError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .map_err(|e| RemoteError::Unreachable(e.to_string()))?;
        debug!(%url, status, "result service answered");
        classify_ack(status, &text)
    }
}

impl ResultStore for HttpResultStore {
    fn submit_primary(&self, result: &TypingResult) -> Result<(), RemoteError> {
        self.post(PRIMARY_PATH, result)
    }

    fn submit_fallback(&self, payload: &LegacyPayload) -> Result<(), RemoteError> {
        self.post(LEGACY_PATH, payload)
    }

    fn is_reachable(&self) -> bool {
        self.client.head(&self.base_url).send().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::difficulty::{Difficulty, Plan};
    use crate::record::ResultStatus;
    use assert_matches::assert_matches;
    use chrono::Local;
    use std::cell::RefCell;

    fn result() -> TypingResult {
        TypingResult {
            participant: "guest".into(),
            plan: Plan::Free,
            difficulty: Difficulty::Easy,
            wpm: 40,
            accuracy: 95,
            elapsed_seconds: 21,
            status: ResultStatus::Completed,
            created_at: Local::now(),
        }
    }

    /// Answers each endpoint with a fixed outcome and records the calls
    struct Fixed {
        primary: fn() -> Result<(), RemoteError>,
        fallback: fn() -> Result<(), RemoteError>,
        calls: RefCell<Vec<&'static str>>,
    }

    impl Fixed {
        fn new(
            primary: fn() -> Result<(), RemoteError>,
            fallback: fn() -> Result<(), RemoteError>,
        ) -> Self {
            Self {
                primary,
                fallback,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ResultStore for Fixed {
        fn submit_primary(&self, _result: &TypingResult) -> Result<(), RemoteError> {
            self.calls.borrow_mut().push("primary");
            (self.primary)()
        }

        fn submit_fallback(&self, _payload: &LegacyPayload) -> Result<(), RemoteError> {
            self.calls.borrow_mut().push("fallback");
            (self.fallback)()
        }

        fn is_reachable(&self) -> bool {
            true
        }
    }

    fn ok() -> Result<(), RemoteError> {
        Ok(())
    }

    fn rejected() -> Result<(), RemoteError> {
        Err(RemoteError::Rejected("nope".into()))
    }

    fn down() -> Result<(), RemoteError> {
        Err(RemoteError::Unreachable("timeout".into()))
    }

    #[test]
    fn test_primary_accepts() {
        let remote = Fixed::new(ok, rejected);
        assert_eq!(deliver(&remote, &result()), DeliveryOutcome::Accepted);
        assert_eq!(*remote.calls.borrow(), vec!["primary"]);
    }

    #[test]
    fn test_primary_refused_legacy_accepts() {
        let remote = Fixed::new(rejected, ok);
        assert_eq!(deliver(&remote, &result()), DeliveryOutcome::Accepted);
        assert_eq!(*remote.calls.borrow(), vec!["primary", "fallback"]);
    }

    #[test]
    fn test_both_refuse() {
        let remote = Fixed::new(rejected, rejected);
        assert_eq!(deliver(&remote, &result()), DeliveryOutcome::Rejected);
    }

    #[test]
    fn test_primary_refused_legacy_down() {
        let remote = Fixed::new(rejected, down);
        assert_eq!(deliver(&remote, &result()), DeliveryOutcome::Unreachable);
    }

    #[test]
    fn test_primary_down_skips_legacy() {
        let remote = Fixed::new(down, ok);
        assert_eq!(deliver(&remote, &result()), DeliveryOutcome::Unreachable);
        assert_eq!(*remote.calls.borrow(), vec!["primary"]);
    }

    #[test]
    fn test_classify_ack() {
        assert!(classify_ack(200, r#"{"success": true}"#).is_ok());
        assert!(classify_ack(201, r#"{"ok": true, "message": "saved"}"#).is_ok());
        assert!(classify_ack(200, "").is_ok());
        assert_matches!(
            classify_ack(200, r#"{"success": false, "message": "bad plan"}"#),
            Err(RemoteError::Rejected(reason)) if reason == "bad plan"
        );
        assert_matches!(
            classify_ack(500, "internal error"),
            Err(RemoteError::Rejected(reason)) if reason == "status 500"
        );
        assert_matches!(
            classify_ack(400, r#"{"error": "missing wpm"}"#),
            Err(RemoteError::Rejected(reason)) if reason == "missing wpm"
        );
    }

    #[test]
    fn test_offline_store_is_unreachable() {
        assert_eq!(
            deliver(&OfflineResultStore, &result()),
            DeliveryOutcome::Unreachable
        );
        assert!(!OfflineResultStore.is_reachable());
    }

    #[test]
    fn test_http_store_unreachable() {
        let remote =
            HttpResultStore::new("http://127.0.0.1:9/", Duration::from_millis(200)).unwrap();
        assert_eq!(remote.base_url(), "http://127.0.0.1:9");
        assert_matches!(
            remote.submit_primary(&result()),
            Err(RemoteError::Unreachable(_))
        );
        assert!(!remote.is_reachable());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(DeliveryOutcome::Unreachable.to_string(), "unreachable");
    }
}
