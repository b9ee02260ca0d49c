use crate::error::TransportError;
use sha2::{Digest, Sha256};
use std::cell::Cell;
use std::collections::BTreeMap;

/// The statement-sending library the engine hands finished statements to.
pub trait StatementTransport {
    /// Send a fully assembled statement, returning the id the store
    /// acknowledged.
    fn send(&mut self, statement: &serde_json::Value) -> Result<String, TransportError>;

    /// Hash an identifier such as a `mailto:` IRI.
    fn hash(&self, input: &str) -> String;

    /// Fetch a previously sent statement by id.
    fn fetch(&self, id: &str) -> Option<serde_json::Value>;
}

/// Keeps sent statements in memory, keyed by their `id`.
#[derive(Debug, Default)]
pub struct RecordingTransport {
    statements: BTreeMap<String, serde_json::Value>,
    sent: Vec<String>,
    fail_next: Option<TransportError>,
    fetches: Cell<usize>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `send` fail with `error`.
    pub fn fail_next(&mut self, error: TransportError) {
        self.fail_next = Some(error);
    }

    /// Statements in the order they were sent.
    pub fn sent(&self) -> impl Iterator<Item = &serde_json::Value> {
        self.sent.iter().filter_map(|id| self.statements.get(id))
    }

    pub fn last(&self) -> Option<&serde_json::Value> {
        self.sent.last().and_then(|id| self.statements.get(id))
    }

    /// How many times `fetch` has been called.
    pub fn fetch_count(&self) -> usize {
        self.fetches.get()
    }
}

impl StatementTransport for RecordingTransport {
    fn send(&mut self, statement: &serde_json::Value) -> Result<String, TransportError> {
        if let Some(error) = self.fail_next.take() {
            return Err(error);
        }
        let id = statement
            .get("id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| TransportError {
                status: Some(400),
                message: "statement has no id".to_string(),
            })?
            .to_string();
        self.statements.insert(id.clone(), statement.clone());
        self.sent.push(id.clone());
        Ok(id)
    }

    fn hash(&self, input: &str) -> String {
        let digest = Sha256::digest(input.as_bytes());
        digest.iter().map(|b| format!("{:02x}", b)).collect()
    }

    fn fetch(&self, id: &str) -> Option<serde_json::Value> {
        self.fetches.set(self.fetches.get() + 1);
        self.statements.get(id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_and_fetches() {
        let mut transport = RecordingTransport::new();
        let statement = json!({"id": "abc", "verb": {"id": "v"}});
        assert_eq!(transport.send(&statement).unwrap(), "abc");
        assert_eq!(transport.fetch("abc"), Some(statement.clone()));
        assert_eq!(transport.fetch("nope"), None);
        assert_eq!(transport.fetch_count(), 2);
        assert_eq!(transport.sent().count(), 1);
        assert_eq!(transport.last(), Some(&statement));
    }

    #[test]
    fn injected_failure_is_one_shot() {
        let mut transport = RecordingTransport::new();
        transport.fail_next(TransportError::new("offline"));
        let statement = json!({"id": "abc"});
        assert!(transport.send(&statement).is_err());
        assert!(transport.send(&statement).is_ok());
    }

    #[test]
    fn rejects_statements_without_id() {
        let mut transport = RecordingTransport::new();
        let err = transport.send(&json!({})).unwrap_err();
        assert_eq!(err.status, Some(400));
    }

    #[test]
    fn hashes_to_hex() {
        let transport = RecordingTransport::new();
        let hash = transport.hash("mailto:ann@example.com");
        assert_eq!(hash.len(), 64);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash, transport.hash("mailto:ann@example.com"));
    }
}
