use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use crate::session::Session;

pub const APP_NAME: &str = "dyscover";
pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8443";
const HISTORY_LIMIT: usize = 50;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub server_url: String,
    pub timeout_secs: u64,
    /// Prefill for the username screen only.
    pub last_username: String,
    pub last_class_name: String,
    pub learning: HashMap<String, Vec<u32>>, // username -> practice accuracy per session (%)
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER.to_string(),
            timeout_secs: 30,
            last_username: String::new(),
            last_class_name: String::new(),
            learning: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load from `path`, or from the platform config dir when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, confy::ConfyError> {
        match path {
            Some(path) => confy::load_path(path),
            None => confy::load(APP_NAME, None),
        }
    }

    pub fn store(&self, path: Option<&Path>) -> Result<(), confy::ConfyError> {
        match path {
            Some(path) => confy::store_path(path, self),
            None => confy::store(APP_NAME, None, self),
        }
    }

    /// Server URL and request timeout for this run. Command-line overrides win
    /// but are never copied into the stored settings.
    pub fn connection(&self, server: Option<&str>, timeout_secs: Option<u64>) -> (String, Duration) {
        let server = server.unwrap_or(self.server_url.as_str()).to_string();
        let timeout = Duration::from_secs(timeout_secs.unwrap_or(self.timeout_secs));
        (server, timeout)
    }

    pub fn remember(&mut self, session: &Session) {
        self.last_username = session.username().to_string();
        self.last_class_name = session.class_name().to_string();
    }

    pub fn record_learning(&mut self, username: &str, accuracy: u32) {
        let scores = self.learning.entry(username.to_string()).or_default();
        scores.push(accuracy.min(100));
        if scores.len() > HISTORY_LIMIT {
            let excess = scores.len() - HISTORY_LIMIT;
            scores.drain(..excess);
        }
    }

    pub fn learning_history(&self, username: &str) -> &[u32] {
        self.learning
            .get(username)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}
