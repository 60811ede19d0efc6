// src/testing.rs

//! Test doubles for the checker collaborators.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{AppError, Result};
use crate::services::{Fetcher, Notifier};

type Response = std::result::Result<String, String>;

/// Fetcher answering from per-URL scripts.
///
/// Responses are consumed in order; the last one repeats forever. URLs without
/// a script fail like a 404.
#[derive(Default)]
pub struct ScriptedFetcher {
    scripts: Mutex<HashMap<String, VecDeque<Response>>>,
    counts: Mutex<HashMap<String, usize>>,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn always(self, url: &str, body: &str) -> Self {
        self.sequence(url, &[body])
    }

    pub fn sequence(self, url: &str, bodies: &[&str]) -> Self {
        self.push(url, bodies.iter().map(|b| Ok(b.to_string())));
        self
    }

    /// Fail every fetch after the scripted ones.
    pub fn then_fail(self, url: &str) -> Self {
        self.push(url, [Err("connection refused".to_string())]);
        self
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        let counts = self.counts.lock().unwrap();
        counts.get(url).copied().unwrap_or(0)
    }

    fn push(&self, url: &str, responses: impl IntoIterator<Item = Response>) {
        let mut scripts = self.scripts.lock().unwrap();
        scripts.entry(url.to_string()).or_default().extend(responses);
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<String> {
        *self.counts.lock().unwrap().entry(url.to_string()).or_default() += 1;

        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts
            .get_mut(url)
            .filter(|q| !q.is_empty())
            .ok_or_else(|| AppError::fetch(url, "Invalid http code: 404"))?;

        let response = if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        };
        response.map_err(|message| AppError::fetch(url, message))
    }
}

/// Notifier that records every report it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    reports: Mutex<Vec<Vec<String>>>,
    fail: bool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record reports but answer every call with an error.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn reports(&self) -> Vec<Vec<String>> {
        self.reports.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, lines: &[String]) -> Result<()> {
        self.reports.lock().unwrap().push(lines.to_vec());
        if self.fail {
            return Err(AppError::notify("smtp server unreachable"));
        }
        Ok(())
    }
}
