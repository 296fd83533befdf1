//! Short-window response cache absorbing voice-platform retries.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::types::ChatMessage;

/// How long a completed response stays replayable.
pub const DEDUP_WINDOW: Duration = Duration::from_secs(15);

const FINGERPRINT_TAIL: usize = 3;
const FINGERPRINT_CONTENT_CHARS: usize = 200;

/// Cache key summarizing the conversation tail: the last three messages'
/// role and first 200 characters of content.
pub fn fingerprint(messages: &[ChatMessage]) -> String {
    let skip = messages.len().saturating_sub(FINGERPRINT_TAIL);
    messages[skip..]
        .iter()
        .map(|m| {
            let head: String = m.content.chars().take(FINGERPRINT_CONTENT_CHARS).collect();
            format!("{}:{}", m.role, head)
        })
        .collect::<Vec<_>>()
        .join("|")
}

struct CacheEntry {
    text: String,
    inserted_at: Instant,
}

/// Fingerprint -> last LLM response text, bounded by a freshness window.
/// Holds only LLM-produced content, never filler phrases.
pub struct ResponseCache {
    window: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl ResponseCache {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn lookup(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().expect("dedup cache lock poisoned");
        entries
            .get(key)
            .filter(|entry| entry.inserted_at.elapsed() < self.window)
            .map(|entry| entry.text.clone())
    }

    /// Insert a response, opportunistically dropping anything older than
    /// twice the freshness window.
    pub fn store(&self, key: &str, text: String) {
        let mut entries = self.entries.lock().expect("dedup cache lock poisoned");
        let stale_after = self.window * 2;
        entries.retain(|_, entry| entry.inserted_at.elapsed() <= stale_after);
        entries.insert(
            key.to_string(),
            CacheEntry {
                text,
                inserted_at: Instant::now(),
            },
        );
    }
}

impl Default for ResponseCache {
    fn default() -> Self {
        Self::new(DEDUP_WINDOW)
    }
}
