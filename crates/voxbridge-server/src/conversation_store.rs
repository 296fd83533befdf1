//! Bounded in-memory conversation log.
//!
//! Strictly a debug facility: nothing here survives a restart, and the map
//! caps itself by evicting the longest-idle session wholesale.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggedMessage {
    pub role: String,
    pub content: String,
    pub timestamp_iso: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionLog {
    pub messages: Vec<LoggedMessage>,
    pub started_at: DateTime<Utc>,
}

pub struct ConversationStore {
    cap: usize,
    sessions: RwLock<HashMap<String, SessionLog>>,
}

impl ConversationStore {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub async fn append(&self, session_id: &str, role: &str, content: &str) {
        let mut sessions = self.sessions.write().await;
        let log = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| SessionLog {
                messages: Vec::new(),
                started_at: Utc::now(),
            });
        log.messages.push(LoggedMessage {
            role: role.to_string(),
            content: content.to_string(),
            timestamp_iso: Utc::now().to_rfc3339(),
        });

        while sessions.len() > self.cap {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, log)| log.started_at)
                .map(|(id, _)| id.clone());
            match oldest {
                Some(id) => {
                    sessions.remove(&id);
                }
                None => break,
            }
        }
    }

    pub async fn snapshot(&self) -> HashMap<String, SessionLog> {
        self.sessions.read().await.clone()
    }

    pub async fn session(&self, session_id: &str) -> Option<SessionLog> {
        self.sessions.read().await.get(session_id).cloned()
    }

    pub async fn clear(&self) {
        self.sessions.write().await.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn append_groups_by_session() {
        let store = ConversationStore::new(50);
        store.append("u1", "user", "hello").await;
        store.append("u1", "assistant", "hi there").await;
        store.append("u2", "user", "other call").await;

        let log = store.session("u1").await.unwrap();
        assert_eq!(log.messages.len(), 2);
        assert_eq!(log.messages[0].role, "user");
        assert_eq!(log.messages[1].content, "hi there");
        assert_eq!(store.snapshot().await.len(), 2);
    }

    #[tokio::test]
    async fn oldest_session_is_evicted_over_cap() {
        let store = ConversationStore::new(2);
        store.append("a", "user", "first").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.append("b", "user", "second").await;
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        store.append("c", "user", "third").await;

        let sessions = store.snapshot().await;
        assert_eq!(sessions.len(), 2);
        assert!(!sessions.contains_key("a"));
        assert!(sessions.contains_key("b"));
        assert!(sessions.contains_key("c"));
    }

    #[tokio::test]
    async fn clear_empties_everything() {
        let store = ConversationStore::new(50);
        store.append("u1", "user", "hello").await;
        store.clear().await;
        assert!(store.snapshot().await.is_empty());
    }
}
