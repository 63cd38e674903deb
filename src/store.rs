//! Local persistence for the chat transcript and theme.
//!
//! `KvStore` is a one-table SQLite key-value store. `ChatStore` sits on top
//! of it and knows the two keys the chat client uses.

use std::fs;
use std::path::Path;

use rusqlite::{params, Connection, OptionalExtension};
use tracing::warn;

use crate::error::StoreError;
use crate::state::{ChatMessage, Theme};

const SAVED_CHATS_KEY: &str = "saved_chats";
const THEME_KEY: &str = "theme_color";

pub struct KvStore {
    conn: Connection,
}

impl KvStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    pub fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.conn.execute(
            "INSERT INTO kv (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Removing a missing key is not an error.
    pub fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.conn.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// What `ChatStore::load` hands back.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Snapshot {
    /// `None` when nothing has been saved.
    pub transcript: Option<Vec<ChatMessage>>,
    pub theme: Theme,
}

pub struct ChatStore {
    kv: KvStore,
}

impl ChatStore {
    pub fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    pub fn load(&self) -> Result<Snapshot, StoreError> {
        Ok(Snapshot {
            transcript: self.transcript()?,
            theme: self.theme()?,
        })
    }

    fn transcript(&self) -> Result<Option<Vec<ChatMessage>>, StoreError> {
        let Some(blob) = self.kv.get(SAVED_CHATS_KEY)? else {
            return Ok(None);
        };
        match serde_json::from_str(&blob) {
            Ok(messages) => Ok(Some(messages)),
            Err(e) => {
                warn!(error = %e, "discarding unreadable saved chats");
                Ok(None)
            }
        }
    }

    /// Overwrite the stored transcript with `messages`.
    pub fn save(&self, messages: &[ChatMessage]) -> Result<(), StoreError> {
        let blob = serde_json::to_string(messages)?;
        self.kv.set(SAVED_CHATS_KEY, &blob)
    }

    pub fn clear(&self) -> Result<(), StoreError> {
        self.kv.remove(SAVED_CHATS_KEY)
    }

    pub fn theme(&self) -> Result<Theme, StoreError> {
        Ok(Theme::from_stored(self.kv.get(THEME_KEY)?.as_deref()))
    }

    pub fn set_theme(&self, theme: Theme) -> Result<(), StoreError> {
        self.kv.set(THEME_KEY, theme.as_str())
    }

    /// Raw stored theme string, if any.
    pub fn stored_theme_value(&self) -> Result<Option<String>, StoreError> {
        self.kv.get(THEME_KEY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn memory_store() -> ChatStore {
        ChatStore::new(KvStore::open_in_memory().unwrap())
    }

    #[test]
    fn test_load_defaults_when_empty() {
        let store = memory_store();
        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.transcript, None);
        assert_eq!(snapshot.theme, Theme::Dark);
    }

    #[test]
    fn test_save_overwrites() {
        let store = memory_store();
        store.save(&[ChatMessage::outgoing("first")]).unwrap();
        let messages = vec![ChatMessage::outgoing("second"), ChatMessage {
            text: "reply".to_string(),
            loading: false,
            ..ChatMessage::incoming_placeholder()
        }];
        store.save(&messages).unwrap();

        assert_eq!(store.load().unwrap().transcript, Some(messages));
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = memory_store();
        store.clear().unwrap();
        store.save(&[ChatMessage::outgoing("hi")]).unwrap();
        store.clear().unwrap();
        store.clear().unwrap();
        assert_eq!(store.load().unwrap().transcript, None);
    }

    #[test]
    fn test_theme_round_trip() {
        let store = memory_store();
        store.set_theme(Theme::Light).unwrap();
        assert_eq!(store.theme().unwrap(), Theme::Light);
        assert_eq!(store.stored_theme_value().unwrap().as_deref(), Some("light_mode"));
        store.set_theme(Theme::Dark).unwrap();
        assert_eq!(store.theme().unwrap(), Theme::Dark);
    }

    #[test]
    fn test_corrupt_transcript_reads_as_absent() {
        let kv = KvStore::open_in_memory().unwrap();
        kv.set(SAVED_CHATS_KEY, "<div class=\"message\">").unwrap();
        let store = ChatStore::new(kv);
        assert_eq!(store.load().unwrap().transcript, None);
    }

    #[test]
    fn test_file_store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data").join("chat.db");

        {
            let store = ChatStore::new(KvStore::open(&path).unwrap());
            store.save(&[ChatMessage::outgoing("persisted")]).unwrap();
            store.set_theme(Theme::Light).unwrap();
        }

        let store = ChatStore::new(KvStore::open(&path).unwrap());
        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.transcript, Some(vec![ChatMessage::outgoing("persisted")]));
        assert_eq!(snapshot.theme, Theme::Light);
    }
}
