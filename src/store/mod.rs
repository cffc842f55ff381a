//! SQLite sink for archived messages
//!
//! One row per (message id, owner). Re-archiving a message replaces the
//! previous row: the delete and insert run inside a single transaction so
//! the store never holds two copies and never loses the message between
//! runs.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use tracing::debug;

use crate::error::Result;
use crate::query::context::SecurityId;

/// One message as delivered by a mail session, ready for archiving.
///
/// Body extraction (choosing a text part out of the MIME structure) is the
/// session's concern; the store only persists what it is given.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchivedMessage {
    /// Message-ID header, unique per message per owner.
    pub message_id: String,
    /// When the server received the message, if known.
    pub received: Option<DateTime<Utc>>,
    /// Sender, or the joined From addresses when no Sender header exists.
    pub sender: Option<String>,
    pub subject: Option<String>,
    /// Extracted text body, if any.
    pub body: Option<String>,
    /// The complete raw message.
    pub raw: Vec<u8>,
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS messages (
    id      TEXT NOT NULL,
    mailbox TEXT NOT NULL,
    owner   TEXT NOT NULL,
    date    TEXT,
    sender  TEXT,
    subject TEXT,
    body    TEXT,
    data    BLOB NOT NULL,
    PRIMARY KEY (id, owner)
);
";

/// The relational message sink.
pub struct MessageStore {
    conn: Connection,
}

impl MessageStore {
    /// Open (and if needed create) the store at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(MessageStore { conn })
    }

    /// In-memory store for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(MessageStore { conn })
    }

    /// Archive a message, replacing any previously stored version.
    pub fn replace_message(
        &mut self,
        mailbox: &str,
        owner: &SecurityId,
        message: &ArchivedMessage,
    ) -> Result<()> {
        debug!(id = %message.message_id, mailbox, "archiving message");

        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM messages WHERE id = ?1 AND owner = ?2",
            params![message.message_id, owner.as_str()],
        )?;
        tx.execute(
            "INSERT INTO messages (id, mailbox, owner, date, sender, subject, body, data) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                message.message_id,
                mailbox,
                owner.as_str(),
                message.received.map(|d| d.to_rfc3339()),
                message.sender,
                message.subject,
                message.body,
                message.raw,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Number of archived messages, across all owners.
    pub fn message_count(&self) -> Result<u64> {
        let count: u64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM messages", [], |row| row.get(0))?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str, subject: &str) -> ArchivedMessage {
        ArchivedMessage {
            message_id: id.to_string(),
            received: Some("2024-07-19T14:35:41Z".parse().unwrap()),
            sender: Some("billing@example.com".to_string()),
            subject: Some(subject.to_string()),
            body: Some("body".to_string()),
            raw: b"raw bytes".to_vec(),
        }
    }

    fn owner(n: u32) -> SecurityId {
        SecurityId::new(format!("S-1-5-21-1-1-1-{n}"))
    }

    #[test]
    fn test_replace_overwrites_previous_version() {
        let mut store = MessageStore::open_in_memory().unwrap();
        store
            .replace_message("INBOX", &owner(1), &message("<a@x>", "first"))
            .unwrap();
        store
            .replace_message("Archive", &owner(1), &message("<a@x>", "second"))
            .unwrap();

        assert_eq!(store.message_count().unwrap(), 1);
        let subject: String = store
            .conn
            .query_row(
                "SELECT subject FROM messages WHERE id = '<a@x>'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(subject, "second");
    }

    #[test]
    fn test_same_message_id_per_owner() {
        let mut store = MessageStore::open_in_memory().unwrap();
        store
            .replace_message("INBOX", &owner(1), &message("<a@x>", "one"))
            .unwrap();
        store
            .replace_message("INBOX", &owner(2), &message("<a@x>", "two"))
            .unwrap();
        assert_eq!(store.message_count().unwrap(), 2);
    }

    #[test]
    fn test_nullable_fields() {
        let mut store = MessageStore::open_in_memory().unwrap();
        let bare = ArchivedMessage {
            message_id: "<bare@x>".to_string(),
            received: None,
            sender: None,
            subject: None,
            body: None,
            raw: Vec::new(),
        };
        store.replace_message("INBOX", &owner(1), &bare).unwrap();
        assert_eq!(store.message_count().unwrap(), 1);
    }
}
