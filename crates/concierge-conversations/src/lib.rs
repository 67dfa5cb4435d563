//! Conversation persistence and history assembly for Concierge.
//!
//! A conversation is an ordered sequence of turns (`conversation_items`),
//! each authored by either the customer (`user`) or the reasoning agent
//! (`agent`). Within a conversation, `order` values form a strictly
//! increasing, gapless sequence starting at 1, assigned in the sequence
//! turns actually occur.
//!
//! Order assignment is atomic and server-side: [`append_next`] reads the
//! current maximum order and inserts in a single transaction, so concurrent
//! requests against the same conversation can never collide on an order
//! value. [`append_item`] accepts a caller-supplied order for callers that
//! already hold one; it performs no contiguity validation.

use rusqlite::{params, Connection, OptionalExtension, Row};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur during conversation operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("conversation not found: {0}")]
    NotFound(String),
}

/// The author of a single conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Author {
    User,
    Agent,
}

impl Author {
    pub fn as_str(self) -> &'static str {
        match self {
            Author::User => "user",
            Author::Agent => "agent",
        }
    }

    fn from_db(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Author::User),
            "agent" => Some(Author::Agent),
            _ => None,
        }
    }
}

/// A conversation between a customer and the agent.
///
/// Immutable once created; only `updated_at` moves as turns are appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Conversation {
    /// Opaque unique identifier (UUID, generated when absent).
    pub id: String,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
    /// Last-update timestamp (ISO 8601).
    pub updated_at: String,
}

/// A single turn within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConversationItem {
    /// The owning conversation.
    pub conversation_id: String,
    /// Position within the conversation, starting at 1.
    pub order: i64,
    /// Turn text content.
    pub text: String,
    /// Who authored the turn.
    pub author: Author,
    /// Creation timestamp (ISO 8601).
    pub created_at: String,
    /// Last-update timestamp (ISO 8601).
    pub updated_at: String,
}

/// Resolves an existing conversation or creates a new one.
///
/// An empty `id` creates a conversation with a freshly generated UUID. A
/// non-empty `id` is looked up; an unknown id is a [`StoreError::NotFound`],
/// never an implicit creation.
pub fn resolve_or_create(conn: &Connection, id: &str) -> Result<Conversation, StoreError> {
    if id.is_empty() {
        let new_id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO conversations (id) VALUES (?1)",
            params![new_id],
        )?;
        tracing::debug!(conversation_id = %new_id, "created conversation");
        return get_conversation(conn, &new_id);
    }
    get_conversation(conn, id)
}

/// Retrieves a conversation by its identifier.
pub fn get_conversation(conn: &Connection, id: &str) -> Result<Conversation, StoreError> {
    conn.query_row(
        "SELECT id, created_at, updated_at FROM conversations WHERE id = ?1",
        [id],
        |row| {
            Ok(Conversation {
                id: row.get(0)?,
                created_at: row.get(1)?,
                updated_at: row.get(2)?,
            })
        },
    )
    .optional()?
    .ok_or_else(|| StoreError::NotFound(id.to_string()))
}

/// Appends a turn at a caller-supplied order.
///
/// Contiguity of the order sequence is the caller's responsibility; prefer
/// [`append_next`] unless an order is already held.
pub fn append_item(
    conn: &Connection,
    conversation_id: &str,
    text: &str,
    author: Author,
    order: i64,
) -> Result<ConversationItem, StoreError> {
    conn.execute(
        "INSERT INTO conversation_items (conversation_id, \"order\", text, author)
         VALUES (?1, ?2, ?3, ?4)",
        params![conversation_id, order, text, author.as_str()],
    )?;
    get_item(conn, conversation_id, order)
}

/// Appends a turn at the next free order, atomically.
///
/// The maximum existing order is read and the insert performed inside one
/// transaction, so two concurrent appends to the same conversation serialize
/// rather than collide. Also touches the conversation's `updated_at`.
pub fn append_next(
    conn: &Connection,
    conversation_id: &str,
    text: &str,
    author: Author,
) -> Result<ConversationItem, StoreError> {
    let tx = conn.unchecked_transaction()?;

    let next_order: i64 = tx.query_row(
        "SELECT COALESCE(MAX(\"order\"), 0) + 1 FROM conversation_items
         WHERE conversation_id = ?1",
        [conversation_id],
        |row| row.get(0),
    )?;

    tx.execute(
        "INSERT INTO conversation_items (conversation_id, \"order\", text, author)
         VALUES (?1, ?2, ?3, ?4)",
        params![conversation_id, next_order, text, author.as_str()],
    )?;
    tx.execute(
        "UPDATE conversations SET updated_at = datetime('now') WHERE id = ?1",
        [conversation_id],
    )?;

    let item = get_item_on(&tx, conversation_id, next_order)?;
    tx.commit()?;

    tracing::debug!(
        conversation_id = %conversation_id,
        order = next_order,
        author = author.as_str(),
        "appended conversation item"
    );
    Ok(item)
}

/// Loads a conversation's history as an ordered sequence of turn texts.
///
/// Ascending by `order`. A conversation with no items yields an empty vec;
/// only a storage fault is an error.
pub fn load_history(conn: &Connection, conversation_id: &str) -> Result<Vec<String>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT text FROM conversation_items
         WHERE conversation_id = ?1 ORDER BY \"order\" ASC",
    )?;
    let rows = stmt.query_map([conversation_id], |row| row.get(0))?;

    let mut history = Vec::new();
    for row in rows {
        history.push(row?);
    }
    Ok(history)
}

/// Lists a conversation's full items, ascending by order.
pub fn list_items(
    conn: &Connection,
    conversation_id: &str,
) -> Result<Vec<ConversationItem>, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT conversation_id, \"order\", text, author, created_at, updated_at
         FROM conversation_items
         WHERE conversation_id = ?1 ORDER BY \"order\" ASC",
    )?;
    let rows = stmt.query_map([conversation_id], map_row_to_item)?;

    let mut items = Vec::new();
    for row in rows {
        items.push(row?);
    }
    Ok(items)
}

/// Counts the items in a conversation.
pub fn count_items(conn: &Connection, conversation_id: &str) -> Result<i64, StoreError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM conversation_items WHERE conversation_id = ?1",
        [conversation_id],
        |row| row.get(0),
    )?;
    Ok(count)
}

fn get_item(
    conn: &Connection,
    conversation_id: &str,
    order: i64,
) -> Result<ConversationItem, StoreError> {
    conn.query_row(
        "SELECT conversation_id, \"order\", text, author, created_at, updated_at
         FROM conversation_items
         WHERE conversation_id = ?1 AND \"order\" = ?2",
        params![conversation_id, order],
        map_row_to_item,
    )
    .map_err(StoreError::from)
}

fn get_item_on(
    tx: &rusqlite::Transaction<'_>,
    conversation_id: &str,
    order: i64,
) -> Result<ConversationItem, StoreError> {
    tx.query_row(
        "SELECT conversation_id, \"order\", text, author, created_at, updated_at
         FROM conversation_items
         WHERE conversation_id = ?1 AND \"order\" = ?2",
        params![conversation_id, order],
        map_row_to_item,
    )
    .map_err(StoreError::from)
}

fn map_row_to_item(row: &Row<'_>) -> rusqlite::Result<ConversationItem> {
    let author_str: String = row.get(3)?;
    let author = Author::from_db(&author_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown author value: {author_str}").into(),
        )
    })?;
    Ok(ConversationItem {
        conversation_id: row.get(0)?,
        order: row.get(1)?,
        text: row.get(2)?,
        author,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}
