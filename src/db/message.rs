//! Message store: store-and-forward mailbox between nodes

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use super::node::{find_by_device_id_with, get_with as get_node_with};
use super::{DbPool, Node, now_timestamp, parse_datetime};
use crate::{Error, Result};

/// Default cap on inbox, outbox and dashboard listings
pub const DEFAULT_MAILBOX_LIMIT: usize = 50;

const MESSAGE_COLUMNS: &str =
    "id, sender_id, receiver_id, content, message_type, status, created_at, updated_at";

const ENTRY_SELECT: &str = "SELECT m.id, m.sender_id, m.receiver_id, m.content, m.message_type,
            m.status, m.created_at, m.updated_at,
            s.node_name, s.esp32_device_id, r.node_name, r.esp32_device_id
     FROM messages m
     JOIN nodes s ON s.id = m.sender_id
     JOIN nodes r ON r.id = m.receiver_id";

/// Delivery status of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageStatus {
    Sent,
    Delivered,
}

impl MessageStatus {
    /// Wire and storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sent => "SENT",
            Self::Delivered => "DELIVERED",
        }
    }

    fn from_db(s: &str) -> Option<Self> {
        match s {
            "SENT" => Some(Self::Sent),
            "DELIVERED" => Some(Self::Delivered),
            _ => None,
        }
    }
}

/// Payload kind; only text is relayed today
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Text,
}

impl MessageType {
    /// Wire and storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "TEXT",
        }
    }
}

/// A relayed message
#[derive(Debug, Clone)]
pub struct Message {
    pub id: i64,
    pub sender_id: i64,
    pub receiver_id: i64,
    pub content: String,
    pub message_type: MessageType,
    pub status: MessageStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Identity of a node as shown alongside a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRef {
    pub id: i64,
    pub display_name: String,
    pub device_id: String,
}

/// A message together with both endpoints
#[derive(Debug, Clone)]
pub struct MessageEntry {
    pub message: Message,
    pub sender: NodeRef,
    pub receiver: NodeRef,
}

/// A node's inbox snapshot
#[derive(Debug, Clone)]
pub struct Mailbox {
    pub node: Node,
    pub messages: Vec<MessageEntry>,
}

#[derive(Clone, Copy)]
enum Direction {
    To(i64),
    From(i64),
    Any,
}

/// Message repository
#[derive(Clone)]
pub struct MessageRepo {
    pool: DbPool,
}

impl MessageRepo {
    /// Create a new message repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Relay a message between two devices
    ///
    /// Used by the device API, which does not reject a device messaging
    /// itself; see [`Self::send_from_dashboard`] for the checked variant.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` for empty input and `NodeNotFound` naming the
    /// side (sender or receiver) that failed to resolve
    pub fn send(
        &self,
        sender_device_id: &str,
        receiver_device_id: &str,
        content: &str,
    ) -> Result<Message> {
        for (field, value) in [
            ("sender device id", sender_device_id),
            ("receiver device id", receiver_device_id),
            ("content", content),
        ] {
            if value.is_empty() {
                return Err(Error::MissingField(field.to_string()));
            }
        }

        let conn = self.pool.get()?;

        let sender = find_by_device_id_with(&conn, sender_device_id)?
            .ok_or_else(|| Error::NodeNotFound(format!("sender {sender_device_id}")))?;
        let receiver = find_by_device_id_with(&conn, receiver_device_id)?
            .ok_or_else(|| Error::NodeNotFound(format!("receiver {receiver_device_id}")))?;

        let message = insert_with(&conn, sender.id, receiver.id, content)?;

        tracing::info!(
            message_id = message.id,
            from = %sender.device_id,
            to = %receiver.device_id,
            "message relayed"
        );
        Ok(message)
    }

    /// Send a message on behalf of a node from the dashboard
    ///
    /// Content is trimmed and a node may not message itself.
    ///
    /// # Errors
    ///
    /// Returns `MissingField` for blank content, `NodeNotFound` for unknown
    /// node IDs and `SelfMessage` when sender and receiver are the same node
    pub fn send_from_dashboard(
        &self,
        sender_id: i64,
        receiver_id: i64,
        content: &str,
    ) -> Result<Message> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::MissingField("content".to_string()));
        }

        let conn = self.pool.get()?;

        let sender = get_node_with(&conn, sender_id)?
            .ok_or_else(|| Error::NodeNotFound(format!("sender id {sender_id}")))?;
        let receiver = get_node_with(&conn, receiver_id)?
            .ok_or_else(|| Error::NodeNotFound(format!("receiver id {receiver_id}")))?;

        if sender.id == receiver.id {
            return Err(Error::SelfMessage);
        }

        let message = insert_with(&conn, sender.id, receiver.id, content)?;

        tracing::info!(
            message_id = message.id,
            from = %sender.device_id,
            to = %receiver.device_id,
            "dashboard message sent"
        );
        Ok(message)
    }

    /// Most recent messages addressed to a device, newest first
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown device
    pub fn inbox(&self, device_id: &str, limit: usize) -> Result<Mailbox> {
        let conn = self.pool.get()?;

        let node = find_by_device_id_with(&conn, device_id)?
            .ok_or_else(|| Error::NodeNotFound(device_id.to_string()))?;
        let messages = entries_with(&conn, Direction::To(node.id), limit)?;

        Ok(Mailbox { node, messages })
    }

    /// Most recent messages received by a node, newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn inbox_for(&self, node_id: i64, limit: usize) -> Result<Vec<MessageEntry>> {
        let conn = self.pool.get()?;
        entries_with(&conn, Direction::To(node_id), limit)
    }

    /// Most recent messages sent by a node, newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn outbox_for(&self, node_id: i64, limit: usize) -> Result<Vec<MessageEntry>> {
        let conn = self.pool.get()?;
        entries_with(&conn, Direction::From(node_id), limit)
    }

    /// Most recent messages across all nodes, newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn recent(&self, limit: usize) -> Result<Vec<MessageEntry>> {
        let conn = self.pool.get()?;
        entries_with(&conn, Direction::Any, limit)
    }

    /// Get a message by ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, id: i64) -> Result<Option<Message>> {
        let conn = self.pool.get()?;
        get_with(&conn, id)
    }

    /// Get a message by ID together with both endpoints
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get_entry(&self, id: i64) -> Result<Option<MessageEntry>> {
        let conn = self.pool.get()?;
        let entry = conn
            .query_row(&format!("{ENTRY_SELECT} WHERE m.id = ?1"), [id], row_to_entry)
            .optional()?;
        Ok(entry)
    }

    /// Mark a message DELIVERED on behalf of its receiver
    ///
    /// Acknowledging an already delivered message returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns `MessageNotFound`, `NodeNotFound`, or `NotReceiver` when the
    /// device is not the message's receiver
    pub fn acknowledge(&self, message_id: i64, device_id: &str) -> Result<Message> {
        let conn = self.pool.get()?;

        let message = get_with(&conn, message_id)?.ok_or(Error::MessageNotFound(message_id))?;
        let node = find_by_device_id_with(&conn, device_id)?
            .ok_or_else(|| Error::NodeNotFound(device_id.to_string()))?;

        if message.receiver_id != node.id {
            return Err(Error::NotReceiver {
                message_id,
                device_id: device_id.to_string(),
            });
        }

        if message.status == MessageStatus::Delivered {
            return Ok(message);
        }

        conn.execute(
            "UPDATE messages SET status = 'DELIVERED', updated_at = ?1
             WHERE id = ?2 AND status = 'SENT'",
            rusqlite::params![now_timestamp(), message_id],
        )?;

        tracing::debug!(message_id, device_id = %device_id, "message acknowledged");
        get_with(&conn, message_id)?.ok_or(Error::MessageNotFound(message_id))
    }
}

fn insert_with(
    conn: &Connection,
    sender_id: i64,
    receiver_id: i64,
    content: &str,
) -> Result<Message> {
    let now = now_timestamp();

    conn.execute(
        "INSERT INTO messages
             (sender_id, receiver_id, content, message_type, status, created_at, updated_at)
         VALUES (?1, ?2, ?3, 'TEXT', 'SENT', ?4, ?4)",
        rusqlite::params![sender_id, receiver_id, content, now],
    )?;

    let id = conn.last_insert_rowid();
    let created_at = parse_datetime(&now);

    Ok(Message {
        id,
        sender_id,
        receiver_id,
        content: content.to_string(),
        message_type: MessageType::Text,
        status: MessageStatus::Sent,
        created_at,
        updated_at: created_at,
    })
}

fn get_with(conn: &Connection, id: i64) -> Result<Option<Message>> {
    let message = conn
        .query_row(
            &format!("SELECT {MESSAGE_COLUMNS} FROM messages WHERE id = ?1"),
            [id],
            row_to_message,
        )
        .optional()?;
    Ok(message)
}

fn entries_with(
    conn: &Connection,
    direction: Direction,
    limit: usize,
) -> Result<Vec<MessageEntry>> {
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);
    let (filter, node_id) = match direction {
        Direction::To(id) => ("WHERE m.receiver_id = ?2", Some(id)),
        Direction::From(id) => ("WHERE m.sender_id = ?2", Some(id)),
        Direction::Any => ("", None),
    };

    let mut stmt = conn.prepare(&format!(
        "{ENTRY_SELECT} {filter} ORDER BY m.created_at DESC, m.id DESC LIMIT ?1"
    ))?;

    let entries = match node_id {
        Some(node_id) => stmt
            .query_map(rusqlite::params![limit, node_id], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
        None => stmt
            .query_map([limit], row_to_entry)?
            .collect::<rusqlite::Result<Vec<_>>>()?,
    };

    Ok(entries)
}

fn row_to_message(row: &Row<'_>) -> rusqlite::Result<Message> {
    Ok(Message {
        id: row.get(0)?,
        sender_id: row.get(1)?,
        receiver_id: row.get(2)?,
        content: row.get(3)?,
        // TEXT is the only type the schema admits
        message_type: MessageType::Text,
        status: MessageStatus::from_db(&row.get::<_, String>(5)?).unwrap_or(MessageStatus::Sent),
        created_at: parse_datetime(&row.get::<_, String>(6)?),
        updated_at: parse_datetime(&row.get::<_, String>(7)?),
    })
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<MessageEntry> {
    let message = row_to_message(row)?;
    let sender = NodeRef {
        id: message.sender_id,
        display_name: row.get(8)?,
        device_id: row.get(9)?,
    };
    let receiver = NodeRef {
        id: message.receiver_id,
        display_name: row.get(10)?,
        device_id: row.get(11)?,
    };

    Ok(MessageEntry {
        message,
        sender,
        receiver,
    })
}
