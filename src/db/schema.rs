//! Database schema and migrations

use rusqlite::Connection;

use crate::Result;

/// Current schema version
pub const SCHEMA_VERSION: i32 = 2;

/// Initialize the database schema
///
/// # Errors
///
/// Returns error if migration fails
pub fn init(conn: &Connection) -> Result<()> {
    let version: i32 = conn
        .query_row("PRAGMA user_version", [], |row| row.get(0))
        .unwrap_or(0);

    if version < 1 {
        migrate_v1(conn)?;
    }
    if version < 2 {
        migrate_v2(conn)?;
    }

    Ok(())
}

fn migrate_v1(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Owner accounts, one per node
        CREATE TABLE IF NOT EXISTS accounts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            email TEXT,
            is_staff INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        );

        -- Registered ESP32 + LoRa nodes
        CREATE TABLE IF NOT EXISTS nodes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            account_id INTEGER NOT NULL UNIQUE REFERENCES accounts(id) ON DELETE CASCADE,
            node_name TEXT NOT NULL,
            esp32_device_id TEXT NOT NULL UNIQUE,
            lora_node_id TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'OFFLINE' CHECK(status IN ('ONLINE', 'OFFLINE')),
            last_seen TEXT,
            description TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_nodes_name ON nodes(node_name);
        CREATE INDEX IF NOT EXISTS idx_nodes_status ON nodes(status);

        -- Relayed messages
        CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            sender_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
            receiver_id INTEGER NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
            content TEXT NOT NULL CHECK(length(content) > 0),
            message_type TEXT NOT NULL DEFAULT 'TEXT' CHECK(message_type IN ('TEXT')),
            status TEXT NOT NULL DEFAULT 'SENT' CHECK(status IN ('SENT', 'DELIVERED')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_messages_created ON messages(created_at DESC);
        CREATE INDEX IF NOT EXISTS idx_messages_receiver ON messages(receiver_id, created_at DESC);

        PRAGMA user_version = 1;
        ",
    )?;

    tracing::info!("migrated to schema v1");
    Ok(())
}

fn migrate_v2(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r"
        -- Contact details of the person responsible for a node
        ALTER TABLE nodes ADD COLUMN contact_name TEXT;
        ALTER TABLE nodes ADD COLUMN contact_email TEXT;
        ALTER TABLE nodes ADD COLUMN contact_phone TEXT;

        CREATE INDEX IF NOT EXISTS idx_messages_sender ON messages(sender_id, created_at DESC);

        PRAGMA user_version = 2;
        ",
    )?;

    tracing::info!("migrated to schema v2");
    Ok(())
}
