//! Node registry: device identities, liveness status and last-seen times

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{Connection, OptionalExtension, Row};

use super::{DbPool, account, format_timestamp, now_timestamp, parse_datetime};
use crate::{Error, Result};

const MAX_NAME_LEN: usize = 100;
const MAX_DEVICE_ID_LEN: usize = 100;
const MAX_LORA_ID_LEN: usize = 50;
const MAX_PHONE_LEN: usize = 20;

const NODE_COLUMNS: &str = "id, account_id, node_name, esp32_device_id, lora_node_id, status,
     last_seen, description, contact_name, contact_email, contact_phone, created_at, updated_at";

/// Liveness status reported by a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeStatus {
    Online,
    #[default]
    Offline,
}

impl NodeStatus {
    /// Wire and storage representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Online => "ONLINE",
            Self::Offline => "OFFLINE",
        }
    }

    /// Parse a device-supplied status, case-insensitively
    ///
    /// # Errors
    ///
    /// Returns `InvalidStatus` unless the input upper-cases to ONLINE or OFFLINE
    pub fn parse(input: &str) -> Result<Self> {
        match input.to_uppercase().as_str() {
            "ONLINE" => Ok(Self::Online),
            "OFFLINE" => Ok(Self::Offline),
            _ => Err(Error::InvalidStatus(input.to_string())),
        }
    }

    fn from_db(s: &str) -> Self {
        if s == "ONLINE" { Self::Online } else { Self::Offline }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered node
#[derive(Debug, Clone)]
pub struct Node {
    pub id: i64,
    pub account_id: i64,
    pub display_name: String,
    pub device_id: String,
    pub lora_node_id: String,
    pub status: NodeStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub description: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to register an account and its node
#[derive(Debug, Clone, Default)]
pub struct NewRegistration {
    pub username: String,
    pub password: String,
    pub email: Option<String>,
    pub display_name: String,
    pub device_id: String,
    pub lora_node_id: String,
    pub description: String,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
}

impl NewRegistration {
    fn validate(&self) -> Result<()> {
        for (field, value) in [
            ("username", self.username.as_str()),
            ("password", self.password.as_str()),
            ("node_name", self.display_name.as_str()),
            ("esp32_device_id", self.device_id.as_str()),
            ("lora_node_id", self.lora_node_id.as_str()),
        ] {
            if value.trim().is_empty() {
                return Err(Error::MissingField(field.to_string()));
            }
        }

        for (field, value, max) in [
            ("node_name", self.display_name.trim(), MAX_NAME_LEN),
            ("esp32_device_id", self.device_id.trim(), MAX_DEVICE_ID_LEN),
            ("lora_node_id", self.lora_node_id.trim(), MAX_LORA_ID_LEN),
            (
                "contact_name",
                self.contact_name.as_deref().unwrap_or_default(),
                MAX_NAME_LEN,
            ),
            (
                "contact_phone",
                self.contact_phone.as_deref().unwrap_or_default(),
                MAX_PHONE_LEN,
            ),
        ] {
            if value.chars().count() > max {
                return Err(Error::Validation(format!(
                    "{field} must be at most {max} characters"
                )));
            }
        }

        for (field, value) in [
            ("email", self.email.as_deref()),
            ("contact_email", self.contact_email.as_deref()),
        ] {
            if let Some(value) = value.filter(|v| !v.is_empty())
                && !value.contains('@')
            {
                return Err(Error::Validation(format!(
                    "{field} is not a valid email address"
                )));
            }
        }

        Ok(())
    }
}

/// Node counts for the dashboard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NodeStats {
    pub total: i64,
    pub online: i64,
    pub offline: i64,
}

/// Node repository
#[derive(Clone)]
pub struct NodeRepo {
    pool: DbPool,
}

impl NodeRepo {
    /// Create a new node repository
    #[must_use]
    #[allow(clippy::missing_const_for_fn)]
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Register an account and its node in one transaction
    ///
    /// The node starts OFFLINE with no `last_seen`. If either insert fails
    /// nothing is written.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateDeviceId` or `DuplicateUsername` on collisions,
    /// validation errors for blank or oversized fields, or a database error
    pub fn register(&self, reg: &NewRegistration) -> Result<Node> {
        reg.validate()?;
        let password_hash = account::hash_password(&reg.password)?;

        let device_id = reg.device_id.trim();
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;
        let now = now_timestamp();

        let account_id = account::insert_with(
            &tx,
            reg.username.trim(),
            &password_hash,
            reg.email.as_deref().filter(|e| !e.is_empty()),
            &now,
        )?;

        tx.execute(
            "INSERT INTO nodes (account_id, node_name, esp32_device_id, lora_node_id, status,
                 description, contact_name, contact_email, contact_phone, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, 'OFFLINE', ?5, ?6, ?7, ?8, ?9, ?9)",
            rusqlite::params![
                account_id,
                reg.display_name.trim(),
                device_id,
                reg.lora_node_id.trim(),
                reg.description,
                reg.contact_name,
                reg.contact_email,
                reg.contact_phone,
                now,
            ],
        )
        .map_err(|e| {
            if super::is_unique_violation(&e, "nodes.esp32_device_id") {
                Error::DuplicateDeviceId(device_id.to_string())
            } else {
                Error::Sqlite(e)
            }
        })?;

        let node = get_with(&tx, tx.last_insert_rowid())?
            .ok_or_else(|| Error::Database("registered node not readable".to_string()))?;
        tx.commit()?;

        tracing::info!(
            node_id = node.id,
            device_id = %node.device_id,
            username = %reg.username.trim(),
            "node registered"
        );
        Ok(node)
    }

    /// Get a node by ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, id: i64) -> Result<Option<Node>> {
        let conn = self.pool.get()?;
        get_with(&conn, id)
    }

    /// Find a node by its hardware device ID
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn find_by_device_id(&self, device_id: &str) -> Result<Option<Node>> {
        let conn = self.pool.get()?;
        find_by_device_id_with(&conn, device_id)
    }

    /// List all nodes ordered by name
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self) -> Result<Vec<Node>> {
        let conn = self.pool.get()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes ORDER BY node_name, id"
        ))?;

        let nodes = stmt
            .query_map([], row_to_node)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(nodes)
    }

    /// Count nodes by status
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn stats(&self) -> Result<NodeStats> {
        let conn = self.pool.get()?;

        let stats = conn.query_row(
            "SELECT COUNT(*),
                    COALESCE(SUM(status = 'ONLINE'), 0),
                    COALESCE(SUM(status = 'OFFLINE'), 0)
             FROM nodes",
            [],
            |row| {
                Ok(NodeStats {
                    total: row.get(0)?,
                    online: row.get(1)?,
                    offline: row.get(2)?,
                })
            },
        )?;

        Ok(stats)
    }

    /// Apply a heartbeat: parse `status`, then set it and stamp `last_seen`
    ///
    /// # Errors
    ///
    /// Returns `InvalidStatus` for anything other than ONLINE/OFFLINE (any
    /// case) and `NodeNotFound` for an unknown device
    pub fn update_status(&self, device_id: &str, status: &str) -> Result<Node> {
        let status = NodeStatus::parse(status)?;
        self.set_status(device_id, status)
    }

    /// Set a node's status and stamp `last_seen`
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` for an unknown device
    pub fn set_status(&self, device_id: &str, status: NodeStatus) -> Result<Node> {
        let conn = self.pool.get()?;
        let now = now_timestamp();

        let changed = conn.execute(
            "UPDATE nodes SET status = ?1, last_seen = ?2, updated_at = ?2
             WHERE esp32_device_id = ?3",
            rusqlite::params![status.as_str(), now, device_id],
        )?;

        if changed == 0 {
            return Err(Error::NodeNotFound(device_id.to_string()));
        }

        let node = find_by_device_id_with(&conn, device_id)?
            .ok_or_else(|| Error::NodeNotFound(device_id.to_string()))?;

        tracing::debug!(device_id = %device_id, status = %status, "node status updated");
        Ok(node)
    }

    /// Delete a node together with its account and every message it sent or received
    ///
    /// # Errors
    ///
    /// Returns `NodeNotFound` if no node has this ID
    pub fn delete(&self, id: i64) -> Result<Node> {
        let mut conn = self.pool.get()?;
        let tx = conn.transaction()?;

        let node = get_with(&tx, id)?.ok_or_else(|| Error::NodeNotFound(format!("id {id}")))?;

        // Cascades: accounts -> nodes -> messages
        tx.execute("DELETE FROM accounts WHERE id = ?1", [node.account_id])?;
        tx.commit()?;

        tracing::info!(node_id = id, device_id = %node.device_id, "node deleted");
        Ok(node)
    }

    /// Mark ONLINE nodes whose last heartbeat is older than `timeout` as OFFLINE
    ///
    /// `last_seen` is left untouched. Returns the number of nodes changed.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn expire_stale(&self, timeout: Duration) -> Result<usize> {
        let conn = self.pool.get()?;
        let now = Utc::now();
        let cutoff = format_timestamp(now - timeout);

        let expired = conn.execute(
            "UPDATE nodes SET status = 'OFFLINE', updated_at = ?1
             WHERE status = 'ONLINE' AND (last_seen IS NULL OR last_seen < ?2)",
            rusqlite::params![format_timestamp(now), cutoff],
        )?;

        if expired > 0 {
            tracing::info!(count = expired, cutoff = %cutoff, "expired stale nodes");
        }
        Ok(expired)
    }
}

pub(super) fn get_with(conn: &Connection, id: i64) -> Result<Option<Node>> {
    let node = conn
        .query_row(
            &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE id = ?1"),
            [id],
            row_to_node,
        )
        .optional()?;
    Ok(node)
}

pub(super) fn find_by_device_id_with(conn: &Connection, device_id: &str) -> Result<Option<Node>> {
    let node = conn
        .query_row(
            &format!("SELECT {NODE_COLUMNS} FROM nodes WHERE esp32_device_id = ?1"),
            [device_id],
            row_to_node,
        )
        .optional()?;
    Ok(node)
}

fn row_to_node(row: &Row<'_>) -> rusqlite::Result<Node> {
    Ok(Node {
        id: row.get(0)?,
        account_id: row.get(1)?,
        display_name: row.get(2)?,
        device_id: row.get(3)?,
        lora_node_id: row.get(4)?,
        status: NodeStatus::from_db(&row.get::<_, String>(5)?),
        last_seen: row
            .get::<_, Option<String>>(6)?
            .as_deref()
            .map(parse_datetime),
        description: row.get(7)?,
        contact_name: row.get(8)?,
        contact_email: row.get(9)?,
        contact_phone: row.get(10)?,
        created_at: parse_datetime(&row.get::<_, String>(11)?),
        updated_at: parse_datetime(&row.get::<_, String>(12)?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{AccountRepo, init_memory};

    fn setup() -> (DbPool, NodeRepo) {
        let pool = init_memory().unwrap();
        (pool.clone(), NodeRepo::new(pool))
    }

    fn registration(username: &str, name: &str, device_id: &str) -> NewRegistration {
        NewRegistration {
            username: username.to_string(),
            password: "testpass123".to_string(),
            display_name: name.to_string(),
            device_id: device_id.to_string(),
            lora_node_id: "LORA-001".to_string(),
            ..NewRegistration::default()
        }
    }

    #[test]
    fn test_register_starts_offline() {
        let (_, repo) = setup();

        let node = repo.register(&registration("node1", "Node 1", "ESP32-001")).unwrap();
        assert_eq!(node.device_id, "ESP32-001");
        assert_eq!(node.display_name, "Node 1");
        assert_eq!(node.status, NodeStatus::Offline);
        assert!(node.last_seen.is_none());

        let found = repo.find_by_device_id("ESP32-001").unwrap().unwrap();
        assert_eq!(found.id, node.id);
    }

    #[test]
    fn test_register_duplicate_device_id() {
        let (pool, repo) = setup();
        repo.register(&registration("node1", "Node 1", "ESP32-001")).unwrap();

        let err = repo
            .register(&registration("node2", "Node 2", "ESP32-001"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateDeviceId(ref id) if id == "ESP32-001"));

        // The account written before the node insert failed was rolled back
        let accounts = AccountRepo::new(pool);
        assert!(accounts.find_by_username("node2").unwrap().is_none());
    }

    #[test]
    fn test_register_duplicate_username() {
        let (_, repo) = setup();
        repo.register(&registration("node1", "Node 1", "ESP32-001")).unwrap();

        let err = repo
            .register(&registration("node1", "Node 1b", "ESP32-002"))
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateUsername(_)));
        assert!(repo.find_by_device_id("ESP32-002").unwrap().is_none());
    }

    #[test]
    fn test_register_validates_fields() {
        let (_, repo) = setup();

        let err = repo.register(&registration("node1", "Node 1", "  ")).unwrap_err();
        assert!(matches!(err, Error::MissingField(ref f) if f == "esp32_device_id"));

        let mut reg = registration("node1", "Node 1", "ESP32-001");
        reg.lora_node_id = "L".repeat(51);
        assert!(matches!(repo.register(&reg).unwrap_err(), Error::Validation(_)));

        let mut reg = registration("node1", "Node 1", "ESP32-001");
        reg.contact_email = Some("not-an-email".to_string());
        assert!(matches!(repo.register(&reg).unwrap_err(), Error::Validation(_)));

        // Blank emails are treated as absent
        let mut reg = registration("node1", "Node 1", "ESP32-001");
        reg.email = Some(String::new());
        reg.contact_email = Some(String::new());
        assert!(repo.register(&reg).is_ok());
    }

    #[test]
    fn test_update_status() {
        let (_, repo) = setup();
        repo.register(&registration("node1", "Node 1", "ESP32-001")).unwrap();

        let node = repo.update_status("ESP32-001", "online").unwrap();
        assert_eq!(node.status, NodeStatus::Online);
        assert_eq!(node.display_name, "Node 1");
        let first_seen = node.last_seen.unwrap();

        let node = repo.update_status("ESP32-001", "OFFLINE").unwrap();
        assert_eq!(node.status, NodeStatus::Offline);
        assert!(node.last_seen.unwrap() >= first_seen);
    }

    #[test]
    fn test_update_status_errors() {
        let (_, repo) = setup();
        repo.register(&registration("node1", "Node 1", "ESP32-001")).unwrap();

        let err = repo.update_status("ESP32-999", "ONLINE").unwrap_err();
        assert!(matches!(err, Error::NodeNotFound(_)));

        let err = repo.update_status("ESP32-001", "BOGUS").unwrap_err();
        assert!(matches!(err, Error::InvalidStatus(_)));

        // Invalid status is rejected before the lookup
        let err = repo.update_status("ESP32-999", "BOGUS").unwrap_err();
        assert!(matches!(err, Error::InvalidStatus(_)));
    }

    #[test]
    fn test_list_and_stats() {
        let (_, repo) = setup();
        repo.register(&registration("b", "Bravo", "ESP32-002")).unwrap();
        repo.register(&registration("a", "Alpha", "ESP32-001")).unwrap();
        repo.register(&registration("c", "Charlie", "ESP32-003")).unwrap();
        repo.update_status("ESP32-003", "ONLINE").unwrap();

        let names: Vec<_> = repo.list().unwrap().into_iter().map(|n| n.display_name).collect();
        assert_eq!(names, ["Alpha", "Bravo", "Charlie"]);

        let stats = repo.stats().unwrap();
        assert_eq!(
            stats,
            NodeStats {
                total: 3,
                online: 1,
                offline: 2
            }
        );
    }

    #[test]
    fn test_delete_removes_account() {
        let (pool, repo) = setup();
        let node = repo.register(&registration("node1", "Node 1", "ESP32-001")).unwrap();

        let deleted = repo.delete(node.id).unwrap();
        assert_eq!(deleted.device_id, "ESP32-001");
        assert!(repo.get(node.id).unwrap().is_none());
        assert!(AccountRepo::new(pool).find_by_username("node1").unwrap().is_none());

        assert!(matches!(repo.delete(node.id).unwrap_err(), Error::NodeNotFound(_)));
    }

    #[test]
    fn test_expire_stale() {
        let (pool, repo) = setup();
        repo.register(&registration("a", "A", "ESP32-001")).unwrap();
        repo.register(&registration("b", "B", "ESP32-002")).unwrap();
        repo.register(&registration("c", "C", "ESP32-003")).unwrap();
        repo.update_status("ESP32-001", "ONLINE").unwrap();
        repo.update_status("ESP32-002", "ONLINE").unwrap();

        // Backdate A's heartbeat past the timeout
        let old = format_timestamp(Utc::now() - Duration::minutes(10));
        pool.get()
            .unwrap()
            .execute(
                "UPDATE nodes SET last_seen = ?1 WHERE esp32_device_id = 'ESP32-001'",
                [&old],
            )
            .unwrap();

        let expired = repo.expire_stale(Duration::minutes(5)).unwrap();
        assert_eq!(expired, 1);

        let a = repo.find_by_device_id("ESP32-001").unwrap().unwrap();
        assert_eq!(a.status, NodeStatus::Offline);
        assert_eq!(a.last_seen.map(format_timestamp), Some(old));
        let b = repo.find_by_device_id("ESP32-002").unwrap().unwrap();
        assert_eq!(b.status, NodeStatus::Online);

        // Nothing left to expire
        assert_eq!(repo.expire_stale(Duration::minutes(5)).unwrap(), 0);
    }

    #[test]
    fn test_status_parse() {
        assert_eq!(NodeStatus::parse("Online").unwrap(), NodeStatus::Online);
        assert_eq!(NodeStatus::parse("offline").unwrap(), NodeStatus::Offline);
        assert!(NodeStatus::parse("").is_err());
        assert_eq!(NodeStatus::default().to_string(), "OFFLINE");
    }
}
