//! Test node fixtures for bench setups

use crate::Result;
use crate::db::{AccountRepo, DbPool, NewRegistration, Node, NodeRepo};

/// Number of test nodes created by [`seed_test_nodes`]
pub const TEST_NODE_COUNT: u32 = 5;

/// Password shared by every seeded account
pub const TEST_PASSWORD: &str = "testpass123";

/// Outcome of a seeding run
#[derive(Debug, Default)]
pub struct SeedReport {
    pub created: Vec<Node>,
    pub skipped: Vec<String>,
}

fn test_registration(n: u32) -> NewRegistration {
    NewRegistration {
        username: format!("node{n}"),
        password: TEST_PASSWORD.to_string(),
        email: Some(format!("node{n}@example.com")),
        display_name: format!("Node {n}"),
        device_id: format!("ESP32-00{n}"),
        lora_node_id: format!("LORA-00{n}"),
        description: format!("Test node {n}"),
        ..NewRegistration::default()
    }
}

/// Register `Node 1` through `Node 5`, skipping usernames that already exist
///
/// # Errors
///
/// Returns error if a registration fails for any reason other than an
/// existing username
pub fn seed_test_nodes(db: &DbPool) -> Result<SeedReport> {
    let accounts = AccountRepo::new(db.clone());
    let nodes = NodeRepo::new(db.clone());
    let mut report = SeedReport::default();

    for n in 1..=TEST_NODE_COUNT {
        let reg = test_registration(n);

        if accounts.find_by_username(&reg.username)?.is_some() {
            tracing::debug!(username = %reg.username, "test node already exists");
            report.skipped.push(reg.username);
            continue;
        }

        report.created.push(nodes.register(&reg)?);
    }

    tracing::info!(
        created = report.created.len(),
        skipped = report.skipped.len(),
        "seeded test nodes"
    );
    Ok(report)
}
