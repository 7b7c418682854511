//! Shared utilities for CLI commands.

use anyhow::{Context, Result};
use rc_core::Material;
use rc_db::Database;

use crate::Config;

/// Opens the configured database, creating its parent directory if needed.
pub fn open_database(config: &Config) -> Result<Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Database::open(&config.database_path)
        .with_context(|| format!("failed to open {}", config.database_path.display()))
}

/// Parses a material label, listing the catalog on failure.
pub fn parse_material(label: &str) -> Result<Material> {
    label.parse::<Material>().with_context(|| {
        let known = Material::ALL.map(Material::as_str).join(", ");
        format!("expected one of: {known}")
    })
}

/// New random session identifier.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// First eight characters of a session ID for display.
pub fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}
