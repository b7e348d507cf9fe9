mod schema;

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row};

use crate::models::*;

/// SQLite persistence for strategies, groups and features.
///
/// Cloning is cheap: clones share one connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn open(path: PathBuf) -> Result<Self> {
        let parent = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("Database path has no parent directory"))?;
        std::fs::create_dir_all(parent)?;
        let conn = Connection::open(&path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        Self::from_connection(conn)
    }

    pub fn open_default() -> Result<Self> {
        Self::open(default_path()?)
    }

    pub fn open_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();
        schema::run_migrations(&conn)
    }

    // ============================================================
    // Strategy operations
    // ============================================================

    pub fn get_all_strategies(&self) -> Result<Vec<Strategy>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT name, description, type, key, value FROM strategies ORDER BY name",
        )?;

        let strategies = stmt
            .query_map([], strategy_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(strategies)
    }

    pub fn get_strategy(&self, name: &str) -> Result<Option<Strategy>> {
        let conn = self.conn.lock();
        let strategy = conn
            .query_row(
                "SELECT name, description, type, key, value FROM strategies WHERE name = ?",
                [name],
                strategy_from_row,
            )
            .optional()?;
        Ok(strategy)
    }

    pub fn insert_strategy(&self, strategy: &Strategy) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO strategies (name, description, type, key, value) VALUES (?, ?, ?, ?, ?)",
            (
                &strategy.name,
                &strategy.description,
                strategy.kind.as_str(),
                &strategy.key,
                &strategy.value,
            ),
        )?;
        Ok(())
    }

    pub fn update_strategy(&self, strategy: &Strategy) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE strategies SET description = ?, type = ?, key = ?, value = ? WHERE name = ?",
            (
                &strategy.description,
                strategy.kind.as_str(),
                &strategy.key,
                &strategy.value,
                &strategy.name,
            ),
        )?;
        Ok(rows > 0)
    }

    pub fn delete_strategy(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM strategies WHERE name = ?", [name])?;
        Ok(rows > 0)
    }

    // ============================================================
    // Group operations
    // ============================================================

    pub fn get_all_groups(&self) -> Result<Vec<Group>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT name, description, strategy, enabled, properties FROM flag_groups ORDER BY name",
        )?;

        let groups = stmt
            .query_map([], group_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(groups)
    }

    pub fn get_group(&self, name: &str) -> Result<Option<Group>> {
        let conn = self.conn.lock();
        let group = conn
            .query_row(
                "SELECT name, description, strategy, enabled, properties FROM flag_groups WHERE name = ?",
                [name],
                group_from_row,
            )
            .optional()?;
        Ok(group)
    }

    pub fn insert_group(&self, group: &Group) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO flag_groups (name, description, strategy, enabled, properties)
             VALUES (?, ?, ?, ?, ?)",
            (
                &group.name,
                &group.description,
                &group.strategy,
                group.enabled,
                serde_json::to_string(&group.properties)?,
            ),
        )?;
        Ok(())
    }

    pub fn update_group(&self, group: &Group) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE flag_groups SET description = ?, strategy = ?, enabled = ?, properties = ? WHERE name = ?",
            (
                &group.description,
                &group.strategy,
                group.enabled,
                serde_json::to_string(&group.properties)?,
                &group.name,
            ),
        )?;
        Ok(rows > 0)
    }

    pub fn delete_group(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM flag_groups WHERE name = ?", [name])?;
        Ok(rows > 0)
    }

    // ============================================================
    // Feature operations
    // ============================================================

    pub fn get_all_features(&self) -> Result<Vec<Feature>> {
        let conn = self.conn.lock();

        let mut memberships: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        {
            let mut stmt =
                conn.prepare("SELECT feature_name, group_name FROM feature_group_members")?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                memberships
                    .entry(row.get(0)?)
                    .or_default()
                    .insert(row.get(1)?);
            }
        }

        let mut stmt = conn.prepare(
            "SELECT name, description, strategy, enabled, properties FROM features ORDER BY name",
        )?;
        let mut features = stmt
            .query_map([], feature_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        for feature in &mut features {
            if let Some(groups) = memberships.remove(&feature.name) {
                feature.groups = groups;
            }
        }

        Ok(features)
    }

    pub fn get_feature(&self, name: &str) -> Result<Option<Feature>> {
        let conn = self.conn.lock();
        let Some(mut feature) = conn
            .query_row(
                "SELECT name, description, strategy, enabled, properties FROM features WHERE name = ?",
                [name],
                feature_from_row,
            )
            .optional()?
        else {
            return Ok(None);
        };

        feature.groups = load_memberships(&conn, name)?;
        Ok(Some(feature))
    }

    pub fn insert_feature(&self, feature: &Feature) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO features (name, description, strategy, enabled, properties)
             VALUES (?, ?, ?, ?, ?)",
            (
                &feature.name,
                &feature.description,
                &feature.strategy,
                feature.enabled,
                serde_json::to_string(&feature.properties)?,
            ),
        )?;
        write_memberships(&tx, feature)?;

        tx.commit()?;
        Ok(())
    }

    /// Replaces a feature's row and its group memberships in one transaction.
    pub fn update_feature(&self, feature: &Feature) -> Result<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;

        let rows = tx.execute(
            "UPDATE features SET description = ?, strategy = ?, enabled = ?, properties = ? WHERE name = ?",
            (
                &feature.description,
                &feature.strategy,
                feature.enabled,
                serde_json::to_string(&feature.properties)?,
                &feature.name,
            ),
        )?;
        if rows == 0 {
            return Ok(false);
        }

        tx.execute(
            "DELETE FROM feature_group_members WHERE feature_name = ?",
            [&feature.name],
        )?;
        write_memberships(&tx, feature)?;

        tx.commit()?;
        Ok(true)
    }

    pub fn set_feature_enabled(&self, name: &str, enabled: bool) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute(
            "UPDATE features SET enabled = ? WHERE name = ?",
            (enabled, name),
        )?;
        Ok(rows > 0)
    }

    pub fn delete_feature(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM features WHERE name = ?", [name])?;
        Ok(rows > 0)
    }
}

fn default_path() -> Result<PathBuf> {
    let dirs = directories::ProjectDirs::from("", "", "featureflags")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    Ok(dirs.data_dir().join("featureflags.db"))
}

fn load_memberships(conn: &Connection, feature: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn.prepare(
        "SELECT group_name FROM feature_group_members WHERE feature_name = ? ORDER BY group_name",
    )?;
    let groups = stmt
        .query_map([feature], |row| row.get(0))?
        .collect::<Result<BTreeSet<String>, _>>()?;
    Ok(groups)
}

fn write_memberships(conn: &Connection, feature: &Feature) -> Result<()> {
    let mut stmt = conn
        .prepare("INSERT INTO feature_group_members (feature_name, group_name) VALUES (?, ?)")?;
    for group in &feature.groups {
        stmt.execute((&feature.name, group))?;
    }
    Ok(())
}

fn strategy_from_row(row: &Row<'_>) -> rusqlite::Result<Strategy> {
    Ok(Strategy {
        name: row.get(0)?,
        description: row.get(1)?,
        kind: StrategyType::from(row.get::<_, String>(2)?),
        key: row.get(3)?,
        value: row.get(4)?,
    })
}

fn group_from_row(row: &Row<'_>) -> rusqlite::Result<Group> {
    Ok(Group {
        name: row.get(0)?,
        description: row.get(1)?,
        strategy: row.get(2)?,
        enabled: row.get(3)?,
        properties: parse_properties(4, row.get(4)?)?,
    })
}

fn feature_from_row(row: &Row<'_>) -> rusqlite::Result<Feature> {
    Ok(Feature {
        name: row.get(0)?,
        description: row.get(1)?,
        strategy: row.get(2)?,
        groups: BTreeSet::new(),
        enabled: row.get(3)?,
        properties: parse_properties(4, row.get(4)?)?,
    })
}

fn parse_properties(column: usize, raw: String) -> rusqlite::Result<Properties> {
    serde_json::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}
