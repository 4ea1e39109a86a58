//! SQLite persistence for topology snapshots, fragments, services and
//! deployments (C10, spec.md §4.10). Same wrapper shape the daemon's
//! predecessor used: a single `Connection` behind a `Mutex`, WAL mode, JSON
//! blobs for the record bodies.

use crate::types::{
    BdFragment, BridgeDomainService, Deployment, Diagnostic, TopologySnapshotRecord,
};
use crate::Result;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Exposes the underlying connection for callers that need a custom
    /// query outside the typed helpers below.
    pub fn connection(&self) -> Arc<Mutex<Connection>> {
        self.conn.clone()
    }

    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref())?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        info!("opened database at {:?}", path.as_ref());
        Ok(db)
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS topology_snapshots (
                id INTEGER PRIMARY KEY,
                captured_at INTEGER NOT NULL,
                snapshot_json TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS fragments (
                device TEXT NOT NULL,
                bd_name TEXT NOT NULL,
                snapshot_id INTEGER NOT NULL,
                fragment_json TEXT NOT NULL,
                PRIMARY KEY (device, bd_name, snapshot_id)
            );
            CREATE INDEX IF NOT EXISTS idx_fragments_snapshot ON fragments(snapshot_id);

            CREATE TABLE IF NOT EXISTS services (
                name TEXT PRIMARY KEY,
                service_json TEXT NOT NULL,
                confidence REAL NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS deployments (
                id TEXT PRIMARY KEY,
                service_name TEXT NOT NULL,
                state TEXT NOT NULL,
                deployment_json TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_deployments_service ON deployments(service_name);

            CREATE TABLE IF NOT EXISTS diagnostics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                kind TEXT NOT NULL,
                message TEXT NOT NULL,
                device TEXT,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );
            "#,
        )?;
        debug!("database schema initialized");
        Ok(())
    }

    // -- topology snapshots --------------------------------------------

    pub fn insert_topology_snapshot(&self, record: &TopologySnapshotRecord) -> Result<i64> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO topology_snapshots (captured_at, snapshot_json) VALUES (?1, ?2)",
            params![now, serde_json::to_string(record)?],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn latest_topology_snapshot(&self) -> Result<Option<(i64, TopologySnapshotRecord)>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT id, snapshot_json FROM topology_snapshots ORDER BY id DESC LIMIT 1",
            [],
            |row| {
                let id: i64 = row.get(0)?;
                let json: String = row.get(1)?;
                Ok((id, json))
            },
        )
        .optional()?
        .map(|(id, json)| Ok((id, serde_json::from_str(&json)?)))
        .transpose()
    }

    // -- fragments --------------------------------------------------------

    pub fn replace_fragments(&self, snapshot_id: i64, fragments: &[BdFragment]) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute("DELETE FROM fragments WHERE snapshot_id = ?1", params![snapshot_id])?;
        for frag in fragments {
            conn.execute(
                "INSERT INTO fragments (device, bd_name, snapshot_id, fragment_json) VALUES (?1, ?2, ?3, ?4)",
                params![frag.device, frag.bd_name, snapshot_id, serde_json::to_string(frag)?],
            )?;
        }
        debug!("persisted {} fragments for snapshot {}", fragments.len(), snapshot_id);
        Ok(())
    }

    pub fn list_fragments(&self, snapshot_id: i64) -> Result<Vec<BdFragment>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT fragment_json FROM fragments WHERE snapshot_id = ?1 ORDER BY device, bd_name",
        )?;
        let rows = stmt.query_map(params![snapshot_id], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }

    // -- services ---------------------------------------------------------

    pub fn upsert_service(&self, service: &BridgeDomainService) -> Result<()> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO services (name, service_json, confidence, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(name) DO UPDATE SET service_json = excluded.service_json,
                 confidence = excluded.confidence, updated_at = excluded.updated_at",
            params![service.name, serde_json::to_string(service)?, service.confidence, now],
        )?;
        Ok(())
    }

    pub fn get_service(&self, name: &str) -> Result<Option<BridgeDomainService>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT service_json FROM services WHERE name = ?1",
            params![name],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .map(|json| Ok(serde_json::from_str(&json)?))
        .transpose()
    }

    pub fn list_services(&self) -> Result<Vec<BridgeDomainService>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT service_json FROM services ORDER BY name")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }

    pub fn delete_service(&self, name: &str) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn.execute("DELETE FROM services WHERE name = ?1", params![name])?;
        Ok(rows > 0)
    }

    // -- deployments --------------------------------------------------------

    pub fn insert_deployment(&self, deployment: &Deployment) -> Result<()> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO deployments (id, service_name, state, deployment_json, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
            params![
                deployment.id,
                deployment.intent.service_name,
                format!("{:?}", deployment.state),
                serde_json::to_string(deployment)?,
                now,
            ],
        )?;
        Ok(())
    }

    pub fn update_deployment(&self, deployment: &Deployment) -> Result<()> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "UPDATE deployments SET state = ?1, deployment_json = ?2, updated_at = ?3 WHERE id = ?4",
            params![
                format!("{:?}", deployment.state),
                serde_json::to_string(deployment)?,
                now,
                deployment.id,
            ],
        )?;
        Ok(())
    }

    pub fn get_deployment(&self, id: &str) -> Result<Option<Deployment>> {
        let conn = self.conn.lock();
        conn.query_row(
            "SELECT deployment_json FROM deployments WHERE id = ?1",
            params![id],
            |row| row.get::<_, String>(0),
        )
        .optional()?
        .map(|json| Ok(serde_json::from_str(&json)?))
        .transpose()
    }

    pub fn list_deployments(&self) -> Result<Vec<Deployment>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT deployment_json FROM deployments ORDER BY created_at DESC")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        let mut out = Vec::new();
        for row in rows {
            out.push(serde_json::from_str(&row?)?);
        }
        Ok(out)
    }

    // -- diagnostics ----------------------------------------------------

    pub fn insert_diagnostic(&self, diag: &Diagnostic) -> Result<()> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT INTO diagnostics (kind, message, device, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![diag.kind, diag.message, diag.device, now],
        )?;
        Ok(())
    }

    pub fn list_diagnostics(&self, limit: i64) -> Result<Vec<Diagnostic>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT kind, message, device FROM diagnostics ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit], |row| {
            Ok(Diagnostic {
                kind: row.get(0)?,
                message: row.get(1)?,
                device: row.get(2)?,
            })
        })?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    // -- key-value ----------------------------------------------------

    pub fn kv_set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.conn.lock();
        let now = chrono::Utc::now().timestamp();
        conn.execute(
            "INSERT OR REPLACE INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn kv_get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.conn.lock();
        Ok(conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BuildIntent, P2mpStrategy, ServiceEndpoint, VlanExpr, BridgeDomainTemplate};
    use std::collections::HashMap;

    #[test]
    fn topology_snapshot_round_trips() {
        let db = Database::open_memory().unwrap();
        let record = TopologySnapshotRecord {
            device_count: 3,
            edge_count: 2,
            half_edge_anomaly_count: 0,
        };
        let id = db.insert_topology_snapshot(&record).unwrap();
        let (latest_id, latest) = db.latest_topology_snapshot().unwrap().unwrap();
        assert_eq!(id, latest_id);
        assert_eq!(latest.device_count, 3);
    }

    #[test]
    fn service_upsert_and_list() {
        let db = Database::open_memory().unwrap();
        let service = BridgeDomainService {
            name: "g_alice_v200".to_string(),
            template: BridgeDomainTemplate::SingleTagged,
            vlan: VlanExpr::Single(200),
            endpoints: Vec::new(),
            uplinks: Vec::new(),
            paths: Vec::new(),
            confidence: 0.9,
            provenance: Vec::new(),
        };
        db.upsert_service(&service).unwrap();
        assert_eq!(db.list_services().unwrap().len(), 1);
        assert!(db.get_service("g_alice_v200").unwrap().is_some());
        assert!(db.delete_service("g_alice_v200").unwrap());
        assert!(db.list_services().unwrap().is_empty());
    }

    #[test]
    fn deployment_lifecycle_persists() {
        let db = Database::open_memory().unwrap();
        let intent = BuildIntent {
            service_name: "g_bob_v300".to_string(),
            template: BridgeDomainTemplate::SingleTagged,
            vlan: VlanExpr::Single(300),
            source: ServiceEndpoint { device: "leaf-a".to_string(), interface: "ge1.300".to_string() },
            destinations: vec![ServiceEndpoint { device: "leaf-b".to_string(), interface: "ge2.300".to_string() }],
            strategy: P2mpStrategy::SharedSpine,
            manual_paths: HashMap::new(),
        };
        let deployment = Deployment::new("dep-1".to_string(), intent, HashMap::new());
        db.insert_deployment(&deployment).unwrap();
        assert!(db.get_deployment("dep-1").unwrap().is_some());
        assert_eq!(db.list_deployments().unwrap().len(), 1);
    }
}
