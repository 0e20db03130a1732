//! Engine: top-level namespace of databases, plus the snapshot/replay and
//! AOL-application hooks the persistence manager drives.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::command::{AOLRecord, CommandPayload};
use crate::database::Database;
use crate::error::{CoreError, Result};
use crate::hnsw::HnswGraphState;
use crate::types::{CollectionConfig, SearchResult, Vector, VectorId};

/// Maximum vectors batched into a single optimized `INSERT` record, per spec.
const INSERT_BATCH_SIZE: usize = 100;

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Per-collection state as captured into a snapshot: config, live vectors,
/// and the full exported HNSW graph. Restoring imports the graph state
/// verbatim; no vector is re-inserted through the index's insert path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionState {
    pub config: CollectionConfig,
    pub vectors: Vec<Vector>,
    pub graph: HnswGraphState,
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseState {
    pub name: String,
    pub collections: HashMap<String, CollectionState>,
    pub created_at: u64,
}

/// `version` is a string tag; the only value this engine ever writes or
/// accepts is `"1.0"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub version: String,
    pub timestamp: u64,
    pub databases: HashMap<String, DatabaseState>,
    pub metadata: crate::Value,
}

pub const SNAPSHOT_VERSION: &str = "1.0";

/// The engine is a constructor-initialized value threaded through handlers,
/// never an ambient global. Its only state is the database map.
pub struct Engine {
    databases: HashMap<String, Database>,
    created_at: HashMap<String, u64>,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Self {
            databases: HashMap::new(),
            created_at: HashMap::new(),
        }
    }

    pub fn create_database(&mut self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(CoreError::InvalidInput("database name is empty".into()));
        }
        if self.databases.contains_key(name) {
            return Err(CoreError::AlreadyExists(format!("database '{name}'")));
        }
        self.databases.insert(name.to_string(), Database::new(name));
        self.created_at.insert(name.to_string(), now_millis());
        Ok(())
    }

    pub fn drop_database(&mut self, name: &str) -> Result<()> {
        let mut db = self
            .databases
            .remove(name)
            .ok_or_else(|| CoreError::database_not_found(name))?;
        db.close();
        self.created_at.remove(name);
        Ok(())
    }

    pub fn list_databases(&self) -> Vec<String> {
        let mut names: Vec<String> = self.databases.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn database(&self, name: &str) -> Result<&Database> {
        self.databases
            .get(name)
            .ok_or_else(|| CoreError::database_not_found(name))
    }

    pub fn database_mut(&mut self, name: &str) -> Result<&mut Database> {
        self.databases
            .get_mut(name)
            .ok_or_else(|| CoreError::database_not_found(name))
    }

    pub fn create_collection(&mut self, db: &str, config: CollectionConfig) -> Result<()> {
        self.database_mut(db)?.create_collection(config)
    }

    pub fn drop_collection(&mut self, db: &str, name: &str) -> Result<()> {
        self.database_mut(db)?.drop_collection(name)
    }

    pub fn insert(&mut self, db: &str, coll: &str, vectors: &[Vector]) -> Result<()> {
        self.database_mut(db)?.collection_mut(coll)?.insert(vectors)
    }

    pub fn delete(&mut self, db: &str, coll: &str, ids: &[VectorId]) -> Result<usize> {
        self.database_mut(db)?.collection_mut(coll)?.delete(ids)
    }

    pub fn search(
        &self,
        db: &str,
        coll: &str,
        query: &[f32],
        top_k: usize,
        ef_override: Option<usize>,
    ) -> Result<Vec<SearchResult>> {
        self.database(db)?
            .collection(coll)?
            .search(query, top_k, ef_override)
    }

    pub fn get(&self, db: &str, coll: &str, id: VectorId) -> Result<Option<Vector>> {
        Ok(self.database(db)?.collection(coll)?.get(id))
    }

    pub fn get_multiple(&self, db: &str, coll: &str, ids: &[VectorId]) -> Result<Vec<Vector>> {
        Ok(self.database(db)?.collection(coll)?.get_multiple(ids))
    }

    pub fn count(&self, db: &str, coll: &str) -> Result<usize> {
        Ok(self.database(db)?.collection(coll)?.count())
    }

    pub fn compact(
        &mut self,
        db: &str,
        coll: &str,
        cancellation: Option<&tokio_util::sync::CancellationToken>,
    ) -> Result<()> {
        self.database_mut(db)?
            .collection_mut(coll)?
            .compact(cancellation)
    }

    /// Consistent snapshot under a read-lock sequence in the concurrent
    /// wrapper above this type; here, a plain sequential walk.
    pub fn capture_state(&self) -> Snapshot {
        let mut databases = HashMap::with_capacity(self.databases.len());
        for (db_name, db) in &self.databases {
            let mut collections = HashMap::new();
            for (coll_name, coll) in db.collections() {
                let graph = coll.export_graph_state().unwrap_or_else(|| HnswGraphState {
                    metric: coll.config().metric,
                    params: coll.config().hnsw.clone(),
                    ef_search: coll.config().hnsw.ef_search,
                    nodes: Vec::new(),
                    entry: None,
                    max_layer: -1,
                });
                collections.insert(
                    coll_name.clone(),
                    CollectionState {
                        config: coll.config().clone(),
                        vectors: coll.export_live_vectors(),
                        graph,
                        created_at: coll.created_at(),
                        updated_at: coll.updated_at(),
                    },
                );
            }
            databases.insert(
                db_name.clone(),
                DatabaseState {
                    name: db_name.clone(),
                    collections,
                    created_at: *self.created_at.get(db_name).unwrap_or(&0),
                },
            );
        }

        Snapshot {
            version: SNAPSHOT_VERSION.to_string(),
            timestamp: now_millis(),
            databases,
            metadata: crate::Value::Null,
        }
    }

    /// Drops any existing state, then rebuilds every collection and imports
    /// its graph state verbatim. Missing graph state would silently degrade
    /// semantics, so it is never reconstructed by re-insertion here — the
    /// caller is expected to have validated the snapshot first.
    pub fn restore_from(&mut self, snapshot: &Snapshot) -> Result<()> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(CoreError::InvalidInput(format!(
                "unsupported snapshot version '{}'",
                snapshot.version
            )));
        }

        let mut databases = HashMap::with_capacity(snapshot.databases.len());
        let mut created_at = HashMap::with_capacity(snapshot.databases.len());

        for (db_name, db_state) in &snapshot.databases {
            let mut db = Database::new(db_name.clone());
            for (coll_name, coll_state) in &db_state.collections {
                let collection = crate::collection::Collection::restore(
                    coll_state.config.clone(),
                    coll_state.vectors.clone(),
                    coll_state.graph.clone(),
                    coll_state.created_at,
                    coll_state.updated_at,
                )?;
                db.insert_restored_collection(coll_name.clone(), collection);
            }
            created_at.insert(db_name.clone(), db_state.created_at);
            databases.insert(db_name.clone(), db);
        }

        for (_, mut old_db) in self.databases.drain() {
            old_db.close();
        }
        self.databases = databases;
        self.created_at = created_at;
        Ok(())
    }

    /// Replays a single AOL record, updating engine state exactly as the
    /// live path would.
    pub fn apply_command(&mut self, record: &AOLRecord) -> Result<()> {
        match &record.payload {
            CommandPayload::CreateDatabase => {
                let db = record
                    .db
                    .as_deref()
                    .ok_or_else(|| CoreError::InvalidInput("CREATE_DB missing db name".into()))?;
                self.create_database(db)
            }
            CommandPayload::DropDatabase => {
                let db = record
                    .db
                    .as_deref()
                    .ok_or_else(|| CoreError::InvalidInput("DROP_DB missing db name".into()))?;
                self.drop_database(db)
            }
            CommandPayload::CreateCollection { config } => {
                let db = record.db.as_deref().ok_or_else(|| {
                    CoreError::InvalidInput("CREATE_COLL missing db name".into())
                })?;
                self.create_collection(db, config.clone())
            }
            CommandPayload::DropCollection => {
                let db = record.db.as_deref().ok_or_else(|| {
                    CoreError::InvalidInput("DROP_COLL missing db name".into())
                })?;
                let coll = record.collection.as_deref().ok_or_else(|| {
                    CoreError::InvalidInput("DROP_COLL missing collection name".into())
                })?;
                self.drop_collection(db, coll)
            }
            CommandPayload::Insert { vectors } => {
                let db = record
                    .db
                    .as_deref()
                    .ok_or_else(|| CoreError::InvalidInput("INSERT missing db name".into()))?;
                let coll = record.collection.as_deref().ok_or_else(|| {
                    CoreError::InvalidInput("INSERT missing collection name".into())
                })?;
                self.insert(db, coll, vectors)
            }
            CommandPayload::Delete { ids } => {
                let db = record
                    .db
                    .as_deref()
                    .ok_or_else(|| CoreError::InvalidInput("DELETE missing db name".into()))?;
                let coll = record.collection.as_deref().ok_or_else(|| {
                    CoreError::InvalidInput("DELETE missing collection name".into())
                })?;
                self.delete(db, coll, ids).map(|_| ())
            }
        }
    }

    /// Emits the minimum AOL sequence that reconstructs the current state:
    /// one `CREATE_DB` per database, one `CREATE_COLL` per collection, then
    /// its live vectors as `INSERT` records batched at `INSERT_BATCH_SIZE`.
    /// A vector inserted then deleted within the same compaction window
    /// contributes zero `INSERT` records, since only live vectors are
    /// walked.
    pub fn optimized_commands(&self) -> Vec<AOLRecord> {
        let ts = now_millis();
        let mut out = Vec::new();

        let mut db_names: Vec<&String> = self.databases.keys().collect();
        db_names.sort();

        for db_name in db_names {
            let db = &self.databases[db_name];
            out.push(AOLRecord::new(
                ts,
                Some(db_name.clone()),
                None,
                CommandPayload::CreateDatabase,
            ));

            for coll_name in db.list_collections() {
                let coll = db.collection(&coll_name).expect("name from list_collections");
                out.push(AOLRecord::new(
                    ts,
                    Some(db_name.clone()),
                    Some(coll_name.clone()),
                    CommandPayload::CreateCollection {
                        config: coll.config().clone(),
                    },
                ));

                let live = coll.export_live_vectors();
                for chunk in live.chunks(INSERT_BATCH_SIZE) {
                    out.push(AOLRecord::new(
                        ts,
                        Some(db_name.clone()),
                        Some(coll_name.clone()),
                        CommandPayload::Insert {
                            vectors: chunk.to_vec(),
                        },
                    ));
                }
            }
        }

        out
    }
}
