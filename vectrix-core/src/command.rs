//! Tagged command payloads: the typed replacement for the untyped
//! `map<string, any>` command log. One variant per `AOLRecord` kind, each
//! carrying exactly the fields that kind needs, so a decoder never handles
//! an "any" value.

use serde::{Deserialize, Serialize};

use crate::types::{CollectionConfig, Vector, VectorId};

/// A single command, as appended to the append-only log and replayed by
/// `Engine::apply_command`. `db`/`collection` name the target; `payload`
/// carries the kind-specific data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AOLRecord {
    pub timestamp: u64,
    pub db: Option<String>,
    pub collection: Option<String>,
    pub payload: CommandPayload,
}

impl AOLRecord {
    pub fn new(
        timestamp: u64,
        db: Option<String>,
        collection: Option<String>,
        payload: CommandPayload,
    ) -> Self {
        Self {
            timestamp,
            db,
            collection,
            payload,
        }
    }
}

/// Tagged union over the six command kinds. Deliberately flat (no nested
/// `any`): every field is concretely typed.
///
/// Uses serde's default externally-tagged representation rather than
/// `#[serde(tag = "...")]`: the AOL encodes this through `bincode`, which
/// can only deserialize self-describing variant indices, not the
/// `deserialize_any` an internally/adjacently tagged enum would require.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum CommandPayload {
    CreateDatabase,
    DropDatabase,
    CreateCollection { config: CollectionConfig },
    DropCollection,
    Insert { vectors: Vec<Vector> },
    Delete { ids: Vec<VectorId> },
}

impl CommandPayload {
    /// Short label matching the spec's kind names, for logging.
    pub fn kind_name(&self) -> &'static str {
        match self {
            CommandPayload::CreateDatabase => "CREATE_DB",
            CommandPayload::DropDatabase => "DROP_DB",
            CommandPayload::CreateCollection { .. } => "CREATE_COLL",
            CommandPayload::DropCollection => "DROP_COLL",
            CommandPayload::Insert { .. } => "INSERT",
            CommandPayload::Delete { .. } => "DELETE",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{HnswParams, Metric};

    #[test]
    fn kind_names_match_spec_vocabulary() {
        assert_eq!(CommandPayload::CreateDatabase.kind_name(), "CREATE_DB");
        assert_eq!(CommandPayload::DropDatabase.kind_name(), "DROP_DB");
        assert_eq!(
            CommandPayload::CreateCollection {
                config: CollectionConfig {
                    name: "c".into(),
                    metric: Metric::L2,
                    hnsw: HnswParams::default(),
                },
            }
            .kind_name(),
            "CREATE_COLL"
        );
        assert_eq!(CommandPayload::DropCollection.kind_name(), "DROP_COLL");
        assert_eq!(
            CommandPayload::Insert { vectors: vec![] }.kind_name(),
            "INSERT"
        );
        assert_eq!(CommandPayload::Delete { ids: vec![] }.kind_name(), "DELETE");
    }

    #[test]
    fn record_round_trips_through_json() {
        let record = AOLRecord::new(
            42,
            Some("db".into()),
            Some("coll".into()),
            CommandPayload::Delete { ids: vec![1, 2, 3] },
        );
        let encoded = serde_json::to_vec(&record).unwrap();
        let decoded: AOLRecord = serde_json::from_slice(&encoded).unwrap();
        assert_eq!(decoded.timestamp, 42);
        assert!(matches!(decoded.payload, CommandPayload::Delete { ids } if ids == vec![1, 2, 3]));
    }
}
