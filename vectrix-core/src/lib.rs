//! In-memory approximate nearest-neighbor engine.
//!
//! Provides HNSW-backed vector search organized into named collections and
//! databases, with the snapshot/replay hooks a durability layer needs to
//! reconstruct state exactly. Persistence itself (append-only log, snapshot
//! file I/O, scheduled rewriting) lives in `vectrix-persistence`; this crate
//! only exposes the in-memory state machine and the typed command log it
//! replays.
//!
//! # Example
//!
//! ```
//! use vectrix_core::{CollectionConfig, Engine, HnswParams, Metric, Vector};
//!
//! let mut engine = Engine::new();
//! engine.create_database("default").unwrap();
//! engine
//!     .create_collection(
//!         "default",
//!         CollectionConfig {
//!             name: "embeddings".into(),
//!             metric: Metric::Cosine,
//!             hnsw: HnswParams::default(),
//!         },
//!     )
//!     .unwrap();
//! engine
//!     .insert("default", "embeddings", &[Vector::new(1, vec![0.1, 0.2, 0.3])])
//!     .unwrap();
//! let results = engine
//!     .search("default", "embeddings", &[0.1, 0.2, 0.3], 1, None)
//!     .unwrap();
//! assert_eq!(results[0].id, 1);
//! ```

pub mod collection;
pub mod command;
pub mod database;
pub mod distance;
pub mod engine;
pub mod error;
pub mod hnsw;
pub mod types;
pub mod value;

pub use collection::{Collection, CollectionInfo};
pub use command::{AOLRecord, CommandPayload};
pub use database::Database;
pub use engine::{CollectionState, DatabaseState, Engine, Snapshot, SNAPSHOT_VERSION};
pub use error::{CoreError, Result};
pub use hnsw::{ExportedNode, HnswGraphState, HnswIndex, HnswStats};
pub use types::{CollectionConfig, HnswParams, Metric, SearchResult, Vector, VectorId};
pub use value::Value;
