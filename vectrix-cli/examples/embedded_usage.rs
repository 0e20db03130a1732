//! Demonstrates driving Vectrix as an embedded library: create a database
//! and collection, insert vectors, search, then snapshot and recover from
//! a fresh process (simulated here by dropping and rebuilding the
//! persistence manager against the same data directory).

use vectrix_core::{CollectionConfig, HnswParams, Metric, Vector};
use vectrix_persistence::{PersistenceConfig, PersistenceManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let data_dir = std::env::temp_dir().join("vectrix-embedded-demo");
    let _ = std::fs::remove_dir_all(&data_dir);

    let config = PersistenceConfig {
        data_dir: data_dir.clone(),
        ..Default::default()
    };
    let manager = PersistenceManager::new(config)?;
    manager.attach_engine(vectrix_core::Engine::new()).await;
    manager.recover().await?;

    {
        let engine_lock = manager.engine_handle();
        let mut guard = engine_lock.write().await;
        let engine = guard.as_mut().expect("engine attached");
        engine.create_database("demo")?;
        engine.create_collection(
            "demo",
            CollectionConfig {
                name: "embeddings".into(),
                metric: Metric::Cosine,
                hnsw: HnswParams::default(),
            },
        )?;
        engine.insert(
            "demo",
            "embeddings",
            &[
                Vector::new(1, vec![1.0, 0.0, 0.0]),
                Vector::new(2, vec![0.0, 1.0, 0.0]),
            ],
        )?;
    }

    manager.snapshot_now().await?;
    println!("snapshot written to {}", data_dir.display());

    let recovered = PersistenceManager::new(PersistenceConfig {
        data_dir,
        ..Default::default()
    })?;
    recovered.attach_engine(vectrix_core::Engine::new()).await;
    let stats = recovered.recover().await?;
    println!(
        "recovered {} AOL records, snapshot_loaded={}",
        stats.records_applied, stats.snapshot_loaded
    );

    let engine_lock = recovered.engine_handle();
    let guard = engine_lock.read().await;
    let engine = guard.as_ref().expect("engine attached");
    let results = engine.search("demo", "embeddings", &[1.0, 0.0, 0.0], 2, None)?;
    println!("search results: {results:?}");

    Ok(())
}
