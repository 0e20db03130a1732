use tempfile::TempDir;
use vectrix_core::{CollectionConfig, Engine, HnswParams, Metric, Vector};
use vectrix_persistence::{PersistenceConfig, PersistenceManager, SyncPolicy};

fn config(data_dir: &std::path::Path) -> PersistenceConfig {
    PersistenceConfig {
        data_dir: data_dir.to_path_buf(),
        aol_sync: SyncPolicy::Always,
        ..Default::default()
    }
}

#[tokio::test]
async fn recover_on_empty_data_dir_is_a_no_op() {
    let dir = TempDir::new().unwrap();
    let manager = PersistenceManager::new(config(dir.path())).unwrap();
    manager.attach_engine(Engine::new()).await;

    let stats = manager.recover().await.unwrap();
    assert_eq!(stats.records_applied, 0);
    assert!(!stats.snapshot_loaded);
}

#[tokio::test]
async fn append_then_reopen_replays_every_record() {
    let dir = TempDir::new().unwrap();
    {
        let manager = PersistenceManager::new(config(dir.path())).unwrap();
        manager.attach_engine(Engine::new()).await;
        manager.recover().await.unwrap();

        manager
            .record_mutation(
                Some("d".into()),
                None,
                vectrix_core::CommandPayload::CreateDatabase,
            )
            .await
            .unwrap();
        manager
            .record_mutation(
                Some("d".into()),
                None,
                vectrix_core::CommandPayload::CreateCollection {
                    config: CollectionConfig {
                        name: "c".into(),
                        metric: Metric::L2,
                        hnsw: HnswParams::default(),
                    },
                },
            )
            .await
            .unwrap();
        manager
            .record_mutation(
                Some("d".into()),
                Some("c".into()),
                vectrix_core::CommandPayload::Insert {
                    vectors: vec![
                        Vector::new(1, vec![1.0, 2.0]),
                        Vector::new(2, vec![3.0, 4.0]),
                    ],
                },
            )
            .await
            .unwrap();
    }

    let manager = PersistenceManager::new(config(dir.path())).unwrap();
    manager.attach_engine(Engine::new()).await;
    let stats = manager.recover().await.unwrap();
    assert_eq!(stats.records_applied, 3);

    let engine_lock = manager.engine_handle();
    let guard = engine_lock.read().await;
    assert_eq!(guard.as_ref().unwrap().count("d", "c").unwrap(), 2);
}

#[tokio::test]
async fn snapshot_now_truncates_the_aol() {
    let dir = TempDir::new().unwrap();
    let manager = PersistenceManager::new(config(dir.path())).unwrap();
    manager.attach_engine(Engine::new()).await;
    manager.recover().await.unwrap();

    {
        let engine_lock = manager.engine_handle();
        let mut guard = engine_lock.write().await;
        let engine = guard.as_mut().unwrap();
        engine.create_database("d").unwrap();
        engine
            .create_collection(
                "d",
                CollectionConfig {
                    name: "c".into(),
                    metric: Metric::L2,
                    hnsw: HnswParams::default(),
                },
            )
            .unwrap();
    }
    manager
        .record_mutation(
            Some("d".into()),
            None,
            vectrix_core::CommandPayload::CreateDatabase,
        )
        .await
        .unwrap();

    let aol_path = dir.path().join("aol.bin");
    let size_before = std::fs::metadata(&aol_path).unwrap().len();
    assert!(size_before > 0);

    manager.snapshot_now().await.unwrap();
    let size_after = std::fs::metadata(&aol_path).unwrap().len();
    assert_eq!(size_after, 0);
    assert!(dir.path().join("snapshot.bin").exists());
}

#[tokio::test]
async fn recovering_from_a_snapshot_skips_replaying_superseded_records() {
    let dir = TempDir::new().unwrap();
    {
        let manager = PersistenceManager::new(config(dir.path())).unwrap();
        manager.attach_engine(Engine::new()).await;
        manager.recover().await.unwrap();
        {
            let engine_lock = manager.engine_handle();
            let mut guard = engine_lock.write().await;
            let engine = guard.as_mut().unwrap();
            engine.create_database("d").unwrap();
            engine
                .create_collection(
                    "d",
                    CollectionConfig {
                        name: "c".into(),
                        metric: Metric::L2,
                        hnsw: HnswParams::default(),
                    },
                )
                .unwrap();
            engine
                .insert("d", "c", &[Vector::new(1, vec![1.0])])
                .unwrap();
        }
        manager.snapshot_now().await.unwrap();
    }

    let manager = PersistenceManager::new(config(dir.path())).unwrap();
    manager.attach_engine(Engine::new()).await;
    let stats = manager.recover().await.unwrap();
    assert!(stats.snapshot_loaded);
    assert_eq!(stats.records_applied, 0);

    let engine_lock = manager.engine_handle();
    let guard = engine_lock.read().await;
    assert_eq!(guard.as_ref().unwrap().count("d", "c").unwrap(), 1);
}
