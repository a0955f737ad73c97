//! End-to-end tests for the durable file store: restarts, legacy rows,
//! schema errors and exports.

use block_stitch::export::{export_aligned_frames_path, export_registry_dump};
use block_stitch::registration::load_camera_centers;
use block_stitch::{
    BlockId, BlockRegistry, BlockStore, Error, FileStore, NavigationController, NavigationEvent,
    NavigationState, PortalGraphBuilder, Pose, RegistrationStatus, RigidTransform, StitchConfig,
};
use glam::DVec3;
use pretty_assertions::assert_eq;

const LEGACY_STORE: &str = r#"{
  "block_transforms": [
    { "block_name": "A",
      "t00": 1, "t01": 0, "t02": 0, "t03": 0,
      "t10": 0, "t11": 1, "t12": 0, "t13": 0,
      "t20": 0, "t21": 0, "t22": 1, "t23": 0,
      "t30": 0, "t31": 0, "t32": 0, "t33": 1 },
    { "block_name": "B",
      "t00": 1, "t01": 0, "t02": 0, "t03": 2,
      "t10": 0, "t11": 1, "t12": 0, "t13": 0,
      "t20": 0, "t21": 0, "t22": 1, "t23": 3,
      "t30": 0, "t31": 0, "t32": 0, "t33": 1 }
  ],
  "portals": [
    { "portal_id": "A_to_B_0", "block_a": "A", "local_x_a": 2.0, "local_z_a": 3.0,
      "block_b": "B", "local_x_b": 0.0, "local_z_b": 0.0, "radius": 0.5 }
  ]
}"#;

// ============================================================================
// 1. Restart: everything written before a reopen is visible after it
// ============================================================================

#[tokio::test]
async fn test_registry_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blocks.json");
    let t_b = RigidTransform::from_yaw_translation(0.5, DVec3::new(2.0, 0.0, 3.0));

    {
        let registry = BlockRegistry::open(FileStore::open(&path).unwrap()).await.unwrap();
        registry.register_anchor(&"A".into(), None).await.unwrap();
        registry.put_transform(&"B".into(), t_b, None).await.unwrap();
        let snapshot = registry.snapshot();
        let mut builder = PortalGraphBuilder::new(&snapshot, Default::default());
        builder.add_portal(&"A".into(), DVec3::new(2.0, 0.0, 3.0), &"B".into(), 0.5).unwrap();
        builder.commit(registry.store()).await.unwrap();
    }

    let registry = BlockRegistry::open(FileStore::open_existing(&path).unwrap()).await.unwrap();
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.anchor().unwrap().id, BlockId::from("A"));
    assert!(registry.get_transform(&"B".into()).unwrap().abs_diff_eq(&t_b, 1e-12));
    assert_eq!(registry.store().load_portals().await.unwrap().len(), 1);
    assert!(matches!(
        registry.put_transform(&"B".into(), RigidTransform::IDENTITY, None).await,
        Err(Error::AlreadyRegistered(_))
    ));
}

#[tokio::test]
async fn test_reset_clears_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("blocks.json");
    let registry = BlockRegistry::open(FileStore::open(&path).unwrap()).await.unwrap();
    registry.register_anchor(&"A".into(), None).await.unwrap();
    registry.reset().await.unwrap();

    let reopened = FileStore::open_existing(&path).unwrap();
    assert!(reopened.load_blocks().await.unwrap().is_empty());
    assert!(reopened.load_portals().await.unwrap().is_empty());
}

// ============================================================================
// 2. Stores written by older tools
// ============================================================================

#[tokio::test]
async fn test_legacy_rows_load_and_navigate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.json");
    std::fs::write(&path, LEGACY_STORE).unwrap();
    let store = FileStore::open_existing(&path).unwrap();

    let blocks = store.load_blocks().await.unwrap();
    let status: Vec<_> = blocks.iter().map(|b| (b.id.as_str().to_string(), b.status)).collect();
    assert_eq!(
        status,
        vec![
            ("A".to_string(), RegistrationStatus::Anchor),
            ("B".to_string(), RegistrationStatus::Registered),
        ]
    );

    let config = StitchConfig::default();
    let nav = NavigationController::load(&store, &config).await.unwrap();
    let mut state = NavigationState::new("A".into());
    let camera = Pose::from_translation(DVec3::new(2.1, 1.0, 3.0));
    let NavigationEvent::Switched(switch) = nav.poll(&mut state, &camera) else {
        panic!("expected a switch");
    };
    assert!(switch.pose.translation.abs_diff_eq(DVec3::new(0.1, 1.0, 0.0), 1e-12));
}

#[tokio::test]
async fn test_missing_table_is_schema_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.json");
    std::fs::write(&path, r#"{"block_transforms": []}"#).unwrap();
    assert!(matches!(FileStore::open_existing(&path), Err(Error::Schema(_))));
    assert!(matches!(FileStore::open(&path), Err(Error::Schema(_))));
}

#[tokio::test]
async fn test_missing_file_at_runtime() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        FileStore::open_existing(dir.path().join("nope.json")),
        Err(Error::NotFound(_))
    ));
}

// ============================================================================
// 3. Exports
// ============================================================================

#[tokio::test]
async fn test_dump_and_aligned_frames() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("legacy.json");
    std::fs::write(&path, LEGACY_STORE).unwrap();
    let store = FileStore::open_existing(&path).unwrap();
    let registry = BlockRegistry::open(store).await.unwrap();

    let mut dump = Vec::new();
    export_registry_dump(&registry.snapshot(), &mut dump).unwrap();
    let dump = String::from_utf8(dump).unwrap();
    assert!(dump.contains("[A] anchor"));
    assert!(dump.contains("[B] registered"));

    let frames_in = dir.path().join("transforms.json");
    let frames_out = dir.path().join("transforms_aligned.json");
    std::fs::write(
        &frames_in,
        r#"{"frames": [{"transform_matrix": [[1,0,0,0.5],[0,1,0,0],[0,0,1,-0.5],[0,0,0,1]]}]}"#,
    )
    .unwrap();
    let t_b = registry.get_transform(&"B".into()).unwrap();
    export_aligned_frames_path(&frames_in, &frames_out, &t_b).unwrap();

    assert_eq!(load_camera_centers(&frames_out).unwrap(), vec![DVec3::new(2.5, 0.0, 2.5)]);
}
