mod common;

use std::time::Duration;

use anyhow::Result;
use common::{Completion, Harness, RecordingHost};
use veml_loader::{
    load_loader_config_from_env, CancelToken, DeploymentMode, FetchError, LoadError, LoadState,
    LoaderConfig, LocalStore, ResolvedBackground,
};
use veml_runtime::{
    CapabilityHints, Rgba, SchemaVersion, SyncTransport, ValidationError,
};

const ROOM_URI: &str = "https://worlds.example/room/room.veml";
const MAIN_SCRIPT_URI: &str = "https://worlds.example/room/scripts/main.js";

fn room_harness(host: RecordingHost) -> Harness {
    let harness = Harness::new(host);
    harness.serve(ROOM_URI, common::fixture("v3_0.json"));
    harness.serve(MAIN_SCRIPT_URI, "world.log('main')");
    harness
}

#[tokio::test]
async fn loads_room_end_to_end() -> Result<()> {
    let harness = room_harness(RecordingHost::new(Completion::Immediate));
    let report = harness
        .loader
        .load(&common::url(ROOM_URI), &CancelToken::new())
        .await?;

    assert_eq!(
        report.states,
        vec![
            LoadState::Idle,
            LoadState::Downloading,
            LoadState::Parsed,
            LoadState::Migrated,
            LoadState::Validated,
            LoadState::ProcessingMetadata,
            LoadState::ProcessingEnvironment,
            LoadState::WaitingForEntities,
            LoadState::ApplyingHierarchy,
            LoadState::Done,
        ]
    );
    assert_eq!(report.source_version, SchemaVersion::V3_0);
    assert_eq!(report.title, "Room");
    assert_eq!(report.capabilities, CapabilityHints::VR | CapabilityHints::PHYSICS);
    assert!(!report.entities_timed_out);
    assert_eq!(report.metrics.entities_requested, 5);
    assert_eq!(report.metrics.entities_completed, 5);
    assert_eq!(report.metrics.hierarchy_applied, 5);
    assert!(!report.metrics.served_from_store);

    let host = &harness.host;
    assert_eq!(host.created_tags(), ["room", "ui", "table", "ceiling", "exit"]);
    assert_eq!(report.entity_ids.len(), 5);
    for request in host.created.lock().iter() {
        assert!(request.parentless);
        assert!(!request.visible);
    }

    let table = host.request("table").expect("table requested");
    assert_eq!(
        table.resources,
        vec![common::url("https://worlds.example/room/models/table.glb")]
    );
    let binding = table.synchronizer.expect("table is bound to its synchronizer");
    assert_eq!(binding.synchronizer, "room-sync");
    assert_eq!(binding.session, "room");
    assert_eq!(table.placement_sockets.len(), 1);

    let room = host.request("room").expect("room requested");
    let parents = host.parents.lock().clone();
    assert_eq!(parents.len(), 5);
    assert!(parents.contains(&(host.handle_of(room.id).unwrap(), None)));
    assert!(parents.contains(&(
        host.handle_of(table.id).unwrap(),
        host.handle_of(room.id)
    )));
    assert_eq!(host.revealed.lock().len(), 5);

    assert_eq!(
        *host.scripts.lock(),
        vec![
            "world.log('inline')".to_string(),
            "world.log('main')".to_string(),
            format!("tableLoaded({})", table.id),
        ]
    );
    assert_eq!(
        *host.inputs.lock(),
        vec![("left".to_string(), "onLeft(?)".to_string())]
    );

    let synchronizers = host.synchronizers.lock().clone();
    assert_eq!(synchronizers.len(), 1);
    let (id, endpoint, transport) = &synchronizers[0];
    assert_eq!(id, "room-sync");
    assert_eq!(endpoint.host, "sync.example");
    assert_eq!(endpoint.port, 8883);
    assert!(endpoint.use_tls);
    assert_eq!(*transport, SyncTransport::Tcp);

    let backgrounds = host.backgrounds.lock().clone();
    assert_eq!(backgrounds.len(), 1);
    match backgrounds[0] {
        ResolvedBackground::Solid(Rgba { r, g, b, a }) => {
            assert!((r - 0x33 as f32 / 255.0).abs() < 1e-6);
            assert!((g - 0x66 as f32 / 255.0).abs() < 1e-6);
            assert!((b - 0x99 as f32 / 255.0).abs() < 1e-6);
            assert_eq!(a, 1.0);
        }
        ref other => panic!("unexpected background {other:?}"),
    }

    assert!(harness.store.contains(&common::url(ROOM_URI)));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn entity_timeout_applies_what_completed() -> Result<()> {
    let harness = room_harness(RecordingHost::new(Completion::Immediate).stalling("ceiling"));
    let (_guard, logs) = common::capture_logs();

    let report = harness
        .loader
        .load(&common::url(ROOM_URI), &CancelToken::new())
        .await?;

    assert_eq!(report.final_state(), LoadState::Done);
    assert!(report.entities_timed_out);
    assert_eq!(report.metrics.entities_completed, 4);
    assert_eq!(report.metrics.hierarchy_skipped, 1);
    assert_eq!(report.metrics.hierarchy_applied, 4);
    assert_eq!(harness.host.parents.lock().len(), 4);

    let warnings = common::warnings(&logs);
    let timeout = warnings
        .iter()
        .find(|envelope| envelope.message == "entities.timeout")
        .expect("timeout is reported");
    assert_eq!(timeout.target, "veml::loader");
    assert_eq!(timeout.fields["outstanding"], 1);
    assert!(warnings
        .iter()
        .any(|envelope| envelope.message == "hierarchy.skip_incomplete"
            && envelope.field_str("tag") == Some("ceiling")));

    // Scripts still run after a partial load.
    assert_eq!(harness.host.scripts.lock().len(), 3);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn nothing_completing_still_reaches_done() -> Result<()> {
    let harness = room_harness(RecordingHost::new(Completion::Never));
    let started = tokio::time::Instant::now();
    let report = harness
        .loader
        .load(&common::url(ROOM_URI), &CancelToken::new())
        .await?;
    assert!(started.elapsed() >= Duration::from_secs(10));
    assert!(report.entities_timed_out);
    assert_eq!(report.metrics.entities_completed, 0);
    assert_eq!(report.metrics.hierarchy_skipped, 5);
    assert!(harness.host.parents.lock().is_empty());
    assert!(harness.host.revealed.lock().is_empty());
    // On-load events only fire for entities that exist.
    assert_eq!(harness.host.scripts.lock().len(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn unresponsive_runtime_times_out_into_done() -> Result<()> {
    let harness = Harness::new(RecordingHost::new(Completion::Never));
    let uri = harness.serve(
        "https://worlds.example/minimal/room.veml",
        r#"{
            "xmlns": "https://veml.dev/schema/3.0",
            "metadata": {"title": "Room"},
            "environment": {
                "background": {"color": "black"},
                "entity": [{
                    "type": "entity",
                    "tag": "root",
                    "transform": {"type": "scale"},
                    "children": [{
                        "type": "meshentity",
                        "tag": "chair",
                        "mesh-name": "Chair",
                        "mesh-resource": ["chair.gltf", "chair.bin"],
                        "transform": {"type": "scale", "scale": {"x": 1, "y": 1, "z": 1}}
                    }]
                }]
            }
        }"#,
    );
    let (_guard, logs) = common::capture_logs();
    let started = tokio::time::Instant::now();

    let report = harness.loader.load(&uri, &CancelToken::new()).await?;

    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11));
    assert_eq!(report.final_state(), LoadState::Done);
    assert!(report.entities_timed_out);
    assert_eq!(report.metrics.hierarchy_skipped, 2);
    assert_eq!(
        harness.host.request("chair").map(|request| request.resources.len()),
        Some(2)
    );
    assert!(common::warnings(&logs)
        .iter()
        .any(|envelope| envelope.message == "entities.timeout"));
    Ok(())
}

#[tokio::test]
async fn unresolvable_entity_attaches_nothing() {
    let harness = room_harness(RecordingHost::new(Completion::Immediate).losing("table"));
    let err = harness
        .loader
        .load(&common::url(ROOM_URI), &CancelToken::new())
        .await
        .expect_err("a completed entity that cannot be found is fatal");
    match err {
        LoadError::EntityResolution { tag, .. } => assert_eq!(tag, "table"),
        other => panic!("unexpected error {other}"),
    }
    assert!(harness.host.parents.lock().is_empty());
    assert!(harness.host.revealed.lock().is_empty());
    assert!(harness.host.scripts.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancellation_during_entity_wait_fails_the_load() {
    let harness = room_harness(RecordingHost::new(Completion::Never));
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let started = tokio::time::Instant::now();
    let err = harness
        .loader
        .load(&common::url(ROOM_URI), &cancel)
        .await
        .expect_err("cancelled");
    assert!(matches!(err, LoadError::Cancelled(_)));
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(harness.host.created.lock().len(), 5);
    assert!(harness.host.parents.lock().is_empty());
}

#[tokio::test]
async fn cancelled_before_start_never_fetches() {
    let harness = room_harness(RecordingHost::new(Completion::Immediate));
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = harness
        .loader
        .load(&common::url(ROOM_URI), &cancel)
        .await
        .expect_err("cancelled");
    assert!(matches!(err, LoadError::Cancelled(_)));
    assert!(harness.store.is_empty());
}

#[tokio::test]
async fn missing_document_reports_status() {
    let harness = Harness::new(RecordingHost::new(Completion::Immediate));
    let err = harness
        .loader
        .load(&common::url("https://worlds.example/none.veml"), &CancelToken::new())
        .await
        .expect_err("nothing served");
    match err {
        LoadError::Fetch {
            source: FetchError::Status { status, .. },
            ..
        } => assert_eq!(status, 404),
        other => panic!("unexpected error {other}"),
    }
    assert!(harness.host.created.lock().is_empty());
}

#[tokio::test]
async fn store_serves_cached_documents() -> Result<()> {
    let harness = Harness::new(RecordingHost::new(Completion::Immediate));
    let uri = common::url("https://worlds.example/cached/lobby.veml");
    harness.store.write(&uri, common::fixture("v1_0.json").as_bytes());

    let report = harness.loader.load(&uri, &CancelToken::new()).await?;
    assert!(report.metrics.served_from_store);
    assert_eq!(report.source_version, SchemaVersion::V1_0);
    assert!(report.warnings.is_empty());

    let synchronizers = harness.host.synchronizers.lock().clone();
    let (_, endpoint, transport) = &synchronizers[0];
    assert_eq!(endpoint.host, "lobby.example");
    assert_eq!(endpoint.port, 5525);
    assert!(!endpoint.use_tls);
    assert_eq!(*transport, SyncTransport::Tcp);

    let chair = harness.host.request("chair").expect("chair requested");
    assert_eq!(
        chair.resources,
        vec![common::url("https://worlds.example/cached/models/chair.glb")]
    );
    let ground = harness.host.request("ground").expect("ground requested");
    let terrain = ground.terrain.expect("terrain grids decoded");
    let heights = terrain.heights.expect("heights present");
    assert_eq!((heights.width(), heights.height()), (3, 3));
    assert_eq!(heights.sample(2, 2), 2.0);
    Ok(())
}

#[tokio::test]
async fn failed_script_is_skipped() -> Result<()> {
    let harness = Harness::new(RecordingHost::new(Completion::Immediate));
    let uri = harness.serve(ROOM_URI, common::fixture("v3_0.json"));
    let (_guard, logs) = common::capture_logs();

    let report = harness.loader.load(&uri, &CancelToken::new()).await?;
    assert_eq!(report.metrics.scripts_run, 1);
    assert_eq!(report.metrics.scripts_skipped, 1);
    assert_eq!(report.metrics.resource_failures, 1);
    let scripts = harness.host.scripts.lock().clone();
    assert_eq!(scripts[0], "world.log('inline')");
    assert!(scripts[1].starts_with("tableLoaded("));
    assert!(common::warnings(&logs)
        .iter()
        .any(|envelope| envelope.message == "script.fetch_failed"));
    Ok(())
}

#[tokio::test]
async fn invalid_document_fails_before_creating_entities() {
    let harness = Harness::new(RecordingHost::new(Completion::Immediate));
    let uri = harness.serve(
        "https://worlds.example/bad.veml",
        r#"{
            "xmlns": "https://veml.dev/schema/3.0",
            "metadata": {"title": "Bad"},
            "environment": {
                "background": {"color": "black"},
                "entity": [{"type": "textentity", "tag": "label", "transform": {"type": "scale"}}]
            }
        }"#,
    );
    let err = harness
        .loader
        .load(&uri, &CancelToken::new())
        .await
        .expect_err("text with a scale transform");
    assert!(matches!(
        err,
        LoadError::Validation(ValidationError::IncompatibleTransform { .. })
    ));
    assert!(harness.host.created.lock().is_empty());
    assert!(harness.host.backgrounds.lock().is_empty());
}

#[tokio::test]
async fn texture_backgrounds_fall_back_when_missing() -> Result<()> {
    let harness = Harness::new(RecordingHost::new(Completion::Immediate));
    let uri = harness.serve(
        "https://worlds.example/sky/world.veml",
        r#"{
            "xmlns": "https://veml.dev/schema/3.0",
            "metadata": {"title": "Sky"},
            "environment": {"background": {"color": "textures/sky.png"}}
        }"#,
    );
    let report = harness.loader.load(&uri, &CancelToken::new()).await?;
    assert_eq!(report.metrics.resource_failures, 1);
    let backgrounds = harness.host.backgrounds.lock().clone();
    match backgrounds.as_slice() {
        [ResolvedBackground::Solid(color)] => {
            assert!((color.r - 128.0 / 255.0).abs() < 1e-6);
            assert_eq!(color.r, color.g);
            assert_eq!(color.g, color.b);
        }
        other => panic!("unexpected backgrounds {other:?}"),
    }
    Ok(())
}

#[tokio::test]
async fn texture_backgrounds_are_fetched_relative_to_the_document() -> Result<()> {
    let harness = Harness::new(RecordingHost::new(Completion::Immediate));
    harness.serve("https://worlds.example/sky/textures/sky.png", vec![1u8, 2, 3]);
    let uri = harness.serve(
        "https://worlds.example/sky/world.veml",
        r#"{
            "xmlns": "https://veml.dev/schema/3.0",
            "metadata": {"title": "Sky"},
            "environment": {"background": {"panorama": "textures/sky.png"}}
        }"#,
    );
    let report = harness.loader.load(&uri, &CancelToken::new()).await?;
    assert_eq!(report.metrics.resource_failures, 0);
    let backgrounds = harness.host.backgrounds.lock().clone();
    assert_eq!(
        backgrounds,
        vec![ResolvedBackground::Panorama {
            uri: common::url("https://worlds.example/sky/textures/sky.png"),
            bytes: vec![1, 2, 3],
        }]
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_background_fetch_in_flight() {
    let harness = Harness::new(RecordingHost::new(Completion::Never));
    let sky = harness.serve("https://worlds.example/slow/textures/sky.png", vec![1u8, 2, 3]);
    harness.fetcher.delay(&sky, Duration::from_secs(5));
    let uri = harness.serve(
        "https://worlds.example/slow/world.veml",
        r#"{
            "xmlns": "https://veml.dev/schema/3.0",
            "metadata": {"title": "Slow sky"},
            "environment": {
                "background": {"panorama": "textures/sky.png"},
                "entity": [{"type": "entity", "tag": "root", "transform": {"type": "scale"}}]
            }
        }"#,
    );
    let cancel = CancelToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(1)).await;
        trigger.cancel();
    });

    let err = harness
        .loader
        .load(&uri, &cancel)
        .await
        .expect_err("cancelled");
    assert!(matches!(err, LoadError::Cancelled(_)));

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert!(harness.host.backgrounds.lock().is_empty());
}

#[tokio::test(start_paused = true)]
async fn failed_creation_settles_without_waiting_out_the_timeout() -> Result<()> {
    let harness = room_harness(RecordingHost::new(Completion::Immediate).failing("ceiling"));
    let started = tokio::time::Instant::now();

    let report = harness
        .loader
        .load(&common::url(ROOM_URI), &CancelToken::new())
        .await?;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(report.final_state(), LoadState::Done);
    assert!(!report.entities_timed_out);
    assert_eq!(report.metrics.entities_requested, 5);
    assert_eq!(report.metrics.entities_completed, 4);
    assert_eq!(report.metrics.hierarchy_skipped, 1);
    assert_eq!(report.metrics.hierarchy_applied, 4);
    Ok(())
}

#[tokio::test]
async fn bad_sync_descriptors_are_skipped_and_the_rest_registered() -> Result<()> {
    let harness = Harness::new(RecordingHost::new(Completion::Immediate));
    let uri = harness.serve(
        "https://worlds.example/sync/world.veml",
        r#"{
            "xmlns": "https://veml.dev/schema/3.0",
            "metadata": {
                "title": "Sync",
                "synchronizationservice": [
                    {"id": "good", "address": "plain:sync.example:5000", "session": "s", "type": "tcp"},
                    {"id": "bad-scheme", "address": "udp:h:1", "session": "s", "type": "tcp"},
                    {"id": "bad-type", "address": "sync.example:5001", "session": "s", "type": "mqtt"}
                ]
            },
            "environment": {"background": {"color": "black"}}
        }"#,
    );
    let (_guard, logs) = common::capture_logs();

    let report = harness.loader.load(&uri, &CancelToken::new()).await?;

    assert_eq!(report.final_state(), LoadState::Done);
    assert_eq!(report.metrics.sync_services_registered, 1);
    assert_eq!(report.metrics.sync_services_skipped, 2);
    let synchronizers = harness.host.synchronizers.lock().clone();
    assert_eq!(synchronizers.len(), 1);
    assert_eq!(synchronizers[0].0, "good");
    assert_eq!(synchronizers[0].1.port, 5000);

    let skipped: Vec<String> = common::warnings(&logs)
        .iter()
        .filter(|envelope| envelope.message == "sync.descriptor_skipped")
        .filter_map(|envelope| envelope.field_str("id").map(str::to_string))
        .collect();
    assert_eq!(skipped, ["bad-scheme", "bad-type"]);
    Ok(())
}

#[test]
fn loader_config_is_read_from_the_environment() {
    common::ensure_test_config();
    let (config, metadata) = load_loader_config_from_env();
    assert!(metadata.path().is_some());
    assert_eq!(config.deployment, DeploymentMode::Web);
    assert_eq!(config.timeout(), Duration::from_secs(120));
    assert_eq!(config.script_timeout(), Duration::from_secs(5));
    assert_eq!(config.base_uri.as_deref(), Some("https://cdn.example/worlds/"));

    let builtin = LoaderConfig::builtin();
    assert_eq!(builtin.timeout(), DeploymentMode::Desktop.default_timeout());
}
