use std::sync::Arc;

use serde_json::json;

use adams_bridge::runtime::memory::MemoryLauncher;
use adams_bridge::{ActorHandle, BridgeError, ExecutionHost, HostStatus, StartOptions};

const FOR_LOOP: &str = "adams.flow.source.ForLoop";

fn started(headless: bool) -> (Arc<MemoryLauncher>, ExecutionHost, tempfile::TempDir) {
    let root = tempfile::tempdir().unwrap();
    let launcher = Arc::new(MemoryLauncher::standard());
    let host = ExecutionHost::new(launcher.clone());
    host.start(&StartOptions::new(root.path()).headless(headless))
        .unwrap();
    (launcher, host, root)
}

#[test]
fn test_start_twice_launches_once() {
    let (launcher, host, root) = started(false);
    host.start(&StartOptions::new(root.path())).unwrap();
    assert_eq!(launcher.launches(), 1);
    assert!(host.is_started());
}

#[test]
fn test_stop_never_started_is_noop() {
    let host = ExecutionHost::new(Arc::new(MemoryLauncher::standard()));
    host.stop();
    host.stop();
    assert_eq!(host.status(), HostStatus::NeverStarted);
    assert!(matches!(host.session(), Err(BridgeError::HostNotStarted)));
}

#[test]
fn test_missing_root_dir_fails_without_launch() {
    let launcher = Arc::new(MemoryLauncher::standard());
    let host = ExecutionHost::new(launcher.clone());
    let err = host
        .start(&StartOptions::new("/no/such/adams/root"))
        .unwrap_err();
    assert!(matches!(err, BridgeError::RootDirNotFound(_)));
    assert_eq!(launcher.launches(), 0);
    assert!(!host.is_started());
}

#[test]
fn test_launch_config_carries_options() {
    let root = tempfile::tempdir().unwrap();
    let launcher = Arc::new(MemoryLauncher::standard());
    let host = ExecutionHost::new(launcher.clone());
    host.start(
        &StartOptions::new(root.path())
            .max_heap("2g")
            .headless(true)
            .convert_text(false),
    )
    .unwrap();

    let config = launcher.last_config().unwrap();
    assert!(config.options.contains(&"-Xmx2g".to_string()));
    assert!(config.headless);
    assert!(!config.convert_text);
    assert_eq!(config.resource_paths[0], root.path().join("lib").join("*"));
    assert!(host.is_headless());
}

#[test]
fn test_handles_fail_after_stop() {
    let (_, host, _root) = started(false);
    let session = host.session().unwrap();
    let actor = ActorHandle::new(&session, FOR_LOOP).unwrap();
    assert_eq!(actor.set_up().unwrap(), None);

    host.stop();
    assert!(!session.is_alive());
    assert!(matches!(actor.execute(), Err(BridgeError::HostStopped)));
    assert!(matches!(actor.to_text(), Err(BridgeError::HostStopped)));
    assert!(matches!(
        ActorHandle::new(&session, FOR_LOOP),
        Err(BridgeError::HostStopped)
    ));
}

#[test]
fn test_restart_gives_fresh_session() {
    let (launcher, host, root) = started(false);
    let first = host.session().unwrap();
    host.stop();
    host.start(&StartOptions::new(root.path())).unwrap();
    let second = host.session().unwrap();
    assert_ne!(first.id(), second.id());
    assert!(second.is_alive());
    assert_eq!(launcher.launches(), 2);
}

#[test]
fn test_codec_round_trips() {
    let (_, host, _root) = started(false);
    let session = host.session().unwrap();

    let actor = ActorHandle::new(&session, FOR_LOOP).unwrap();
    actor
        .apply_mapping(
            json!({"name": "count", "loop_lower": 2, "loop_upper": 7})
                .as_object()
                .cloned()
                .unwrap(),
        )
        .unwrap();

    let mapping = actor.to_mapping().unwrap();
    let via_mapping = ActorHandle::from_mapping(&session, FOR_LOOP, mapping.clone()).unwrap();
    assert_eq!(via_mapping.to_mapping().unwrap(), mapping);

    let text = actor.to_text().unwrap();
    let via_text = ActorHandle::from_text(&session, FOR_LOOP, &text).unwrap();
    assert_eq!(via_text.to_text().unwrap(), text);

    let args = actor.to_args().unwrap();
    let via_args = ActorHandle::from_args(&session, FOR_LOOP, &args).unwrap();
    assert_eq!(via_args.to_args().unwrap(), args);
    assert_eq!(via_args.to_mapping().unwrap(), mapping);
}

#[test]
fn test_full_lifecycle_through_host() {
    let (_, host, _root) = started(false);
    let session = host.session().unwrap();
    let actor = ActorHandle::from_args(&session, FOR_LOOP, &["-loop_upper", "3"]).unwrap();

    assert_eq!(actor.set_up().unwrap(), None);
    assert_eq!(actor.execute().unwrap(), None);
    assert!(actor.is_executed().unwrap());
    actor.wrap_up().unwrap();
    actor.clean_up().unwrap();
    assert!(actor.set_up().unwrap().is_some());
}
