use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};

use serde_json::json;

use adams_bridge::capability::names;
use adams_bridge::config::Configuration;
use adams_bridge::flow;
use adams_bridge::runtime::memory::{ActorBehavior, Catalog, ClassDef, MemoryLauncher};
use adams_bridge::{
    ActorHandle, ActorRole, Capability, ExecutionHost, LifecycleState, MessageSink, ObjectHandle,
    StartOptions,
};

fn host(headless: bool) -> (ExecutionHost, tempfile::TempDir) {
    let root = tempfile::tempdir().unwrap();
    let host = ExecutionHost::new(Arc::new(MemoryLauncher::standard()));
    host.start(&StartOptions::new(root.path()).headless(headless))
        .unwrap();
    (host, root)
}

fn write_flow(dir: &Path, doc: serde_json::Value) -> PathBuf {
    let path = dir.join("flow.json");
    std::fs::write(&path, doc.to_string()).unwrap();
    path
}

fn counting_flow() -> serde_json::Value {
    json!({
        "class": names::FLOW,
        "options": {"headless": false},
        "actors": [
            {"class": "adams.flow.standalone.SetVariable"},
            {"class": "adams.flow.source.ForLoop", "options": {"loop_upper": 5}},
            {"class": "adams.flow.transformer.MathExpression", "options": {"expression": "X*2"}},
            {"class": "adams.flow.sink.Display"}
        ]
    })
}

#[test]
fn test_headless_host_forces_headless_flow() {
    let (host, root) = host(true);
    let path = write_flow(root.path(), counting_flow());

    let session = host.session().unwrap();
    let flow = flow::read(&session, &path, None, None).unwrap().unwrap();
    assert!(flow.is_headless().unwrap());
}

#[test]
fn test_missing_flow_reports_errors() {
    let (host, root) = host(false);
    let session = host.session().unwrap();
    let mut errors = MessageSink::new();

    let result = flow::read(
        &session,
        root.path().join("missing.flow"),
        Some(&mut errors),
        None,
    )
    .unwrap();
    assert!(result.is_none());
    assert!(errors.len() >= 1);
}

#[test]
fn test_warnings_do_not_prevent_loading() {
    let (host, root) = host(false);
    let path = write_flow(
        root.path(),
        json!({"class": names::FLOW, "options": {"obsolete_option": 1}}),
    );
    let session = host.session().unwrap();
    let mut errors = MessageSink::new();
    let mut warnings = MessageSink::new();

    let flow = flow::read(&session, &path, Some(&mut errors), Some(&mut warnings)).unwrap();
    assert!(flow.is_some());
    assert!(errors.is_empty());
    assert_eq!(warnings.len(), 1);
    assert!(warnings.to_string().contains("obsolete_option"));
}

#[test]
fn test_flow_runs_end_to_end() {
    let (host, root) = host(true);
    let path = write_flow(root.path(), counting_flow());
    let session = host.session().unwrap();
    let flow = flow::read(&session, &path, None, None).unwrap().unwrap();

    assert_eq!(flow.set_up().unwrap(), None);
    assert_eq!(flow.execute().unwrap(), None);
    assert!(flow.is_finished().unwrap());
    assert!(!flow.is_stopped().unwrap());
    flow.wrap_up().unwrap();
    flow.clean_up().unwrap();

    let copy = root.path().join("copy.json");
    assert!(flow::write(&copy, &flow).unwrap());
    let reread = flow::read(&session, &copy, None, None).unwrap().unwrap();
    assert_eq!(reread.to_args().unwrap(), flow.to_args().unwrap());
}

#[test]
fn test_roles_are_exclusive() {
    let (host, _root) = host(false);
    let session = host.session().unwrap();
    let classes = [
        "adams.flow.standalone.SetVariable",
        "adams.flow.source.ForLoop",
        "adams.flow.transformer.PassThrough",
        "adams.flow.transformer.MathExpression",
        "adams.flow.sink.Null",
        "adams.flow.sink.Display",
        names::FLOW,
    ];
    for classname in classes {
        let actor = ActorHandle::new(&session, classname).unwrap();
        let exclusive = [
            flow::is_source(&actor).unwrap(),
            flow::is_sink(&actor).unwrap(),
            flow::is_transformer(&actor).unwrap(),
        ];
        assert!(
            exclusive.iter().filter(|b| **b).count() <= 1,
            "{} has more than one of source/sink/transformer",
            classname
        );
    }

    let display = ActorHandle::new(&session, "adams.flow.sink.Display").unwrap();
    assert_eq!(
        flow::roles(&display).unwrap(),
        vec![ActorRole::Sink, ActorRole::Interactive]
    );
    let standalone = ActorHandle::new(&session, "adams.flow.standalone.SetVariable").unwrap();
    assert!(flow::is_standalone(&standalone).unwrap());
    assert!(!flow::is_interactive(&standalone).unwrap());
}

#[test]
fn test_child_actors_know_their_root() {
    let root = tempfile::tempdir().unwrap();
    let launcher = Arc::new(MemoryLauncher::standard());
    let host = ExecutionHost::new(launcher.clone());
    host.start(&StartOptions::new(root.path())).unwrap();
    let path = write_flow(root.path(), counting_flow());
    let session = host.session().unwrap();
    let flow = flow::read(&session, &path, None, None).unwrap().unwrap();
    assert!(flow.root().unwrap().is_none());
    assert!(flow.parent().unwrap().is_none());
    assert!(flow.check_type(&Capability::Flow).unwrap());
    assert!(flow.check_type(&Capability::ActorHandler).unwrap());

    let children = launcher.runtime().unwrap().children(flow.foreign()).unwrap();
    assert_eq!(children.len(), 4);
    for handle in children {
        let child = ActorHandle::from_foreign(&session, Some(handle)).unwrap();
        let parent = child.parent().unwrap().unwrap();
        let top = child.root().unwrap().unwrap();
        assert!(parent.same_object(&flow).unwrap(), "parent of {}", child);
        assert!(top.same_object(&flow).unwrap(), "root of {}", child);
    }
}

/// Blocks inside `execute` until the test has had its turn.
struct Gate(Barrier);

impl ActorBehavior for Gate {
    fn execute(&self, _config: &Configuration) -> Option<String> {
        self.0.wait();
        self.0.wait();
        None
    }
}

#[derive(Default)]
struct Counter(AtomicUsize);

impl ActorBehavior for Counter {
    fn execute(&self, _config: &Configuration) -> Option<String> {
        self.0.fetch_add(1, Ordering::SeqCst);
        None
    }
}

#[test]
fn test_stop_execution_while_running() {
    let gate = Arc::new(Gate(Barrier::new(2)));
    let counter = Arc::new(Counter::default());
    let catalog = Catalog::standard()
        .with(
            ClassDef::actor("test.Gate")
                .role(ActorRole::Standalone)
                .behavior(gate.clone()),
        )
        .with(
            ClassDef::actor("test.Counter")
                .role(ActorRole::Standalone)
                .behavior(counter.clone()),
        );
    let root = tempfile::tempdir().unwrap();
    let host = ExecutionHost::new(Arc::new(MemoryLauncher::new(catalog)));
    host.start(&StartOptions::new(root.path())).unwrap();
    let path = write_flow(
        root.path(),
        json!({
            "class": names::FLOW,
            "actors": [{"class": "test.Gate"}, {"class": "test.Counter"}]
        }),
    );
    let session = host.session().unwrap();
    let flow = flow::read(&session, &path, None, None).unwrap().unwrap();
    assert_eq!(flow.set_up().unwrap(), None);

    std::thread::scope(|scope| {
        let running = scope.spawn(|| flow.execute());
        gate.0.wait();
        assert_eq!(flow.lifecycle(), LifecycleState::Executing);
        assert!(!flow.is_stopped().unwrap());
        flow.stop_execution(Some("stopped by user")).unwrap();
        gate.0.wait();
        assert_eq!(running.join().unwrap().unwrap(), None);
    });

    assert!(flow.is_stopped().unwrap());
    assert!(flow.is_finished().unwrap());
    assert_eq!(counter.0.load(Ordering::SeqCst), 0);
}

#[test]
fn test_non_actor_cannot_become_actor_handle() {
    let (host, _root) = host(false);
    let session = host.session().unwrap();
    let info = ObjectHandle::instantiate::<&str>(&session, names::SYSTEM_INFO, &[]).unwrap();
    assert!(ActorHandle::wrap(info).is_err());
}
