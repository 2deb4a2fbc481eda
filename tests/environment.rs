mod common;

use std::sync::Arc;

use common::{OnStart, RecordingSink, Scripted, Trace, builder, registry};
use sessionvisor::{EventKind, Phase, SessionConfig};

#[tokio::test]
async fn every_change_reaches_each_sink_once() {
    let trace = Trace::default();
    let sink = Arc::new(RecordingSink::default());
    let mut orch = builder(
        SessionConfig::default(),
        registry(vec![("a", Scripted::arc("a", Phase::Init, &trace))]),
    )
    .with_sink(sink.clone())
    .build();
    orch.initialize().await.expect("initialize");
    orch.start().await.expect("start");
    // Startup resync.
    assert_eq!(sink.pushes().len(), 1);

    orch.set_environment("GTK_THEME", "Adwaita").await;
    orch.unset_environment("GTK_THEME").await;

    let pushes = sink.pushes();
    assert_eq!(pushes.len(), 3);
    assert_eq!(pushes[1].get("GTK_THEME").map(String::as_str), Some("Adwaita"));
    assert!(!pushes[2].contains_key("GTK_THEME"));
    assert_eq!(trace.count("env:a"), 2);
}

#[tokio::test]
async fn setting_the_same_value_twice_is_still_propagated() {
    let sink = Arc::new(RecordingSink::default());
    let mut orch = builder(SessionConfig::default(), registry(Vec::new()))
        .with_sink(sink.clone())
        .build();
    orch.initialize().await.expect("initialize");
    orch.start().await.expect("start");

    orch.set_environment("LANG", "C.UTF-8").await;
    orch.set_environment("LANG", "C.UTF-8").await;

    let pushes = sink.pushes();
    assert_eq!(pushes.len(), 3);
    assert_eq!(pushes[1], pushes[2]);
    assert_eq!(orch.environment().get("LANG"), Some("C.UTF-8"));
}

#[tokio::test]
async fn session_local_keys_stay_local() {
    let sink = Arc::new(RecordingSink::default());
    let mut orch = builder(SessionConfig::default(), registry(Vec::new()))
        .with_sink(sink.clone())
        .build();
    orch.initialize().await.expect("initialize");
    orch.start().await.expect("start");

    orch.set_environment("XDG_SESSION_ID", "7").await;
    orch.set_environment("BASH_FUNC_x%%", "() { :; }").await;

    let last = sink.pushes().pop().expect("pushed");
    assert!(!last.contains_key("XDG_SESSION_ID"));
    assert!(!last.contains_key("BASH_FUNC_x%%"));
    assert_eq!(orch.environment().get("XDG_SESSION_ID"), Some("7"));
}

#[tokio::test]
async fn module_changes_are_visible_to_later_modules() {
    let trace = Trace::default();
    let sink = Arc::new(RecordingSink::default());
    let reg = registry(vec![
        (
            "reader",
            Scripted::with("reader", Phase::Applications, OnStart::Observe("QT_SCALE"), &trace),
        ),
        (
            "writer",
            Scripted::with("writer", Phase::EarlyInit, OnStart::SetEnv("QT_SCALE", "2"), &trace),
        ),
    ]);
    let mut orch = builder(SessionConfig::default(), reg)
        .with_sink(sink.clone())
        .build();
    let mut events = orch.bus().subscribe();
    orch.initialize().await.expect("initialize");
    orch.start().await.expect("start");

    assert_eq!(
        trace.lines(),
        vec!["start:writer", "env:writer", "start:reader", "saw:reader:QT_SCALE=2"]
    );
    assert_eq!(sink.pushes().len(), 2);

    let mut set_events = 0;
    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::EnvironmentSet {
            assert_eq!(ev.key.as_deref(), Some("QT_SCALE"));
            set_events += 1;
        }
    }
    assert_eq!(set_events, 1);
}
