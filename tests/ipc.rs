mod common;

use std::sync::Arc;

use common::{RecordingSink, Scripted, Trace, builder, on_demand, registry};
use sessionvisor::{
    BackendCall, BackendEvent, EventKind, FakeBackend, InhibitToken, Phase, SessionConfig,
    SessionControl, SessionInterface,
};
use tokio::sync::mpsc;

#[tokio::test]
async fn interface_maps_calls_onto_the_session() {
    let trace = Trace::default();
    let sink = Arc::new(RecordingSink::default());
    let reg = registry(Vec::new())
        .with_candidate(on_demand("notify", Scripted::arc("notify", Phase::Applications, &trace)));
    let orch = builder(SessionConfig::default(), reg)
        .with_sink(sink.clone())
        .build();
    let backend = Arc::new(FakeBackend::new());
    let iface = SessionInterface::new(orch.handle(), backend.clone(), orch.bus().clone());
    let session = tokio::spawn(orch.run());

    iface.load("notify").await.expect("load");
    iface.set_environment("EDITOR", "vi").await.expect("set");
    iface.unset_environment("EDITOR").await.expect("unset");
    iface.unload("notify").await.expect("unload");

    let pushes = sink.pushes();
    assert_eq!(pushes.len(), 3);
    assert_eq!(pushes[1].get("EDITOR").map(String::as_str), Some("vi"));
    assert_eq!(trace.lines(), vec!["start:notify", "stop:notify"]);

    iface.logout().expect("logout");
    session.await.expect("join").expect("run");

    assert!(iface.load("notify").await.is_err());
}

#[tokio::test]
async fn backend_passthroughs_and_inhibit_cookies() {
    let orch = builder(SessionConfig::default(), registry(Vec::new())).build();
    let backend = Arc::new(FakeBackend::new());
    let iface = SessionInterface::new(orch.handle(), backend.clone(), orch.bus().clone());

    iface.set_idle(true).await.expect("idle");
    let first = iface.inhibit("player", "playing video").await.expect("inhibit");
    let second = iface.inhibit("presenter", "slides").await.expect("inhibit");
    assert_ne!(first, second);
    assert_eq!(iface.inhibitions().await, 2);

    iface.uninhibit(first).await.expect("uninhibit");
    iface.uninhibit(first).await.expect("unknown cookie is ignored");
    iface.lock().await.expect("lock");
    iface.unlock().await.expect("unlock");
    iface.switch_terminal(2).await.expect("vt");
    assert_eq!(iface.inhibitions().await, 1);

    assert_eq!(
        backend.calls().await,
        vec![
            BackendCall::SetIdle(true),
            BackendCall::Inhibit {
                who: "player".into(),
                why: "playing video".into()
            },
            BackendCall::Inhibit {
                who: "presenter".into(),
                why: "slides".into()
            },
            BackendCall::Uninhibit(InhibitToken(1)),
            BackendCall::Lock,
            BackendCall::Unlock,
            BackendCall::SwitchTerminal(2),
        ]
    );
}

#[tokio::test]
async fn backend_events_are_translated() {
    let trace = Trace::default();
    let orch = builder(
        SessionConfig::default(),
        registry(vec![("a", Scripted::arc("a", Phase::Init, &trace))]),
    )
    .build();
    let mut events = orch.bus().subscribe();
    let backend = Arc::new(FakeBackend::new());
    let iface = Arc::new(SessionInterface::new(
        orch.handle(),
        backend.clone(),
        orch.bus().clone(),
    ));
    let handle = orch.handle();
    let session = tokio::spawn(orch.run());
    handle.sync().await.expect("session started");

    let (tx, rx) = mpsc::channel(8);
    let listener = Arc::clone(&iface).listen(rx);
    tx.send(BackendEvent::Locked).await.expect("send");
    tx.send(BackendEvent::Unlocked).await.expect("send");
    tx.send(BackendEvent::PrepareForSleep(false)).await.expect("send");
    tx.send(BackendEvent::PrepareForSleep(true)).await.expect("send");
    tx.send(BackendEvent::PrepareForShutdown(true)).await.expect("send");
    drop(tx);
    listener.await.expect("listener");

    session.await.expect("join").expect("run");
    assert_eq!(backend.calls().await, vec![BackendCall::Lock]);
    assert_eq!(trace.lines(), vec!["start:a", "stop:a"]);

    let mut kinds = Vec::new();
    while let Ok(ev) = events.try_recv() {
        kinds.push(ev.kind);
    }
    let locked = kinds.iter().position(|k| *k == EventKind::SessionLocked);
    let unlocked = kinds.iter().position(|k| *k == EventKind::SessionUnlocked);
    assert!(locked.is_some() && locked < unlocked);
    assert!(kinds.contains(&EventKind::ShutdownRequested));
    assert_eq!(kinds.last(), Some(&EventKind::SessionEnded));
}

#[tokio::test]
async fn session_control_logout_tolerates_a_vanished_session() {
    let orch = builder(SessionConfig::default(), registry(Vec::new())).build();
    let handle = orch.handle();
    let control = SessionControl::new(handle.clone());
    let session = tokio::spawn(orch.run());
    handle.sync().await.expect("session started");

    assert!(control.is_session_running());
    control.logout().expect("first logout");
    session.await.expect("join").expect("run");

    assert!(!control.is_session_running());
    control.logout().expect("session already gone");
    SessionControl::detached().logout().expect("no session at all");
}
