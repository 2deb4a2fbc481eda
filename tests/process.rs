#![cfg(unix)]

mod common;

use std::time::Duration;

use common::{builder, registry};
use sessionvisor::{
    BackoffPolicy, EnvironmentMap, EventKind, FakeBackend, ModuleRef, Orchestrator, Phase,
    ProcessConfig, ProcessModule, SessionConfig, SessionError, SessionInterface, Supervision,
};

fn session(shell: ModuleRef) -> Orchestrator {
    let path = std::env::var("PATH").unwrap_or_else(|_| "/usr/bin:/bin".into());
    builder(SessionConfig::default(), registry(vec![("shell", shell)]))
        .with_environment(EnvironmentMap::from([("PATH".to_string(), path)]))
        .build()
}

fn sh(script: &str, phase: Phase) -> ProcessConfig {
    ProcessConfig {
        program: "/bin/sh".into(),
        args: vec!["-c".into(), script.into()],
        phase,
        readiness: None,
        remove_env: Vec::new(),
    }
}

fn supervision(max_crash_restarts: u32) -> Supervision {
    Supervision {
        readiness_timeout: Duration::ZERO,
        max_start_retries: 0,
        max_crash_restarts,
        stop_grace: Duration::from_millis(200),
        backoff: BackoffPolicy::immediate(),
    }
}

#[tokio::test]
async fn exhausted_crash_budget_ends_the_session() {
    let shell: ModuleRef = std::sync::Arc::new(ProcessModule::new(
        sh("sleep 0.2; exit 3", Phase::WindowManager),
        supervision(1),
    ));
    let orch = session(shell);
    let mut events = orch.bus().subscribe();

    let result = tokio::time::timeout(Duration::from_secs(10), orch.run())
        .await
        .expect("session must end on its own");
    assert!(
        matches!(result, Ok(()) | Err(SessionError::StartupAborted { .. })),
        "unexpected result: {result:?}"
    );

    let mut kinds = Vec::new();
    while let Ok(ev) = events.try_recv() {
        kinds.push(ev.kind);
    }
    let crashes = kinds.iter().filter(|k| **k == EventKind::ProcessCrashed).count();
    assert_eq!(crashes, 2);
    assert_eq!(
        kinds.iter().filter(|k| **k == EventKind::CrashBudgetExhausted).count(),
        1
    );
    assert!(kinds.contains(&EventKind::ShutdownRequested));
    assert_eq!(kinds.last(), Some(&EventKind::SessionEnded));
}

#[tokio::test]
async fn long_running_process_is_stopped_at_logout() {
    let shell: ModuleRef = std::sync::Arc::new(ProcessModule::new(
        sh("exec sleep 30", Phase::WindowManager),
        supervision(3),
    ));
    let orch = session(shell);
    let mut events = orch.bus().subscribe();
    let handle = orch.handle();
    let session = tokio::spawn(orch.run());

    handle.sync().await.expect("started");
    handle.logout("done").expect("logout");
    tokio::time::timeout(Duration::from_secs(5), session)
        .await
        .expect("stop within grace")
        .expect("join")
        .expect("run");

    let mut kinds = Vec::new();
    while let Ok(ev) = events.try_recv() {
        kinds.push(ev.kind);
    }
    assert!(kinds.contains(&EventKind::ProcessSpawned));
    assert!(!kinds.contains(&EventKind::ProcessCrashed));
    assert!(kinds.contains(&EventKind::ModuleStopped));
}

#[tokio::test]
async fn launched_commands_get_the_session_environment_and_end_with_it() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("greeting");
    let orch = builder(SessionConfig::default(), registry(Vec::new())).build();
    let mut events = orch.bus().subscribe();
    let iface = SessionInterface::new(
        orch.handle(),
        std::sync::Arc::new(FakeBackend::new()),
        orch.bus().clone(),
    );
    let session = tokio::spawn(orch.run());

    iface.set_environment("GREETING", "hi").await.expect("set");
    let script = format!("printf %s \"$GREETING\" > {}", out.display());
    let writer = iface
        .launch_command(&["/bin/sh", "-c", script.as_str()])
        .await
        .expect("launch writer");
    let looper = iface
        .launch_command(&["/bin/sh", "-c", "while :; do :; done"])
        .await
        .expect("launch looper");
    assert_ne!(writer, looper);

    let exited = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let ev = events.recv().await.expect("bus open");
            if ev.kind == EventKind::CommandExited {
                return ev;
            }
        }
    })
    .await
    .expect("writer exits");
    assert_eq!(exited.pid, Some(writer));
    assert_eq!(std::fs::read_to_string(&out).expect("output"), "hi");

    let err = iface.launch_command(&[]).await.expect_err("empty command");
    assert_eq!(err.as_label(), "session_launch_failed");

    iface.logout().expect("logout");
    session.await.expect("join").expect("run");

    let mut terminated = None;
    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::CommandExited {
            terminated = Some((ev.pid, ev.reason.as_deref().map(str::to_string)));
        }
    }
    assert_eq!(
        terminated,
        Some((Some(looper), Some("terminated with the session".to_string())))
    );
}
