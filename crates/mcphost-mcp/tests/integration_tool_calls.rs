//! Tool routing, timeouts, cancellation and the concurrency gate.

mod common;

use std::time::Duration;

use common::{TestHost, fixture};
use mcphost_core::{CollisionPolicy, HostError, HostEvent, HostSettings, ServerState, ToolCall};
use serde_json::json;

#[tokio::test]
async fn test_echo_round_trip() {
    let host = TestHost::new();
    host.start(fixture("B", "normal", "echo,fail")).await;

    let result = host
        .manager
        .call_tool(ToolCall::new("echo", json!({"text": "hi"})))
        .await
        .unwrap();
    assert!(result.success);
    assert_eq!(result.text(), "hi");

    let failed = host
        .manager
        .call_tool(ToolCall::new("fail", json!({})))
        .await
        .unwrap();
    assert!(!failed.success);
    assert_eq!(failed.text(), "tool failed on purpose");

    host.manager.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_tool_routes_to_first_ready_server() {
    let mut host = TestHost::new();
    host.start(fixture("C", "normal", "dup")).await;
    host.start(fixture("D", "normal", "dup,only_d")).await;

    let registry = host.manager.registry();
    assert_eq!(registry.get("dup").unwrap().server_id, "C");
    assert_eq!(registry.get("only_d").unwrap().server_id, "D");
    assert_eq!(
        host.manager
            .get_tools()
            .iter()
            .filter(|t| t.name == "dup")
            .count(),
        1
    );

    let shadowed: Vec<HostEvent> = host
        .drain_events()
        .into_iter()
        .filter(|e| matches!(e, HostEvent::ToolShadowed { .. }))
        .collect();
    assert_eq!(shadowed.len(), 1);
    assert!(matches!(
        &shadowed[0],
        HostEvent::ToolShadowed { tool, kept_server, shadowed_server }
            if tool == "dup" && kept_server == "C" && shadowed_server == "D"
    ));

    // The fixture answers unknown tools with their own name.
    let result = host
        .manager
        .call_tool(ToolCall::new("dup", json!({})))
        .await
        .unwrap();
    assert_eq!(result.text(), "dup");

    // With C gone, D's declaration becomes reachable.
    host.manager.stop_server("C").await.unwrap();
    assert_eq!(host.manager.registry().get("dup").unwrap().server_id, "D");

    host.manager.shutdown().await;
}

#[tokio::test]
async fn test_reject_policy_refuses_colliding_server() {
    let host = TestHost::with_settings(
        HostSettings::default().with_collision_policy(CollisionPolicy::Reject),
    );
    host.start(fixture("C", "normal", "dup")).await;
    host.manager
        .add_server(fixture("D", "normal", "dup"))
        .await
        .unwrap();

    let err = host.manager.start_server("D").await.unwrap_err();
    assert!(
        matches!(&err, HostError::ToolCollision { tool, existing_server, .. }
            if tool == "dup" && existing_server == "C"),
        "{err}"
    );
    assert!(matches!(
        host.manager.server_info("D").await.unwrap().state,
        ServerState::Error(_)
    ));

    host.manager.shutdown().await;
}

#[tokio::test]
async fn test_builtin_shadows_server_tool() {
    let host = TestHost::new();
    std::fs::write(host.root.path().join("x.txt"), "abc").unwrap();
    host.start(fixture("B", "normal", "path_info")).await;

    let result = host
        .manager
        .call_tool(ToolCall::new("path_info", json!({"path": "x.txt"})))
        .await
        .unwrap();
    let info: serde_json::Value = serde_json::from_str(&result.text()).unwrap();
    assert_eq!(info["size"], 3);
    assert!(host.manager.registry().get("path_info").unwrap().is_builtin());

    host.manager.shutdown().await;
}

#[tokio::test]
async fn test_timeout_leaves_server_ready() {
    let host = TestHost::with_settings(
        HostSettings::default().with_request_timeout(Duration::from_millis(300)),
    );
    host.start(fixture("sleepy", "hang", "wait")).await;

    let err = host
        .manager
        .call_tool(ToolCall::new("wait", json!({})))
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "{err}");
    assert!(err.to_string().contains("300ms"));

    assert_eq!(
        host.manager.server_info("sleepy").await.unwrap().state,
        ServerState::Ready
    );
    assert_eq!(host.manager.gate().in_flight(), 0);

    host.manager.shutdown().await;
}

#[tokio::test]
async fn test_stop_fails_pending_calls_and_frees_gate() {
    let host = TestHost::new();
    host.start(fixture("sleepy", "hang", "wait")).await;

    let manager = host.manager.clone();
    let pending = tokio::spawn(async move {
        manager
            .call_tool(ToolCall::new("wait", json!({})))
            .await
    });

    for _ in 0..50 {
        if host.manager.gate().in_flight() == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(host.manager.gate().in_flight(), 1);

    host.manager.stop_server("sleepy").await.unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), pending)
        .await
        .expect("pending call should settle promptly")
        .unwrap()
        .unwrap_err();
    assert!(err.is_disconnected(), "{err}");
    assert_eq!(host.manager.gate().in_flight(), 0);
}

#[tokio::test]
async fn test_gate_bounds_concurrent_calls() {
    let host = TestHost::with_settings(HostSettings::default().with_max_concurrent_tools(2));
    host.start(fixture("slow", "slow", "work").with_env("FIXTURE_DELAY_MS", "150"))
        .await;

    let calls: Vec<_> = (0..6)
        .map(|_| {
            let manager = host.manager.clone();
            tokio::spawn(async move {
                manager
                    .call_tool(ToolCall::new("work", json!({})))
                    .await
            })
        })
        .collect();

    for call in calls {
        let result = call.await.unwrap().unwrap();
        let peak: usize = result
            .text()
            .trim_start_matches("peak=")
            .parse()
            .unwrap();
        assert!(peak <= 2, "server saw {peak} overlapping calls");
    }
    assert_eq!(host.manager.gate().available(), 2);

    host.manager.shutdown().await;
}

#[tokio::test]
async fn test_builtins_work_without_servers() {
    let host = TestHost::new();
    host.manager
        .call_tool(ToolCall::new(
            "write_file",
            json!({"path": "notes/a.txt", "content": "x", "createDirs": true}),
        ))
        .await
        .unwrap();

    let result = host
        .manager
        .call_tool(ToolCall::new("path_info", json!({"path": "notes/a.txt"})))
        .await
        .unwrap();
    assert!(result.text().contains("\"kind\": \"file\""));
    assert!(host.manager.list_servers().await.is_empty());
}

#[tokio::test]
async fn test_tools_of_stopped_server_are_not_routable() {
    let host = TestHost::new();
    host.start(fixture("B", "normal", "echo")).await;
    host.manager.stop_server("B").await.unwrap();

    assert!(matches!(
        host.manager
            .call_tool(ToolCall::new("echo", json!({"text": "hi"})))
            .await,
        Err(HostError::ToolNotFound { .. })
    ));
}

#[tokio::test]
async fn test_crash_of_ready_server_disconnects_and_stops() {
    let host = TestHost::new();
    host.start(fixture("fragile", "crash", "boom")).await;

    let err = host
        .manager
        .call_tool(ToolCall::new("boom", json!({})))
        .await
        .unwrap_err();
    assert!(err.is_disconnected(), "{err}");

    // The exit notice lands shortly after pending calls are failed.
    let mut state = ServerState::Ready;
    for _ in 0..100 {
        state = host.manager.server_info("fragile").await.unwrap().state;
        if state == ServerState::Stopped {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert_eq!(state, ServerState::Stopped);
    assert!(host.manager.registry().get("boom").is_none());
    assert_eq!(host.manager.gate().in_flight(), 0);

    // No automatic restart; an explicit start brings it back.
    host.manager.start_server("fragile").await.unwrap();
    host.manager.shutdown().await;
}

#[tokio::test]
async fn test_list_changed_notification_refreshes_registry() {
    let mut host = TestHost::new();
    host.start(fixture("grower", "normal", "echo,learn")).await;
    host.drain_events();

    let result = host
        .manager
        .call_tool(ToolCall::new("learn", json!({"name": "fresh"})))
        .await
        .unwrap();
    assert_eq!(result.text(), "fresh");

    // The refresh runs in the background once the notification arrives.
    let mut routed = false;
    for _ in 0..100 {
        if host.manager.registry().get("fresh").is_some() {
            routed = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(routed, "new tool never reached the registry");
    assert!(host.manager.get_tools().iter().any(|t| t.name == "fresh"));
    assert_eq!(
        host.manager.server_info("grower").await.unwrap().tool_count,
        3
    );
    assert!(
        host.drain_events()
            .iter()
            .any(|e| matches!(e, HostEvent::ToolsChanged { .. }))
    );

    let fresh = host
        .manager
        .call_tool(ToolCall::new("fresh", json!({})))
        .await
        .unwrap();
    assert_eq!(fresh.text(), "fresh");

    host.manager.shutdown().await;
}

#[tokio::test]
async fn test_explicit_refresh_picks_up_new_tools() {
    let host = TestHost::new();
    host.start(fixture("grower", "normal", "learn")).await;

    host.manager
        .call_tool(ToolCall::new("learn", json!({"name": "later"})))
        .await
        .unwrap();
    let tools = host.manager.refresh_tools("grower").await.unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["learn", "later"]);
    assert_eq!(
        host.manager.registry().get("later").unwrap().server_id,
        "grower"
    );

    assert!(matches!(
        host.manager.refresh_tools("nobody").await,
        Err(HostError::UnknownServer { .. })
    ));

    host.manager.shutdown().await;
}

#[tokio::test]
async fn test_reject_policy_refuses_colliding_refresh() {
    let host = TestHost::with_settings(
        HostSettings::default().with_collision_policy(CollisionPolicy::Reject),
    );
    host.start(fixture("owner", "normal", "taken")).await;
    host.start(fixture("grower", "normal", "learn")).await;

    host.manager
        .call_tool(ToolCall::new("learn", json!({"name": "taken"})))
        .await
        .unwrap();
    let err = host.manager.refresh_tools("grower").await.unwrap_err();
    assert!(
        matches!(&err, HostError::ToolCollision { tool, existing_server, server_id }
            if tool == "taken" && existing_server == "owner" && server_id == "grower"),
        "{err}"
    );

    // The previous catalog stays and the server keeps serving.
    let info = host.manager.server_info("grower").await.unwrap();
    assert_eq!(info.state, ServerState::Ready);
    assert_eq!(info.tool_count, 1);
    assert_eq!(
        host.manager.registry().get("taken").unwrap().server_id,
        "owner"
    );

    host.manager.shutdown().await;
}
