use crate::common::{servers, statuses, Event, Harness, Outcome};
use std::time::Duration;
use tidewire::{
    ClientError, ClientFrame, ConfigError, ConnectionState, Resume, Status, SubscribeRequest,
    TransportError,
};

#[tokio::test(start_paused = true)]
async fn connect_reports_server_up_and_subscribes() {
    let mut harness = Harness::new(servers(&["p1.example.com:80"]), Outcome::Accept);
    harness.client.subscribe(["/a"]).unwrap();
    harness.client.connect().unwrap();

    let mut server = harness.accept().await;
    assert_eq!(
        harness.status().await,
        Status::ServerUp {
            address: "p1.example.com:80".to_string()
        }
    );
    assert_eq!(
        server.frame().await,
        ClientFrame::Subscribe(vec![SubscribeRequest {
            subject: "/a".to_string(),
            resume: Resume::Latest,
        }])
    );
    assert_eq!(harness.client.state(), ConnectionState::Connected);
}

#[tokio::test(start_paused = true)]
async fn failed_connect_fails_over_to_another_server() {
    let mut harness = Harness::new(servers(&["p1:80", "p2:80"]), Outcome::Accept);
    harness.transport.script([Outcome::Refuse]);
    harness.client.connect().unwrap();

    let first = match harness.status().await {
        Status::ServerDown { address } => address,
        other => panic!("expected NOTIFY_SERVER_DOWN, got {other:?}"),
    };
    let server = harness.accept().await;
    assert_ne!(server.address, first);
    assert_eq!(
        harness.status().await,
        Status::ServerUp {
            address: server.address.clone()
        }
    );
    assert_eq!(harness.client.failed_attempts(), 0);

    let attempts = harness.transport.attempts();
    assert_eq!(attempts.len(), 2);
    assert_ne!(attempts[0].target.address, attempts[1].target.address);
}

#[tokio::test(start_paused = true)]
async fn server_down_every_n_failed_attempts() {
    let builder = servers(&["p1:80", "p2:80"])
        .failed_attempts_before_down(3)
        .unwrap();
    let mut harness = Harness::new(builder, Outcome::Refuse);
    harness.client.connect().unwrap();

    for _ in 0..2 {
        assert!(matches!(harness.status().await, Status::ServerDown { .. }));
    }
    harness.client.disconnect().unwrap();
    harness.settle().await;

    let failures = harness.client.failed_attempts() as usize;
    let late = harness.drain(Duration::from_secs(3600)).await;
    let late_downs = statuses(&late)
        .into_iter()
        .filter(|status| matches!(status, Status::ServerDown { .. }))
        .count();
    assert_eq!(2 + late_downs, failures / 3);
    assert_eq!(harness.client.failed_attempts() as usize, failures);
}

#[tokio::test(start_paused = true)]
async fn disconnect_cancels_pending_reconnect() {
    let mut harness = Harness::new(servers(&["p1:80"]), Outcome::Refuse);
    harness.client.connect().unwrap();
    assert!(matches!(harness.status().await, Status::ServerDown { .. }));

    harness.client.disconnect().unwrap();
    harness.settle().await;
    assert_eq!(harness.client.state(), ConnectionState::Closed);

    let attempts = harness.transport.attempt_count();
    harness.drain(Duration::from_secs(3600)).await;
    assert_eq!(harness.transport.attempt_count(), attempts);
    assert_eq!(harness.client.state(), ConnectionState::Closed);
}

#[tokio::test(start_paused = true)]
async fn connect_after_disconnect_starts_over() {
    let mut harness = Harness::new(servers(&["p1:80"]), Outcome::Accept);
    harness.client.connect().unwrap();
    let first = harness.accept().await;
    assert!(matches!(harness.status().await, Status::ServerUp { .. }));

    harness.client.disconnect().unwrap();
    harness.settle().await;
    assert!(first.is_closed());

    harness.client.connect().unwrap();
    harness.accept().await;
    assert!(matches!(harness.status().await, Status::ServerUp { .. }));
}

#[tokio::test(start_paused = true)]
async fn reconnect_rate_exceeded_reported_once_per_window() {
    let builder = servers(&["p1:80", "p2:80"])
        .reconnect_rate_threshold(2)
        .unwrap()
        .quick_reconnect_initial_delay(Duration::from_millis(100))
        .quick_reconnect_max_retries(20);
    let mut harness = Harness::new(builder, Outcome::Refuse);
    harness.client.connect().unwrap();

    let mut seen = Vec::new();
    while harness.transport.attempt_count() < 10 {
        seen.push(harness.event().await);
    }
    harness.client.disconnect().unwrap();
    harness.settle().await;
    seen.extend(harness.drain(Duration::from_secs(60)).await);

    let exceeded: Vec<_> = statuses(&seen)
        .into_iter()
        .filter(|status| matches!(status, Status::ReconnectRateExceeded { .. }))
        .collect();
    // The first attempt is not a reconnect; the third reconnect trips the guard.
    assert_eq!(exceeded, vec![&Status::ReconnectRateExceeded { attempts: 3 }]);
}

#[tokio::test(start_paused = true)]
async fn broken_session_fails_over_without_server_down() {
    let mut harness = Harness::new(servers(&["p1:80", "p2:80"]), Outcome::Accept);
    harness.client.connect().unwrap();

    let first = harness.accept().await;
    assert!(matches!(harness.status().await, Status::ServerUp { .. }));
    first.fail(TransportError::Closed);

    let second = harness.accept().await;
    assert_ne!(second.address, first.address);
    assert_eq!(
        harness.status().await,
        Status::ServerUp {
            address: second.address.clone()
        }
    );
}

#[tokio::test(start_paused = true)]
async fn stalled_handshake_waits_at_least_ten_seconds() {
    let mut harness = Harness::new(servers(&["p1:80"]), Outcome::Accept);
    harness.transport.script([Outcome::Stall]);
    harness.client.connect().unwrap();

    harness.accept().await;
    let attempts = harness.transport.attempts();
    assert_eq!(attempts.len(), 2);
    assert!(attempts[1].at - attempts[0].at >= Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn pause_closes_session_and_resume_reconnects() {
    let mut harness = Harness::new(servers(&["p1:80"]), Outcome::Accept);
    harness.client.connect().unwrap();
    let first = harness.accept().await;
    assert!(matches!(harness.status().await, Status::ServerUp { .. }));

    harness.client.pause().unwrap();
    harness.settle().await;
    assert!(harness.client.is_paused());
    assert!(first.is_closed());
    assert_eq!(harness.client.state(), ConnectionState::Disconnected);

    // Nothing is attempted while paused.
    harness.drain(Duration::from_secs(600)).await;
    assert_eq!(harness.transport.attempt_count(), 1);

    harness.client.resume().unwrap();
    harness.accept().await;
    assert!(matches!(harness.status().await, Status::ServerUp { .. }));
    assert!(!harness.client.is_paused());
}

#[tokio::test(start_paused = true)]
async fn pause_without_session_does_not_connect_on_resume() {
    let mut harness = Harness::new(servers(&["p1:80"]), Outcome::Accept);
    harness.client.pause().unwrap();
    harness.client.resume().unwrap();
    harness.settle().await;

    let events = harness.drain(Duration::from_secs(60)).await;
    assert!(events.is_empty());
    assert_eq!(harness.transport.attempt_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn set_servers_validates_and_applies_to_next_attempt() {
    let harness = Harness::new(servers(&["p1:80"]), Outcome::Accept);

    assert!(matches!(
        harness.client.set_servers(Vec::<String>::new()),
        Err(ClientError::Config(ConfigError::EmptyServerList))
    ));
    assert!(matches!(
        harness.client.set_servers(["101 p2:80"]),
        Err(ClientError::Config(ConfigError::InvalidWeight { .. }))
    ));

    harness.client.set_servers(["p9.example.com:443"]).unwrap();
    harness
        .client
        .set_entitlement_token("token-2")
        .unwrap();
    harness.client.connect().unwrap();
    harness.settle().await;

    let attempts = harness.transport.attempts();
    assert_eq!(attempts[0].target.address, "p9.example.com:443");
    assert_eq!(attempts[0].target.token.as_deref(), Some("token-2"));
}

#[tokio::test(start_paused = true)]
async fn entitlement_token_and_encryption_reach_transport() {
    let builder = servers(&["p1:80"])
        .entitlement_token("token-1")
        .encryption(true);
    let harness = Harness::new(builder, Outcome::Accept);
    harness.client.connect().unwrap();
    harness.settle().await;

    let target = &harness.transport.attempts()[0].target;
    assert_eq!(target.token.as_deref(), Some("token-1"));
    assert!(target.encrypted);
}

#[tokio::test(start_paused = true)]
async fn dropping_last_handle_closes_session() {
    let mut harness = Harness::new(servers(&["p1:80"]), Outcome::Accept);
    harness.client.connect().unwrap();
    let server = harness.accept().await;
    assert!(matches!(harness.event().await, Event::Status(Status::ServerUp { .. })));

    let other = harness.client.clone();
    drop(other);
    harness.settle().await;
    assert!(!server.is_closed());

    let Harness { client, .. } = harness;
    drop(client);
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(server.is_closed());
}
