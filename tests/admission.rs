mod support;

use reqmux::upstream::EchoUpstream;
use reqmux::{Dispatcher, DispatcherConfig};
use support::{bind_loopback, TestClient};

/// With `max_active = 2`, a third concurrent client is not admitted until
/// one of the first two disconnects.
#[tokio::test]
async fn admission_saturates_at_max_active_and_reopens_on_close() {
    let (listener, addr) = bind_loopback().await;
    let dispatcher = Dispatcher::new(
        vec![listener],
        EchoUpstream,
        DispatcherConfig {
            max_active: 2,
            ..DispatcherConfig::default()
        },
    )
    .unwrap();

    let mut a = TestClient::connect(addr).await;
    let mut b = TestClient::connect(addr).await;

    // Give the acceptor loop a moment to admit both.
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(dispatcher.active_connections(), 2);

    // A third connection succeeds at the TCP level (kernel backlog) but is
    // never read from until a slot frees. Prove it by round-tripping a
    // request on it with a short timeout and observing it times out.
    let mut c = TestClient::connect(addr).await;
    c.send(b"hi").await;
    let third_is_stuck = tokio::time::timeout(std::time::Duration::from_millis(200), c.recv())
        .await
        .is_err();
    assert!(third_is_stuck, "third connection must not be served yet");
    assert_eq!(dispatcher.active_connections(), 2);

    // Closing the first client frees a slot; a fresh connect now succeeds
    // and is served promptly.
    a.send(b"bye").await;
    assert_eq!(a.recv().await.unwrap(), &b"bye"[..]);
    a.half_close().await;

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert_eq!(dispatcher.active_connections(), 2);

    let resp = tokio::time::timeout(std::time::Duration::from_secs(1), c.recv())
        .await
        .expect("third connection should now be served")
        .unwrap();
    assert_eq!(resp, &b"hi"[..]);

    drop(b);
}
