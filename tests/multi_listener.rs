mod support;

use reqmux::upstream::EchoUpstream;
use reqmux::{Dispatcher, DispatcherConfig};
use support::TestClient;

/// A dispatcher with two independent listeners serves both concurrently,
/// each admitting its own clients. Fault-injecting a transient `accept()`
/// error on one listener without affecting the other is covered by the
/// lower-level unit test
/// `listener::tests::transient_accept_error_does_not_stall_the_listener`,
/// which has access to the internal `Acceptor` seam this integration test
/// cannot reach from outside the crate.
#[tokio::test]
async fn both_listeners_serve_independently() {
    let (listener_a, addr_a) = support::bind_loopback().await;
    let (listener_b, addr_b) = support::bind_loopback().await;

    let dispatcher = Dispatcher::new(
        vec![listener_a, listener_b],
        EchoUpstream,
        DispatcherConfig::default(),
    )
    .unwrap();

    let mut client_a = TestClient::connect(addr_a).await;
    let mut client_b = TestClient::connect(addr_b).await;

    client_a.send(b"via-a").await;
    client_b.send(b"via-b").await;

    assert_eq!(client_a.recv().await.unwrap(), &b"via-a"[..]);
    assert_eq!(client_b.recv().await.unwrap(), &b"via-b"[..]);

    assert_eq!(dispatcher.active_connections(), 2);
}
