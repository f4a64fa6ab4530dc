mod support;

use reqmux::upstream::EchoUpstream;
use reqmux::{Dispatcher, DispatcherConfig};
use support::{bind_loopback, TestClient};

/// A client sends 5 requests then closes its write side. The connection
/// must stay alive (reading nothing further) until the remaining
/// responses are written, then tear itself down.
#[tokio::test]
async fn mid_pipeline_eof_drains_remaining_responses_before_closing() {
    let (listener, addr) = bind_loopback().await;
    let dispatcher = Dispatcher::new(vec![listener], EchoUpstream, DispatcherConfig::default())
        .unwrap();

    let mut client = TestClient::connect(addr).await;

    for i in 0..5u8 {
        client.send(&[i]).await;
    }

    // Read back 2 responses before the peer half-closes.
    for _ in 0..2 {
        tokio::time::timeout(std::time::Duration::from_secs(1), client.recv())
            .await
            .unwrap()
            .unwrap();
    }

    client.half_close().await;

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    // The connection must still be registered: 3 responses are still owed.
    assert_eq!(dispatcher.active_connections(), 1);

    // Give the remaining 3 in-flight requests time to finish and the
    // connection to tear itself down once they do.
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert_eq!(dispatcher.active_connections(), 0);
}
