use std::time::Duration;

use meshwire_lib::{
    ConnectionState, ShapedWsClient, ShapedWsServer, WsClientConfig, WsServerConfig,
};

const RECV_TIMEOUT: Option<Duration> = Some(Duration::from_secs(2));

fn server_config(obfuscation: &str, profile: &str) -> WsServerConfig {
    WsServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        obfuscation: obfuscation.to_string(),
        obfuscation_key: "demo-key".to_string(),
        traffic_profile: profile.to_string(),
    }
}

fn client_config(uri: &str, obfuscation: &str, profile: &str) -> WsClientConfig {
    WsClientConfig {
        obfuscation: obfuscation.to_string(),
        obfuscation_key: "demo-key".to_string(),
        traffic_profile: profile.to_string(),
        ..WsClientConfig::new(uri)
    }
}

async fn echo_server(obfuscation: &str, profile: &str) -> (ShapedWsServer, String) {
    let server = ShapedWsServer::new(server_config(obfuscation, profile));
    server.on_message(|_addr, data| {
        let mut reply = b"ECHO: ".to_vec();
        reply.extend_from_slice(&data);
        Some(reply)
    });
    server.start().await.expect("server start");
    let uri = format!("ws://{}", server.local_addr().unwrap());
    (server, uri)
}

#[tokio::test]
async fn echo_roundtrip_plain() {
    let (server, uri) = echo_server("none", "none").await;
    let mut client = ShapedWsClient::new(client_config(&uri, "none", "none"));

    assert!(client.connect().await);
    assert_eq!(client.state(), ConnectionState::Connected);

    assert!(client.send(b"hello mesh").await);
    let reply = client.receive(RECV_TIMEOUT).await.expect("echo reply");
    assert_eq!(reply, b"ECHO: hello mesh");

    let stats = client.get_stats();
    assert_eq!(stats.messages_sent, 1);
    assert_eq!(stats.messages_received, 1);
    assert_eq!(stats.state, "connected");

    let server_stats = server.get_stats();
    assert_eq!(server_stats.total_messages, 1);
    assert_eq!(server_stats.clients_connected, 1);

    client.close().await;
    assert_eq!(client.state(), ConnectionState::Closed);
    assert!(!client.send(b"after close").await);

    server.stop().await;
}

#[tokio::test]
async fn echo_roundtrip_with_xor_and_gaming_shaper() {
    let (server, uri) = echo_server("xor", "gaming").await;
    let mut client = ShapedWsClient::new(client_config(&uri, "xor", "gaming"));

    assert!(client.connect().await);
    assert!(client.send(b"shaped and scrambled").await);
    let reply = client.receive(RECV_TIMEOUT).await.expect("echo reply");
    assert_eq!(reply, b"ECHO: shaped and scrambled");

    // The shaped message on the wire is at least padded to the profile floor.
    assert!(client.get_stats().bytes_sent >= 50);

    client.close().await;
    server.stop().await;
}

#[tokio::test]
async fn echo_roundtrip_with_faketls_framing() {
    let (server, uri) = echo_server("faketls", "none").await;
    let mut client = ShapedWsClient::new(client_config(&uri, "faketls", "none"));

    assert!(client.connect().await);
    assert!(client.send(b"looks like https").await);
    let reply = client.receive(RECV_TIMEOUT).await.expect("echo reply");
    assert_eq!(reply, b"ECHO: looks like https");

    client.close().await;
    server.stop().await;
}

#[tokio::test]
async fn receive_times_out_quietly() {
    let (server, uri) = echo_server("none", "none").await;
    let mut client = ShapedWsClient::new(client_config(&uri, "none", "none"));

    assert!(client.connect().await);
    assert!(client
        .receive(Some(Duration::from_millis(50)))
        .await
        .is_none());
    assert_eq!(client.state(), ConnectionState::Connected);

    client.close().await;
    server.stop().await;
}

#[tokio::test]
async fn connect_failure_reports_disconnected() {
    // Bind-then-drop yields a port with nothing behind it.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead_uri = format!("ws://{}", listener.local_addr().unwrap());
    drop(listener);

    let config = WsClientConfig {
        auto_reconnect: false,
        ..client_config(&dead_uri, "none", "none")
    };
    let mut client = ShapedWsClient::new(config);
    assert!(!client.connect().await);
    assert_eq!(client.state(), ConnectionState::Disconnected);
    assert!(!client.send(b"nobody home").await);
}

#[tokio::test]
async fn server_counts_disconnections() {
    let (server, uri) = echo_server("none", "none").await;
    let mut client = ShapedWsClient::new(client_config(&uri, "none", "none"));

    assert!(client.connect().await);
    assert!(client.send(b"one").await);
    assert!(client.receive(RECV_TIMEOUT).await.is_some());
    client.close().await;

    // The server notices the close and clears its registry.
    for _ in 0..100 {
        if server.get_stats().clients_connected == 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(server.get_stats().clients_connected, 0);

    server.stop().await;
}
