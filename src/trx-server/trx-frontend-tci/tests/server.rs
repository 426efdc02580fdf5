// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::time::{sleep, timeout, Instant};

use trx_core::{Freq, RigMode, RigState};
use trx_frontend_tci::frame::{decode_frame, encode_masked_frame, Frame, Opcode};
use trx_frontend_tci::{TciConfig, TciServer};

const KEY: [u8; 4] = [0x12, 0x34, 0x56, 0x78];
const STEP: Duration = Duration::from_secs(5);

const UPGRADE: &str = "GET / HTTP/1.1\r\n\
    Host: 127.0.0.1\r\n\
    Upgrade: websocket\r\n\
    Connection: Upgrade\r\n\
    Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
    Sec-WebSocket-Version: 13\r\n\r\n";

fn test_config(max_clients: usize) -> TciConfig {
    TciConfig {
        listen: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        max_clients,
        ..TciConfig::default()
    }
}

fn start(max_clients: usize) -> (TciServer, watch::Sender<RigState>) {
    let state = RigState::with_vfo_a(14_010_000, RigMode::USB);
    let (state_tx, state_rx) = watch::channel(state);
    let server = TciServer::bind(&test_config(max_clients), state_rx).unwrap();
    (server, state_tx)
}

struct TestClient {
    stream: TcpStream,
    buf: Vec<u8>,
}

impl TestClient {
    /// Send the upgrade request without waiting for the answer.
    async fn request(addr: SocketAddr) -> Self {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(UPGRADE.as_bytes()).await.unwrap();
        Self {
            stream,
            buf: Vec::new(),
        }
    }

    async fn read_more(&mut self) -> usize {
        let mut chunk = [0u8; 4096];
        let n = self.stream.read(&mut chunk).await.unwrap_or(0);
        self.buf.extend_from_slice(&chunk[..n]);
        n
    }

    async fn read_upgrade_response(&mut self) -> String {
        loop {
            if let Some(pos) = self.buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head: Vec<u8> = self.buf.drain(..pos + 4).collect();
                return String::from_utf8(head).unwrap();
            }
            assert!(self.read_more().await > 0, "closed during upgrade");
        }
    }

    async fn connect(addr: SocketAddr) -> Self {
        let mut client = Self::request(addr).await;
        let response = timeout(STEP, client.read_upgrade_response()).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 101"), "{response}");
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo="));
        client
    }

    async fn next_frame(&mut self) -> Frame {
        timeout(STEP, async {
            loop {
                if let Some((used, frame)) = decode_frame(&self.buf).unwrap() {
                    self.buf.drain(..used);
                    return frame;
                }
                assert!(self.read_more().await > 0, "connection closed");
            }
        })
        .await
        .expect("timed out waiting for a frame")
    }

    async fn next_text(&mut self) -> String {
        loop {
            let frame = self.next_frame().await;
            if let Some(text) = frame.text() {
                return text.to_string();
            }
        }
    }

    async fn read_burst(&mut self) -> Vec<String> {
        let mut burst = Vec::new();
        loop {
            let text = self.next_text().await;
            let done = text == "ready;";
            burst.push(text);
            if done {
                return burst;
            }
        }
    }

    /// Collect every text message that arrives within `total`.
    async fn collect_texts(&mut self, total: Duration) -> Vec<String> {
        let deadline = Instant::now() + total;
        let mut out = Vec::new();
        while let Ok(frame) = tokio::time::timeout_at(deadline, self.next_frame()).await {
            if let Some(text) = frame.text() {
                out.push(text.to_string());
            }
        }
        out
    }

    async fn send(&mut self, opcode: Opcode, payload: &[u8]) {
        let frame = encode_masked_frame(opcode, payload, KEY).unwrap();
        self.stream.write_all(&frame).await.unwrap();
    }
}

async fn wait_for_clients(server: &TciServer, expected: usize) {
    timeout(STEP, async {
        while server.connected_clients() != expected {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("client count did not settle");
}

#[tokio::test]
async fn test_handshake_and_initial_burst() {
    let (server, _state_tx) = start(3);
    let mut client = TestClient::connect(server.local_addr()).await;

    let burst = client.read_burst().await;
    assert_eq!(burst[0], "protocol:ExpertSDR3,1.8;");
    assert!(burst.contains(&"trx_count:2;".to_string()));
    assert!(burst.contains(&"vfo_limits:0,450000000;".to_string()));
    assert!(burst.contains(&"vfo:0,0,14010000;".to_string()));
    assert!(burst.contains(&"modulation:0,USB;".to_string()));
    wait_for_clients(&server, 1).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_vfo_change_is_reported_once() {
    let (server, state_tx) = start(3);
    let mut client = TestClient::connect(server.local_addr()).await;
    client.read_burst().await;

    state_tx.send_modify(|state| state.apply_freq(0, Freq::new(14_015_000)));
    let texts = client.collect_texts(Duration::from_millis(1800)).await;

    let reports = texts
        .iter()
        .filter(|text| text.as_str() == "vfo:0,0,14015000;")
        .count();
    assert_eq!(reports, 1, "{texts:?}");

    server.shutdown().await;
}

#[tokio::test]
async fn test_queries_and_ping() {
    let (server, _state_tx) = start(3);
    let mut client = TestClient::connect(server.local_addr()).await;
    client.read_burst().await;

    client.send(Opcode::Text, b"TRX_COUNT;CW_MACROS_SPEED;").await;
    // Reporter ticks may interleave with the replies.
    let mut seen = Vec::new();
    while !seen.iter().any(|text: &String| text == "cw_macros_speed:15;") {
        seen.push(client.next_text().await);
    }
    assert!(seen.contains(&"trx_count:2;".to_string()));

    client.send(Opcode::Ping, b"42").await;
    let pong = loop {
        let frame = client.next_frame().await;
        if frame.opcode == Opcode::Pong {
            break frame;
        }
    };
    assert_eq!(pong.payload, b"42");

    server.shutdown().await;
}

#[tokio::test]
async fn test_client_close_gets_stop_and_close() {
    let (server, _state_tx) = start(3);
    let mut client = TestClient::connect(server.local_addr()).await;
    client.read_burst().await;
    wait_for_clients(&server, 1).await;

    client.send(Opcode::Close, &[]).await;
    let mut saw_stop = false;
    loop {
        let frame = client.next_frame().await;
        if frame.text() == Some("stop;") {
            saw_stop = true;
        }
        if frame.opcode == Opcode::Close {
            break;
        }
    }
    assert!(saw_stop);
    wait_for_clients(&server, 0).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_fourth_client_waits_for_free_slot() {
    let (server, _state_tx) = start(3);
    let addr = server.local_addr();

    let mut clients = Vec::new();
    for _ in 0..3 {
        let mut client = TestClient::connect(addr).await;
        client.read_burst().await;
        clients.push(client);
    }
    wait_for_clients(&server, 3).await;

    let mut waiting = TestClient::request(addr).await;
    assert!(
        timeout(Duration::from_millis(700), waiting.read_upgrade_response())
            .await
            .is_err(),
        "fourth client was upgraded while all slots were busy"
    );

    clients[0].send(Opcode::Close, &[]).await;
    let response = timeout(STEP, waiting.read_upgrade_response()).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 101"));
    let burst = waiting.read_burst().await;
    assert!(burst.contains(&"trx_count:2;".to_string()));
    wait_for_clients(&server, 3).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_plain_tcp_is_rejected_and_slot_freed() {
    let (server, _state_tx) = start(1);
    let addr = server.local_addr();

    let mut plain = TcpStream::connect(addr).await.unwrap();
    plain.write_all(b"hello\r\n").await.unwrap();
    let mut buf = [0u8; 64];
    let n = timeout(STEP, plain.read(&mut buf)).await.unwrap().unwrap_or(0);
    assert_eq!(n, 0);

    let mut client = TestClient::connect(addr).await;
    client.read_burst().await;
    wait_for_clients(&server, 1).await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_sends_stop() {
    let (server, _state_tx) = start(3);
    let mut client = TestClient::connect(server.local_addr()).await;
    client.read_burst().await;
    wait_for_clients(&server, 1).await;

    server.shutdown().await;
    let mut texts = Vec::new();
    loop {
        let frame = client.next_frame().await;
        if frame.opcode == Opcode::Close {
            break;
        }
        if let Some(text) = frame.text() {
            texts.push(text.to_string());
        }
    }
    assert_eq!(texts.last().map(String::as_str), Some("stop;"));
}
