//! Integration tests for the card server
//!
//! These tests run a real server on a loopback port and drive it with raw
//! framed TCP clients.

use server::config::ServerConfig;
use server::network::Server;
use shared::{encode, read_frame, write_frame, Frame, FrameError, MessageType};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;

const READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Starts a server on an ephemeral port and returns its address
async fn spawn_server(max_sessions: usize) -> SocketAddr {
    let config = ServerConfig {
        bind_addr: "127.0.0.1:0".to_string(),
        max_sessions,
        sweep_interval: Duration::from_secs(60),
        heartbeat_timeout: Duration::from_secs(60),
        ..ServerConfig::default()
    };
    let server = Server::bind(config).await.expect("Failed to bind server");
    let addr = server.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run().await;
    });
    addr
}

struct TestClient {
    stream: TcpStream,
}

impl TestClient {
    async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("Failed to connect");
        Self { stream }
    }

    async fn send(&mut self, msg_type: MessageType, payload: &str) {
        write_frame(&mut self.stream, &Frame::new(msg_type, payload))
            .await
            .unwrap();
    }

    async fn send_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.unwrap();
    }

    async fn recv(&mut self) -> Result<Frame, FrameError> {
        timeout(READ_TIMEOUT, read_frame(&mut self.stream))
            .await
            .expect("Timed out waiting for a frame")
    }

    /// Next frame that is not a heartbeat ping
    async fn expect_frame(&mut self) -> Frame {
        loop {
            let frame = self.recv().await.expect("Connection closed unexpectedly");
            if frame.msg_type != MessageType::Ping {
                return frame;
            }
        }
    }

    async fn expect(&mut self, msg_type: MessageType) -> Frame {
        let frame = self.expect_frame().await;
        assert_eq!(frame.msg_type, msg_type, "unexpected frame {:?}", frame);
        frame
    }

    async fn expect_closed(&mut self) {
        loop {
            match self.recv().await {
                Ok(frame) if frame.msg_type == MessageType::Ping => continue,
                Ok(frame) => panic!("Expected the connection to close, got {:?}", frame),
                Err(e) => {
                    assert!(e.is_transport(), "unexpected error {}", e);
                    return;
                }
            }
        }
    }

    /// Logs in and returns the reconnect token
    async fn login(&mut self, nick: &str) -> String {
        self.send(MessageType::Login, nick).await;
        let reply = self.expect(MessageType::Okay).await;
        let (greeting, token) = reply.payload.split_once('|').unwrap();
        assert_eq!(greeting, "Welcome!");
        token.to_string()
    }
}

/// Two logged-in players seated in room 0 with a match just started
async fn started_match(addr: SocketAddr) -> (TestClient, TestClient, String) {
    let mut alice = TestClient::connect(addr).await;
    let mut bob = TestClient::connect(addr).await;
    let token = alice.login("alice").await;
    bob.login("bob").await;

    alice.send(MessageType::RoomCreate, "table1").await;
    alice.expect(MessageType::RoomCreated).await;
    alice.expect(MessageType::Owner).await;
    alice.expect(MessageType::RoomInfo).await;

    bob.send(MessageType::RoomJoin, "0").await;
    bob.expect(MessageType::RoomJoined).await;
    bob.expect(MessageType::RoomInfo).await;
    alice.expect(MessageType::RoomInfo).await;

    for client in [&mut alice, &mut bob] {
        client.send(MessageType::Ready, "1").await;
    }
    for _ in 0..2 {
        alice.expect(MessageType::PlayersReady).await;
        alice.expect(MessageType::RoomInfo).await;
        bob.expect(MessageType::PlayersReady).await;
        bob.expect(MessageType::RoomInfo).await;
    }

    alice.send(MessageType::Start, "").await;
    (alice, bob, token)
}

/// WIRE PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// Tests the login handshake hands out a token
    #[tokio::test]
    async fn login_returns_token() {
        let addr = spawn_server(4).await;
        let mut client = TestClient::connect(addr).await;

        let token = client.login("alice").await;
        assert_eq!(token.len(), 10);
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric()));
    }

    /// Tests garbage ahead of a frame is skipped while resynchronizing
    #[tokio::test]
    async fn garbage_before_frame_is_skipped() {
        let addr = spawn_server(4).await;
        let mut client = TestClient::connect(addr).await;

        let mut bytes = b"noise!JOK".to_vec();
        bytes.extend(encode(MessageType::Login, "alice").unwrap());
        client.send_raw(&bytes).await;

        let reply = client.expect(MessageType::Okay).await;
        assert!(reply.payload.starts_with("Welcome!|"));
    }

    /// Tests a frame split across several writes is reassembled
    #[tokio::test]
    async fn split_frame_is_reassembled() {
        let addr = spawn_server(4).await;
        let mut client = TestClient::connect(addr).await;

        let bytes = encode(MessageType::Login, "alice").unwrap();
        for chunk in bytes.chunks(3) {
            client.send_raw(chunk).await;
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        client.expect(MessageType::Okay).await;
    }

    /// Tests an unknown message type is answered and the connection closed
    #[tokio::test]
    async fn unknown_type_closes_connection() {
        let addr = spawn_server(4).await;
        let mut client = TestClient::connect(addr).await;

        client.send_raw(b"JOKEXXXX0000").await;
        let reply = client.expect(MessageType::Error).await;
        assert_eq!(reply.payload, "Invalid data");
        client.expect_closed().await;
    }

    /// Tests a non-numeric length field is a protocol violation
    #[tokio::test]
    async fn malformed_length_closes_connection() {
        let addr = spawn_server(4).await;
        let mut client = TestClient::connect(addr).await;
        client.login("alice").await;

        client.send_raw(b"JOKERLIS00x1").await;
        assert_eq!(client.expect(MessageType::Error).await.payload, "Invalid data");
        client.expect_closed().await;
    }

    /// Tests heartbeats are accepted before logging in
    #[tokio::test]
    async fn ping_before_login_is_tolerated() {
        let addr = spawn_server(4).await;
        let mut client = TestClient::connect(addr).await;

        client.send(MessageType::Ping, "").await;
        client.send(MessageType::Pong, "").await;
        client.login("alice").await;
    }

    /// Tests connections beyond the session table are turned away
    #[tokio::test]
    async fn full_server_rejects_connection() {
        let addr = spawn_server(1).await;
        let mut first = TestClient::connect(addr).await;
        first.login("alice").await;

        let mut second = TestClient::connect(addr).await;
        let reply = second.expect(MessageType::Error).await;
        assert_eq!(reply.payload, "Cannot connect at the moment (FULL)");
        second.expect_closed().await;
    }
}

/// LOBBY AND ROOM TESTS
mod lobby_tests {
    use super::*;

    /// Tests a taken nickname is refused and the connection closed
    #[tokio::test]
    async fn duplicate_nick_rejected() {
        let addr = spawn_server(4).await;
        let mut first = TestClient::connect(addr).await;
        first.login("alice").await;

        let mut second = TestClient::connect(addr).await;
        second.send(MessageType::Login, "alice").await;
        assert_eq!(
            second.expect(MessageType::Error).await.payload,
            "User already exists"
        );
        second.expect_closed().await;
    }

    /// Tests listing, creating and joining rooms
    #[tokio::test]
    async fn create_list_and_join() {
        let addr = spawn_server(4).await;
        let mut alice = TestClient::connect(addr).await;
        let mut bob = TestClient::connect(addr).await;
        alice.login("alice").await;
        bob.login("bob").await;

        bob.send(MessageType::RoomList, "").await;
        assert_eq!(bob.expect(MessageType::RoomListEmpty).await.payload, "No rooms");

        alice.send(MessageType::RoomCreate, "table1").await;
        assert_eq!(alice.expect(MessageType::RoomCreated).await.payload, "0");
        assert_eq!(alice.expect(MessageType::Owner).await.payload, "1");
        alice.expect(MessageType::RoomInfo).await;

        bob.send(MessageType::RoomList, "").await;
        assert_eq!(
            bob.expect(MessageType::RoomList).await.payload,
            "0|table1|(1/2)|W,\n"
        );

        bob.send(MessageType::RoomJoin, "0").await;
        assert_eq!(bob.expect(MessageType::RoomJoined).await.payload, "0");
        let info = bob.expect(MessageType::RoomInfo).await;
        assert_eq!(info.payload, "alice|NOT READY|OWNER,bob|NOT READY|GUEST,");
        assert_eq!(alice.expect(MessageType::RoomInfo).await, info);
    }

    /// Tests a lobby player sending a game action is disconnected
    #[tokio::test]
    async fn out_of_state_message_disconnects() {
        let addr = spawn_server(4).await;
        let mut client = TestClient::connect(addr).await;
        client.login("alice").await;

        client.send(MessageType::Discard, "KS").await;
        client.expect_closed().await;
    }
}

/// MATCH TESTS
mod game_tests {
    use super::*;

    /// Tests the deal and the starter's opening restrictions
    #[tokio::test]
    async fn start_deals_and_starter_cannot_draw() {
        let addr = spawn_server(4).await;
        let (mut alice, mut bob, _) = started_match(addr).await;

        alice.expect(MessageType::Start).await;
        alice.expect(MessageType::Turn).await;
        let cards = alice.expect(MessageType::Cards).await;
        assert_eq!(cards.payload.split('|').count(), 15);

        bob.expect(MessageType::Start).await;
        bob.expect(MessageType::Wait).await;
        let cards = bob.expect(MessageType::Cards).await;
        assert_eq!(cards.payload.split('|').count(), 14);

        alice.send(MessageType::TakeFromDeck, "").await;
        alice.expect(MessageType::Error).await;

        bob.send(MessageType::TakeFromDeck, "").await;
        assert_eq!(bob.expect(MessageType::Error).await.payload, "Not your turn");

        alice.send(MessageType::Discard, "KS").await;
        let state = alice.expect(MessageType::State).await;
        assert!(state.payload.ends_with("|KS||WAIT|14"));
        alice.expect(MessageType::Wait).await;

        let state = bob.expect(MessageType::State).await;
        assert!(state.payload.ends_with("|KS||TURN|14"));
        bob.expect(MessageType::Turn).await;

        bob.send(MessageType::TakeFromDiscard, "").await;
        let state = bob.expect(MessageType::State).await;
        assert!(state.payload.contains("KS"));
        assert!(state.payload.ends_with("|AC||TURN|14"));
    }

    /// Tests a dropped player pauses the match and can reclaim its seat
    #[tokio::test]
    async fn reconnect_resumes_paused_match() {
        let addr = spawn_server(4).await;
        let (alice, mut bob, token) = started_match(addr).await;
        for msg_type in [MessageType::Start, MessageType::Wait, MessageType::Cards] {
            bob.expect(msg_type).await;
        }

        drop(alice);
        bob.expect(MessageType::Paused).await;

        bob.send(MessageType::TakeFromDeck, "").await;
        assert_eq!(bob.expect(MessageType::Notice).await.payload, "Game paused");

        let mut intruder = TestClient::connect(addr).await;
        intruder
            .send(MessageType::Login, "alice|AAAAAAAAAA")
            .await;
        assert_eq!(
            intruder.expect(MessageType::Error).await.payload,
            "Invalid token"
        );

        let mut alice = TestClient::connect(addr).await;
        alice
            .send(MessageType::Login, &format!("alice|{}", token))
            .await;
        alice.expect(MessageType::Reconnected).await;
        assert_eq!(alice.expect(MessageType::Okay).await.payload, "TURN");
        let state = alice.expect(MessageType::State).await;
        assert!(state.payload.ends_with("|AC||TURN|14"));
        alice.expect(MessageType::Resumed).await;
        bob.expect(MessageType::Resumed).await;

        alice.send(MessageType::Discard, "KS").await;
        alice.expect(MessageType::State).await;
        alice.expect(MessageType::Wait).await;
        bob.expect(MessageType::State).await;
        bob.expect(MessageType::Turn).await;
    }

    /// Tests a token for a nickname the server no longer knows
    #[tokio::test]
    async fn unknown_session_reports_expiry() {
        let addr = spawn_server(4).await;
        let mut client = TestClient::connect(addr).await;
        client.send(MessageType::Login, "ghost|AAAAAAAAAA").await;
        assert_eq!(
            client.expect(MessageType::Error).await.payload,
            "Session expired"
        );
        client.login("ghost").await;
    }
}
