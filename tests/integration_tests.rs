//! Integration tests for the server and client crates
//!
//! These tests run a real server on an ephemeral port and talk to it over TCP.

use client::config::ClientConfig;
use client::input::InputEvent;
use client::network::{Client, ClientHandle};
use server::config::ServerConfig;
use server::network::Server;
use server::registry::ConnectionRegistry;
use shared::codec::{decode_snapshot, encode_report};
use shared::frame::{read_frame, write_frame};
use shared::handshake::accept_identity;
use shared::{ClientId, ClientState, MAX_SNAPSHOT_SIZE};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Instant};
use tokio_util::sync::CancellationToken;

const TIMEOUT: Duration = Duration::from_secs(5);
const TICK: Duration = Duration::from_millis(20);

struct TestServer {
    addr: String,
    registry: Arc<ConnectionRegistry>,
    shutdown: CancellationToken,
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start_server() -> TestServer {
    let config = ServerConfig {
        listen_addr: "127.0.0.1:0".to_string(),
        tick_interval: TICK,
        ack_timeout: Duration::from_millis(500),
        ..ServerConfig::default()
    };
    let server = Server::bind(config).await.expect("bind test server");
    let test_server = TestServer {
        addr: server.local_addr().unwrap().to_string(),
        registry: server.registry(),
        shutdown: server.shutdown_token(),
    };
    tokio::spawn(server.run());
    test_server
}

async fn connect(server: &TestServer) -> ClientHandle {
    let config = ClientConfig {
        server_addr: server.addr.clone(),
        tick_interval: TICK,
        ..ClientConfig::default()
    };
    Client::connect(config).await.expect("connect").start()
}

/// Handshakes over a raw socket and returns the assigned id.
async fn connect_raw(server: &TestServer) -> (TcpStream, ClientId) {
    let mut stream = TcpStream::connect(&server.addr).await.unwrap();
    let id = accept_identity(&mut stream, TIMEOUT).await.unwrap();
    (stream, id)
}

async fn wait_for_world<F>(handle: &ClientHandle, mut accept: F) -> Vec<ClientState>
where
    F: FnMut(&[ClientState]) -> bool,
{
    let mut world = handle.world();
    timeout(TIMEOUT, async {
        loop {
            {
                let current = world.borrow_and_update();
                if accept(&current) {
                    return current.clone();
                }
            }
            world.changed().await.expect("client stopped");
        }
    })
    .await
    .expect("world never reached the expected state")
}

async fn read_world_until<F>(stream: &mut TcpStream, mut accept: F) -> Vec<ClientState>
where
    F: FnMut(&[ClientState]) -> bool,
{
    timeout(TIMEOUT, async {
        loop {
            let payload = read_frame(stream, MAX_SNAPSHOT_SIZE).await.unwrap();
            let world = decode_snapshot(&payload).unwrap();
            if accept(&world) {
                return world;
            }
        }
    })
    .await
    .expect("broadcast never reached the expected state")
}

fn sorted(mut world: Vec<ClientState>) -> Vec<ClientState> {
    world.sort_by_key(|state| state.id);
    world
}

/// END-TO-END BROADCAST TESTS
mod broadcast_tests {
    use super::*;

    /// Three clients report their positions and all see the same world
    #[tokio::test]
    async fn three_clients_share_one_world() {
        let server = start_server().await;

        let reports = [(-200, -300, b'w'), (-250, -640, b'a'), (-500, -250, b'w')];
        let mut clients = Vec::new();
        let mut expected = Vec::new();
        for (x, y, key) in reports {
            let handle = connect(&server).await;
            handle.push(InputEvent::Key(key));
            handle.push(InputEvent::MoveTo { x, y });
            expected.push(ClientState::new(handle.id(), x, y, key as i64));
            clients.push(handle);
        }
        let expected = sorted(expected);

        for handle in &clients {
            let world = wait_for_world(handle, |world| sorted(world.to_vec()) == expected).await;
            assert_eq!(world.len(), 3);
        }

        for handle in clients {
            handle.shutdown().await;
        }
    }

    /// A new client appears at the spawn point before it reports anything
    #[tokio::test]
    async fn newcomer_broadcast_at_spawn() {
        let server = start_server().await;
        let handle = connect(&server).await;
        let id = handle.id();

        let world = wait_for_world(&handle, |world| !world.is_empty()).await;
        assert_eq!(world, vec![ClientState::spawn(id)]);

        handle.shutdown().await;
    }

    /// Clients that leave stop appearing in later broadcasts
    #[tokio::test]
    async fn disconnected_client_leaves_world() {
        let server = start_server().await;
        let stay = connect(&server).await;
        let leave = connect(&server).await;
        let leaving_id = leave.id();

        wait_for_world(&stay, |world| world.len() == 2).await;
        leave.shutdown().await;

        let world = wait_for_world(&stay, |world| world.len() == 1).await;
        assert!(world.iter().all(|state| state.id != leaving_id));
        assert_eq!(server.registry.len(), 1);

        stay.shutdown().await;
    }

    /// A peer that never reads does not hold back broadcasts to others
    #[tokio::test]
    async fn silent_peer_does_not_delay_others() {
        let server = start_server().await;
        let (_silent, _) = connect_raw(&server).await;
        let (mut healthy, _) = connect_raw(&server).await;

        let start = Instant::now();
        let mut received = 0;
        while received < 10 {
            timeout(TICK * 5, read_frame(&mut healthy, MAX_SNAPSHOT_SIZE))
                .await
                .expect("broadcast late")
                .unwrap();
            received += 1;
        }
        assert!(start.elapsed() < TICK * 30);
    }
}

/// WIRE PROTOCOL TESTS
mod protocol_tests {
    use super::*;

    /// A client answering the id with anything but 1 is never registered
    #[tokio::test]
    async fn wrong_ack_is_rejected() {
        let server = start_server().await;
        let (_observer, _) = connect_raw(&server).await;

        let mut stream = TcpStream::connect(&server.addr).await.unwrap();
        let rejected_id = stream.read_i64().await.unwrap();
        stream.write_u8(2).await.unwrap();

        // The server closes the connection without sending any broadcast.
        let mut rest = Vec::new();
        timeout(TIMEOUT, stream.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert!(rest.is_empty());

        sleep(TICK * 3).await;
        assert_eq!(server.registry.len(), 1);
        assert!(server
            .registry
            .snapshot()
            .iter()
            .all(|(_, state)| state.id != rejected_id));
    }

    /// A client that never acknowledges is dropped after the ack timeout
    #[tokio::test]
    async fn missing_ack_is_rejected() {
        let server = start_server().await;

        let mut stream = TcpStream::connect(&server.addr).await.unwrap();
        stream.read_i64().await.unwrap();

        let mut rest = Vec::new();
        timeout(TIMEOUT, stream.read_to_end(&mut rest))
            .await
            .unwrap()
            .unwrap();
        assert!(server.registry.is_empty());
    }

    /// Reports without an id field are attributed to the sending connection
    #[tokio::test]
    async fn identity_less_report() {
        let server = start_server().await;
        let (mut stream, id) = connect_raw(&server).await;

        let payload = bincode::serialize(&vec![-120i64, -80, b'd' as i64]).unwrap();
        write_frame(&mut stream, &payload).await.unwrap();

        let expected = ClientState::new(id, -120, -80, b'd' as i64);
        read_world_until(&mut stream, |world| world == [expected]).await;
    }

    /// A client cannot overwrite another client's entry by claiming its id
    #[tokio::test]
    async fn reports_cannot_spoof_other_ids() {
        let server = start_server().await;
        let (mut victim, victim_id) = connect_raw(&server).await;
        let (mut spoofer, spoofer_id) = connect_raw(&server).await;

        let forged = ClientState::new(victim_id, 1, 1, b'x' as i64);
        write_frame(&mut spoofer, &encode_report(&forged).unwrap())
            .await
            .unwrap();

        let world = read_world_until(&mut victim, |world| {
            world.iter().any(|state| state.id == spoofer_id && state.x == 1)
        })
        .await;
        assert!(world.contains(&ClientState::spawn(victim_id)));
    }

    /// Garbage between valid reports is skipped without dropping the client
    #[tokio::test]
    async fn garbage_is_discarded() {
        let server = start_server().await;
        let (mut stream, id) = connect_raw(&server).await;

        write_frame(&mut stream, &[0xde, 0xad]).await.unwrap();
        write_frame(&mut stream, &vec![7u8; 4096]).await.unwrap();

        let report = ClientState::new(id, 16, 24, b's' as i64);
        write_frame(&mut stream, &encode_report(&report).unwrap())
            .await
            .unwrap();

        read_world_until(&mut stream, |world| world == [report]).await;
        assert_eq!(server.registry.len(), 1);
    }
}
