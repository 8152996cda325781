// tests/cluster.rs

//! End-to-end tests driving the real `ringstore-coordinator` and
//! `ringstore-server` binaries over real TCP sockets, the way spec.md §8's
//! worked scenarios describe a client observing the system from outside.
//! These spawn actual child processes; keep the cluster small (N = 3) to
//! bound wall-clock cost.

use futures::{SinkExt, StreamExt};
use ringstore::core::protocol::{Message, MessageCodec, Op, Status};
use std::io::Write;
use std::net::TcpListener as StdTcpListener;
use std::os::unix::process::CommandExt;
use std::process::{Child, ChildStdin, Command, Stdio};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_util::codec::Framed;

fn free_port() -> u16 {
    StdTcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap().port()
}

struct Cluster {
    coordinator: Child,
    coordinator_stdin: Option<ChildStdin>,
    client_port: u16,
    server_client_ports: Vec<u16>,
}

impl Cluster {
    /// Kills the server process serving shard `id` by matching the unique
    /// `--client-port` flag the coordinator launched it with, simulating
    /// the crash spec.md §8's recovery walkthrough starts from.
    fn kill_server(&self, id: usize) {
        let port = self.server_client_ports[id];
        let _ = Command::new("pkill")
            .args(["-9", "-f", &format!("client-port {port} ")])
            .status();
    }

    /// Closes the coordinator's stdin, delivering EOF — spec.md §6's
    /// graceful-shutdown trigger.
    fn close_stdin(&mut self) {
        self.coordinator_stdin.take();
    }
}

impl Drop for Cluster {
    fn drop(&mut self) {
        // The coordinator spawns server processes that inherit its process
        // group by default; killing only the coordinator orphans them.
        // `spawn_cluster` puts the coordinator in its own group (pgid ==
        // its pid), so a negative pid signals the whole tree at once.
        let pgid = self.coordinator.id() as i32;
        let _ = Command::new("kill").args(["-9", "--", &format!("-{pgid}")]).status();
        let _ = self.coordinator.wait();
    }
}

fn spawn_cluster(n: usize) -> Cluster {
    let coordinator_client_port = free_port();
    let coordinator_peer_port = free_port();

    let mut config = format!("{n}\n");
    let mut server_ports = Vec::new();
    for _ in 0..n {
        let (cp, pp, op) = (free_port(), free_port(), free_port());
        config += &format!("localhost {cp} {pp} {op}\n");
        server_ports.push((cp, pp, op));
    }

    let mut config_file = tempfile::NamedTempFile::new().unwrap();
    config_file.write_all(config.as_bytes()).unwrap();

    let mut coordinator = Command::new(env!("CARGO_BIN_EXE_ringstore-coordinator"))
        .arg("--client-port")
        .arg(coordinator_client_port.to_string())
        .arg("--peer-port")
        .arg(coordinator_peer_port.to_string())
        .arg("--config")
        .arg(config_file.path())
        .arg("--detector-timeout-secs")
        .arg("1")
        .env("RUST_LOG", "warn")
        .process_group(0)
        .stdin(Stdio::piped())
        .spawn()
        .expect("failed to launch coordinator binary");
    let coordinator_stdin = coordinator.stdin.take();

    // Keep the tempfile alive for the coordinator's lifetime by leaking it;
    // the OS cleans up the test's tmp directory regardless.
    std::mem::forget(config_file);

    Cluster {
        coordinator,
        coordinator_stdin,
        client_port: coordinator_client_port,
        server_client_ports: server_ports.iter().map(|(cp, _, _)| *cp).collect(),
    }
}

async fn locate(client_port: u16, key: &[u8]) -> (String, u16) {
    let stream = TcpStream::connect(("127.0.0.1", client_port)).await.unwrap();
    let mut framed = Framed::new(stream, MessageCodec);
    framed
        .send(Message::LocateReq { key: key.to_vec() })
        .await
        .unwrap();
    match framed.next().await.unwrap().unwrap() {
        Message::LocateResp { host, client_port } => (host, client_port),
        other => panic!("unexpected locate reply: {other:?}"),
    }
}

async fn op(server_port: u16, op: Op) -> (Status, Option<Vec<u8>>) {
    let stream = TcpStream::connect(("127.0.0.1", server_port)).await.unwrap();
    let mut framed = Framed::new(stream, MessageCodec);
    framed.send(Message::OpReq { op }).await.unwrap();
    match framed.next().await.unwrap().unwrap() {
        Message::OpResp { status, value } => (status, value),
        other => panic!("unexpected op reply: {other:?}"),
    }
}

async fn wait_for_cluster_ready(client_port: u16) {
    for _ in 0..100 {
        let stream = TcpStream::connect(("127.0.0.1", client_port)).await;
        if stream.is_ok() {
            sleep(Duration::from_millis(300)).await;
            return;
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("coordinator never came up");
}

#[tokio::test]
async fn put_then_get_round_trips_through_locate() {
    let cluster = spawn_cluster(3);
    wait_for_cluster_ready(cluster.client_port).await;

    let key = b"integration-test-key-000".to_vec();
    let key = &key[..16];

    let (host, port) = locate(cluster.client_port, key).await;
    assert_eq!(host, "localhost");

    let (status, _) = op(
        port,
        Op::Put {
            key: key.to_vec(),
            value: b"hello".to_vec(),
        },
    )
    .await;
    assert_eq!(status, Status::Success);

    let (status, value) = op(port, Op::Get { key: key.to_vec() }).await;
    assert_eq!(status, Status::Success);
    assert_eq!(value, Some(b"hello".to_vec()));
}

/// spec.md §8's worked recovery scenario: a shard's owner crashes, the
/// coordinator notices via its failure detector, spawns a replacement,
/// streams the surviving secondary's data into it, and switches client
/// traffic back over — all transparent to anyone still issuing PUT/GET.
#[tokio::test]
async fn crashed_primary_is_recovered_and_data_survives() {
    let cluster = spawn_cluster(3);
    wait_for_cluster_ready(cluster.client_port).await;

    let key = b"integration-test-key-001".to_vec();
    let key = &key[..16];

    let (_, port) = locate(cluster.client_port, key).await;
    let owner_id = cluster
        .server_client_ports
        .iter()
        .position(|p| *p == port)
        .expect("locate returned a port not in the cluster");

    let (status, _) = op(
        port,
        Op::Put {
            key: key.to_vec(),
            value: b"before-crash".to_vec(),
        },
    )
    .await;
    assert_eq!(status, Status::Success);

    cluster.kill_server(owner_id);

    // Give the detector (ticking every detector_timeout/4 == 250ms) a few
    // cycles to notice, spawn a replacement, and complete the recovery
    // stream before a client asks again.
    sleep(Duration::from_secs(3)).await;

    let (_, port) = locate(cluster.client_port, key).await;
    let (status, value) = op(port, Op::Get { key: key.to_vec() }).await;
    assert_eq!(status, Status::Success);
    assert_eq!(value, Some(b"before-crash".to_vec()));
}

/// spec.md §6/§8 scenario 6: EOF on the coordinator's stdin drives a
/// graceful `SHUTDOWN` to every server, and every server process exits.
#[tokio::test]
async fn eof_on_stdin_shuts_down_every_server() {
    let mut cluster = spawn_cluster(3);
    wait_for_cluster_ready(cluster.client_port).await;

    cluster.close_stdin();

    for _ in 0..50 {
        let all_down = cluster
            .server_client_ports
            .iter()
            .all(|p| std::net::TcpStream::connect(("127.0.0.1", *p)).is_err());
        if all_down {
            return;
        }
        sleep(Duration::from_millis(100)).await;
    }
    panic!("not every server shut down after EOF on coordinator stdin");
}

#[tokio::test]
async fn get_of_missing_key_is_key_not_found() {
    let cluster = spawn_cluster(3);
    wait_for_cluster_ready(cluster.client_port).await;

    let key = vec![0xABu8; 16];
    let (_, port) = locate(cluster.client_port, &key).await;
    let (status, value) = op(port, Op::Get { key: key.clone() }).await;
    assert_eq!(status, Status::KeyNotFound);
    assert_eq!(value, None);
}
