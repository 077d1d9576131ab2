//! Integration tests for wordfeed.
//!
//! A real server on 127.0.0.1:0, real clients, artifacts in a temp dir.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::path::Path;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use wordfeed::error::Result;
use wordfeed::protocol::Sentinel;
use wordfeed::{
    Config, ConnectionManager, LoadHarness, PageSettings, ServeStats, SessionDriver, SessionOutcome,
    WordStore,
};

struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    task: tokio::task::JoinHandle<Result<ServeStats>>,
}

impl TestServer {
    async fn start(store: WordStore, k: usize, p: usize) -> Self {
        let manager = ConnectionManager::bind(
            "127.0.0.1:0".parse().unwrap(),
            store,
            PageSettings::new(k, p).unwrap(),
        )
        .await
        .unwrap();
        let addr = manager.local_addr().unwrap();
        let shutdown = CancellationToken::new();
        let task = tokio::spawn(manager.run(shutdown.clone()));
        Self { addr, shutdown, task }
    }

    async fn stop(self) -> ServeStats {
        self.shutdown.cancel();
        self.task.await.unwrap().unwrap()
    }
}

fn document(words: usize) -> String {
    // Repeating vocabulary with mixed delimiters.
    let vocab = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta"];
    let mut text = String::new();
    for i in 0..words {
        text.push_str(vocab[(i * 3 + i / 7) % vocab.len()]);
        text.push_str(if i % 5 == 0 { " " } else { "," });
        if i % 11 == 0 {
            text.push('\n');
        }
    }
    text
}

fn expected_counts(store: &WordStore) -> BTreeMap<String, u64> {
    let mut counts = BTreeMap::new();
    for word in store.words() {
        *counts.entry(word.clone()).or_insert(0) += 1;
    }
    counts
}

fn read_artifact(path: &Path) -> BTreeMap<String, u64> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(|line| {
            let (word, count) = line.split_once(", ").unwrap();
            (word.to_string(), count.parse().unwrap())
        })
        .collect()
}

/// Every word of the document arrives exactly once per client.
#[tokio::test]
async fn test_full_coverage_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("words.txt");
    std::fs::write(&corpus, document(503)).unwrap();

    let store = WordStore::open(&corpus).unwrap();
    assert_eq!(store.len(), 503);
    let expected = expected_counts(&store);

    for (k, p) in [(10, 3), (7, 7), (1, 1), (600, 50), (10, 20)] {
        let server = TestServer::start(store.clone(), k, p).await;
        let out = dir.path().join(format!("k{}_p{}", k, p));
        std::fs::create_dir_all(&out).unwrap();

        let report = SessionDriver::new(1, k).unwrap().run(server.addr, &out).await;

        assert_eq!(report.outcome, SessionOutcome::Completed(Sentinel::Eof), "k={} p={}", k, p);
        assert_eq!(report.tokens_received, 503);
        assert_eq!(report.table.total(), report.tokens_received);
        assert_eq!(read_artifact(&out.join("output1.txt")), expected);

        server.stop().await;
    }
}

/// Concurrent clients produce the same artifacts as a lone client.
#[tokio::test]
async fn test_concurrent_clients_match_serial_run() {
    let dir = tempfile::tempdir().unwrap();
    let store = WordStore::from_text(&document(1000));
    let server = TestServer::start(store, 13, 4).await;

    let serial = dir.path().join("serial");
    let serial_report = LoadHarness::new(server.addr, 13, 1, &serial).unwrap().run().await.unwrap();
    assert_eq!(serial_report.truncated(), 0);
    let baseline = std::fs::read_to_string(serial.join("output1.txt")).unwrap();

    let concurrent = dir.path().join("concurrent");
    let report = LoadHarness::new(server.addr, 13, 8, &concurrent).unwrap().run().await.unwrap();

    assert_eq!(report.sessions.len(), 8);
    assert_eq!(report.truncated(), 0);
    for id in 1..=8 {
        let text = std::fs::read_to_string(concurrent.join(format!("output{}.txt", id))).unwrap();
        assert_eq!(text, baseline, "client {}", id);
    }

    let stats = server.stop().await;
    assert_eq!(stats.sessions, 9);
    assert_eq!(stats.failed_sessions, 0);
}

/// The reference scenario: five words, k = 2, p = 1.
#[tokio::test]
async fn test_five_word_scenario_on_the_wire() {
    let store = WordStore::from_text("a,b,c,d,e");
    let server = TestServer::start(store, 2, 1).await;

    let stream = TcpStream::connect(server.addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    let mut transcript = Vec::new();
    for offset in [0, 2, 4, 6] {
        write_half.write_all(format!("{}\n", offset).as_bytes()).await.unwrap();
        let expected_frames = if offset == 4 || offset == 6 { 1 } else { 2 };
        for _ in 0..expected_frames {
            transcript.push(lines.next_line().await.unwrap().unwrap());
        }
    }

    assert_eq!(transcript, vec!["a,", "b,", "c,", "d,", "e,EOF", "$$"]);

    drop(write_half);
    server.stop().await;
}

/// A malformed request is answered with an error frame and the session
/// keeps serving.
#[tokio::test]
async fn test_malformed_request_then_valid() {
    let store = WordStore::from_text("one two three");
    let server = TestServer::start(store, 3, 3).await;

    let stream = TcpStream::connect(server.addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    write_half.write_all(b"abc\n").await.unwrap();
    let reply = lines.next_line().await.unwrap().unwrap();
    assert!(reply.starts_with("ERR "), "got {:?}", reply);

    write_half.write_all(b"-1\n").await.unwrap();
    assert!(lines.next_line().await.unwrap().unwrap().starts_with("ERR "));

    write_half.write_all(b"0\n").await.unwrap();
    assert_eq!(lines.next_line().await.unwrap().unwrap(), "one,two,three,EOF");

    drop(write_half);
    let stats = server.stop().await;
    assert_eq!(stats.failed_sessions, 0);
}

/// Requests for offsets past the end get the out-of-range sentinel.
#[tokio::test]
async fn test_out_of_range_offsets() {
    let store = WordStore::from_text("x y");
    let server = TestServer::start(store, 5, 2).await;

    let stream = TcpStream::connect(server.addr).await.unwrap();
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();

    for offset in ["2", "3", "18446744073709551615"] {
        write_half.write_all(format!("{}\n", offset).as_bytes()).await.unwrap();
        assert_eq!(lines.next_line().await.unwrap().unwrap(), "$$");
    }

    drop(write_half);
    server.stop().await;
}

/// An empty document ends every client session with `$$`.
#[tokio::test]
async fn test_empty_document() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(WordStore::from_text(""), 4, 2).await;

    let report = LoadHarness::new(server.addr, 4, 3, dir.path()).unwrap().run().await.unwrap();

    for session in &report.sessions {
        assert_eq!(session.outcome, SessionOutcome::Completed(Sentinel::OutOfRange));
        assert!(session.table.is_empty());
    }
    assert_eq!(std::fs::read_to_string(dir.path().join("output2.txt")).unwrap(), "");

    server.stop().await;
}

/// Config file drives both ends.
#[tokio::test]
async fn test_config_driven_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let corpus = dir.path().join("doc.txt");
    std::fs::write(&corpus, "the quick brown fox jumps over the lazy dog").unwrap();
    let out = dir.path().join("out");

    let config_path = dir.path().join("config.json");
    std::fs::write(
        &config_path,
        format!(
            r#"{{"server_ip": "127.0.0.1", "server_port": 0, "input_file": {:?}, "k": 4, "p": 3, "num_clients": 2, "output_dir": {:?}}}"#,
            corpus.display().to_string(),
            out.display().to_string()
        ),
    )
    .unwrap();

    let config = Config::load(&config_path).unwrap();
    let store = WordStore::open(&config.input_file).unwrap();
    let settings = config.page_settings().unwrap();
    let manager = ConnectionManager::bind(config.socket_addr(), store, settings)
        .await
        .unwrap();
    let addr = manager.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let task = tokio::spawn(manager.run(shutdown.clone()));

    let report = LoadHarness::new(addr, config.k, config.num_clients, &config.output_dir)
        .unwrap()
        .run()
        .await
        .unwrap();
    assert_eq!(report.total_words(), 18);

    let counts = read_artifact(&out.join("output1.txt"));
    assert_eq!(counts.get("the"), Some(&2));
    assert_eq!(counts.get("dog"), Some(&1));

    shutdown.cancel();
    task.await.unwrap().unwrap();
}

/// A session that is mid-way when the server stops ends truncated.
#[tokio::test]
async fn test_server_shutdown_truncates_connected_session() {
    let server = TestServer::start(WordStore::from_text("a b c d e f"), 2, 2).await;

    // Establish the session and consume one page so it is live server-side.
    let mut stream = TcpStream::connect(server.addr).await.unwrap();
    stream.write_all(b"0\n").await.unwrap();
    let mut page = String::new();
    BufReader::new(&mut stream).read_line(&mut page).await.unwrap();
    assert_eq!(page, "a,b,\n");

    let stats = server.stop().await;
    assert_eq!(stats.sessions, 1);

    let report = SessionDriver::new(1, 2).unwrap().drive(stream).await;
    assert!(report.is_truncated());
    assert_eq!(report.tokens_received, 0);
}

/// Connecting after the server is gone still leaves an (empty) artifact.
#[tokio::test]
async fn test_client_against_stopped_server_is_truncated() {
    let dir = tempfile::tempdir().unwrap();
    let server = TestServer::start(WordStore::from_text("a b"), 2, 2).await;
    let addr = server.addr;
    server.stop().await;

    let report = SessionDriver::new(1, 2).unwrap().run(addr, dir.path()).await;
    assert!(report.is_truncated());
    assert_eq!(std::fs::read_to_string(dir.path().join("output1.txt")).unwrap(), "");
}
