//! Provider clients against an in-process HTTP stub.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use market_common::catalog::{Catalog, IndexSymbol};
use market_common::config::ProviderConfig;
use market_common::quote::Provenance;
use market_common::{MarketError, SyncConfig};
use market_feed::primary::PrimaryClient;
use market_feed::secondary::SecondaryClient;
use market_feed::shutdown::ShutdownHandle;
use market_feed::{CacheManager, QuoteProvider, SymbolProvider};

/// Serves canned `(status, body)` responses in order, repeating the last one, and
/// records each request head.
struct StubServer {
    base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    fn start(responses: Vec<(u16, &'static str)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        thread::spawn(move || {
            for (served, stream) in listener.incoming().enumerate() {
                let Ok(mut stream) = stream else { continue };
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut head = String::new();
                loop {
                    let mut line = String::new();
                    if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
                        break;
                    }
                    head.push_str(&line);
                }
                seen.lock().unwrap().push(head);

                let (status, body) = responses[served.min(responses.len() - 1)];
                let response = format!(
                    "HTTP/1.1 {status} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = stream.write_all(response.as_bytes());
            }
        });

        Self { base_url, requests }
    }

    fn hits(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn request(&self, index: usize) -> String {
        self.requests.lock().unwrap()[index].clone()
    }
}

const BATCH: &str = r#"[
    {"symbol": "^GSPC", "price": 5100.0, "change": 100.0, "volume": 2000000},
    {"symbol": "^FTSE", "price": 8000.0, "change": -80.0, "volume": 0},
    {"symbol": "^NOTOURS", "price": 1.0, "change": 0.0}
]"#;

fn config(server: &StubServer) -> SyncConfig {
    SyncConfig::new("secret")
        .with_primary_url(&server.base_url)
        .with_retries(2, Duration::from_millis(10))
        .with_request_timeout(Duration::from_secs(2))
}

fn primary(server: &StubServer) -> (PrimaryClient, ShutdownHandle) {
    let shutdown = ShutdownHandle::new();
    let client = PrimaryClient::new(&config(server), shutdown.signal()).unwrap();
    (client, shutdown)
}

#[test]
fn batch_request_shape_and_parsing() {
    let server = StubServer::start(vec![(200, BATCH)]);
    let (client, _shutdown) = primary(&server);

    let quotes = client.fetch_batch(&Catalog::standard(), true).unwrap();
    assert_eq!(quotes.len(), 2);
    assert_eq!(quotes[0].symbol, IndexSymbol::Gspc);
    assert_eq!(quotes[0].change_percent, 2.0);
    assert_eq!(quotes[0].volume, 2_000_000);
    assert_eq!(quotes[1].change_percent, -0.99);

    let head = server.request(0).to_ascii_lowercase();
    assert!(head.starts_with("get /stable/batch-index-quotes?apikey=secret "));
    assert!(head.contains("cache-control: no-cache"));
}

#[test]
fn server_errors_are_retried_with_backoff() {
    let server = StubServer::start(vec![(503, "{}"), (502, "{}"), (200, BATCH)]);
    let (client, _shutdown) = primary(&server);

    let started = Instant::now();
    let quotes = client.fetch_batch(&Catalog::standard(), false).unwrap();
    assert_eq!(quotes.len(), 2);
    assert_eq!(server.hits(), 3);
    // 10ms + 20ms of backoff
    assert!(started.elapsed() >= Duration::from_millis(30));
}

#[test]
fn retries_are_bounded() {
    let server = StubServer::start(vec![(500, "{}")]);
    let (client, _shutdown) = primary(&server);

    let err = client.fetch_batch(&Catalog::standard(), false).unwrap_err();
    assert!(matches!(err, MarketError::Transport(_)), "{err}");
    assert_eq!(server.hits(), 3);
}

#[test]
fn malformed_payloads_are_not_retried() {
    for body in [r#"{"error": "nope"}"#, "[]", "not json"] {
        let server = StubServer::start(vec![(200, body)]);
        let (client, _shutdown) = primary(&server);
        let err = client.fetch_batch(&Catalog::standard(), false).unwrap_err();
        assert!(matches!(err, MarketError::MalformedResponse(_)), "{body}: {err}");
        assert_eq!(server.hits(), 1);
    }
}

#[test]
fn client_errors_are_rejected_without_retry() {
    let server = StubServer::start(vec![(401, r#"{"message": "bad key"}"#)]);
    let (client, _shutdown) = primary(&server);
    let err = client.fetch_batch(&Catalog::standard(), false).unwrap_err();
    match err {
        MarketError::Rejected { status, url } => {
            assert_eq!(status, 401);
            assert!(!url.contains("secret"));
        }
        other => panic!("unexpected {other}"),
    }
    assert_eq!(server.hits(), 1);
}

#[test]
fn shutdown_cancels_backoff() {
    let server = StubServer::start(vec![(503, "{}")]);
    let shutdown = ShutdownHandle::new();
    let config = config(&server).with_retries(2, Duration::from_secs(30));
    let client = PrimaryClient::new(&config, shutdown.signal()).unwrap();

    let worker = thread::spawn(move || client.fetch_batch(&Catalog::standard(), false));
    while server.hits() == 0 {
        thread::sleep(Duration::from_millis(5));
    }
    let started = Instant::now();
    shutdown.trigger();
    let err = worker.join().unwrap().unwrap_err();
    assert!(matches!(err, MarketError::ShutDown(_)));
    assert!(started.elapsed() < Duration::from_secs(10));
}

#[test]
fn single_quote_endpoint() {
    let server = StubServer::start(vec![(
        200,
        r#"[{"symbol": "^N225", "price": 39000.0, "change": 390.0, "changesPercentage": 1.01}]"#,
    )]);
    let (client, _shutdown) = primary(&server);
    let quote = client.fetch_quote(&IndexSymbol::N225.spec()).unwrap();
    assert_eq!(quote.change_percent, 1.01);
    let head = server.request(0);
    assert!(head.starts_with("GET /api/v3/quote/"));
    assert!(head.contains("N225?apikey=secret "));
}

#[test]
fn api_key_with_reserved_characters_reaches_the_server_encoded() {
    let server = StubServer::start(vec![(200, BATCH)]);
    let config = SyncConfig::new("k&ey=1 2")
        .with_primary_url(&server.base_url)
        .with_retries(0, Duration::from_millis(10));
    let shutdown = ShutdownHandle::new();
    let client = PrimaryClient::new(&config, shutdown.signal()).unwrap();

    client.fetch_batch(&Catalog::standard(), false).unwrap();
    assert!(
        server
            .request(0)
            .starts_with("GET /stable/batch-index-quotes?apikey=k%26ey%3D1+2 ")
    );
}

#[test]
fn secondary_parses_global_quote_and_isolates_failures() {
    let server = StubServer::start(vec![
        (
            200,
            r#"{"Global Quote": {"05. price": "8123.45", "06. volume": "42", "10. change percent": "1.2345%"}}"#,
        ),
        (200, "{}"),
    ]);
    let shutdown = ShutdownHandle::new();
    let endpoint = ProviderConfig::new(&server.base_url, "backup-key");
    let client = SecondaryClient::new(endpoint, &config(&server), shutdown.signal()).unwrap();

    let ok = client.fetch_symbol(&IndexSymbol::Ftse.spec()).unwrap();
    assert_eq!(ok.change_percent, 1.23);
    assert_eq!(ok.price, Some(8123.45));
    assert_eq!(ok.volume, 42);
    assert_eq!(ok.source, Provenance::Secondary);
    let head = server.request(0);
    assert!(head.starts_with("GET /query?function=GLOBAL_QUOTE&symbol="));
    assert!(head.contains("symbol=%5EFTSE&apikey=backup-key "));

    let err = client.fetch_symbol(&IndexSymbol::Dji.spec()).unwrap_err();
    assert!(matches!(err, MarketError::PerSymbol { ref symbol, .. } if symbol == "^DJI"));
}

#[test]
fn cache_manager_over_http_degrades_to_cached_batch() {
    let server = StubServer::start(vec![(200, BATCH), (503, "{}")]);
    let config = config(&server);
    let manager = CacheManager::new(Catalog::standard(), &config).unwrap();

    let first = manager.get_quotes(true);
    let second = manager.get_quotes(true);
    assert!(second.same_batch(&first));
    assert_eq!(server.hits(), 4);
    assert!(manager.status().has_error);
}
