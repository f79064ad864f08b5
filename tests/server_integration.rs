//! Server Integration Tests
//!
//! Real sockets against a server on an ephemeral port, backed by a temporary
//! cache log and an in-process provider.

use std::io::{BufRead, BufReader, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use nutricache::cache::{Food, FoodCache, FoodId};
use nutricache::error::Result;
use nutricache::provider::{FoodProvider, SearchPage};
use nutricache::request::{
    HandlerConfig, RequestHandler, Response, NOT_FOUND_MESSAGE, TOO_LARGE_MESSAGE,
};
use nutricache::server::{Server, ServerConfig};

/// Knows every id; keyword searches return one page of bulky records
#[derive(Default)]
struct StubProvider {
    calls: AtomicUsize,
}

impl FoodProvider for StubProvider {
    fn food(&self, fdc_id: FoodId) -> Result<Option<Food>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(Food::new(fdc_id).with_description(format!("FOOD {}", fdc_id))))
    }

    fn search(&self, keywords: &[String], page: u32) -> Result<Option<SearchPage>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if keywords.iter().any(|k| k == "nothing") {
            return Ok(Some(SearchPage::default()));
        }
        Ok(Some(SearchPage {
            query: Some(keywords.join(" ")),
            total_hits: 50,
            current_page: page,
            total_pages: 1,
            foods: (0..50)
                .map(|id| Food::new(10_000 + id).with_description("X".repeat(100)))
                .collect(),
        }))
    }
}

// Fields drop in order: the server stops before the log directory goes away
struct Fixture {
    server: Server,
    cache: Arc<FoodCache>,
    provider: Arc<StubProvider>,
    _dir: tempfile::TempDir,
}

impl Fixture {
    fn start(output_buffer_bytes: usize) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let cache = Arc::new(FoodCache::open_at(dir.path().join("cache.jsonl")).unwrap());
        let provider = Arc::new(StubProvider::default());
        let handler = Arc::new(
            RequestHandler::new(
                Arc::clone(&cache),
                provider.clone(),
                HandlerConfig::default(),
            )
            .unwrap(),
        );

        let server = Server::start(
            ServerConfig {
                bind_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
                worker_threads: 3,
                output_buffer_bytes,
                ..Default::default()
            },
            handler,
        )
        .unwrap();

        Self {
            server,
            cache,
            provider,
            _dir: dir,
        }
    }

    fn connect(&self) -> Client {
        Client::connect(self.server.local_addr())
    }
}

struct Client {
    writer: TcpStream,
    reader: BufReader<TcpStream>,
}

impl Client {
    fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(Duration::from_secs(10))).unwrap();
        Self {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
        }
    }

    fn request_raw(&mut self, request: &str) -> String {
        self.writer.write_all(request.as_bytes()).unwrap();
        self.writer.flush().unwrap();
        let mut line = String::new();
        self.reader.read_line(&mut line).unwrap();
        line
    }

    fn request(&mut self, request: &str) -> Response {
        let line = self.request_raw(request);
        assert!(line.ends_with('\n'), "reply not newline terminated: {:?}", line);
        Response::from_bytes(line.as_bytes()).unwrap()
    }
}

// =============================================================================
// Protocol
// =============================================================================

mod protocol_tests {
    use super::*;

    #[test]
    fn test_sequential_requests_get_ordered_replies() {
        let fixture = Fixture::start(256 * 1024);
        let mut client = fixture.connect();

        for id in 1..=20u64 {
            let reply = client.request(&format!("get-food-report {}\n", id));
            assert!(reply.is_ok());
            assert_eq!(reply.food.unwrap().fdc_id, id);
        }
    }

    #[test]
    fn test_malformed_request_keeps_connection_open() {
        let fixture = Fixture::start(256 * 1024);
        let mut client = fixture.connect();

        let reply = client.request("make-me-a-sandwich\n");
        assert!(!reply.is_ok());
        assert!(reply.message.unwrap().starts_with("Invalid request: "));

        let reply = client.request("get-food-report 42\r\n");
        assert_eq!(reply.food.map(|f| f.fdc_id), Some(42));
    }

    #[test]
    fn test_barcode_miss_is_not_found() {
        let fixture = Fixture::start(256 * 1024);
        let mut client = fixture.connect();

        let reply = client.request("get-food-by-barcode 009800146130\n");
        assert_eq!(reply.message.as_deref(), Some(NOT_FOUND_MESSAGE));
        assert_eq!(fixture.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_search_without_hits_is_not_found() {
        let fixture = Fixture::start(256 * 1024);
        let mut client = fixture.connect();

        let reply = client.request("get-food nothing at all\n");
        assert_eq!(reply.message.as_deref(), Some(NOT_FOUND_MESSAGE));
    }

    #[test]
    fn test_oversized_reply_reports_too_big() {
        let fixture = Fixture::start(1024);
        let mut client = fixture.connect();

        let reply = client.request("get-food bulky\n");
        assert_eq!(reply.message.as_deref(), Some(TOO_LARGE_MESSAGE));

        // The connection is still usable afterwards
        let reply = client.request("get-food-report 5\n");
        assert!(reply.is_ok());
    }
}

// =============================================================================
// Concurrency & Caching
// =============================================================================

mod concurrency_tests {
    use super::*;

    #[test]
    fn test_concurrent_clients_receive_identical_hits() {
        let fixture = Fixture::start(256 * 1024);
        fixture
            .cache
            .store_in_cache(&Food::new(2015943).with_description("CHEDDAR CHEESE"));
        let addr = fixture.server.local_addr();

        let clients: Vec<_> = (0..16)
            .map(|_| {
                thread::spawn(move || {
                    let mut client = Client::connect(addr);
                    client.request_raw("get-food-report 2015943\n")
                })
            })
            .collect();

        let replies: Vec<String> = clients.into_iter().map(|c| c.join().unwrap()).collect();
        assert!(replies.iter().all(|r| r == &replies[0]));
        assert_eq!(
            replies[0],
            "{\"status\":\"OK\",\"food\":{\"fdcId\":2015943,\"description\":\"CHEDDAR CHEESE\"}}\n"
        );
        assert_eq!(fixture.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_fetched_search_is_served_from_cache_afterwards() {
        let fixture = Fixture::start(256 * 1024);
        let mut client = fixture.connect();

        let first = client.request("get-food bulky snack\n");
        assert_eq!(first.foods.as_ref().map(Vec::len), Some(50));
        assert_eq!(fixture.provider.calls.load(Ordering::SeqCst), 1);

        // Wait for the writers to index what was fetched
        for _ in 0..200 {
            if fixture.cache.index().keyword_ids("bulky snack").map(|ids| ids.len()) == Some(50) {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        let second = client.request("get-food bulky snack\n");
        assert_eq!(second.foods.map(|f| f.len()), Some(50));
        assert_eq!(fixture.provider.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shutdown_closes_open_connections() {
        let mut fixture = Fixture::start(256 * 1024);
        let mut client = fixture.connect();
        assert!(client.request("get-food-report 1\n").is_ok());

        fixture.server.shutdown();

        let mut line = String::new();
        let read = client.reader.read_line(&mut line).unwrap_or(0);
        assert_eq!(read, 0);
        fixture.cache.shutdown();
    }
}
