//! Mock analytics API server for testing
//!
//! Serves canned JSON per path so the remote adapter can be exercised
//! without a running backend. Unknown paths answer 404. Every request line
//! is recorded, and the first N requests can be stalled past the client
//! timeout to drive the retry path.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::Value as JsonValue;

/// Canned responses keyed by path (query string excluded)
#[derive(Debug, Clone, Default)]
pub struct MockRoutes {
    routes: HashMap<String, (u16, String)>,
    stall_first: usize,
    stall: Duration,
}

impl MockRoutes {
    pub fn route(mut self, path: &str, body: JsonValue) -> Self {
        self.routes.insert(path.to_string(), (200, body.to_string()));
        self
    }

    pub fn status(mut self, path: &str, status: u16) -> Self {
        self.routes.insert(
            path.to_string(),
            (status, r#"{"detail": "mock failure"}"#.to_string()),
        );
        self
    }

    /// Hold the first `count` requests for `stall` before answering
    pub fn stall_first(mut self, count: usize, stall: Duration) -> Self {
        self.stall_first = count;
        self.stall = stall;
        self
    }
}

pub struct MockApiServer {
    port: u16,
    running: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<String>>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

impl MockApiServer {
    /// Start on a random available port
    pub fn start(routes: MockRoutes) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::new(AtomicUsize::new(0));

        // Non-blocking so the accept loop notices shutdown
        listener.set_nonblocking(true)?;

        let running_clone = running.clone();
        let requests_clone = requests.clone();
        let routes = Arc::new(routes);
        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let routes = routes.clone();
                        let requests = requests_clone.clone();
                        let seen = seen.clone();
                        thread::spawn(move || {
                            handle_connection(stream, &routes, &requests, &seen);
                        });
                    }
                    Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                        thread::sleep(Duration::from_millis(5));
                    }
                    Err(_) => break,
                }
            }
        });

        Ok(Self {
            port,
            running,
            requests,
            thread_handle: Some(thread_handle),
        })
    }

    /// Base URL including the `/api` prefix the real service mounts under
    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}/api", self.port)
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Request targets received so far, query strings included
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockApiServer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn handle_connection(
    mut stream: TcpStream,
    routes: &MockRoutes,
    requests: &Mutex<Vec<String>>,
    seen: &AtomicUsize,
) {
    let _ = stream.set_nonblocking(false);
    let mut buffer = [0; 4096];
    let Ok(n) = stream.read(&mut buffer) else {
        return;
    };
    let request = String::from_utf8_lossy(&buffer[..n]);

    let first_line = request.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        send_response(&mut stream, 400, r#"{"detail": "invalid request"}"#);
        return;
    }
    let target = parts[1].to_string();
    requests.lock().unwrap().push(target.clone());

    if seen.fetch_add(1, Ordering::SeqCst) < routes.stall_first {
        thread::sleep(routes.stall);
    }

    let path = target.split('?').next().unwrap_or(&target);
    match (parts[0], routes.routes.get(path)) {
        ("GET", Some((status, body))) => send_response(&mut stream, *status, body),
        ("GET", None) => send_response(&mut stream, 404, r#"{"detail": "not found"}"#),
        _ => send_response(&mut stream, 405, r#"{"detail": "method not allowed"}"#),
    }
}

fn send_response(stream: &mut TcpStream, status: u16, body: &str) {
    let reason = match status {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        405 => "Method Not Allowed",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "Unknown",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}
