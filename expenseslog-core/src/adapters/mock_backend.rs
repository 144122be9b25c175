//! Mock ExpensesLog backend for testing
//!
//! A small blocking HTTP server that answers the REST routes the gateway
//! calls and records every request it sees, so tests can assert on the
//! exact method, path, query, headers and body that went over the wire.
//!
//! Bearer tokens starting with `good_` are accepted by authenticated routes.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use serde_json::json;

/// Token the mock issues and accepts
pub const VALID_TOKEN: &str = "good_token";

/// Password the mock accepts for `/auth/login`
pub const VALID_PASSWORD: &str = "secret123";

/// Email `/auth/signup` reports as already registered
pub const TAKEN_EMAIL: &str = "taken@example.com";

/// Mock backend server
pub struct MockBackend {
    port: u16,
    running: Arc<AtomicBool>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    thread_handle: Option<thread::JoinHandle<()>>,
}

/// Behaviour switches for the mock
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Answer every authenticated route with 401
    pub fail_auth: bool,
    /// Answer `POST /reimbursements/` with 400 and this detail
    pub reject_reimbursements: Option<String>,
    /// Delay in milliseconds before responding
    pub delay_ms: u64,
}

/// A request as received by the mock
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub authorization: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

impl MockBackend {
    /// Start a new mock server on a random available port
    pub fn start(config: MockConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0")?;
        let port = listener.local_addr()?.port();
        let running = Arc::new(AtomicBool::new(true));
        let requests = Arc::new(Mutex::new(Vec::new()));

        listener.set_nonblocking(true)?;

        let running_clone = running.clone();
        let requests_clone = requests.clone();
        let thread_handle = thread::spawn(move || {
            while running_clone.load(Ordering::SeqCst) {
                match listener.accept() {
                    Ok((stream, _)) => {
                        let cfg = config.clone();
                        let log = requests_clone.clone();
                        thread::spawn(move || handle_connection(stream, &cfg, &log));
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

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    /// Requests received so far, in arrival order
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.thread_handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for MockBackend {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Read one HTTP request: headers, then a Content-Length or chunked body
fn read_request(stream: &mut TcpStream) -> Option<(String, Vec<u8>)> {
    let mut data = Vec::new();
    let mut buffer = [0u8; 8192];

    let header_end = loop {
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buffer[..n]);
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).to_string();
    let head_lower = head.to_lowercase();
    let content_length = head_lower
        .lines()
        .find_map(|l| l.strip_prefix("content-length:"))
        .and_then(|v| v.trim().parse::<usize>().ok());
    let chunked = head_lower.contains("transfer-encoding: chunked");

    loop {
        let body_len = data.len() - header_end;
        let complete = match content_length {
            Some(len) => body_len >= len,
            None if chunked => data.ends_with(b"0\r\n\r\n"),
            None => true,
        };
        if complete {
            break;
        }
        let n = stream.read(&mut buffer).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buffer[..n]);
    }

    Some((head, data[header_end..].to_vec()))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn header(head: &str, name: &str) -> Option<String> {
    head.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim()
            .eq_ignore_ascii_case(name)
            .then(|| value.trim().to_string())
    })
}

fn handle_connection(mut stream: TcpStream, config: &MockConfig, log: &Mutex<Vec<RecordedRequest>>) {
    let _ = stream.set_nonblocking(false);
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));

    let Some((head, body)) = read_request(&mut stream) else {
        return;
    };

    if config.delay_ms > 0 {
        thread::sleep(Duration::from_millis(config.delay_ms));
    }

    let first_line = head.lines().next().unwrap_or("");
    let parts: Vec<&str> = first_line.split_whitespace().collect();
    if parts.len() < 2 {
        send_response(&mut stream, 400, r#"{"detail": "Invalid request"}"#);
        return;
    }

    let method = parts[0].to_string();
    let (path, query) = match parts[1].split_once('?') {
        Some((p, q)) => (p.to_string(), Some(q.to_string())),
        None => (parts[1].to_string(), None),
    };

    let request = RecordedRequest {
        method: method.clone(),
        path: path.clone(),
        query,
        authorization: header(&head, "authorization"),
        content_type: header(&head, "content-type"),
        body: String::from_utf8_lossy(&body).to_string(),
    };
    if let Ok(mut recorded) = log.lock() {
        recorded.push(request.clone());
    }

    let (status, response) = route(&method, &path, &request, config);
    send_response(&mut stream, status, &response.to_string());
}

fn route(
    method: &str,
    path: &str,
    request: &RecordedRequest,
    config: &MockConfig,
) -> (u16, serde_json::Value) {
    let body: serde_json::Value = serde_json::from_str(&request.body).unwrap_or_default();

    // Public routes
    match (method, path) {
        ("POST", "/auth/login") => {
            return if body["password"] == VALID_PASSWORD {
                (200, json!({"access_token": VALID_TOKEN, "token_type": "bearer"}))
            } else {
                (401, json!({"detail": "Invalid email or password"}))
            };
        }
        ("POST", "/auth/signup") => {
            return if body["email"] == TAKEN_EMAIL {
                (400, json!({"detail": "Email already registered"}))
            } else {
                (200, json!({"access_token": VALID_TOKEN, "token_type": "bearer"}))
            };
        }
        ("POST", "/auth/google") => {
            return if body["token"].as_str().is_some_and(|t| !t.is_empty()) {
                (200, json!({"access_token": VALID_TOKEN, "token_type": "bearer"}))
            } else {
                (400, json!({"detail": "Invalid Google token"}))
            };
        }
        _ => {}
    }

    let authorized = request
        .authorization
        .as_deref()
        .and_then(|a| a.strip_prefix("Bearer "))
        .is_some_and(|t| t.starts_with("good_"));
    if config.fail_auth || !authorized {
        return (401, json!({"detail": "Could not validate credentials"}));
    }

    match (method, path) {
        ("GET", "/auth/me") => (
            200,
            json!({"id": 1, "name": "Asha", "email": "asha@example.com"}),
        ),
        ("GET", "/expenses/") => (200, mock_expenses()),
        ("POST", "/statements/upload") => {
            (200, json!({"uploaded": 1, "existing": 0, "new_added": 1}))
        }
        ("POST", "/reimbursements/") => {
            if let Some(detail) = &config.reject_reimbursements {
                return (400, json!({ "detail": detail }));
            }
            (
                200,
                json!({
                    "id": 7,
                    "date": "2024-05-01T12:00:00",
                    "amount": 750.0,
                    "note": body["note"],
                    "created_at": "2024-05-01T12:00:00"
                }),
            )
        }
        ("GET", "/reimbursements/") => (
            200,
            json!([{
                "id": 7,
                "date": "2024-05-01T12:00:00",
                "amount": 750.0,
                "note": "March travel",
                "created_at": "2024-05-01T12:00:00"
            }]),
        ),
        ("GET", p) if p.starts_with("/reimbursements/") && p.ends_with("/items") => (
            200,
            json!([{
                "id": 1,
                "date": "2024-03-02T00:00:00",
                "description": "SWIGGY BANGALORE",
                "amount": 450.0,
                "applied": 450.0,
                "source": "hdfc_march.csv"
            }]),
        ),
        ("GET", "/summary/") => (
            200,
            json!({
                "total_spent": 2850.0,
                "total_reimbursed": 1600.0,
                "total_pending": 1250.0,
                "last_reimbursement_date": "2024-05-01T12:00:00",
                "expenses_covered_last_time": []
            }),
        ),
        _ => (404, json!({"detail": "Not Found"})),
    }
}

fn mock_expenses() -> serde_json::Value {
    json!([
        {"id": 1, "date": "2024-03-02T00:00:00", "description": "SWIGGY BANGALORE", "amount": 450.0,
         "source": "hdfc_march.csv", "status": "PENDING", "reimbursed_amount": 0.0,
         "transaction_hash": "h1", "created_at": "2024-04-01T09:00:00"},
        {"id": 2, "date": "2024-03-05T00:00:00", "description": "UBER TRIP 8841", "amount": 300.0,
         "source": "hdfc_march.csv", "status": "PENDING", "reimbursed_amount": 0.0,
         "transaction_hash": "h2", "created_at": "2024-04-01T09:00:00"},
        {"id": 3, "date": "2024-03-06T00:00:00", "description": "REFUND AMAZON", "amount": -200.0,
         "source": "hdfc_march.csv", "status": "PENDING", "reimbursed_amount": 0.0,
         "transaction_hash": "h3", "created_at": "2024-04-01T09:00:00"},
        {"id": 4, "date": "2024-03-10T00:00:00", "description": "AMAZON PAY INDIA", "amount": 1200.0,
         "source": "hdfc_march.csv", "status": "REIMBURSED", "reimbursed_amount": 1200.0,
         "transaction_hash": "h4", "created_at": "2024-04-01T09:00:00"},
        {"id": 5, "date": "2024-03-18T00:00:00", "description": "APOLLO PHARMACY", "amount": 900.0,
         "source": "hdfc_march.csv", "status": "PARTIAL", "reimbursed_amount": 400.0,
         "transaction_hash": "h5", "created_at": "2024-04-01T09:00:00"}
    ])
}

fn send_response(stream: &mut TcpStream, status: u16, body: &str) {
    let status_text = match status {
        200 => "OK",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        _ => "Error",
    };
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        status_text,
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_lookup_is_case_insensitive() {
        let head = "GET /auth/me HTTP/1.1\r\nAuthorization: Bearer good_x\r\nHost: a\r\n\r\n";
        assert_eq!(header(head, "authorization").as_deref(), Some("Bearer good_x"));
        assert_eq!(header(head, "content-type"), None);
    }

    #[test]
    fn test_unauthenticated_routes_rejected() {
        let request = RecordedRequest {
            method: "GET".into(),
            path: "/summary/".into(),
            query: None,
            authorization: Some("Bearer bad_token".into()),
            content_type: None,
            body: String::new(),
        };
        let (status, body) = route("GET", "/summary/", &request, &MockConfig::default());
        assert_eq!(status, 401);
        assert_eq!(body["detail"], "Could not validate credentials");
    }
}
