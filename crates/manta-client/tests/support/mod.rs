//! Minimal scripted HTTP/1.1 stub server for transport-level tests
//!
//! Each scripted action services exactly one connection: either parse the
//! request and write the scripted response, or close the socket without
//! answering (which clients observe as a reset). Responses always carry
//! `Connection: close`, so every request arrives on a fresh connection
//! and accepted connections count attempts one-to-one.

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::thread::JoinHandle;

#[derive(Debug, Clone)]
pub struct StubResponse {
    pub status: u16,
    pub reason: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl StubResponse {
    pub fn new(status: u16, reason: &'static str) -> Self {
        Self {
            status,
            reason,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn json(self, body: &str) -> Self {
        self.header("Content-Type", "application/json")
            .body(body.as_bytes().to_vec())
    }
}

#[derive(Debug, Clone)]
pub enum Action {
    /// Answer the request with the given response.
    Respond(StubResponse),
    /// Accept and immediately close the connection.
    Reset,
}

/// One parsed request as seen on the wire.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub target: String,
    pub headers: BTreeMap<String, String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

pub struct StubServer {
    addr: SocketAddr,
    handle: JoinHandle<Vec<Option<RecordedRequest>>>,
}

impl StubServer {
    /// Serve the scripted actions, one connection each.
    pub fn start(script: Vec<Action>) -> StubServer {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub server");
        let addr = listener.local_addr().expect("stub server addr");

        let handle = std::thread::spawn(move || {
            let mut recorded = Vec::with_capacity(script.len());
            for action in script {
                let (mut socket, _) = listener.accept().expect("accept");
                match action {
                    Action::Reset => {
                        // close without reading or answering
                        drop(socket);
                        recorded.push(None);
                    }
                    Action::Respond(response) => {
                        let request = read_request(&mut socket);
                        write_response(&mut socket, &response);
                        recorded.push(Some(request));
                    }
                }
            }
            recorded
        });

        StubServer { addr, handle }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Join the server thread; connections recorded in script order.
    /// `None` marks a reset connection.
    pub fn finish(self) -> Vec<Option<RecordedRequest>> {
        self.handle.join().expect("stub server thread")
    }

    /// As `finish`, keeping only the parsed requests.
    pub fn requests(self) -> Vec<RecordedRequest> {
        self.finish().into_iter().flatten().collect()
    }
}

fn read_request(socket: &mut TcpStream) -> RecordedRequest {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = find_header_end(&buf) {
            break pos;
        }
        let n = socket.read(&mut chunk).expect("read request");
        assert!(n > 0, "connection closed before request head completed");
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().expect("request line");
    let mut parts = request_line.split(' ');
    let method = parts.next().unwrap_or("").to_string();
    let target = parts.next().unwrap_or("").to_string();

    let mut headers = BTreeMap::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let mut body = buf[header_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).expect("read body");
        assert!(n > 0, "connection closed before request body completed");
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(content_length);

    RecordedRequest {
        method,
        target,
        headers,
        body,
    }
}

fn find_header_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn write_response(socket: &mut TcpStream, response: &StubResponse) {
    let mut head = format!("HTTP/1.1 {} {}\r\n", response.status, response.reason);
    for (name, value) in &response.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str(&format!("Content-Length: {}\r\n", response.body.len()));
    head.push_str("Connection: close\r\n\r\n");

    socket.write_all(head.as_bytes()).expect("write head");
    socket.write_all(&response.body).expect("write body");
    socket.flush().expect("flush response");
}
