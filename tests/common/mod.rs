//! Shared helpers for integration tests: a one-shot mock HTTP server, a
//! reference multipart decoder and a recording observer.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use file_push::{ProgressState, ResponseStrategy, SourceInfo, TransferObserver, Url};

/// What the mock server answers with.
pub enum Reply {
    /// Status and body, with or without a `Content-Length` header.
    Full {
        status: u16,
        body: Vec<u8>,
        content_length: bool,
    },
    /// Announces `declared` bytes but closes after sending `body`.
    Truncated {
        status: u16,
        declared: usize,
        body: Vec<u8>,
    },
    /// Reads the request, then sits on the connection without answering.
    Stall(Duration),
}

impl Reply {
    pub fn with_length(status: u16, body: &[u8]) -> Self {
        Reply::Full {
            status,
            body: body.to_vec(),
            content_length: true,
        }
    }

    pub fn without_length(status: u16, body: &[u8]) -> Self {
        Reply::Full {
            status,
            body: body.to_vec(),
            content_length: false,
        }
    }
}

/// Request as seen by the mock server.
#[derive(Debug)]
pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

pub struct MockServer {
    pub url: String,
    handle: JoinHandle<Option<CapturedRequest>>,
}

impl MockServer {
    /// Wait for the single exchange to finish and return what was received.
    pub fn captured(self) -> CapturedRequest {
        self.handle
            .join()
            .expect("mock server thread panicked")
            .expect("mock server received no request")
    }
}

/// Starts a mock HTTP server that accepts one connection and answers it
/// with `reply`.
pub fn serve_once(reply: Reply) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let url = format!("http://127.0.0.1:{port}/upload");

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().ok()?;
        let captured = read_request(&stream)?;
        answer(stream, reply);
        Some(captured)
    });

    MockServer { url, handle }
}

/// URL of a port nothing listens on.
pub fn unreachable_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/upload")
}

fn read_request(stream: &TcpStream) -> Option<CapturedRequest> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).ok()?;

    let mut headers = Vec::new();
    loop {
        let mut line = String::new();
        reader.read_line(&mut line).ok()?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':')?;
        headers.push((name.trim().to_string(), value.trim().to_string()));
    }

    let length = headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut body = vec![0u8; length];
    reader.read_exact(&mut body).ok()?;

    Some(CapturedRequest {
        request_line: request_line.trim_end().to_string(),
        headers,
        body,
    })
}

fn answer(mut stream: TcpStream, reply: Reply) {
    match reply {
        Reply::Full {
            status,
            body,
            content_length,
        } => {
            let mut head = format!("HTTP/1.1 {status} Mock\r\nConnection: close\r\n");
            if content_length {
                head.push_str(&format!("Content-Length: {}\r\n", body.len()));
            }
            head.push_str("\r\n");
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
        }
        Reply::Truncated {
            status,
            declared,
            body,
        } => {
            let head = format!(
                "HTTP/1.1 {status} Mock\r\nConnection: close\r\nContent-Length: {declared}\r\n\r\n"
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
        }
        Reply::Stall(wait) => {
            thread::sleep(wait);
        }
    }
    let _ = stream.flush();
    let _ = stream.shutdown(std::net::Shutdown::Write);
}

/// A decoded single-part multipart/form-data body.
#[derive(Debug)]
pub struct FilePart {
    pub name: String,
    pub filename: String,
    pub content: Vec<u8>,
}

/// Reference decoder for a body holding exactly one part.
pub fn decode_single_part(content_type: &str, body: &[u8]) -> FilePart {
    let boundary = content_type
        .strip_prefix("multipart/form-data; boundary=")
        .expect("not a multipart content type");
    let opening = format!("--{boundary}\r\n");
    let closing = format!("\r\n--{boundary}--\r\n");

    assert!(body.starts_with(opening.as_bytes()), "missing opening delimiter");
    assert!(body.ends_with(closing.as_bytes()), "missing closing delimiter");
    let inner = &body[opening.len()..body.len() - closing.len()];

    let header_end = inner
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("part headers not terminated");
    let headers = std::str::from_utf8(&inner[..header_end]).unwrap();
    let content = inner[header_end + 4..].to_vec();

    let disposition = headers
        .split("\r\n")
        .find_map(|l| l.strip_prefix("Content-Disposition: "))
        .expect("missing Content-Disposition");

    FilePart {
        name: quoted_param(disposition, "name").unwrap(),
        filename: quoted_param(disposition, "filename").unwrap(),
        content,
    }
}

fn quoted_param(disposition: &str, key: &str) -> Option<String> {
    let marker = format!("; {key}=\"");
    let start = disposition.find(&marker)? + marker.len();
    let mut out = String::new();
    let mut chars = disposition[start..].chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => out.push(chars.next()?),
            '"' => return Some(out),
            other => out.push(other),
        }
    }
    None
}

/// Everything the pipeline reported, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Opened(SourceInfo),
    Upload(ProgressState),
    UploadFinished(u64),
    Sending(String),
    Receiving(u16, ResponseStrategy),
    Download(ProgressState),
    DownloadFinished(u64),
}

#[derive(Debug, Default)]
pub struct Recorder {
    pub events: Vec<Event>,
}

impl Recorder {
    pub fn uploads(&self) -> Vec<ProgressState> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Upload(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn downloads(&self) -> Vec<ProgressState> {
        self.events
            .iter()
            .filter_map(|e| match e {
                Event::Download(s) => Some(*s),
                _ => None,
            })
            .collect()
    }

    pub fn strategy(&self) -> Option<ResponseStrategy> {
        self.events.iter().find_map(|e| match e {
            Event::Receiving(_, s) => Some(*s),
            _ => None,
        })
    }
}

impl TransferObserver for Recorder {
    fn source_opened(&mut self, source: &SourceInfo) {
        self.events.push(Event::Opened(source.clone()));
    }

    fn upload_progress(&mut self, state: &ProgressState) {
        self.events.push(Event::Upload(*state));
    }

    fn upload_finished(&mut self, bytes: u64) {
        self.events.push(Event::UploadFinished(bytes));
    }

    fn sending(&mut self, url: &Url, _body_len: u64) {
        self.events.push(Event::Sending(url.to_string()));
    }

    fn receiving(&mut self, status: u16, strategy: ResponseStrategy) {
        self.events.push(Event::Receiving(status, strategy));
    }

    fn download_progress(&mut self, state: &ProgressState) {
        self.events.push(Event::Download(*state));
    }

    fn download_finished(&mut self, bytes: u64) {
        self.events.push(Event::DownloadFinished(bytes));
    }
}
