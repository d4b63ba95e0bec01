//! Minimal HTTP/1.1 file server for integration tests.
//!
//! Serves one in-memory file, honours `Range: bytes=a-b` (clamping the end to
//! EOF like real servers) and records every request. Failure modes are
//! switched on through [`Behavior`].

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone, Default)]
pub struct Behavior {
    /// Status returned for HEAD instead of 200.
    pub probe_status: Option<u16>,
    /// Leave `Content-Length` out of the HEAD response.
    pub omit_content_length: bool,
    /// Replace the HEAD `Content-Length` value.
    pub content_length_override: Option<String>,
    /// Answer ranged GETs with 200 and the whole file.
    pub ignore_range: bool,
    /// Close the connection without answering the GET whose range starts here.
    pub drop_range_start: Option<u64>,
    /// Send only half the body of the GET whose range starts here.
    pub truncate_range_start: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub range: Option<String>,
    pub user_agent: Option<String>,
}

pub struct TestServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: JoinHandle<()>,
}

impl TestServer {
    pub async fn start(data: Vec<u8>, behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let data = Arc::new(data);
        let behavior = Arc::new(behavior);

        let handle = tokio::spawn({
            let requests = Arc::clone(&requests);
            async move {
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        break;
                    };
                    let data = Arc::clone(&data);
                    let behavior = Arc::clone(&behavior);
                    let requests = Arc::clone(&requests);
                    tokio::spawn(async move {
                        let _ = serve(stream, &data, &behavior, &requests).await;
                    });
                }
            }
        });

        Self {
            addr,
            requests,
            handle,
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}/files/payload.bin", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn ranges(&self) -> Vec<String> {
        let mut ranges: Vec<String> = self
            .requests()
            .into_iter()
            .filter(|r| r.method == "GET")
            .filter_map(|r| r.range)
            .collect();
        ranges.sort_by_key(|r| range_start(r));
        ranges
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests().iter().filter(|r| r.method == method).count()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn sample_file(len: usize) -> Vec<u8> {
    (0..len).map(|i| ((i * 131 + 7) % 256) as u8).collect()
}

fn range_start(header: &str) -> u64 {
    parse_range(header).map(|(start, _)| start).unwrap_or(u64::MAX)
}

fn parse_range(header: &str) -> Option<(u64, u64)> {
    let spec = header.strip_prefix("bytes=")?;
    let (start, end) = spec.split_once('-')?;
    Some((start.trim().parse().ok()?, end.trim().parse().ok()?))
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        206 => "Partial Content",
        404 => "Not Found",
        416 => "Range Not Satisfiable",
        500 => "Internal Server Error",
        _ => "Status",
    }
}

async fn serve(
    stream: TcpStream,
    data: &[u8],
    behavior: &Behavior,
    requests: &Mutex<Vec<RecordedRequest>>,
) -> std::io::Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);

    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;
    let method = request_line
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .to_string();

    let mut range = None;
    let mut user_agent = None;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            break;
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            match name.trim().to_ascii_lowercase().as_str() {
                "range" => range = Some(value.trim().to_string()),
                "user-agent" => user_agent = Some(value.trim().to_string()),
                _ => {}
            }
        }
    }
    requests.lock().unwrap().push(RecordedRequest {
        method: method.clone(),
        range: range.clone(),
        user_agent,
    });

    let total = data.len() as u64;
    if method == "HEAD" {
        let status = behavior.probe_status.unwrap_or(200);
        let mut head = format!("HTTP/1.1 {} {}\r\nConnection: close\r\n", status, reason(status));
        if !behavior.omit_content_length {
            let value = behavior
                .content_length_override
                .clone()
                .unwrap_or_else(|| total.to_string());
            head.push_str(&format!("Content-Length: {value}\r\n"));
        }
        head.push_str("Accept-Ranges: bytes\r\n\r\n");
        writer.write_all(head.as_bytes()).await?;
        return writer.shutdown().await;
    }

    let parsed = range.as_deref().and_then(parse_range);
    if behavior.ignore_range || parsed.is_none() {
        let head = format!(
            "HTTP/1.1 200 OK\r\nConnection: close\r\nContent-Length: {total}\r\n\r\n"
        );
        writer.write_all(head.as_bytes()).await?;
        writer.write_all(data).await?;
        return writer.shutdown().await;
    }

    let (start, end) = parsed.unwrap_or_default();
    if Some(start) == behavior.drop_range_start {
        return Ok(());
    }
    if start >= total || end < start {
        let head = format!(
            "HTTP/1.1 416 {}\r\nConnection: close\r\nContent-Range: bytes */{total}\r\nContent-Length: 0\r\n\r\n",
            reason(416)
        );
        writer.write_all(head.as_bytes()).await?;
        return writer.shutdown().await;
    }

    let end = end.min(total - 1);
    let body = &data[start as usize..=end as usize];
    let head = format!(
        "HTTP/1.1 206 {}\r\nConnection: close\r\nContent-Range: bytes {start}-{end}/{total}\r\nContent-Length: {}\r\n\r\n",
        reason(206),
        body.len()
    );
    writer.write_all(head.as_bytes()).await?;
    if Some(start) == behavior.truncate_range_start {
        writer.write_all(&body[..body.len() / 2]).await?;
        return writer.shutdown().await;
    }
    writer.write_all(body).await?;
    writer.shutdown().await
}
