#![allow(dead_code)]

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use serde_json::{json, Value};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use veritas_lib::services::{Analyzer, DetectionConfig, ImageInput, ProviderClient};

pub const SPECIALIST_PATH: &str = "AI-image-detector";
pub const REASONING_PATH: &str = ":generateContent";

#[derive(Clone)]
pub struct Route {
    pub path_contains: &'static str,
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request_line: String,
    pub head: String,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).to_string()
    }
}

/// Local HTTP responder returning canned bodies by path substring.
pub struct CannedServer {
    pub url: String,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl CannedServer {
    pub async fn start(routes: Vec<Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind test listener");
        let url = format!("http://{}", listener.local_addr().expect("local addr"));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let routes = Arc::new(routes);

        let log = Arc::clone(&requests);
        tokio::spawn(async move {
            loop {
                let (stream, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let routes = Arc::clone(&routes);
                let log = Arc::clone(&log);
                tokio::spawn(async move {
                    handle(stream, routes, log).await;
                });
            }
        });

        Self { url, requests }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path_contains: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.request_line.contains(path_contains))
            .collect()
    }

    pub fn analyzer(&self, specialist_key: Option<&str>) -> Analyzer {
        let client = ProviderClient::direct().with_endpoints(&self.url, &self.url);
        Analyzer::new(
            client,
            DetectionConfig::default(),
            Some("reasoning-test-key".to_string()),
            specialist_key.map(|k| k.to_string()),
        )
        .expect("analyzer with reasoning key")
    }
}

fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn content_length(head: &str) -> usize {
    head.lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, v)| v.trim().parse().ok())
        .unwrap_or(0)
}

fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        429 => "Too Many Requests",
        _ => "Internal Server Error",
    }
}

async fn handle(mut stream: TcpStream, routes: Arc<Vec<Route>>, log: Arc<Mutex<Vec<RecordedRequest>>>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 16 * 1024];

    let header_end = loop {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => return,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_subsequence(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let total = header_end + content_length(&head);
    while buf.len() < total {
        let n = match stream.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => n,
        };
        buf.extend_from_slice(&chunk[..n]);
    }

    let request_line = head.lines().next().unwrap_or_default().to_string();
    let body = buf[header_end..buf.len().min(total)].to_vec();
    log.lock().unwrap().push(RecordedRequest {
        request_line: request_line.clone(),
        head,
        body,
    });

    let (status, body) = routes
        .iter()
        .find(|r| request_line.contains(r.path_contains))
        .map(|r| (r.status, r.body.clone()))
        .unwrap_or((404, "{}".to_string()));

    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason_phrase(status),
        body.len(),
        body
    );
    let _ = stream.write_all(response.as_bytes()).await;
    let _ = stream.shutdown().await;
}

pub fn specialist_route(status: u16, body: Value) -> Route {
    Route {
        path_contains: SPECIALIST_PATH,
        status,
        body: body.to_string(),
    }
}

/// Wrap a judgment the way `generateContent` returns structured output.
pub fn reasoning_route(judgment: Value) -> Route {
    reasoning_text_route(&judgment.to_string())
}

pub fn reasoning_text_route(text: &str) -> Route {
    Route {
        path_contains: REASONING_PATH,
        status: 200,
        body: json!({
            "candidates": [{ "content": { "parts": [{ "text": text }] } }]
        })
        .to_string(),
    }
}

pub fn judgment(verdict: &str, confidence: f64, ai_probability: f64) -> Value {
    json!({
        "verdict": verdict,
        "confidence": confidence,
        "aiProbability": ai_probability,
        "visualArtifacts": ["uniform bokeh", "waxy skin texture"],
        "reasoning": "Lighting is hyper-consistent across the subject.",
        "metrics": [
            { "label": "Texture", "value": 72 },
            { "label": "Lighting", "value": 64 },
            { "label": "Anatomy", "value": 30 },
            { "label": "Consistency", "value": 55 }
        ]
    })
}

/// PNG with a mild deterministic gradient so the centre patch has some variance.
pub fn png_image(width: u32, height: u32, file_name: &str) -> ImageInput {
    let img = RgbImage::from_fn(width, height, |x, y| {
        let v = (100 + (x % 4) * 3 + (y % 3) * 2) as u8;
        Rgb([v, v, v])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode png");
    ImageInput::from_bytes(out.into_inner(), file_name)
}
