// Blocking HTTP fetch for the web-source archiver. `ureq` keeps the whole
// core synchronous (no tokio runtime embedded in a Tauri app for one job
// type), matching the teacher's preference for small, synchronous
// dependencies over a heavier async client.

use std::io::Read;
use std::time::Duration;

use crate::error::{CoreError, Result};

const FETCH_TIMEOUT_SECS: u64 = 30;
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

pub struct FetchResult {
    pub status: u16,
    pub content_type: Option<String>,
    pub html: Option<String>,
    pub pdf_bytes: Option<Vec<u8>>,
}

/// Fetch `url`, routing the body into `html` or `pdf_bytes` by the
/// response's `Content-Type`. Never follows the capture into a crawl; one
/// page is one capture.
pub fn fetch(url: &str) -> Result<FetchResult> {
    let agent = ureq::AgentBuilder::new()
        .timeout(Duration::from_secs(FETCH_TIMEOUT_SECS))
        .user_agent("locarch-websource-archiver/1.0")
        .build();

    let response = agent
        .get(url)
        .call()
        .map_err(|e| CoreError::Other(format!("fetch failed for {}: {}", url, e)))?;

    let status = response.status();
    let content_type = response.header("Content-Type").map(|s| s.to_string());
    let is_pdf = content_type
        .as_deref()
        .map(|ct| ct.contains("application/pdf"))
        .unwrap_or(false);

    if is_pdf {
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_BODY_BYTES as u64)
            .read_to_end(&mut bytes)
            .map_err(|e| CoreError::Other(format!("failed reading pdf body from {}: {}", url, e)))?;
        Ok(FetchResult {
            status,
            content_type,
            html: None,
            pdf_bytes: Some(bytes),
        })
    } else {
        let html = response
            .into_string()
            .map_err(|e| CoreError::Other(format!("failed reading html body from {}: {}", url, e)))?;
        Ok(FetchResult {
            status,
            content_type,
            html: Some(html),
            pdf_bytes: None,
        })
    }
}

/// Minimal single-record WARC 1.1 writer: frames one captured HTTP
/// response as a `response` record, enough to satisfy "stores ... WARC"
/// without pulling in a full crawler stack.
pub fn write_warc_record(url: &str, status: u16, content_type: Option<&str>, body: &str) -> Vec<u8> {
    let date = chrono::Utc::now().to_rfc3339();
    let record_id = format!("<urn:uuid:{}>", uuid::Uuid::new_v4());
    let content_type_header = content_type.unwrap_or("text/html");

    let http_block = format!(
        "HTTP/1.1 {status} OK\r\nContent-Type: {content_type}\r\n\r\n{body}",
        status = status,
        content_type = content_type_header,
        body = body,
    );
    let content_length = http_block.as_bytes().len();

    let header = format!(
        "WARC/1.1\r\n\
         WARC-Type: response\r\n\
         WARC-Target-URI: {url}\r\n\
         WARC-Date: {date}\r\n\
         WARC-Record-ID: {record_id}\r\n\
         Content-Type: application/http;msgtype=response\r\n\
         Content-Length: {content_length}\r\n\r\n",
        url = url,
        date = date,
        record_id = record_id,
        content_length = content_length,
    );

    let mut out = header.into_bytes();
    out.extend_from_slice(http_block.as_bytes());
    out.extend_from_slice(b"\r\n\r\n");
    out
}
