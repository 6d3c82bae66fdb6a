//! In-memory request log storage

use chrono::{DateTime, Utc};
use http::header::{CONTENT_LENGTH, HOST, TRAILER, TRANSFER_ENCODING};
use http::request::Parts;
use http::{HeaderMap, Version};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::collections::BTreeMap;
use std::net::SocketAddr;
use tokio::sync::RwLock;

/// Name → ordered values, the shape of headers, form fields and trailers in
/// the detail document
pub type ValueMap = BTreeMap<String, Vec<String>>;

/// Snapshot of one recorded request.
///
/// Serializes to the detail document; the key names and their order are part
/// of the viewer's output format (`Method`, `URL`, `Proto`, ...). The capture
/// timestamp appears in the listing title only, never in the document.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RecordedRequest {
    pub method: String,
    #[serde(rename = "URL")]
    pub url: String,
    pub proto: String,
    pub proto_major: u16,
    pub proto_minor: u16,
    pub header: ValueMap,
    pub content_length: i64,
    pub host: String,
    pub form: Option<ValueMap>,
    pub post_form: Option<ValueMap>,
    pub trailer: Option<ValueMap>,
    pub remote_addr: String,
    #[serde(rename = "RequestURI")]
    pub request_uri: String,
    #[serde(skip)]
    pub timestamp: DateTime<Utc>,
}

impl RecordedRequest {
    /// Snapshot the head of an inbound request together with its peer address.
    ///
    /// The body is never read: the content length comes from the headers,
    /// trailers are the announced names only, and form/post-form stay
    /// unpopulated because nothing in the serving path parses request bodies.
    pub fn capture(parts: &Parts, remote_addr: SocketAddr) -> Self {
        let (proto, proto_major, proto_minor) = proto_fields(parts.version);

        Self {
            method: parts.method.to_string(),
            url: parts.uri.to_string(),
            proto: proto.to_string(),
            proto_major,
            proto_minor,
            header: header_map(&parts.headers),
            content_length: content_length(&parts.headers),
            host: host_of(parts),
            form: None,
            post_form: None,
            trailer: announced_trailers(&parts.headers),
            remote_addr: remote_addr.to_string(),
            request_uri: parts.uri.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// One-line listing title: timestamp, method, protocol, peer address
    pub fn title(&self) -> String {
        format!(
            "{} {} {} {}",
            self.timestamp, self.method, self.proto, self.remote_addr
        )
    }

    /// The record as a JSON document indented with four spaces.
    ///
    /// `&`, `<` and `>` inside string values come out as `\uXXXX` escapes;
    /// the document never carries raw markup and embeds into HTML unmodified.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        let mut buf = Vec::new();
        let mut ser =
            serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut ser)?;
        Ok(escape_markup(&String::from_utf8_lossy(&buf)))
    }
}

/// Protocol string and split version for the request line
fn proto_fields(version: Version) -> (&'static str, u16, u16) {
    match version {
        v if v == Version::HTTP_09 => ("HTTP/0.9", 0, 9),
        v if v == Version::HTTP_10 => ("HTTP/1.0", 1, 0),
        v if v == Version::HTTP_2 => ("HTTP/2.0", 2, 0),
        v if v == Version::HTTP_3 => ("HTTP/3.0", 3, 0),
        _ => ("HTTP/1.1", 1, 1),
    }
}

/// Collect every request header as name → ordered values. Values that are
/// not UTF-8 are kept lossily rather than dropped.
fn header_map(headers: &HeaderMap) -> ValueMap {
    let mut map = ValueMap::new();
    for (name, value) in headers {
        map.entry(name.as_str().to_string())
            .or_default()
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    map
}

/// Content length of the request: the Content-Length header when present and
/// valid, -1 when the length is unknown (chunked transfer encoding), 0
/// otherwise
fn content_length(headers: &HeaderMap) -> i64 {
    if let Some(len) = headers
        .get(CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
    {
        return len;
    }

    if is_chunked(headers) {
        -1
    } else {
        0
    }
}

fn is_chunked(headers: &HeaderMap) -> bool {
    headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.to_ascii_lowercase().contains("chunked"))
}

/// Host the request was addressed to: the URI authority when the request
/// target carries one, else the Host header
fn host_of(parts: &Parts) -> String {
    if let Some(authority) = parts.uri.authority() {
        return authority.to_string();
    }

    parts
        .headers
        .get(HOST)
        .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
        .unwrap_or_default()
}

/// Trailer names announced via the Trailer header. Values stay empty: the
/// body, and with it any actual trailer values, is never read.
fn announced_trailers(headers: &HeaderMap) -> Option<ValueMap> {
    let mut names = ValueMap::new();
    for value in headers.get_all(TRAILER) {
        let Ok(value) = value.to_str() else { continue };
        for name in value.split(',') {
            let name = name.trim();
            if !name.is_empty() {
                names.insert(name.to_string(), Vec::new());
            }
        }
    }

    if names.is_empty() {
        None
    } else {
        Some(names)
    }
}

/// Escape `&`, `<` and `>` as `\uXXXX` sequences. JSON syntax keeps these
/// characters inside string values only, so the pass covers the whole
/// document.
fn escape_markup(json: &str) -> String {
    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        match c {
            '&' => out.push_str("\\u0026"),
            '<' => out.push_str("\\u003c"),
            '>' => out.push_str("\\u003e"),
            _ => out.push(c),
        }
    }
    out
}

/// Append-only store of recorded requests, shared by every handler task.
///
/// A record's identity is its position: index `i` is the `i`-th request
/// recorded, in arrival order. Entries are never evicted or reordered. The
/// lock makes concurrent appends and reads memory-safe; nothing stronger is
/// promised - a listing racing an append may or may not observe it.
pub struct RequestStore {
    records: RwLock<Vec<RecordedRequest>>,
}

impl RequestStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
        }
    }

    /// Append one record; infallible, bounded only by memory
    pub async fn append(&self, record: RecordedRequest) {
        self.records.write().await.push(record);
    }

    /// Look up a record by listing index; negative and past-the-end indices
    /// are None
    pub async fn get(&self, id: i64) -> Option<RecordedRequest> {
        let index = usize::try_from(id).ok()?;
        self.records.read().await.get(index).cloned()
    }

    /// Snapshot of all records in arrival order
    pub async fn all(&self) -> Vec<RecordedRequest> {
        self.records.read().await.clone()
    }

    /// Number of records currently stored
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }
}

impl Default for RequestStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sample_parts(method: &str, uri: &str) -> Parts {
        let (parts, _) = http::Request::builder()
            .method(method)
            .uri(uri)
            .header("host", "localhost:8080")
            .header("accept", "*/*")
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:54321".parse().unwrap()
    }

    #[test]
    fn test_capture_request_head() {
        let parts = sample_parts("POST", "/submit?kind=test");
        let record = RecordedRequest::capture(&parts, peer());

        assert_eq!(record.method, "POST");
        assert_eq!(record.url, "/submit?kind=test");
        assert_eq!(record.request_uri, "/submit?kind=test");
        assert_eq!(record.proto, "HTTP/1.1");
        assert_eq!(record.proto_major, 1);
        assert_eq!(record.proto_minor, 1);
        assert_eq!(record.host, "localhost:8080");
        assert_eq!(record.remote_addr, "127.0.0.1:54321");
        assert_eq!(record.header["accept"], vec!["*/*"]);
        assert!(record.form.is_none());
        assert!(record.post_form.is_none());
        assert!(record.trailer.is_none());
    }

    #[test]
    fn test_capture_protocol_versions() {
        let (parts, _) = http::Request::builder()
            .uri("/")
            .version(Version::HTTP_10)
            .body(())
            .unwrap()
            .into_parts();
        let record = RecordedRequest::capture(&parts, peer());
        assert_eq!(record.proto, "HTTP/1.0");
        assert_eq!((record.proto_major, record.proto_minor), (1, 0));

        let (parts, _) = http::Request::builder()
            .uri("/")
            .version(Version::HTTP_2)
            .body(())
            .unwrap()
            .into_parts();
        let record = RecordedRequest::capture(&parts, peer());
        assert_eq!(record.proto, "HTTP/2.0");
        assert_eq!((record.proto_major, record.proto_minor), (2, 0));
    }

    #[test]
    fn test_content_length_fallbacks() {
        let (parts, _) = http::Request::builder()
            .uri("/")
            .header("content-length", "42")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(RecordedRequest::capture(&parts, peer()).content_length, 42);

        let (parts, _) = http::Request::builder()
            .uri("/")
            .header("transfer-encoding", "chunked")
            .body(())
            .unwrap()
            .into_parts();
        assert_eq!(RecordedRequest::capture(&parts, peer()).content_length, -1);

        let (parts, _) = http::Request::builder().uri("/").body(()).unwrap().into_parts();
        assert_eq!(RecordedRequest::capture(&parts, peer()).content_length, 0);
    }

    #[test]
    fn test_capture_announced_trailers() {
        let (parts, _) = http::Request::builder()
            .uri("/")
            .header("transfer-encoding", "chunked")
            .header("trailer", "Expires, X-Checksum")
            .body(())
            .unwrap()
            .into_parts();
        let record = RecordedRequest::capture(&parts, peer());

        let trailer = record.trailer.expect("announced trailers");
        assert!(trailer.contains_key("Expires"));
        assert!(trailer.contains_key("X-Checksum"));
        assert!(trailer["Expires"].is_empty());
    }

    #[test]
    fn test_repeated_headers_keep_every_value() {
        let (parts, _) = http::Request::builder()
            .uri("/")
            .header("x-tag", "one")
            .header("x-tag", "two")
            .body(())
            .unwrap()
            .into_parts();
        let record = RecordedRequest::capture(&parts, peer());
        assert_eq!(record.header["x-tag"], vec!["one", "two"]);
    }

    #[test]
    fn test_title_layout() {
        let parts = sample_parts("PUT", "/things");
        let record = RecordedRequest::capture(&parts, peer());

        let title = record.title();
        assert!(title.ends_with("PUT HTTP/1.1 127.0.0.1:54321"));
        assert!(title.starts_with(&record.timestamp.to_string()));
    }

    #[test]
    fn test_detail_document_layout() {
        let parts = sample_parts("POST", "/submit");
        let record = RecordedRequest::capture(&parts, peer());

        let json = record.to_pretty_json().unwrap();
        assert!(json.starts_with("{\n    \"Method\": \"POST\""));
        assert!(json.contains("\"URL\": \"/submit\""));
        assert!(json.contains("\"RequestURI\": \"/submit\""));
        assert!(json.contains("\"ProtoMajor\": 1"));
        assert!(json.contains("\"Form\": null"));
        assert!(json.contains("\"PostForm\": null"));
        assert!(json.contains("\"Trailer\": null"));
        // The capture timestamp is not part of the document
        assert!(!json.contains("Timestamp"));
    }

    #[test]
    fn test_detail_document_escapes_markup() {
        let (parts, _) = http::Request::builder()
            .method("POST")
            .uri("/submit?a=1&b=2")
            .header("x-note", "</pre><script>alert(1)</script>")
            .body(())
            .unwrap()
            .into_parts();
        let record = RecordedRequest::capture(&parts, peer());

        let json = record.to_pretty_json().unwrap();
        assert!(json.contains(r"/submit?a=1&b=2"));
        assert!(json.contains(r"</pre><script>alert(1)</script>"));
        assert!(!json.contains('&'));
        assert!(!json.contains('<'));
        assert!(!json.contains('>'));
    }

    #[tokio::test]
    async fn test_append_preserves_arrival_order() {
        let store = RequestStore::new();
        for path in ["/first", "/second", "/third"] {
            let parts = sample_parts("POST", path);
            store.append(RecordedRequest::capture(&parts, peer())).await;
        }

        let all = store.all().await;
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].url, "/first");
        assert_eq!(all[1].url, "/second");
        assert_eq!(all[2].url, "/third");
        assert_eq!(store.get(1).await.unwrap().url, "/second");
    }

    #[tokio::test]
    async fn test_get_rejects_out_of_range_ids() {
        let store = RequestStore::new();
        let parts = sample_parts("POST", "/only");
        store.append(RecordedRequest::capture(&parts, peer())).await;

        assert!(store.get(0).await.is_some());
        assert!(store.get(1).await.is_none());
        assert!(store.get(-1).await.is_none());
        assert!(store.get(i64::MAX).await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_concurrent_appends_stay_consistent() {
        let store = Arc::new(RequestStore::new());

        let mut handles = Vec::new();
        for i in 0..100 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                let parts = sample_parts("POST", &format!("/job/{i}"));
                store.append(RecordedRequest::capture(&parts, peer())).await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.len().await, 100);
        let all = store.all().await;
        assert_eq!(all.len(), 100);
        // Arrival order is scheduler-dependent, but every record is intact
        assert!(all.iter().all(|r| r.method == "POST" && r.url.starts_with("/job/")));
    }
}
