//! Framework-neutral static file handler.
//!
//! [`StaticHandler`] turns a request path into a [`StaticResponse`] with
//! validators (`ETag`, `Last-Modified`) and conditional `304` handling.
//! Wiring it into an HTTP server is left to the caller.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sha2::{Digest, Sha256};

use crate::entry::Entry;
use crate::error::{AssetError, AssetResult};
use crate::local::LookupContext;
use crate::path;
use crate::source::AssetSource;

/// Default time-to-live for cached ETags.
pub const DEFAULT_ETAG_TTL: Duration = Duration::from_secs(3600);

/// Default `Cache-Control` header value.
pub const DEFAULT_CACHE_CONTROL: &str = "private, must-revalidate, max-age=300";

const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Content type for a path, by extension.
pub fn content_type(path: &str) -> Option<&'static str> {
    let (_, ext) = path::base_name(path).rsplit_once('.')?;
    let mime = match ext.to_ascii_lowercase().as_str() {
        "html" | "htm" => "text/html; charset=utf-8",
        "css" => "text/css; charset=utf-8",
        "js" | "mjs" => "application/javascript; charset=utf-8",
        "json" => "application/json; charset=utf-8",
        "txt" => "text/plain; charset=utf-8",
        "xml" => "application/xml",
        "svg" => "image/svg+xml",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "ico" => "image/x-icon",
        "webp" => "image/webp",
        "wasm" => "application/wasm",
        "pdf" => "application/pdf",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        _ => return None,
    };
    Some(mime)
}

/// Format a timestamp as an HTTP date.
pub fn http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time).format(HTTP_DATE).to_string()
}

/// Parse an HTTP date into seconds since the epoch.
fn parse_http_date(value: &str) -> Option<i64> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.timestamp())
}

fn unix_secs(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Handler settings.
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    pub etag_ttl: Duration,
    pub cache_control: String,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            etag_ttl: DEFAULT_ETAG_TTL,
            cache_control: DEFAULT_CACHE_CONTROL.to_string(),
        }
    }
}

impl HandlerConfig {
    pub fn with_etag_ttl(mut self, ttl: Duration) -> Self {
        self.etag_ttl = ttl;
        self
    }

    pub fn with_cache_control(mut self, value: impl Into<String>) -> Self {
        self.cache_control = value.into();
        self
    }
}

/// The parts of a request the handler looks at.
#[derive(Debug, Clone)]
pub struct StaticRequest {
    pub method: String,
    pub path: String,
    pub if_none_match: Option<String>,
    pub if_modified_since: Option<String>,
    pub context: LookupContext,
}

impl StaticRequest {
    pub fn new(method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            path: path.into(),
            if_none_match: None,
            if_modified_since: None,
            context: LookupContext::default(),
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new("GET", path)
    }

    pub fn with_if_none_match(mut self, value: impl Into<String>) -> Self {
        self.if_none_match = Some(value.into());
        self
    }

    pub fn with_if_modified_since(mut self, value: impl Into<String>) -> Self {
        self.if_modified_since = Some(value.into());
        self
    }

    pub fn with_context(mut self, context: LookupContext) -> Self {
        self.context = context;
        self
    }
}

/// Status, headers and body to send back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl StaticResponse {
    fn empty(status: u16) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_string(), value.into()));
        self
    }

    /// First header with this name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

struct CachedEtag {
    etag: String,
    computed_at: Instant,
}

/// Serves assets from any [`AssetSource`].
pub struct StaticHandler {
    source: Arc<dyn AssetSource>,
    config: HandlerConfig,
    etags: RwLock<HashMap<String, CachedEtag>>,
}

impl StaticHandler {
    pub fn new(source: Arc<dyn AssetSource>) -> Self {
        Self::with_config(source, HandlerConfig::default())
    }

    pub fn with_config(source: Arc<dyn AssetSource>, config: HandlerConfig) -> Self {
        Self {
            source,
            config,
            etags: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }

    /// Number of ETags currently cached, expired ones included.
    pub fn cached_etags(&self) -> usize {
        self.etags.read().len()
    }

    /// SHA-256 of the content, hex encoded.
    ///
    /// Cached per path, mtime and size; a cached value older than the
    /// configured TTL is recomputed on the next request.
    pub fn etag(&self, entry: &Entry) -> AssetResult<String> {
        let mtime = entry
            .modified()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let key = format!("{}|{}|{}", entry.path(), mtime, entry.size());

        if let Some(cached) = self.etags.read().get(&key) {
            if cached.computed_at.elapsed() < self.config.etag_ttl {
                return Ok(cached.etag.clone());
            }
        }

        tracing::debug!(path = %entry.path(), "Computing ETag");
        let mut hasher = Sha256::new();
        let mut reader = entry.reader()?;
        io::copy(&mut reader, &mut hasher).map_err(|e| {
            AssetError::io(entry.real_path().unwrap_or(std::path::Path::new(entry.path())), e)
        })?;
        let etag = format!("{:x}", hasher.finalize());

        self.etags.write().insert(
            key,
            CachedEtag {
                etag: etag.clone(),
                computed_at: Instant::now(),
            },
        );
        Ok(etag)
    }

    /// Answer one request.
    pub fn serve(&self, request: &StaticRequest) -> StaticResponse {
        let head = request.method.eq_ignore_ascii_case("HEAD");
        if !head && !request.method.eq_ignore_ascii_case("GET") {
            return StaticResponse::empty(405).with_header("Allow", "GET, HEAD");
        }

        let path = path::normalize(&request.path);
        let entry = match self.source.asset_info_in(&request.context, &path) {
            Ok(entry) if !entry.is_dir() => entry,
            Ok(_) => return StaticResponse::empty(404),
            Err(e) if e.is_not_found() => return StaticResponse::empty(404),
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Failed to resolve asset");
                return StaticResponse::empty(500);
            }
        };

        let etag = match self.etag(&entry) {
            Ok(etag) => etag,
            Err(e) => {
                tracing::warn!(path = %path, error = %e, "Failed to hash asset");
                return StaticResponse::empty(500);
            }
        };
        let quoted = format!("\"{}\"", etag);
        let last_modified = http_date(entry.modified());

        if self.not_modified(request, &etag, entry.modified()) {
            return StaticResponse::empty(304)
                .with_header("ETag", quoted)
                .with_header("Last-Modified", last_modified)
                .with_header("Cache-Control", self.config.cache_control.clone());
        }

        let body = if head {
            Vec::new()
        } else {
            match entry.data() {
                Ok(data) => data,
                Err(e) => {
                    tracing::warn!(path = %path, error = %e, "Failed to read asset");
                    return StaticResponse::empty(500);
                }
            }
        };

        let mut response = StaticResponse::empty(200);
        if let Some(mime) = content_type(&path) {
            response = response.with_header("Content-Type", mime);
        }
        response.body = body;
        response
            .with_header("Content-Length", entry.size().to_string())
            .with_header("ETag", quoted)
            .with_header("Last-Modified", last_modified)
            .with_header("Cache-Control", self.config.cache_control.clone())
    }

    /// `If-None-Match` decides when present; otherwise `If-Modified-Since`.
    fn not_modified(&self, request: &StaticRequest, etag: &str, modified: SystemTime) -> bool {
        if let Some(value) = &request.if_none_match {
            return value.split(',').any(|candidate| {
                let candidate = candidate.trim();
                let candidate = candidate.strip_prefix("W/").unwrap_or(candidate);
                candidate == "*" || candidate.trim_matches('"') == etag
            });
        }
        match request.if_modified_since.as_deref().and_then(parse_http_date) {
            Some(since) => unix_secs(modified) <= since,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::namespace::AssetFs;
    use filetime::FileTime;
    use std::fs;
    use tempfile::TempDir;

    const MTIME: i64 = 1_700_000_000;

    fn handler(ttl: Duration) -> (TempDir, StaticHandler) {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("css")).unwrap();
        let file = temp.path().join("css/site.css");
        fs::write(&file, "body{}").unwrap();
        filetime::set_file_mtime(&file, FileTime::from_unix_time(MTIME, 0)).unwrap();

        let assets = AssetFs::new();
        assets.register_path(temp.path()).unwrap();
        let config = HandlerConfig::default().with_etag_ttl(ttl);
        (temp, StaticHandler::with_config(Arc::new(assets), config))
    }

    fn sha256_hex(data: &[u8]) -> String {
        format!("{:x}", Sha256::digest(data))
    }

    #[test]
    fn test_content_type() {
        assert_eq!(content_type("a/b.CSS"), Some("text/css; charset=utf-8"));
        assert_eq!(content_type("x.wasm"), Some("application/wasm"));
        assert_eq!(content_type("README"), None);
        assert_eq!(content_type("x.unknown"), None);
    }

    #[test]
    fn test_http_date() {
        let time = UNIX_EPOCH + Duration::from_secs(784_111_777);
        assert_eq!(http_date(time), "Sun, 06 Nov 1994 08:49:37 GMT");
        assert_eq!(parse_http_date("Sun, 06 Nov 1994 08:49:37 GMT"), Some(784_111_777));
    }

    #[test]
    fn test_get_ok() {
        let (_temp, handler) = handler(DEFAULT_ETAG_TTL);
        let response = handler.serve(&StaticRequest::get("/css/site.css"));

        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"body{}");
        assert_eq!(response.header("content-type"), Some("text/css; charset=utf-8"));
        assert_eq!(response.header("Cache-Control"), Some(DEFAULT_CACHE_CONTROL));
        assert_eq!(
            response.header("ETag"),
            Some(format!("\"{}\"", sha256_hex(b"body{}")).as_str())
        );
        assert_eq!(
            response.header("Last-Modified").map(str::to_string),
            Some(http_date(UNIX_EPOCH + Duration::from_secs(MTIME as u64)))
        );
    }

    #[test]
    fn test_head_has_no_body() {
        let (_temp, handler) = handler(DEFAULT_ETAG_TTL);
        let response = handler.serve(&StaticRequest::new("HEAD", "css/site.css"));
        assert_eq!(response.status, 200);
        assert!(response.body.is_empty());
        assert_eq!(response.header("Content-Length"), Some("6"));
    }

    #[test]
    fn test_if_none_match() {
        let (_temp, handler) = handler(DEFAULT_ETAG_TTL);
        let etag = sha256_hex(b"body{}");

        let hit = StaticRequest::get("css/site.css").with_if_none_match(format!("\"{}\"", etag));
        assert_eq!(handler.serve(&hit).status, 304);

        let miss = StaticRequest::get("css/site.css").with_if_none_match("\"other\"");
        assert_eq!(handler.serve(&miss).status, 200);
    }

    #[test]
    fn test_if_modified_since() {
        let (_temp, handler) = handler(DEFAULT_ETAG_TTL);
        let same = http_date(UNIX_EPOCH + Duration::from_secs(MTIME as u64));
        let before = http_date(UNIX_EPOCH + Duration::from_secs(MTIME as u64 - 60));

        let request = StaticRequest::get("css/site.css").with_if_modified_since(same);
        assert_eq!(handler.serve(&request).status, 304);
        let request = StaticRequest::get("css/site.css").with_if_modified_since(before);
        assert_eq!(handler.serve(&request).status, 200);
    }

    #[test]
    fn test_not_found_directory_and_method() {
        let (_temp, handler) = handler(DEFAULT_ETAG_TTL);
        assert_eq!(handler.serve(&StaticRequest::get("missing.css")).status, 404);
        assert_eq!(handler.serve(&StaticRequest::get("css")).status, 404);

        let response = handler.serve(&StaticRequest::new("POST", "css/site.css"));
        assert_eq!(response.status, 405);
        assert_eq!(response.header("Allow"), Some("GET, HEAD"));
    }

    #[test]
    fn test_etag_cache_follows_content() {
        let (temp, handler) = handler(DEFAULT_ETAG_TTL);
        let first = handler.serve(&StaticRequest::get("css/site.css"));
        assert_eq!(handler.cached_etags(), 1);

        let file = temp.path().join("css/site.css");
        fs::write(&file, "body{color:red}").unwrap();
        filetime::set_file_mtime(&file, FileTime::from_unix_time(MTIME + 10, 0)).unwrap();

        let second = handler.serve(&StaticRequest::get("css/site.css"));
        assert_ne!(first.header("ETag"), second.header("ETag"));
        assert_eq!(handler.cached_etags(), 2);
    }

    #[test]
    fn test_expired_etag_is_recomputed() {
        let (temp, handler) = handler(Duration::ZERO);
        handler.serve(&StaticRequest::get("css/site.css"));

        // Same size and mtime, different bytes: only an expired entry notices.
        let file = temp.path().join("css/site.css");
        fs::write(&file, "body[]").unwrap();
        filetime::set_file_mtime(&file, FileTime::from_unix_time(MTIME, 0)).unwrap();

        let response = handler.serve(&StaticRequest::get("css/site.css"));
        assert_eq!(
            response.header("ETag"),
            Some(format!("\"{}\"", sha256_hex(b"body[]")).as_str())
        );
    }
}
