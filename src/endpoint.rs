//! HTTP surface of the server extraction path.
//!
//! One route: `POST /split`. The request body is the raw image; the query
//! string selects the layout and encoding:
//!
//! | Parameter | Meaning |
//! |---|---|
//! | `rows`, `columns` | Uniform grid (server fallback sizing) |
//! | `cells` | Explicit rectangles, `x,y,w,h;x,y,w,h;...` |
//! | `format` | `png` (default), `jpeg`/`jpg`, `webp` |
//! | `quality` | JPEG quality 1-100 |
//! | `strict` | `true` rejects zero-area cells |
//! | `filename` | Download name |
//!
//! Success is `200` with the ZIP archive. Failures carry a JSON body
//! `{"reason": ..., "message": ...}` and never a partial archive.
//!
//! The listener hands each connection to its own thread; extraction inside a
//! request runs on the rayon pool.

use crate::archive::ARCHIVE_CONTENT_TYPE;
use crate::config::SplitConfig;
use crate::imaging::{Encoding, OutputFormat, Quality};
use crate::partition::PixelRect;
use crate::pipeline::{Layout, SplitError, SplitOptions, split_bytes};
use reqwest::StatusCode;
use serde::Serialize;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Malformed query parameters.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum RequestError {
    #[error("Invalid value for '{name}': {value}")]
    InvalidParam { name: &'static str, value: String },
    #[error("'rows' and 'columns' must be given together")]
    IncompleteGrid,
}

/// JSON error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorBody {
    pub reason: String,
    pub message: String,
}

/// A fully-formed HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub content_type: &'static str,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl Response {
    fn error(status: u16, reason: &str, message: impl Into<String>) -> Self {
        let body = ErrorBody {
            reason: reason.to_string(),
            message: message.into(),
        };
        Self {
            status,
            content_type: "application/json",
            headers: Vec::new(),
            body: serde_json::to_vec(&body).unwrap_or_default(),
        }
    }

    fn status_line(&self) -> String {
        let code = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        format!("{} {}", code.as_str(), code.canonical_reason().unwrap_or("Unknown"))
    }

    /// Serialize head and body onto `out`.
    pub fn write_to(&self, out: &mut impl Write) -> io::Result<()> {
        let mut head = format!(
            "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n",
            self.status_line(),
            self.content_type,
            self.body.len()
        );
        for (name, value) in &self.headers {
            head.push_str(&format!("{name}: {value}\r\n"));
        }
        head.push_str("\r\n");
        out.write_all(head.as_bytes())?;
        out.write_all(&self.body)?;
        out.flush()
    }
}

/// A parsed split request.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractRequest {
    pub layout: Layout,
    pub options: SplitOptions,
}

fn invalid(name: &'static str, value: &str) -> RequestError {
    RequestError::InvalidParam {
        name,
        value: value.to_string(),
    }
}

/// Parse `x,y,w,h;x,y,w,h;...`. Empty segments are skipped.
pub fn parse_cells(value: &str) -> Result<Vec<PixelRect>, RequestError> {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|segment| {
            let parts = segment
                .split(',')
                .map(|n| n.trim().parse::<u32>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(|_| invalid("cells", segment))?;
            match parts.as_slice() {
                [x, y, w, h] => Ok(PixelRect::new(*x, *y, *w, *h)),
                _ => Err(invalid("cells", segment)),
            }
        })
        .collect()
}

/// Build an [`ExtractRequest`] from a query string, filling gaps from config.
pub fn parse_query(query: &str, config: &SplitConfig) -> Result<ExtractRequest, RequestError> {
    let mut rows = None;
    let mut columns = None;
    let mut cells = None;
    let mut encoding = config.encoding();
    let mut strict = false;
    let mut filename = Some(config.output.archive_name.clone());

    for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
        match &*key {
            "rows" => rows = Some(value.parse::<u32>().map_err(|_| invalid("rows", &value))?),
            "columns" => columns = Some(value.parse::<u32>().map_err(|_| invalid("columns", &value))?),
            "cells" => cells = Some(parse_cells(&value)?),
            "format" => {
                encoding.format = OutputFormat::from_name(&value).ok_or_else(|| invalid("format", &value))?;
            }
            "quality" => {
                let q = value.parse::<u32>().map_err(|_| invalid("quality", &value))?;
                encoding = Encoding::new(encoding.format, Quality::new(q));
            }
            "strict" => strict = matches!(&*value, "1" | "true" | "yes"),
            "filename" => filename = Some(value.into_owned()),
            other => debug!(param = other, "ignoring unknown query parameter"),
        }
    }

    let layout = match (cells, rows, columns) {
        (Some(cells), _, _) => Layout::Cells(cells),
        (None, Some(rows), Some(columns)) => Layout::Uniform { rows, columns },
        (None, None, None) => Layout::Uniform {
            rows: config.grid.rows,
            columns: config.grid.columns,
        },
        _ => return Err(RequestError::IncompleteGrid),
    };

    Ok(ExtractRequest {
        layout,
        options: SplitOptions {
            encoding,
            strict,
            filename,
        },
    })
}

/// HTTP status for a pipeline failure.
pub fn status_for(error: &SplitError) -> u16 {
    match error.reason() {
        "invalid_input" => 400,
        "decode_failed" => 422,
        _ => 500,
    }
}

/// `"` and control characters are not allowed inside the quoted filename.
fn disposition(filename: &str) -> String {
    let safe: String = filename
        .chars()
        .map(|c| if c == '"' || c == '\\' || c.is_control() { '_' } else { c })
        .collect();
    format!("attachment; filename=\"{safe}\"")
}

/// Route one request. Pure: no I/O beyond the extraction itself.
pub fn handle(method: &str, target: &str, body: &[u8], config: &SplitConfig) -> Response {
    let (path, query) = target.split_once('?').unwrap_or((target, ""));
    if path != "/split" {
        return Response::error(404, "not_found", format!("no route for {path}"));
    }
    if method != "POST" {
        return Response::error(405, "method_not_allowed", "use POST");
    }

    let request = match parse_query(query, config) {
        Ok(request) => request,
        Err(e) => return Response::error(400, "invalid_input", e.to_string()),
    };

    match split_bytes(body, &request.layout, &request.options) {
        Ok(archive) => {
            info!(entries = archive.entries, bytes = archive.bytes.len(), "split served");
            Response {
                status: 200,
                content_type: ARCHIVE_CONTENT_TYPE,
                headers: vec![("Content-Disposition", disposition(&archive.filename))],
                body: archive.bytes,
            }
        }
        Err(e) => {
            warn!(reason = e.reason(), error = %e, "split failed");
            Response::error(status_for(&e), e.reason(), e.to_string())
        }
    }
}

/// Upper bound on the request line plus headers.
const MAX_HEAD_BYTES: u64 = 16 * 1024;

/// Request line and the headers the endpoint cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Head {
    method: String,
    target: String,
    content_length: Option<u64>,
}

/// Read the request head up to the blank line.
///
/// `Ok(None)` means the peer closed before sending anything. A head that
/// overruns [`MAX_HEAD_BYTES`] or is not UTF-8 comes back as the error
/// response to send.
fn read_head<R: BufRead>(reader: &mut R) -> io::Result<Option<Result<Head, Response>>> {
    let mut raw = Vec::new();
    let mut limited = reader.take(MAX_HEAD_BYTES);
    loop {
        let start = raw.len();
        if limited.read_until(b'\n', &mut raw)? == 0 {
            if raw.is_empty() {
                return Ok(None);
            }
            if limited.limit() == 0 {
                return Ok(Some(Err(Response::error(
                    431,
                    "head_too_large",
                    format!("request head exceeds {MAX_HEAD_BYTES} bytes"),
                ))));
            }
            break;
        }
        if raw[start..].iter().all(u8::is_ascii_whitespace) {
            break;
        }
    }

    let Ok(text) = String::from_utf8(raw) else {
        return Ok(Some(Err(Response::error(
            400,
            "invalid_request",
            "request head is not valid UTF-8",
        ))));
    };

    let mut lines = text.lines();
    let mut parts = lines.next().unwrap_or_default().split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let target = parts.next().unwrap_or("/").to_string();

    let mut content_length = None;
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse::<u64>().ok();
            }
        }
    }

    Ok(Some(Ok(Head {
        method,
        target,
        content_length,
    })))
}

/// Read one request off the stream, dispatch it, and write the response.
fn serve_connection(stream: TcpStream, config: &SplitConfig) -> io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);
    let mut out = stream;
    let head = match read_head(&mut reader)? {
        None => return Ok(()),
        Some(Ok(head)) => head,
        Some(Err(response)) => {
            debug!(status = response.status, "rejected request head");
            return response.write_to(&mut out);
        }
    };
    let Head {
        method,
        target,
        content_length,
    } = head;

    let response = match content_length {
        None if method == "POST" => Response::error(411, "length_required", "Content-Length header is required"),
        Some(len) if len > config.server.max_body_bytes => {
            // Drain without buffering so the client sees the response, not a reset.
            io::copy(&mut reader.take(len), &mut io::sink())?;
            Response::error(
                413,
                "body_too_large",
                format!("body exceeds {} bytes", config.server.max_body_bytes),
            )
        }
        len => {
            let mut body = Vec::new();
            reader.take(len.unwrap_or(0)).read_to_end(&mut body)?;
            handle(&method, &target, &body, config)
        }
    };
    debug!(%method, %target, status = response.status, "request complete");
    response.write_to(&mut out)
}

/// Blocking HTTP server for `POST /split`.
pub struct Server {
    listener: TcpListener,
    config: Arc<SplitConfig>,
}

impl Server {
    /// Bind to `config.server.bind`.
    pub fn bind(config: SplitConfig) -> io::Result<Self> {
        let listener = TcpListener::bind(&config.server.bind)?;
        Ok(Self {
            listener,
            config: Arc::new(config),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections forever, one thread each.
    pub fn run(self) -> io::Result<()> {
        info!(addr = %self.local_addr()?, "listening");
        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };
            let config = Arc::clone(&self.config);
            thread::spawn(move || {
                if let Err(e) = serve_connection(stream, &config) {
                    warn!(error = %e, "connection error");
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{archive_names, gradient, png_bytes};

    fn error_body(response: &Response) -> serde_json::Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    // =========================================================================
    // Query parsing
    // =========================================================================

    #[test]
    fn cells_parameter_parses_in_order() {
        let cells = parse_cells("0,0,10,20; 10,0,5,20;").unwrap();
        assert_eq!(cells, vec![PixelRect::new(0, 0, 10, 20), PixelRect::new(10, 0, 5, 20)]);
    }

    #[test]
    fn malformed_cells_rejected() {
        assert!(matches!(
            parse_cells("0,0,10"),
            Err(RequestError::InvalidParam { name: "cells", .. })
        ));
        assert!(parse_cells("0,0,-1,4").is_err());
    }

    #[test]
    fn query_defaults_come_from_config() {
        let config = SplitConfig::default();
        let request = parse_query("", &config).unwrap();
        assert_eq!(request.layout, Layout::Uniform { rows: 3, columns: 3 });
        assert_eq!(request.options.encoding.format, OutputFormat::Png);
        assert_eq!(request.options.filename.as_deref(), Some("split-images.zip"));
    }

    #[test]
    fn query_overrides_format_and_filename() {
        let request = parse_query(
            "rows=2&columns=5&format=jpg&quality=60&filename=my%20tiles.zip&strict=true",
            &SplitConfig::default(),
        )
        .unwrap();
        assert_eq!(request.layout, Layout::Uniform { rows: 2, columns: 5 });
        assert_eq!(request.options.encoding, Encoding::new(OutputFormat::Jpeg, Quality::new(60)));
        assert_eq!(request.options.filename.as_deref(), Some("my tiles.zip"));
        assert!(request.options.strict);
    }

    #[test]
    fn cells_take_precedence_over_grid() {
        let request = parse_query("rows=2&columns=2&cells=0,0,1,1", &SplitConfig::default()).unwrap();
        assert_eq!(request.layout, Layout::Cells(vec![PixelRect::new(0, 0, 1, 1)]));
    }

    #[test]
    fn rows_without_columns_rejected() {
        assert_eq!(
            parse_query("rows=2", &SplitConfig::default()),
            Err(RequestError::IncompleteGrid)
        );
    }

    // =========================================================================
    // Routing and responses
    // =========================================================================

    #[test]
    fn successful_split_returns_zip_with_disposition() {
        let body = png_bytes(&gradient(40, 40));
        let response = handle("POST", "/split?rows=2&columns=2&filename=grid", &body, &SplitConfig::default());

        assert_eq!(response.status, 200);
        assert_eq!(response.content_type, "application/zip");
        assert_eq!(
            response.headers,
            vec![("Content-Disposition", "attachment; filename=\"grid.zip\"".to_string())]
        );
        assert_eq!(archive_names(&response.body).len(), 4);
    }

    #[test]
    fn undecodable_body_is_422() {
        let response = handle("POST", "/split?rows=2&columns=2", b"nope", &SplitConfig::default());
        assert_eq!(response.status, 422);
        assert_eq!(error_body(&response)["reason"], "decode_failed");
    }

    #[test]
    fn invalid_grid_is_400() {
        let body = png_bytes(&gradient(10, 10));
        let response = handle("POST", "/split?rows=0&columns=2", &body, &SplitConfig::default());
        assert_eq!(response.status, 400);
        assert_eq!(error_body(&response)["reason"], "invalid_input");
    }

    #[test]
    fn out_of_bounds_cells_are_400() {
        let body = png_bytes(&gradient(10, 10));
        let response = handle("POST", "/split?cells=5,5,10,10", &body, &SplitConfig::default());
        assert_eq!(response.status, 400);
    }

    #[test]
    fn unknown_route_and_method() {
        let config = SplitConfig::default();
        assert_eq!(handle("POST", "/other", b"", &config).status, 404);
        assert_eq!(handle("GET", "/split", b"", &config).status, 405);
    }

    #[test]
    fn disposition_escapes_quotes() {
        assert_eq!(disposition("a\"b.zip"), "attachment; filename=\"a_b.zip\"");
    }

    #[test]
    fn response_serializes_headers() {
        let response = Response::error(413, "body_too_large", "big");
        let mut out = Vec::new();
        response.write_to(&mut out).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("HTTP/1.1 413 "));
        assert!(text.contains("Content-Type: application/json\r\n"));
        assert!(text.ends_with("{\"reason\":\"body_too_large\",\"message\":\"big\"}"));
    }

    #[test]
    fn status_line_uses_canonical_reason() {
        let response = Response::error(503, "unavailable", "busy");
        assert_eq!(response.status_line(), "503 Service Unavailable");
        assert_eq!(Response::error(422, "decode_failed", "").status_line(), "422 Unprocessable Entity");
    }

    // =========================================================================
    // Request head
    // =========================================================================

    #[test]
    fn head_parses_method_target_and_length() {
        let mut input = io::Cursor::new(b"POST /split?rows=2 HTTP/1.1\r\nContent-Length: 12\r\n\r\nbody".to_vec());
        let head = read_head(&mut input).unwrap().unwrap().unwrap();
        assert_eq!(
            head,
            Head {
                method: "POST".into(),
                target: "/split?rows=2".into(),
                content_length: Some(12),
            }
        );
    }

    #[test]
    fn closed_connection_has_no_head() {
        let mut input = io::Cursor::new(Vec::new());
        assert!(read_head(&mut input).unwrap().is_none());
    }

    #[test]
    fn non_utf8_head_is_400() {
        let mut input = io::Cursor::new(b"POST /split HTTP/1.1\r\nX-Name: \xff\r\n\r\n".to_vec());
        let response = read_head(&mut input).unwrap().unwrap().unwrap_err();
        assert_eq!(response.status, 400);
        assert_eq!(error_body(&response)["reason"], "invalid_request");
    }

    #[test]
    fn endless_header_line_is_capped() {
        let mut raw = b"POST /split HTTP/1.1\r\nX-Pad: ".to_vec();
        raw.extend(std::iter::repeat_n(b'a', 64 * 1024));
        let mut input = io::Cursor::new(raw);
        let response = read_head(&mut input).unwrap().unwrap().unwrap_err();
        assert_eq!(response.status, 431);
        assert_eq!(error_body(&response)["reason"], "head_too_large");
    }
}
