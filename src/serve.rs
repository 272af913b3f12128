//! Preview server for the `run` command.
//!
//! Serves the output directory over HTTP with `tiny_http` until ENTER is
//! pressed on stdin. Requests resolve in this order:
//!
//! 1. a file at the path → the file
//! 2. a directory with `index.html` → that `index.html`
//! 3. anything else (including paths that climb out of the root) → 404 page

use maud::{DOCTYPE, html};
use std::fs;
use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tiny_http::{Header, Request, Response, Server};
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum ServeError {
    #[error("Failed to bind port {port}: {reason}")]
    Bind { port: u16, reason: String },
    #[error("Output directory not found: {0}")]
    RootNotFound(PathBuf),
}

// ============================================================================
// Request resolution
// ============================================================================

/// Map a request URL to a file under `root`, or `None` for a 404.
pub fn resolve_request_path(root: &Path, url: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(url)
        .map(std::borrow::Cow::into_owned)
        .unwrap_or_else(|_| url.to_string());
    let path = decoded.split(['?', '#']).next().unwrap_or_default();

    let mut local = root.to_path_buf();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s if s.contains('\\') || s.contains(':') => return None,
            s => local.push(s),
        }
    }

    if local.is_dir() {
        local.push("index.html");
    }
    local.is_file().then_some(local)
}

/// Guess MIME content type from file extension.
///
/// Returns `application/octet-stream` for unknown extensions.
pub fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html" | "htm") => "text/html; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("js" | "mjs") => "application/javascript; charset=utf-8",
        Some("json") => "application/json; charset=utf-8",
        Some("xml") => "application/xml; charset=utf-8",
        Some("txt" | "md") => "text/plain; charset=utf-8",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("avif") => "image/avif",
        Some("ico") => "image/x-icon",
        Some("woff") => "font/woff",
        Some("woff2") => "font/woff2",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}

pub fn not_found_page(url: &str) -> String {
    html! {
        (DOCTYPE)
        html lang="en-US" {
            head {
                meta charset="utf-8";
                title { "Not found" }
            }
            body {
                h1 { "404" }
                p { "Nothing at " code { (url) } "." }
                p { a href="/" { "Back to the front page" } }
            }
        }
    }
    .into_string()
}

// ============================================================================
// Server loop
// ============================================================================

/// Serve `root` on `port` until ENTER is pressed.
pub fn serve(root: &Path, port: u16) -> Result<(), ServeError> {
    if !root.is_dir() {
        return Err(ServeError::RootNotFound(root.to_path_buf()));
    }
    let server = Server::http(("127.0.0.1", port)).map_err(|e| ServeError::Bind {
        port,
        reason: e.to_string(),
    })?;
    let server = Arc::new(server);

    let stopper = Arc::clone(&server);
    std::thread::spawn(move || {
        let mut line = String::new();
        let _ = std::io::stdin().lock().read_line(&mut line);
        stopper.unblock();
    });

    println!("Serving {} at http://127.0.0.1:{port}/", root.display());
    println!("Press ENTER to stop.");

    for request in server.incoming_requests() {
        if let Err(e) = handle_request(request, root) {
            warn!(error = %e, "request failed");
        }
    }
    info!("server stopped");
    Ok(())
}

fn handle_request(request: Request, root: &Path) -> std::io::Result<()> {
    let url = request.url().to_string();
    match resolve_request_path(root, &url) {
        Some(path) => {
            debug!(url = %url, path = %path.display(), "200");
            let body = fs::read(&path)?;
            let mut response = Response::from_data(body);
            if let Ok(header) = Header::from_bytes("Content-Type", content_type(&path)) {
                response = response.with_header(header);
            }
            request.respond(response)
        }
        None => {
            debug!(url = %url, "404");
            let mut response = Response::from_string(not_found_page(&url)).with_status_code(404);
            if let Ok(header) = Header::from_bytes("Content-Type", "text/html; charset=utf-8") {
                response = response.with_header(header);
            }
            request.respond(response)
        }
    }
}
