#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
use clap::Parser;
#[cfg(not(target_arch = "wasm32"))]
use std::fs;
#[cfg(not(target_arch = "wasm32"))]
use std::path::{Path, PathBuf};
#[cfg(not(target_arch = "wasm32"))]
use tiny_http::{Header, Request, Response, Server, StatusCode};

/// Serves the built web client for local play.
#[cfg(not(target_arch = "wasm32"))]
#[derive(Parser, Debug)]
struct Opts {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: String,
    /// Directory with index.html and the wasm bundle
    #[arg(long, default_value = "web")]
    root: PathBuf,
}

#[cfg(not(target_arch = "wasm32"))]
fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    let root = std::env::current_dir()?.join(&opts.root);
    anyhow::ensure!(root.exists(), "web directory not found at {}", root.display());

    let server = Server::http(&opts.addr).map_err(|e| anyhow::anyhow!("bind failed: {e}"))?;
    println!("Serving {} on http://{}", root.display(), opts.addr);
    for request in server.incoming_requests() {
        let line = format!("{} {}", request.method(), request.url());
        let status = serve(&root, request);
        println!("{} -> {}", line, status);
    }
    Ok(())
}

/// Answers one request and reports the status code sent.
#[cfg(not(target_arch = "wasm32"))]
fn serve(root: &Path, request: Request) -> u16 {
    let url_path = request.url().split('?').next().unwrap_or("/");
    let file = match resolve(root, url_path) {
        Some(file) => file,
        None => return not_found(request),
    };
    match fs::read(&file) {
        Ok(bytes) => {
            let mut resp = Response::from_data(bytes);
            if let Ok(h) = Header::from_bytes("Content-Type", content_type(&file).as_bytes()) {
                resp.add_header(h);
            }
            let _ = request.respond(resp);
            200
        }
        Err(_) => not_found(request),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn not_found(request: Request) -> u16 {
    let resp = Response::from_string("Not Found").with_status_code(StatusCode(404));
    let _ = request.respond(resp);
    404
}

/// Maps a URL path onto a file under `root`, refusing traversal segments.
/// Directories fall back to their index.html.
#[cfg(not(target_arch = "wasm32"))]
fn resolve(root: &Path, url_path: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    for part in url_path.split('/').filter(|p| !p.is_empty()) {
        if part == ".." || part.contains('\\') {
            return None;
        }
        path.push(part);
    }
    if path.is_dir() {
        path.push("index.html");
    }
    path.is_file().then_some(path)
}

#[cfg(not(target_arch = "wasm32"))]
fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "application/javascript",
        Some("css") => "text/css",
        Some("wasm") => "application/wasm",
        Some("json") => "application/json",
        Some("svg") => "image/svg+xml",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}
