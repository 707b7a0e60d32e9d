//! palette_api - color palette web service
//!
//! A small standalone HTTP service, unrelated to the sorting pipeline:
//!
//! - `POST /random_palette` returns five random colors
//! - `POST /upload_image` extracts the five dominant colors of the posted
//!   JPEG/PNG body, optionally restricted to a `crop=x,y,width,height`
//!   region
//!
//! Colors are returned as `{"colors": ["#rrggbb", ...]}`; malformed input
//! gets a 400 with a JSON error body.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;

use sort_station::palette::{self, CropRect, Rgb};

const MAX_REQUEST_BYTES: usize = 16 * 1024 * 1024;

#[derive(Parser, Debug)]
#[command(name = "palette_api", about = "Color palette web service")]
struct Args {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:5000")]
    addr: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let addr: SocketAddr = args.addr.parse().context("invalid listen address")?;
    let listener = TcpListener::bind(addr)?;
    listener.set_nonblocking(true)?;
    log::info!("palette api listening on {}", listener.local_addr()?);

    let shutdown = Arc::new(AtomicBool::new(false));
    let ctrlc_shutdown = shutdown.clone();
    ctrlc::set_handler(move || {
        ctrlc_shutdown.store(true, Ordering::SeqCst);
    })
    .context("failed to install signal handler")?;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, _)) => {
                if let Err(err) = handle_connection(stream) {
                    log::warn!("request failed: {}", err);
                }
            }
            Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(50));
            }
            Err(err) => return Err(err.into()),
        }
    }

    log::info!("palette api stopped");
    Ok(())
}

fn handle_connection(mut stream: TcpStream) -> Result<()> {
    let request = match read_request(&mut stream) {
        Ok(request) => request,
        Err(err) => {
            write_error(&mut stream, 400, &err.to_string())?;
            return Err(err);
        }
    };

    if request.method != "POST" {
        write_error(&mut stream, 405, "method not allowed")?;
        return Ok(());
    }

    match request.path.as_str() {
        "/random_palette" => {
            write_palette(&mut stream, palette::random_palette())?;
        }
        "/upload_image" => match upload_palette(&request) {
            Ok(colors) => write_palette(&mut stream, colors)?,
            Err(err) => write_error(&mut stream, 400, &err.to_string())?,
        },
        _ => write_error(&mut stream, 404, "not found")?,
    }
    Ok(())
}

fn upload_palette(request: &HttpRequest) -> Result<Vec<Rgb>> {
    if request.body.is_empty() {
        return Err(anyhow!("no image data in request body"));
    }
    let crop = match request.query_param("crop") {
        Some(value) => Some(CropRect::parse(&value)?),
        None => None,
    };
    let image = image::load_from_memory(&request.body)
        .map_err(|e| anyhow!("unable to decode image: {}", e))?
        .to_rgb8();
    palette::extract_colors(&image, crop)
}

fn read_request(stream: &mut TcpStream) -> Result<HttpRequest> {
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    let mut buf = [0u8; 8192];
    let mut data = Vec::new();

    // Read until the header terminator.
    let header_end = loop {
        if let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed mid-request"));
        }
        data.extend_from_slice(&buf[..n]);
        if data.len() > MAX_REQUEST_BYTES {
            return Err(anyhow!("request too large"));
        }
    };

    let head = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let mut lines = head.split("\r\n");
    let request_line = lines.next().ok_or_else(|| anyhow!("empty request"))?;
    let mut parts = request_line.split_whitespace();
    let method = parts
        .next()
        .ok_or_else(|| anyhow!("missing method"))?
        .to_string();
    let raw_path = parts
        .next()
        .ok_or_else(|| anyhow!("missing path"))?
        .to_string();

    let mut headers = HashMap::new();
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((k, v)) = line.split_once(':') {
            headers.insert(k.trim().to_lowercase(), v.trim().to_string());
        }
    }

    let content_length: usize = headers
        .get("content-length")
        .map(|v| v.parse())
        .transpose()
        .map_err(|_| anyhow!("invalid content-length"))?
        .unwrap_or(0);
    if content_length > MAX_REQUEST_BYTES {
        return Err(anyhow!("request body too large"));
    }

    let mut body = data[header_end..].to_vec();
    while body.len() < content_length {
        let n = stream.read(&mut buf)?;
        if n == 0 {
            return Err(anyhow!("connection closed mid-body"));
        }
        body.extend_from_slice(&buf[..n]);
    }
    body.truncate(content_length);

    let path = raw_path
        .split('?')
        .next()
        .unwrap_or(&raw_path)
        .to_string();
    Ok(HttpRequest {
        method,
        path,
        raw_path,
        body,
    })
}

fn write_palette(stream: &mut TcpStream, colors: Vec<Rgb>) -> Result<()> {
    let hex: Vec<String> = colors.into_iter().map(Rgb::to_hex).collect();
    let body = serde_json::to_vec(&serde_json::json!({ "colors": hex }))?;
    write_response(stream, 200, &body)
}

fn write_error(stream: &mut TcpStream, status: u16, message: &str) -> Result<()> {
    let body = serde_json::to_vec(&serde_json::json!({ "error": message }))?;
    write_response(stream, status, &body)
}

fn write_response(stream: &mut TcpStream, status: u16, body: &[u8]) -> Result<()> {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        405 => "HTTP/1.1 405 Method Not Allowed",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let header = format!(
        "{status_line}\r\nContent-Type: application/json\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n",
        len = body.len()
    );
    stream.write_all(header.as_bytes())?;
    stream.write_all(body)?;
    Ok(())
}

#[derive(Debug)]
struct HttpRequest {
    method: String,
    path: String,
    raw_path: String,
    body: Vec<u8>,
}

impl HttpRequest {
    fn query_param(&self, name: &str) -> Option<String> {
        let query = self.raw_path.split('?').nth(1)?;
        for pair in query.split('&') {
            if let Some((k, v)) = pair.split_once('=') {
                if k == name {
                    return Some(v.to_string());
                }
            }
        }
        None
    }
}
