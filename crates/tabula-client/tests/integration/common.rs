use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// A canned HTTP response for one request path.
#[derive(Debug, Clone)]
pub struct Route {
    path: String,
    status: u16,
    location: Option<String>,
    body: String,
}

impl Route {
    pub fn html(path: &str, body: &str) -> Self {
        Self {
            path: path.to_string(),
            status: 200,
            location: None,
            body: body.to_string(),
        }
    }

    pub fn redirect(path: &str, to: &str) -> Self {
        Self {
            path: path.to_string(),
            status: 302,
            location: Some(to.to_string()),
            body: String::new(),
        }
    }

    pub fn status(path: &str, status: u16) -> Self {
        Self {
            path: path.to_string(),
            status,
            location: None,
            body: String::new(),
        }
    }

    fn render(&self) -> String {
        let reason = match self.status {
            200 => "OK",
            302 => "Found",
            404 => "Not Found",
            500 => "Internal Server Error",
            _ => "Unknown",
        };
        let location = self
            .location
            .as_ref()
            .map(|to| format!("Location: {to}\r\n"))
            .unwrap_or_default();
        format!(
            "HTTP/1.1 {} {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n{}",
            self.status,
            reason,
            self.body.len(),
            location,
            self.body
        )
    }
}

/// Starts a throwaway HTTP/1.1 server on loopback and returns its base URL
/// (`http://127.0.0.1:<port>`). Unknown paths get a 404.
///
/// The server lives until the test runtime shuts down.
pub async fn spawn_server(routes: Vec<Route>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let routes = Arc::new(routes);

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let routes = Arc::clone(&routes);
            tokio::spawn(async move {
                let mut buf = vec![0u8; 8192];
                let mut read = 0;
                while read < buf.len() {
                    let n = stream.read(&mut buf[read..]).await.unwrap_or(0);
                    if n == 0 {
                        break;
                    }
                    read += n;
                    if buf[..read].windows(4).any(|w| w == b"\r\n\r\n") {
                        break;
                    }
                }

                let request = String::from_utf8_lossy(&buf[..read]);
                let path = request.split_whitespace().nth(1).unwrap_or("/").to_string();
                let response = routes
                    .iter()
                    .find(|r| r.path == path)
                    .cloned()
                    .unwrap_or_else(|| Route::status(&path, 404))
                    .render();

                let _ = stream.write_all(response.as_bytes()).await;
                let _ = stream.shutdown().await;
            });
        }
    });

    format!("http://{addr}")
}

/// A loopback URL with nothing listening behind it.
pub async fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/")
}
