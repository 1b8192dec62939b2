//! Loopback listener that captures the OAuth redirect.

use std::net::SocketAddr;
use std::time::Duration;

use reqwest::Url;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, warn};

use crate::error::{AuthError, AuthResult};

const SUCCESS_PAGE: &str = "<html><body><h3>Linear CLI authenticated.</h3>You can close this tab.</body></html>";
const FAILURE_PAGE: &str = "<html><body><h3>Authentication failed.</h3>Return to the terminal for details.</body></html>";

pub struct CallbackListener {
    listener: TcpListener,
    path: String,
}

impl CallbackListener {
    /// Bind the host and port named by the redirect URI.
    pub async fn bind(redirect_uri: &str) -> AuthResult<Self> {
        let url = Url::parse(redirect_uri)
            .map_err(|e| AuthError::Config(format!("Invalid redirect URI '{}': {}", redirect_uri, e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| AuthError::Config(format!("Redirect URI '{}' has no host", redirect_uri)))?;
        let host = if host == "localhost" { "127.0.0.1" } else { host };
        let port = url.port_or_known_default().unwrap_or(80);

        let listener = TcpListener::bind((host, port)).await.map_err(|e| {
            AuthError::Config(format!("Cannot listen on {}:{} for the OAuth callback: {}", host, port, e))
        })?;
        debug!(addr = ?listener.local_addr().ok(), "OAuth callback listener bound");

        Ok(Self {
            listener,
            path: url.path().to_string(),
        })
    }

    pub fn local_addr(&self) -> AuthResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Wait for the browser redirect and return the authorization code.
    ///
    /// Requests for other paths (favicon requests) are answered with 404 and
    /// ignored. A `state` mismatch is rejected.
    pub async fn wait_for_code(&self, expected_state: &str, timeout: Duration) -> AuthResult<String> {
        tokio::time::timeout(timeout, self.accept_loop(expected_state))
            .await
            .map_err(|_| {
                AuthError::TransientNetworkError("timed out waiting for the OAuth callback".into())
            })?
    }

    async fn accept_loop(&self, expected_state: &str) -> AuthResult<String> {
        loop {
            let (mut stream, peer) = self.listener.accept().await?;
            debug!(%peer, "OAuth callback connection");

            let target = match read_request_target(&mut stream).await {
                Ok(target) => target,
                Err(e) => {
                    warn!("Unreadable callback request: {}", e);
                    continue;
                }
            };

            let url = match Url::parse(&format!("http://localhost{}", target)) {
                Ok(url) if url.path() == self.path => url,
                _ => {
                    respond(&mut stream, "404 Not Found", "").await;
                    continue;
                }
            };

            let outcome = parse_callback(&url, expected_state);
            let page = if outcome.is_ok() { SUCCESS_PAGE } else { FAILURE_PAGE };
            respond(&mut stream, "200 OK", page).await;
            return outcome;
        }
    }
}

/// Extract the code from the redirect URL's query string.
pub fn parse_callback(url: &Url, expected_state: &str) -> AuthResult<String> {
    let mut code = None;
    let mut state = None;
    let mut error = None;
    for (k, v) in url.query_pairs() {
        match k.as_ref() {
            "code" => code = Some(v.into_owned()),
            "state" => state = Some(v.into_owned()),
            "error" => error = Some(v.into_owned()),
            _ => {}
        }
    }

    if let Some(error) = error {
        return Err(AuthError::OAuth(format!("authorization denied: {}", error)));
    }
    if state.as_deref() != Some(expected_state) {
        return Err(AuthError::InvalidCredential(
            "OAuth state mismatch; the callback did not come from this login".into(),
        ));
    }
    code.filter(|c| !c.is_empty())
        .ok_or_else(|| AuthError::OAuth("callback carried no authorization code".into()))
}

async fn read_request_target(stream: &mut TcpStream) -> std::io::Result<String> {
    let mut buffer = vec![0u8; 8192];
    let mut len = 0;
    // The request line is all we need; stop once it is complete.
    while len < buffer.len() {
        let n = stream.read(&mut buffer[len..]).await?;
        if n == 0 {
            break;
        }
        len += n;
        if buffer[..len].windows(2).any(|w| w == b"\r\n") {
            break;
        }
    }
    let request = String::from_utf8_lossy(&buffer[..len]);
    request
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .map(str::to_string)
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidData, "no request line"))
}

async fn respond(stream: &mut TcpStream, status: &str, body: &str) {
    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    if let Err(e) = stream.write_all(response.as_bytes()).await {
        debug!("Failed to answer callback request: {}", e);
    }
    let _ = stream.shutdown().await;
}
