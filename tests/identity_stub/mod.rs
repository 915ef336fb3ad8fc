use std::sync::mpsc;
use std::thread;
use std::time::Duration;

pub const API_KEY: &str = "stub-api-key";
pub const ADMIN_TOKEN: &str = "admin-token";
pub const GUEST_TOKEN: &str = "guest-token";
/// The user endpoint answers 500 for this token.
pub const BROKEN_TOKEN: &str = "broken-token";

const ADMIN_ID: &str = "user-admin";
const GUEST_ID: &str = "user-guest";

/// Minimal auth + rest service: `/auth/v1/user` and `/rest/v1/admins`.
pub struct IdentityStub {
    pub base_url: String,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

impl IdentityStub {
    pub fn spawn() -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start identity stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(50)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };

                let header = |name: &'static str| {
                    request
                        .headers()
                        .iter()
                        .find(|h| h.field.equiv(name))
                        .map(|h| h.value.as_str().to_owned())
                };
                if header("apikey").as_deref() != Some(API_KEY) {
                    let _ = request.respond(
                        tiny_http::Response::from_string("missing apikey").with_status_code(400),
                    );
                    continue;
                }
                let token = header("Authorization")
                    .and_then(|v| v.strip_prefix("Bearer ").map(str::to_owned))
                    .unwrap_or_default();

                let url = request.url().to_string();
                let (status, body) = if url == "/auth/v1/user" {
                    match token.as_str() {
                        ADMIN_TOKEN => (
                            200,
                            serde_json::json!({ "id": ADMIN_ID, "email": "owner@example.com" })
                                .to_string(),
                        ),
                        GUEST_TOKEN => (200, serde_json::json!({ "id": GUEST_ID }).to_string()),
                        BROKEN_TOKEN => (500, "boom".to_owned()),
                        _ => (401, r#"{"message":"invalid token"}"#.to_owned()),
                    }
                } else if url == format!("/rest/v1/admins?select=user_id&user_id=eq.{ADMIN_ID}") {
                    (200, serde_json::json!([{ "user_id": ADMIN_ID }]).to_string())
                } else if url.starts_with("/rest/v1/admins?") {
                    (200, "[]".to_owned())
                } else {
                    (404, "not found".to_owned())
                };

                let header =
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                        .expect("build header");
                let response = tiny_http::Response::from_string(body)
                    .with_status_code(status)
                    .with_header(header);
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }
}

impl Drop for IdentityStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
