use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use axum::response::Html;
use clap::Parser;
use tower_http::services::{ServeDir, ServeFile};

use folio::app::{AppState, IdentitySource, router};
use folio::content::{Catalog, LocalFsContentStore};
use folio::guard::{GuardConfig, HostedIdentity, HostedIdentityConfig, SessionStore};
use folio::messages::LocalFsMessageStore;

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct AppArgs {
    #[arg(long, default_value = "127.0.0.1:8080")]
    addr: SocketAddr,

    /// Directory holding projects.json, experiences.json, certifications.json,
    /// skills.json and messages.json.
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,

    /// Static web assets directory (serve if exists).
    #[arg(long, default_value = "web/dist")]
    web_dir: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    folio::logging::init_with_default(folio::logging::SERVER_DIRECTIVES)
        .context("init logging")?;
    let args = AppArgs::parse();
    tracing::debug!(?args, "parsed args");

    let identity = match HostedIdentityConfig::from_env().context("identity config")? {
        Some(config) => {
            tracing::info!(base_url = %config.base_url, "using hosted identity service");
            IdentitySource::Hosted(HostedIdentity::new(config)?)
        }
        None => {
            tracing::warn!("FOLIO_IDENTITY_URL is not set; admin routes will redirect everyone");
            IdentitySource::Session(SessionStore::new())
        }
    };
    let guard = GuardConfig::from_env()?;

    let state = AppState {
        catalog: Catalog::new(Arc::new(LocalFsContentStore::new(&args.data_dir))),
        messages: Arc::new(LocalFsMessageStore::new(&args.data_dir)),
        identity,
        guard,
    };

    let mut app = router(state);

    let web_index = args.web_dir.join("index.html");
    if web_index.exists() {
        let static_files = ServeDir::new(&args.web_dir).not_found_service(ServeFile::new(web_index));
        app = app.fallback_service(static_files);
    } else {
        app = app.fallback(|| async {
            Html(
                r#"<!doctype html>
<html>
  <head><meta charset="utf-8"><title>folio-app</title></head>
  <body>
    <h1>folio-app</h1>
    <p>web assets not found. Build the web app into <code>web/dist</code> or pass <code>--web-dir</code>.</p>
  </body>
</html>
"#,
            )
        });
    }

    let listener = tokio::net::TcpListener::bind(args.addr)
        .await
        .map_err(|err| anyhow::anyhow!("bind {}: {err}", args.addr))?;
    tracing::info!(addr = %args.addr, data_dir = %args.data_dir.display(), "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serve")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!("listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
