//! Application orchestrator: wires the watcher, uploader and token store together.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use callrelay_pipeline::{OnOutcomeFn, PipelineConfig, RecordingService};
use callrelay_uploader::{AuthClient, CredentialSource, TokenStore, UploadClient, UploadState};

use crate::config::Config;

/// Runs the agent until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let store = TokenStore::new(config.session_path()?);
    if !store.is_logged_in() {
        tracing::warn!(
            session = %store.path().display(),
            "not logged in, uploads will fail until `callrelay-agent login` is run"
        );
    }

    let credentials: Arc<dyn CredentialSource> = Arc::new(store);
    let uploader = UploadClient::new(&config.server_url, credentials, config.request_timeout())
        .context("failed to build HTTP client")?;
    tracing::info!(url = uploader.url(), "upload endpoint");

    let watcher = config.watcher.build(config.poll_interval());
    let pipeline = PipelineConfig {
        watch_dir: config.watch_dir.clone(),
        retry: config.retry_policy(),
        scan_existing_on_start: config.scan_existing_on_start,
    };

    let on_outcome: OnOutcomeFn = Arc::new(log_outcome);
    let service = RecordingService::start(
        pipeline,
        watcher.as_ref(),
        Arc::new(uploader),
        Some(on_outcome),
    )
    .with_context(|| format!("cannot watch {}", config.watch_dir.display()))?;

    tracing::info!(
        dir = %service.watch_dir().display(),
        backend = ?config.watcher,
        "watching for new recordings"
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    service.shutdown().await;

    Ok(())
}

fn log_outcome(path: &Path, state: &UploadState) {
    if let UploadState::Exhausted { attempts, .. } = state {
        tracing::debug!(file = %path.display(), attempts, "recording left in place");
    }
}

/// Logs in and stores the issued token.
pub async fn login(config: &Config, username: &str, password: &str) -> anyhow::Result<()> {
    let token = AuthClient::new(&config.server_url)
        .login(username, password)
        .await?;

    let store = TokenStore::new(config.session_path()?);
    store.save_token(&token)?;
    println!("Logged in as {username}");
    Ok(())
}

/// Removes the stored token.
pub fn logout(config: &Config) -> anyhow::Result<()> {
    let store = TokenStore::new(config.session_path()?);
    store.clear()?;
    println!("Logged out");
    Ok(())
}

/// Prints configuration and login state.
pub fn status(config: &Config) -> anyhow::Result<()> {
    let store = TokenStore::new(config.session_path()?);

    println!("Server:       {}", config.server_url);
    println!("Watch folder: {}", config.watch_dir.display());
    println!(
        "Folder:       {}",
        if config.watch_dir.is_dir() {
            "present"
        } else {
            "missing"
        }
    );
    println!("Backend:      {:?}", config.watcher);
    println!("Attempts:     {}", config.max_attempts);
    println!("Session:      {}", store.path().display());
    println!(
        "Logged in:    {}",
        if store.is_logged_in() { "yes" } else { "no" }
    );
    Ok(())
}
