//! Serve already built output.

use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use axum::Router;
use tower_http::services::ServeDir;

/// Serve `dir`, which is either one built site or an output root holding
/// one site per source.
pub async fn run(port: u16, dir: PathBuf) -> Result<()> {
    if !dir.is_dir() {
        bail!(
            "Directory not found: {}. Run 'niveflow sync' or 'niveflow build' first.",
            dir.display()
        );
    }

    let addr: SocketAddr = format!("127.0.0.1:{}", port)
        .parse()
        .context("Invalid address")?;
    let base = format!("http://{}", addr);

    let sites = built_sites(&dir)?;
    if dir.join("index.html").exists() || sites.is_empty() {
        tracing::info!("Serving {} at {}", dir.display(), base);
    } else {
        tracing::info!("Serving {} site(s) from {}:", sites.len(), dir.display());
        for site in &sites {
            tracing::info!("  {}/{}/", base, site);
        }
    }

    let app = Router::new().fallback_service(ServeDir::new(&dir));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let _ = open::that(&base);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Subdirectories of `dir` that contain a built site.
fn built_sites(dir: &Path) -> Result<Vec<String>> {
    let mut sites = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.join("index.html").is_file() {
            if let Some(name) = path.file_name() {
                sites.push(name.to_string_lossy().into_owned());
            }
        }
    }
    sites.sort();
    Ok(sites)
}
