//! Static snapshot of the project.
//!
//! The project is copied into a staging directory, then every HTML document
//! and script is rendered in-process through the same request router the
//! server uses and written over the copy: documents to their own path,
//! scripts to `<stem>.js`. The finished tree replaces `<root>/dist`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::StatusCode;
use tern_config::ServerConfig;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::dev::{DevServerState, ServedPath, dispatch};
use crate::error::{CliError, Result, ResultExt};
use crate::ui;

/// Output directory under the project root.
pub const DIST_DIR: &str = "dist";

const STAGING_DIR: &str = ".tern-staging";

/// Never copied nor rendered, at the top level.
const SKIPPED_DIRS: [&str; 2] = [DIST_DIR, "node_modules"];

const RENDERED_EXTENSIONS: [&str; 5] = ["html", "js", "ts", "tsx", "jsx"];

/// One file to render: the URL to request and where the response goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTarget {
    pub request: String,
    pub output: String,
}

#[derive(Debug)]
pub struct BuildSummary {
    pub output: PathBuf,
    pub copied: usize,
    pub rendered: usize,
    pub failed: Vec<(String, StatusCode)>,
    pub duration: Duration,
}

impl BuildSummary {
    pub fn report(&self) {
        for (request, status) in &self.failed {
            ui::warning(&format!("{} answered {}, left unrendered", request, status));
        }
        ui::success(&format!(
            "Static build written to {} ({} rendered, {} copied) in {}",
            self.output.display(),
            self.rendered,
            self.copied,
            ui::format_duration(self.duration)
        ));
    }
}

/// Build `<root>/dist`.
pub async fn execute(config: ServerConfig) -> Result<BuildSummary> {
    let started = Instant::now();
    let root = config.root().to_path_buf();
    let staging = root.join(STAGING_DIR);
    let dist = root.join(DIST_DIR);

    let config = ServerConfig {
        watch: false,
        ..config
    };
    let targets = {
        let root = root.clone();
        let config = config.clone();
        blocking(move || Ok(render_targets(&root, &config))).await?
    };

    let (state, _) = DevServerState::with_oxc(config)?;
    let state = Arc::new(state);

    ui::info("Copying project to staging directory");
    remove_dir_if_exists(&staging).await?;
    let copied = {
        let root = root.clone();
        let staging = staging.clone();
        blocking(move || copy_project(&root, &staging)).await?
    };

    ui::info(&format!("Rendering {} files", targets.len()));
    let mut rendered = 0;
    let mut failed = Vec::new();
    for target in targets {
        let served = dispatch(&state, &target.request).await;
        if !served.is_success() {
            warn!(request = %target.request, status = %served.status, "render failed");
            failed.push((target.request, served.status));
            continue;
        }

        let destination = staging.join(&target.output);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await.with_path(parent)?;
        }
        tokio::fs::write(&destination, &served.body)
            .await
            .context(format!("Failed to write {}", destination.display()))?;
        debug!(request = %target.request, output = %target.output, "rendered");
        rendered += 1;
    }

    remove_dir_if_exists(&dist).await?;
    tokio::fs::rename(&staging, &dist)
        .await
        .context(format!("Failed to move staging directory to {}", dist.display()))?;

    Ok(BuildSummary {
        output: dist,
        copied,
        rendered,
        failed,
        duration: started.elapsed(),
    })
}

/// Files under `root` to render, in a stable order.
///
/// Skips hidden entries, `dist`, `node_modules` and configured exclude
/// directories. A `.ts` and a `.js` with the same stem render once.
pub fn render_targets(root: &Path, config: &ServerConfig) -> Vec<RenderTarget> {
    let mut targets = BTreeMap::new();

    let walker = WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| !is_skipped(entry));

    for entry in walker.filter_map(|entry| entry.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        if config.is_excluded(relative) {
            continue;
        }
        let Some(served) = ServedPath::from_fs_path(root, entry.path()) else {
            continue;
        };
        let Some(extension) = served.extension().map(str::to_ascii_lowercase) else {
            continue;
        };
        if !RENDERED_EXTENSIONS.contains(&extension.as_str()) {
            continue;
        }

        let output = if extension == "html" {
            served.clone()
        } else {
            served.with_extension("js")
        };
        targets.insert(
            output.relative().to_string(),
            RenderTarget {
                request: format!("/{}", output.relative()),
                output: output.relative().to_string(),
            },
        );
    }

    targets.into_values().collect()
}

/// Copy the project tree into `staging`, returning the number of files.
fn copy_project(root: &Path, staging: &Path) -> Result<usize> {
    std::fs::create_dir_all(staging).with_path(staging)?;
    let mut copied = 0;

    let walker = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_entry(|entry| !is_hidden(entry) && !is_top_level(entry, DIST_DIR));

    for entry in walker {
        let entry = entry.map_err(|e| CliError::StaticBuild(e.to_string()))?;
        let relative = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| CliError::StaticBuild(e.to_string()))?;
        let destination = staging.join(relative);

        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&destination).with_path(&destination)?;
        } else if entry.file_type().is_file() {
            std::fs::copy(entry.path(), &destination)
                .context(format!("Failed to copy {}", entry.path().display()))?;
            copied += 1;
        }
    }

    Ok(copied)
}

fn is_skipped(entry: &DirEntry) -> bool {
    is_hidden(entry) || SKIPPED_DIRS.iter().any(|dir| is_top_level(entry, dir))
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0 && entry.file_name().to_str().is_some_and(|name| name.starts_with('.'))
}

fn is_top_level(entry: &DirEntry, name: &str) -> bool {
    entry.depth() == 1 && entry.file_type().is_dir() && entry.file_name() == name
}

async fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).context(format!("Failed to remove {}", path.display())),
    }
}

async fn blocking<T, F>(job: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| CliError::StaticBuild(e.to_string()))?
}
