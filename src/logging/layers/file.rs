use crate::logging::config::LoggingConfig;
use crate::Result;
use anyhow::{anyhow, Context};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::{self as tracing_fmt, format, writer::BoxMakeWriter};
use tracing_subscriber::registry::LookupSpan;

const LOG_FILE_NAME: &str = "tracefix.log";

/// Layer type produced by the file sink builder.
pub type FileFmtLayer<S> =
    tracing_fmt::Layer<S, format::DefaultFields, format::Format<format::Full>, BoxMakeWriter>;

/// Layer stack that already wraps the provided subscriber.
pub type FileLayerStack<S> = tracing_subscriber::layer::Layered<FileFmtLayer<S>, S>;

/// `<workspace>/.tracefix/logs/tracefix.log` unless `log_dir` says otherwise.
///
/// A relative `log_dir` must stay inside the workspace. Absolute directories are taken as given.
pub fn log_file_path(config: &LoggingConfig, workspace_root: &Path) -> Result<PathBuf> {
    let directory = match &config.log_dir {
        Some(dir) if dir.is_absolute() => dir.clone(),
        Some(dir) => join_within(workspace_root, dir)?,
        None => workspace_root.join(".tracefix").join("logs"),
    };
    Ok(directory.join(LOG_FILE_NAME))
}

/// Resolve `relative` against `workspace` without touching the filesystem, since the log
/// directory usually does not exist yet.
fn join_within(workspace: &Path, relative: &Path) -> Result<PathBuf> {
    let mut resolved = workspace.to_path_buf();
    let mut depth = 0usize;
    for component in relative.components() {
        match component {
            Component::CurDir => {}
            Component::Normal(part) => {
                resolved.push(part);
                depth += 1;
            }
            Component::ParentDir if depth > 0 => {
                resolved.pop();
                depth -= 1;
            }
            _ => {
                return Err(anyhow!(
                    "logging.log_dir {} resolves outside workspace {}",
                    relative.display(),
                    workspace.display()
                ))
            }
        }
    }
    Ok(resolved)
}

/// Tracing layer for the log file. When disabled the layer writes to a sink and no guard is
/// returned.
pub fn file_layer<S>(
    log_file: &Path,
    enabled: bool,
) -> Result<(FileFmtLayer<S>, Option<WorkerGuard>)>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    let (writer, guard) = if enabled {
        let (non_blocking, guard) = tracing_appender::non_blocking(open_log_file(log_file)?);
        (BoxMakeWriter::new(non_blocking), Some(guard))
    } else {
        (BoxMakeWriter::new(io::sink), None)
    };

    let layer = tracing_fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false);
    Ok((layer, guard))
}

fn open_log_file(log_file: &Path) -> Result<File> {
    if let Some(directory) = log_file.parent() {
        fs::create_dir_all(directory)
            .with_context(|| format!("failed to create log directory {}", directory.display()))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("failed to open log file {}", log_file.display()))
}
