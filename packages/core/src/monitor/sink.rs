//! Append-only file sink for breach notifications.
//!
//! The file is opened in append mode for every line and closed again as soon
//! as the write returns, so the handle is released on both the success and
//! the failure path. Nothing here truncates or rotates the file.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("cannot open log file {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write log file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
}

impl FileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append `line` followed by a newline.
    pub async fn append_line(&self, line: &str) -> Result<(), SinkError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|source| SinkError::Open {
                path: self.path.clone(),
                source,
            })?;

        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        let written = file.write_all(buf.as_bytes()).await;
        let flushed = match written {
            Ok(()) => file.flush().await,
            Err(err) => Err(err),
        };

        flushed.map_err(|source| SinkError::Write {
            path: self.path.clone(),
            source,
        })
    }
}
