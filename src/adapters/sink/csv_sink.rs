use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt as _, BufWriter};
use tokio::sync::Mutex;

use crate::domain::bundle::NightlyRate;
use crate::error::{RateShopperError, Result};
use crate::ports::result_sink::ResultSink;

/// Appends one semicolon-delimited line per nightly rate.
pub struct CsvFileSink {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl CsvFileSink {
    /// Open `path` for appending, creating it if needed.
    ///
    /// Opening is synchronous so a bad path fails at startup; writes go
    /// through tokio's file I/O.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| RateShopperError::Persistence {
                reason: format!("cannot open {}: {e}", path.display()),
            })?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(File::from_std(file))),
        })
    }

    fn persistence_error(&self, e: &std::io::Error) -> RateShopperError {
        RateShopperError::Persistence {
            reason: format!("{}: {e}", self.path.display()),
        }
    }
}

#[async_trait]
impl ResultSink for CsvFileSink {
    async fn write(&self, rate: &NightlyRate) -> Result<()> {
        let line = format!("{}\n", rate.to_csv_line());
        let mut writer = self.writer.lock().await;
        writer
            .write_all(line.as_bytes())
            .await
            .map_err(|e| self.persistence_error(&e))
    }

    async fn flush(&self) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.flush().await.map_err(|e| self.persistence_error(&e))
    }
}
