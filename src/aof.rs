use futures::StreamExt;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error as ThisError;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncSeekExt, AsyncWriteExt};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio_util::codec::FramedRead;
use tracing::{debug, error, info, warn};

use crate::codec::{CodecError, FrameCodec};
use crate::frame::Frame;

/// Default interval between two syncs of the append-only file to disk.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, ThisError)]
pub enum AofError {
    #[error("append-only file I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("corrupt append-only file: {0}")]
    Codec(#[from] CodecError),
    #[error("append-only file is closed")]
    Closed,
    #[error("flush interval must be greater than zero")]
    ZeroFlushInterval,
}

/// Append-only file recording every write request as its raw RESP frame.
///
/// The file has no header or index: it is a plain concatenation of request arrays and is read
/// back with the same [`FrameCodec`] used for client connections. A background task syncs the
/// file to disk every `flush_interval`; appends, syncs and replays are serialized by one lock.
pub struct Aof {
    path: PathBuf,
    file: Arc<Mutex<Option<File>>>,
    shutdown: Arc<Notify>,
    syncer: Mutex<Option<JoinHandle<()>>>,
}

impl Aof {
    /// Opens the file at `path`, creating it if needed, and starts the periodic sync task.
    pub async fn open(path: impl AsRef<Path>, flush_interval: Duration) -> Result<Self, AofError> {
        if flush_interval.is_zero() {
            return Err(AofError::ZeroFlushInterval);
        }

        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)
            .await?;

        let file = Arc::new(Mutex::new(Some(file)));
        let shutdown = Arc::new(Notify::new());

        let syncer = tokio::spawn({
            let file = file.clone();
            let shutdown = shutdown.clone();
            async move { sync_periodically(file, flush_interval, shutdown).await }
        });

        info!(path = %path.display(), ?flush_interval, "append-only file opened");

        Ok(Self {
            path,
            file,
            shutdown,
            syncer: Mutex::new(Some(syncer)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends the wire encoding of `frame` to the file.
    ///
    /// The data is handed to the OS before returning but only reaches the disk on the next
    /// periodic sync or on [`Aof::close`].
    pub async fn write(&self, frame: &Frame) -> Result<(), AofError> {
        let mut file = self.file.lock().await;
        let file = file.as_mut().ok_or(AofError::Closed)?;

        file.write_all(&frame.serialize()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Reads the file from the beginning and calls `callback` with every request array, in the
    /// order they were appended. Returns the number of frames passed to `callback`.
    ///
    /// A frame cut short by the end of the file is reported as corruption.
    pub async fn replay<F>(&self, mut callback: F) -> Result<usize, AofError>
    where
        F: FnMut(Frame),
    {
        let mut file = self.file.lock().await;
        let file = file.as_mut().ok_or(AofError::Closed)?;

        file.seek(SeekFrom::Start(0)).await?;

        let mut frames = FramedRead::new(file, FrameCodec::new());
        let mut count = 0;

        while let Some(frame) = frames.next().await {
            match frame? {
                frame @ Frame::Array(_) => {
                    callback(frame);
                    count += 1;
                }
                frame => warn!(%frame, "skipping non-array frame in append-only file"),
            }
        }

        debug!(path = %self.path.display(), count, "append-only file replayed");

        Ok(count)
    }

    /// Stops the sync task, syncs pending data to disk and releases the file.
    ///
    /// Closing an already closed file returns [`AofError::Closed`].
    pub async fn close(&self) -> Result<(), AofError> {
        if let Some(syncer) = self.syncer.lock().await.take() {
            self.shutdown.notify_one();
            if let Err(e) = syncer.await {
                error!(error = %e, "append-only file sync task failed");
            }
        }

        let mut file = self.file.lock().await.take().ok_or(AofError::Closed)?;
        file.flush().await?;
        file.sync_all().await?;

        info!(path = %self.path.display(), "append-only file closed");

        Ok(())
    }
}

impl Drop for Aof {
    fn drop(&mut self) {
        // Lets the sync task exit when the log is dropped without being closed.
        self.shutdown.notify_one();
    }
}

async fn sync_periodically(
    file: Arc<Mutex<Option<File>>>,
    interval: Duration,
    shutdown: Arc<Notify>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.tick().await; // skip the immediate first tick

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.notified() => break,
        }

        let mut file = file.lock().await;
        let Some(file) = file.as_mut() else {
            break;
        };

        if let Err(e) = file.sync_all().await {
            error!(error = %e, "failed to sync append-only file to disk");
        }
    }
}
