use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::registry::{ProgressPublisher, UploadProgress};

/// bytes read from the incoming stream per iteration
pub const CHUNK_SIZE: usize = 10 * 1024;

/// drains one upload into its sink, publishing progress after every chunk.
///
/// the worker owns the authoritative `UploadProgress`; the publisher only ever
/// sees copies handed to it by `publish`.
pub struct UploadWorker<'a, P: ProgressPublisher + ?Sized> {
    publisher: &'a P,
    progress: UploadProgress,
    chunk_size: usize,
}

impl<'a, P: ProgressPublisher + ?Sized> UploadWorker<'a, P> {
    pub fn new(publisher: &'a P, progress: UploadProgress) -> Self {
        Self {
            publisher,
            progress,
            chunk_size: CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// run until end of stream, the first read/write error, or a chunk that would
    /// overrun the declared size, then publish the terminal state and return it.
    /// partially written bytes stay in the sink.
    pub async fn run<R, W>(mut self, reader: R, sink: W) -> UploadProgress
    where
        R: AsyncRead,
        W: AsyncWrite,
    {
        tokio::pin!(reader);
        tokio::pin!(sink);

        tracing::debug!(
            "Starting upload {} ({} bytes declared)",
            self.progress.id,
            self.progress.total_size
        );

        let mut buffer = vec![0u8; self.chunk_size];
        loop {
            let n = match reader.read(&mut buffer).await {
                Ok(n) => n,
                Err(e) => {
                    tracing::warn!("Failed to read upload {}: {}", self.progress.id, e);
                    self.progress.fail(e.to_string());
                    break;
                }
            };

            if n == 0 {
                match sink.flush().await {
                    Ok(()) => {
                        tracing::info!(
                            "✅ Upload complete: {} ({} bytes)",
                            self.progress.id,
                            self.progress.bytes_transferred
                        );
                        self.progress.complete();
                    }
                    Err(e) => {
                        tracing::warn!("Failed to flush upload {}: {}", self.progress.id, e);
                        self.progress.fail(e.to_string());
                    }
                }
                break;
            }

            // bytes_transferred never passes the declared size
            if self.progress.bytes_transferred + n as u64 > self.progress.total_size {
                tracing::warn!(
                    "Upload {} is larger than its declared {} bytes",
                    self.progress.id,
                    self.progress.total_size
                );
                self.progress.fail(format!(
                    "Upload exceeds declared size of {} bytes",
                    self.progress.total_size
                ));
                break;
            }

            if let Err(e) = sink.write_all(&buffer[..n]).await {
                tracing::warn!("Failed to write upload {}: {}", self.progress.id, e);
                self.progress.fail(e.to_string());
                break;
            }

            self.progress.record_chunk(n);
            tracing::trace!(
                "Upload {}: {}/{} bytes",
                self.progress.id,
                self.progress.bytes_transferred,
                self.progress.total_size
            );
            self.publisher.publish(&self.progress);
        }

        self.publisher.publish(&self.progress);
        self.progress
    }
}
