use std::io::Write;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::error::DownloadError;
use crate::progress::{ProgressEvent, SharedProgressReporter};
use crate::source::AudioStream;

const CHUNK_SIZE: usize = 32 * 1024;

/// Paces a download so it takes at least a fifth of the track's playback
/// time, mimicking a client that buffers ahead of playback.
#[derive(Debug, Clone)]
pub struct Throttle {
    target: Duration,
}

impl Throttle {
    pub fn new(track_duration_ms: u64) -> Self {
        Self {
            target: Duration::from_millis(track_duration_ms / 5),
        }
    }

    /// How much longer the download should already have taken, given the
    /// current byte position. None when we are on or behind schedule.
    pub fn required_delay(
        &self,
        bytes_downloaded: u64,
        total_bytes: u64,
        elapsed: Duration,
    ) -> Option<Duration> {
        if total_bytes == 0 {
            return None;
        }

        let fraction = bytes_downloaded as f64 / total_bytes as f64;
        let want = self.target.mul_f64(fraction);
        want.checked_sub(elapsed).filter(|d| !d.is_zero())
    }
}

/// Drain an audio stream into `dest`, optionally pacing the reads.
///
/// The librespot reader blocks while fetching, so the whole loop runs on the
/// blocking thread pool. Returns the number of bytes written.
pub async fn download_audio(
    stream: AudioStream,
    dest: PathBuf,
    throttle: Option<Throttle>,
    title: String,
    reporter: SharedProgressReporter,
) -> Result<u64, DownloadError> {
    let total_bytes = stream.total_size;
    let mut reader = stream.reader;

    tokio::task::spawn_blocking(move || {
        let mut file =
            std::fs::File::create(&dest).map_err(|e| DownloadError::FileCreateFailed {
                path: dest.clone(),
                source: e,
            })?;

        let started = Instant::now();
        let mut buf = vec![0u8; CHUNK_SIZE];
        let mut downloaded: u64 = 0;

        loop {
            let n = reader.read(&mut buf).map_err(DownloadError::StreamRead)?;
            if n == 0 {
                break;
            }

            file.write_all(&buf[..n])
                .map_err(|e| DownloadError::FileWriteFailed {
                    path: dest.clone(),
                    source: e,
                })?;
            downloaded += n as u64;

            reporter.report(ProgressEvent::DownloadProgress {
                title: title.clone(),
                bytes_downloaded: downloaded,
                total_bytes,
            });

            if let Some(throttle) = &throttle
                && let Some(delay) =
                    throttle.required_delay(downloaded, total_bytes, started.elapsed())
            {
                std::thread::sleep(delay);
            }
        }

        file.flush().map_err(|e| DownloadError::FileWriteFailed {
            path: dest.clone(),
            source: e,
        })?;

        reporter.report(ProgressEvent::DownloadCompleted {
            title,
            elapsed_secs: started.elapsed().as_secs_f64(),
        });

        Ok(downloaded)
    })
    .await
    .map_err(|_| DownloadError::TaskAborted)?
}
