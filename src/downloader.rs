use std::{
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    process::Stdio,
};

use log::{debug, error, info, warn};
use rust_embed::RustEmbed;
use tokio::{
    io::{AsyncBufRead, AsyncBufReadExt, AsyncRead, BufReader},
    process::Command,
    sync::mpsc::UnboundedSender,
};

use crate::error::{AppError, AppResult};
use crate::model::JobConfig;
use crate::options::YtDlpOptions;
use crate::progress::{parse_progress_from_line, ProgressEvent};
use crate::settings::Settings;

/// Environment variable pointing at a yt-dlp binary to use instead of the bundled one
pub const BINARY_ENV: &str = "YTDL_BINARY";

#[derive(RustEmbed)]
#[folder = "assets/"]
pub struct Asset;

fn binary_name() -> &'static str {
    if cfg!(target_os = "windows") { "yt-dlp.exe" } else { "yt-dlp" }
}

/// Finds the yt-dlp executable: `$YTDL_BINARY`, then the embedded copy (extracted to the
/// temp dir on first use), then whatever `yt-dlp` is on `PATH`.
pub fn resolve_binary() -> AppResult<PathBuf> {
    if let Some(path) = std::env::var_os(BINARY_ENV).filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(path));
    }

    let bin = binary_name();
    let Some(data) = Asset::get(bin) else {
        return Ok(PathBuf::from(bin));
    };

    let tmp = std::env::temp_dir().join(bin);
    if !tmp.exists() {
        debug!("extracting bundled yt-dlp to {}", tmp.display());
        let mut f = File::create(&tmp)?;
        f.write_all(&data.data)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&tmp, std::fs::Permissions::from_mode(0o755))?;
        }
    }
    Ok(tmp)
}

/// Counters gathered while relaying yt-dlp's stdout
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RelayStats {
    pub transfers: usize,
    pub finished: usize,
}

/// Runs one job to the end. Always sends exactly one terminal event.
pub async fn spawn_download(
    job: JobConfig,
    settings: Settings,
    progress_tx: UnboundedSender<ProgressEvent>,
) {
    info!("starting job for {} into {}", job.url, job.folder.display());
    let result = match resolve_binary() {
        Ok(bin) => run_job(&bin, &job, &settings, &progress_tx).await,
        Err(e) => Err(e),
    };
    let event = match result {
        Ok(stats) => {
            info!(
                "job for {} completed ({} file(s), {} progress updates)",
                job.url, stats.finished, stats.transfers
            );
            ProgressEvent::Completed
        }
        Err(e) => {
            error!("job for {} failed: {}", job.url, e);
            ProgressEvent::Error(e.to_string())
        }
    };
    let _ = progress_tx.send(event);
}

async fn run_job(
    bin: &Path,
    job: &JobConfig,
    settings: &Settings,
    progress_tx: &UnboundedSender<ProgressEvent>,
) -> AppResult<RelayStats> {
    let options = YtDlpOptions::from_job(job, settings);
    tokio::fs::create_dir_all(&options.temp_dir).await?;

    let args = options.to_args();
    debug!("{} {}", bin.display(), args.join(" "));

    let mut child = Command::new(bin)
        .args(&args)
        .env("PYTHONIOENCODING", "utf-8")
        .env("PYTHONUTF8", "1")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| AppError::YtDlp(format!("failed to start {}: {}", bin.display(), e)))?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| AppError::YtDlp("stdout was not captured".into()))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| AppError::YtDlp("stderr was not captured".into()))?;

    let stderr_task = tokio::spawn(collect_errors(stderr));
    let stats = relay_progress(BufReader::new(stdout), progress_tx).await?;
    let status = child.wait().await?;
    let last_error = stderr_task.await.unwrap_or_default();

    job_outcome(status.success(), &status.to_string(), stats, last_error)
}

/// Decides whether a finished yt-dlp run counts as a success. Items skipped under
/// `--ignore-errors` make yt-dlp exit non-zero; that is only a failure when nothing
/// was downloaded at all.
fn job_outcome(
    success: bool,
    status: &str,
    stats: RelayStats,
    last_error: Option<String>,
) -> AppResult<RelayStats> {
    if success {
        return Ok(stats);
    }
    if stats.finished > 0 {
        warn!("yt-dlp exited with {} after {} file(s); some items were skipped", status, stats.finished);
        return Ok(stats);
    }
    Err(AppError::YtDlp(
        last_error.unwrap_or_else(|| format!("yt-dlp exited with {status}")),
    ))
}

/// Reads one line, replacing bytes that are not valid UTF-8. Titles printed in a
/// legacy codepage must not end the stream.
async fn next_lossy_line<R>(reader: &mut R, buf: &mut Vec<u8>) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    buf.clear();
    if reader.read_until(b'\n', buf).await? == 0 {
        return Ok(None);
    }
    let line = String::from_utf8_lossy(buf);
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

/// Forwards every progress line on `reader` as an event.
pub async fn relay_progress<R>(
    mut reader: R,
    progress_tx: &UnboundedSender<ProgressEvent>,
) -> std::io::Result<RelayStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = RelayStats::default();
    let mut buf = Vec::new();
    while let Some(line) = next_lossy_line(&mut reader, &mut buf).await? {
        match parse_progress_from_line(&line) {
            Some(event) => {
                match &event {
                    ProgressEvent::Downloading(_) => stats.transfers += 1,
                    ProgressEvent::Finished { title } => {
                        stats.finished += 1;
                        info!("finished: {title}");
                    }
                    _ => {}
                }
                // The UI may already be gone; keep draining so yt-dlp never blocks.
                let _ = progress_tx.send(event);
            }
            None => debug!("yt-dlp> {}", line),
        }
    }
    Ok(stats)
}

/// Logs yt-dlp's stderr and returns the last `ERROR:` message, if any.
pub async fn collect_errors<R>(reader: R) -> Option<String>
where
    R: AsyncRead + Unpin,
{
    let mut last_error = None;
    let mut reader = BufReader::new(reader);
    let mut buf = Vec::new();
    loop {
        match next_lossy_line(&mut reader, &mut buf).await {
            Ok(Some(line)) => {
                let line = line.trim();
                if let Some(msg) = line.strip_prefix("ERROR:") {
                    warn!("yt-dlp: {}", line);
                    last_error = Some(msg.trim().to_string());
                } else if line.starts_with("WARNING:") {
                    warn!("yt-dlp: {}", line);
                } else if !line.is_empty() {
                    debug!("yt-dlp stderr> {}", line);
                }
            }
            Ok(None) => break,
            Err(e) => {
                warn!("failed to read yt-dlp stderr: {}", e);
                break;
            }
        }
    }
    last_error
}
