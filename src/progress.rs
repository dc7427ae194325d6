use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

/// Prefix that marks the lines produced by [`progress_template`]
pub const PROGRESS_MARKER: &str = "YTDL_PROGRESS";

/// `--progress-template` value. The filename goes last since it may contain `|`.
pub fn progress_template() -> String {
    format!(
        "download:{PROGRESS_MARKER}|%(progress.status)s|%(progress._percent_str)s|%(progress.speed)s\
         |%(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress.downloaded_bytes)s\
         |%(progress.filename)s"
    )
}

/// A snapshot of one file being transferred
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub title: String,
    /// 0 to 100
    pub percent: f32,
    /// Bytes per second, 0 when unknown
    pub speed: f64,
    /// Exact size, or yt-dlp's estimate when the exact one is unknown
    pub total_size: Option<u64>,
    pub downloaded: u64,
}

impl Transfer {
    /// Seconds left, or 0 when speed or size is unknown.
    pub fn eta_secs(&self) -> u64 {
        match self.total_size {
            Some(total) if self.speed > 0.0 => {
                let remaining = total.saturating_sub(self.downloaded);
                (remaining as f64 / self.speed).round() as u64
            }
            _ => 0,
        }
    }

    pub fn eta(&self) -> String {
        format_hms(self.eta_secs())
    }
}

/// What the runner tells the UI
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Downloading(Transfer),
    /// One file is fully on disk
    Finished { title: String },
    /// The whole job ended successfully
    Completed,
    /// The whole job failed
    Error(String),
}

impl ProgressEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Completed | ProgressEvent::Error(_))
    }
}

pub fn parse_progress_from_line(line: &str) -> Option<ProgressEvent> {
    let line = strip_ansi(line);
    let rest = line.trim().strip_prefix(PROGRESS_MARKER)?.strip_prefix('|')?;

    let mut fields = rest.splitn(7, '|');
    let status = fields.next()?.trim();
    let percent_str = fields.next()?;
    let speed = parse_number(fields.next()?).unwrap_or(0.0);
    let total_bytes = parse_number(fields.next()?);
    let estimate = parse_number(fields.next()?);
    let downloaded = parse_number(fields.next()?).unwrap_or(0.0) as u64;
    let title = title_from_filename(fields.next()?);

    match status {
        "downloading" => {
            let total_size = total_bytes.or(estimate).map(|b| b as u64);
            let percent = parse_percent(percent_str)
                .or_else(|| {
                    total_size
                        .filter(|t| *t > 0)
                        .map(|t| (downloaded as f64 / t as f64 * 100.0) as f32)
                })
                .unwrap_or(0.0)
                .clamp(0.0, 100.0);
            Some(ProgressEvent::Downloading(Transfer {
                title,
                percent,
                speed,
                total_size,
                downloaded,
            }))
        }
        "finished" => Some(ProgressEvent::Finished { title }),
        _ => None,
    }
}

/// yt-dlp prints `NA` (or `None`) for fields it does not know yet.
fn parse_number(field: &str) -> Option<f64> {
    field.trim().parse::<f64>().ok().filter(|v| v.is_finite() && *v >= 0.0)
}

fn parse_percent(field: &str) -> Option<f32> {
    field.trim().trim_end_matches('%').trim().parse::<f32>().ok()
}

fn strip_ansi(line: &str) -> std::borrow::Cow<'_, str> {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let re = ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*[A-Za-z]").expect("valid regex"));
    re.replace_all(line, "")
}

/// Row title for a file: the base name without extension or `.f<format id>` suffix,
/// so the video and audio streams of one item share a row.
pub fn title_from_filename(filename: &str) -> String {
    static FORMAT_ID: OnceLock<Regex> = OnceLock::new();
    let re = FORMAT_ID.get_or_init(|| Regex::new(r"\.f\d+(-\w+)?$").expect("valid regex"));

    let filename = filename.trim();
    let stem = Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| filename.to_string());
    re.replace(&stem, "").into_owned()
}

pub fn format_hms(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}

pub fn format_speed(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec.max(0.0) as u64))
}
