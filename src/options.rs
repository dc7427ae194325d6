//! Translation of a [`JobConfig`] into yt-dlp command-line options.

use std::path::PathBuf;

use crate::model::{DownloadType, JobConfig};
use crate::progress::progress_template;
use crate::settings::Settings;

/// Subfolder of the download folder that holds partial files
pub const TEMP_DIR_NAME: &str = "yt_temp";
pub const OUTPUT_TEMPLATE: &str = "%(title)s.%(ext)s";
pub const AUDIO_FORMAT_SELECTOR: &str = "bestaudio/best";

/// Best video no taller than `height` plus best audio; a single pre-muxed file under the
/// same bound as fallback.
pub fn video_format_selector(height: u32) -> String {
    format!("bestvideo[height<={height}]+bestaudio/best[height<={height}]")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcessor {
    /// Transcode to `codec` at `quality` (a bitrate such as `192k`)
    ExtractAudio { codec: String, quality: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YtDlpOptions {
    pub home_dir: PathBuf,
    pub temp_dir: PathBuf,
    pub output_template: String,
    pub format: String,
    pub merge_output_format: Option<String>,
    pub postprocessors: Vec<PostProcessor>,
    pub cookiefile: Option<PathBuf>,
    pub ffmpeg_location: Option<PathBuf>,
    /// Keep going when a playlist item fails
    pub ignore_errors: bool,
    pub cache_dir: bool,
    pub urls: Vec<String>,
}

impl YtDlpOptions {
    pub fn from_job(job: &JobConfig, settings: &Settings) -> Self {
        let format = job.effective_format();
        let (selector, merge_output_format, postprocessors) = match job.download_type {
            DownloadType::Combined => (
                video_format_selector(job.quality.height()),
                Some(format.extension().to_string()),
                Vec::new(),
            ),
            DownloadType::AudioOnly => (
                AUDIO_FORMAT_SELECTOR.to_string(),
                None,
                vec![PostProcessor::ExtractAudio {
                    codec: format.extension().to_string(),
                    quality: job.audio_quality.label().to_string(),
                }],
            ),
        };

        let cookiefile = job
            .cookiefile
            .clone()
            .or_else(|| settings.cookiefile().map(PathBuf::from));

        Self {
            home_dir: job.folder.clone(),
            temp_dir: job.folder.join(TEMP_DIR_NAME),
            output_template: OUTPUT_TEMPLATE.to_string(),
            format: selector,
            merge_output_format,
            postprocessors,
            cookiefile,
            ffmpeg_location: settings.ffmpeg_path().map(PathBuf::from),
            ignore_errors: true,
            cache_dir: false,
            urls: vec![job.url.clone()],
        }
    }

    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "--newline".to_owned(),
            "--progress".to_owned(),
            "--no-colors".to_owned(),
            "--progress-template".to_owned(),
            progress_template(),
            "-P".to_owned(),
            self.home_dir.display().to_string(),
            "-P".to_owned(),
            format!("temp:{}", self.temp_dir.display()),
            "-o".to_owned(),
            self.output_template.clone(),
            "-f".to_owned(),
            self.format.clone(),
        ];

        if let Some(container) = &self.merge_output_format {
            args.push("--merge-output-format".to_owned());
            args.push(container.clone());
        }

        for pp in &self.postprocessors {
            match pp {
                PostProcessor::ExtractAudio { codec, quality } => {
                    args.push("-x".to_owned());
                    args.push("--audio-format".to_owned());
                    args.push(codec.clone());
                    args.push("--audio-quality".to_owned());
                    args.push(quality.clone());
                }
            }
        }

        if let Some(cookies) = &self.cookiefile {
            args.push("--cookies".to_owned());
            args.push(cookies.display().to_string());
        }
        if let Some(ffmpeg) = &self.ffmpeg_location {
            args.push("--ffmpeg-location".to_owned());
            args.push(ffmpeg.display().to_string());
        }
        if self.ignore_errors {
            args.push("--ignore-errors".to_owned());
        }
        if !self.cache_dir {
            args.push("--no-cache-dir".to_owned());
        }

        args.push("--".to_owned());
        args.extend(self.urls.iter().cloned());
        args
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AudioQuality, FileFormat, Quality};

    fn job(download_type: DownloadType, file_format: FileFormat) -> JobConfig {
        JobConfig {
            url: "https://youtube.com/watch?v=X".into(),
            folder: PathBuf::from("/downloads"),
            quality: Quality::P1080,
            download_type,
            file_format,
            audio_quality: AudioQuality::K192,
            cookiefile: None,
        }
    }

    fn bare_settings() -> Settings {
        Settings {
            cookiefile: String::new(),
            ffmpeg_path: String::new(),
            ..Settings::default()
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn combined_1080p_mp4_bounds_height_and_merges() {
        let opts = YtDlpOptions::from_job(&job(DownloadType::Combined, FileFormat::Mp4), &bare_settings());
        assert_eq!(opts.format, "bestvideo[height<=1080]+bestaudio/best[height<=1080]");
        assert_eq!(opts.merge_output_format.as_deref(), Some("mp4"));
        assert!(opts.postprocessors.is_empty());

        let args = opts.to_args();
        assert_eq!(value_after(&args, "-f"), Some(opts.format.as_str()));
        assert_eq!(value_after(&args, "--merge-output-format"), Some("mp4"));
        assert_eq!(args.last().map(String::as_str), Some("https://youtube.com/watch?v=X"));
        assert!(!args.contains(&"-x".to_owned()));
    }

    #[test]
    fn every_quality_bounds_video_height() {
        for quality in Quality::ALL {
            let mut j = job(DownloadType::Combined, FileFormat::Webm);
            j.quality = quality;
            let opts = YtDlpOptions::from_job(&j, &bare_settings());
            let bound = format!("[height<={}]", quality.height());
            assert!(opts.format.starts_with(&format!("bestvideo{bound}+bestaudio")));
            assert!(opts.format.ends_with(&bound));
            assert_eq!(opts.merge_output_format.as_deref(), Some("webm"));
        }
    }

    #[test]
    fn audio_only_extracts_with_codec_and_bitrate() {
        for (format, codec) in [(FileFormat::Mp3, "mp3"), (FileFormat::M4a, "m4a")] {
            for aq in AudioQuality::ALL {
                let mut j = job(DownloadType::AudioOnly, format);
                j.audio_quality = aq;
                let opts = YtDlpOptions::from_job(&j, &bare_settings());
                assert_eq!(opts.format, "bestaudio/best");
                assert_eq!(opts.merge_output_format, None);
                assert_eq!(
                    opts.postprocessors,
                    vec![PostProcessor::ExtractAudio {
                        codec: codec.into(),
                        quality: aq.label().into(),
                    }]
                );

                let args = opts.to_args();
                assert!(args.contains(&"-x".to_owned()));
                assert_eq!(value_after(&args, "--audio-format"), Some(codec));
                assert_eq!(value_after(&args, "--audio-quality"), Some(aq.label()));
            }
        }
    }

    #[test]
    fn common_options_follow_folder_and_settings() {
        let settings = Settings {
            cookiefile: "/secrets/cookies.txt".into(),
            ffmpeg_path: "/opt/ffmpeg/bin/ffmpeg".into(),
            ..Settings::default()
        };
        let opts = YtDlpOptions::from_job(&job(DownloadType::Combined, FileFormat::Mp4), &settings);
        assert_eq!(opts.temp_dir, PathBuf::from("/downloads/yt_temp"));

        let args = opts.to_args();
        assert_eq!(value_after(&args, "-o"), Some("%(title)s.%(ext)s"));
        assert_eq!(value_after(&args, "--cookies"), Some("/secrets/cookies.txt"));
        assert_eq!(value_after(&args, "--ffmpeg-location"), Some("/opt/ffmpeg/bin/ffmpeg"));
        assert!(args.contains(&"-P".to_owned()));
        assert!(args.contains(&"/downloads".to_owned()));
        assert!(args.contains(&"temp:/downloads/yt_temp".to_owned()));
        assert!(args.contains(&"--ignore-errors".to_owned()));
        assert!(args.contains(&"--no-cache-dir".to_owned()));
    }

    #[test]
    fn job_cookiefile_overrides_settings() {
        let settings = Settings {
            cookiefile: "/from/settings.txt".into(),
            ..bare_settings()
        };
        let mut j = job(DownloadType::Combined, FileFormat::Mp4);
        j.cookiefile = Some(PathBuf::from("/from/job.txt"));
        let args = YtDlpOptions::from_job(&j, &settings).to_args();
        assert_eq!(value_after(&args, "--cookies"), Some("/from/job.txt"));
    }

    #[test]
    fn unset_paths_are_left_out() {
        let args = YtDlpOptions::from_job(&job(DownloadType::AudioOnly, FileFormat::Mp3), &bare_settings())
            .to_args();
        assert!(!args.contains(&"--cookies".to_owned()));
        assert!(!args.contains(&"--ffmpeg-location".to_owned()));
    }
}
