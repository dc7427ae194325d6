use std::fmt;
use std::path::PathBuf;

/// Target video resolution offered in the quality picker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    P360,
    P480,
    #[default]
    P720,
    P1080,
    /// 2K
    P1440,
    /// 4K
    P2160,
    /// 8K
    P4320,
}

impl Quality {
    pub const ALL: [Quality; 7] = [
        Quality::P360,
        Quality::P480,
        Quality::P720,
        Quality::P1080,
        Quality::P1440,
        Quality::P2160,
        Quality::P4320,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Quality::P360 => "360p",
            Quality::P480 => "480p",
            Quality::P720 => "720p",
            Quality::P1080 => "1080p",
            Quality::P1440 => "1440p",
            Quality::P2160 => "2160p",
            Quality::P4320 => "4320p",
        }
    }

    /// Maximum vertical resolution in pixels
    pub fn height(self) -> u32 {
        match self {
            Quality::P360 => 360,
            Quality::P480 => 480,
            Quality::P720 => 720,
            Quality::P1080 => 1080,
            Quality::P1440 => 1440,
            Quality::P2160 => 2160,
            Quality::P4320 => 4320,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim();
        Self::ALL.into_iter().find(|q| q.label() == label)
    }

    /// Like [`Quality::from_label`], but unknown labels become 720p.
    pub fn from_label_or_default(label: &str) -> Self {
        Self::from_label(label).unwrap_or_default()
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Whether to keep the video stream or only extract audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadType {
    /// Best video plus best audio, muxed into one container
    #[default]
    Combined,
    /// Best audio, transcoded to the chosen codec and bitrate
    AudioOnly,
}

impl DownloadType {
    pub const ALL: [DownloadType; 2] = [DownloadType::Combined, DownloadType::AudioOnly];

    pub fn label(self) -> &'static str {
        match self {
            DownloadType::Combined => "Video + Audio",
            DownloadType::AudioOnly => "Audio Only",
        }
    }
}

impl fmt::Display for DownloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Output container (combined mode) or audio codec (audio-only mode)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Mp4,
    Webm,
    Mp3,
    M4a,
}

impl FileFormat {
    pub fn label(self) -> &'static str {
        match self {
            FileFormat::Mp4 => "MP4",
            FileFormat::Webm => "WEBM",
            FileFormat::Mp3 => "MP3",
            FileFormat::M4a => "M4A",
        }
    }

    /// Lowercase name as yt-dlp expects it
    pub fn extension(self) -> &'static str {
        match self {
            FileFormat::Mp4 => "mp4",
            FileFormat::Webm => "webm",
            FileFormat::Mp3 => "mp3",
            FileFormat::M4a => "m4a",
        }
    }

    /// Formats offered for a download type. The first one is the default.
    pub fn for_type(download_type: DownloadType) -> &'static [FileFormat] {
        match download_type {
            DownloadType::Combined => &[FileFormat::Mp4, FileFormat::Webm],
            DownloadType::AudioOnly => &[FileFormat::Mp3, FileFormat::M4a],
        }
    }

    pub fn default_for(download_type: DownloadType) -> Self {
        Self::for_type(download_type)[0]
    }

    pub fn belongs_to(self, download_type: DownloadType) -> bool {
        Self::for_type(download_type).contains(&self)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Bitrate requested when transcoding audio
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioQuality {
    #[default]
    K128,
    K192,
    K256,
    K320,
}

impl AudioQuality {
    pub const ALL: [AudioQuality; 4] = [
        AudioQuality::K128,
        AudioQuality::K192,
        AudioQuality::K256,
        AudioQuality::K320,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AudioQuality::K128 => "128k",
            AudioQuality::K192 => "192k",
            AudioQuality::K256 => "256k",
            AudioQuality::K320 => "320k",
        }
    }
}

impl fmt::Display for AudioQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One user request, frozen at the moment the Download button is clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobConfig {
    /// Video or playlist URL
    pub url: String,
    /// Destination folder
    pub folder: PathBuf,
    pub quality: Quality,
    pub download_type: DownloadType,
    pub file_format: FileFormat,
    pub audio_quality: AudioQuality,
    /// Overrides the cookie file from the settings when set
    pub cookiefile: Option<PathBuf>,
}

impl JobConfig {
    /// The chosen format, or the type's default if it does not fit the type.
    pub fn effective_format(&self) -> FileFormat {
        if self.file_format.belongs_to(self.download_type) {
            self.file_format
        } else {
            FileFormat::default_for(self.download_type)
        }
    }
}
