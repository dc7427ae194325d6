use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yt-dlp error: {0}")]
    YtDlp(String),

    #[error("GUI error: {0}")]
    Gui(String),

    #[error("Runtime error: {0}")]
    Runtime(String),
}

pub type AppResult<T> = Result<T, AppError>;
