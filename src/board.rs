use std::collections::HashMap;

use crate::progress::{ProgressEvent, Transfer};

/// Represents the current state of one title
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowStatus {
    /// Bytes are still arriving
    Downloading,
    /// File has been written
    Finished,
}

/// Data structure for one progress row in the UI
#[derive(Debug, Clone, PartialEq)]
pub struct TitleRow {
    pub title: String,
    pub status: RowStatus,
    /// Progress percentage (0 to 100)
    pub percent: f32,
    pub speed: f64,
    pub total_size: Option<u64>,
    pub downloaded: u64,
    /// HH:MM:SS
    pub eta: String,
}

impl TitleRow {
    fn new(title: String) -> Self {
        Self {
            title,
            status: RowStatus::Downloading,
            percent: 0.0,
            speed: 0.0,
            total_size: None,
            downloaded: 0,
            eta: "00:00:00".to_string(),
        }
    }

    fn apply_transfer(&mut self, t: Transfer) {
        self.status = RowStatus::Downloading;
        self.percent = t.percent;
        self.speed = t.speed;
        self.total_size = t.total_size;
        self.downloaded = t.downloaded;
        self.eta = t.eta();
    }

    fn finish(&mut self) {
        self.status = RowStatus::Finished;
        self.percent = 100.0;
        self.speed = 0.0;
        if let Some(total) = self.total_size {
            self.downloaded = total;
        }
        self.eta = "00:00:00".to_string();
    }
}

/// How the last job ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    Completed,
    Failed(String),
}

/// Rows of the current job in arrival order, keyed by title.
#[derive(Debug, Default)]
pub struct ProgressBoard {
    rows: Vec<TitleRow>,
    by_title: HashMap<String, usize>,
    outcome: Option<JobOutcome>,
}

impl ProgressBoard {
    pub fn clear(&mut self) {
        self.rows.clear();
        self.by_title.clear();
        self.outcome = None;
    }

    pub fn rows(&self) -> &[TitleRow] {
        &self.rows
    }

    pub fn outcome(&self) -> Option<&JobOutcome> {
        self.outcome.as_ref()
    }

    /// Routes an event to its row, creating the row on first sight of a title.
    pub fn apply(&mut self, event: ProgressEvent) {
        match event {
            ProgressEvent::Downloading(t) => {
                let title = t.title.clone();
                self.row_mut(title).apply_transfer(t);
            }
            ProgressEvent::Finished { title } => self.row_mut(title).finish(),
            ProgressEvent::Completed => self.outcome = Some(JobOutcome::Completed),
            ProgressEvent::Error(msg) => self.outcome = Some(JobOutcome::Failed(msg)),
        }
    }

    /// Marks the job failed if it has not reported an outcome yet.
    pub fn fail_if_unfinished(&mut self, msg: &str) {
        if self.outcome.is_none() {
            self.outcome = Some(JobOutcome::Failed(msg.to_string()));
        }
    }

    fn row_mut(&mut self, title: String) -> &mut TitleRow {
        let idx = match self.by_title.get(&title) {
            Some(&idx) => idx,
            None => {
                self.rows.push(TitleRow::new(title.clone()));
                self.by_title.insert(title, self.rows.len() - 1);
                self.rows.len() - 1
            }
        };
        &mut self.rows[idx]
    }
}
