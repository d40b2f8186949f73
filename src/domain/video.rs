use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Lifecycle of a submitted video as seen by status queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStatus {
    Processing,
    ReadyToDownload,
    Error,
}

impl VideoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoStatus::Processing => "processing",
            VideoStatus::ReadyToDownload => "ready_to_download",
            VideoStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, VideoStatus::Processing)
    }

    /// Only `processing -> ready_to_download` and `processing -> error` exist.
    pub fn can_transition_to(&self, next: VideoStatus) -> bool {
        matches!(
            (self, next),
            (VideoStatus::Processing, VideoStatus::ReadyToDownload)
                | (VideoStatus::Processing, VideoStatus::Error)
        )
    }
}

impl fmt::Display for VideoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VideoStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "processing" => Ok(VideoStatus::Processing),
            "ready_to_download" => Ok(VideoStatus::ReadyToDownload),
            "error" => Ok(VideoStatus::Error),
            other => Err(format!("unknown video status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("invalid status transition {from} -> {to}")]
pub struct TransitionError {
    pub from: VideoStatus,
    pub to: VideoStatus,
}

/// Metadata record persisted for every accepted upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoRecord {
    pub id: String,
    pub owner_id: String,
    pub status: VideoStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl VideoRecord {
    pub fn new(owner_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            owner_id: owner_id.into(),
            status: VideoStatus::Processing,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn transition(&mut self, next: VideoStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn asset_file_name(&self) -> String {
        asset_file_name(&self.id)
    }

    pub fn archive_key(&self) -> String {
        archive_key(&self.id)
    }
}

/// Projection returned by owner listings; never carries asset data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoSummary {
    pub owner_id: String,
    pub id: String,
    pub status: VideoStatus,
}

impl From<&VideoRecord> for VideoSummary {
    fn from(record: &VideoRecord) -> Self {
        Self {
            owner_id: record.owner_id.clone(),
            id: record.id.clone(),
            status: record.status,
        }
    }
}

pub fn asset_file_name(id: &str) -> String {
    format!("{}.mp4", id)
}

pub fn archive_key(id: &str) -> String {
    format!("{}.zip", id)
}
