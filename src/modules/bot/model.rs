use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use utoipa::ToSchema;
use uuid::Uuid;

/// Output kind/quality requested for a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Video360,
    Video720,
    Video1080,
    Video1440,
    AudioMp3,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VariantError {
    #[error("unknown variant: {0}")]
    Unknown(String),
}

impl Variant {
    pub const ALL: [Variant; 5] = [
        Variant::Video360,
        Variant::Video720,
        Variant::Video1080,
        Variant::Video1440,
        Variant::AudioMp3,
    ];

    /// Short code carried in callback data.
    pub fn code(self) -> &'static str {
        match self {
            Variant::Video360 => "360",
            Variant::Video720 => "720",
            Variant::Video1080 => "1080",
            Variant::Video1440 => "1440",
            Variant::AudioMp3 => "mp3",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Variant::Video360 => "Video 360p",
            Variant::Video720 => "HD 720p",
            Variant::Video1080 => "Full HD 1080p",
            Variant::Video1440 => "2K 1440p",
            Variant::AudioMp3 => "Audio MP3",
        }
    }

    /// Height cap for video variants, `None` for audio.
    pub fn max_height(self) -> Option<u32> {
        match self {
            Variant::Video360 => Some(360),
            Variant::Video720 => Some(720),
            Variant::Video1080 => Some(1080),
            Variant::Video1440 => Some(1440),
            Variant::AudioMp3 => None,
        }
    }

    pub fn is_audio(self) -> bool {
        self.max_height().is_none()
    }
}

impl FromStr for Variant {
    type Err = VariantError;

    fn from_str(code: &str) -> Result<Self, Self::Err> {
        Variant::ALL
            .into_iter()
            .find(|v| v.code().eq_ignore_ascii_case(code.trim()))
            .ok_or_else(|| VariantError::Unknown(code.to_string()))
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// What a token stands for until the user picks a variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    pub url: String,
}

/// One unit of download work. Owned by the queue until a worker takes it.
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub chat_id: i64,
    pub url: String,
    pub variant: Variant,
    pub requested_at: OffsetDateTime,
    /// Previous failed runs of this job.
    pub attempts: u32,
}

impl Job {
    pub fn new(chat_id: i64, url: impl Into<String>, variant: Variant) -> Self {
        Self {
            id: Uuid::new_v4(),
            chat_id,
            url: url.into(),
            variant,
            requested_at: OffsetDateTime::now_utc(),
            attempts: 0,
        }
    }

    /// Same job, one attempt further along.
    pub fn next_attempt(&self) -> Self {
        Self {
            attempts: self.attempts + 1,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_round_trip_and_reject_unknown() {
        for v in Variant::ALL {
            assert_eq!(v.code().parse::<Variant>(), Ok(v));
        }
        assert_eq!("MP3".parse::<Variant>(), Ok(Variant::AudioMp3));
        assert_eq!(
            "4k".parse::<Variant>(),
            Err(VariantError::Unknown("4k".to_string()))
        );
        assert!("".parse::<Variant>().is_err());
    }

    #[test]
    fn next_attempt_keeps_identity() {
        let job = Job::new(42, "https://youtu.be/dQw4w9WgXcQ", Variant::Video720);
        let retry = job.next_attempt();

        assert_eq!(retry.id, job.id);
        assert_eq!(retry.attempts, 1);
        assert_eq!(retry.variant, Variant::Video720);
    }
}
