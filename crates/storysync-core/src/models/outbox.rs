use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::PayloadDecodeError;

/// File name used when a queued photo arrives without one.
const DEFAULT_PHOTO_NAME: &str = "photo.png";

/// Content type used when neither the item nor the data URL names one.
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// A photo captured while offline, held inline as a data URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhotoBlob {
    pub data_url: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub content_type: Option<String>,
}

/// Binary attachment reconstructed from a [`PhotoBlob`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl PhotoBlob {
    /// Decode the inline data back into the original file.
    pub fn decode(&self) -> Result<Attachment, PayloadDecodeError> {
        let (media_type, bytes) = parse_data_url(&self.data_url)?;

        let file_name = non_empty(self.name.as_deref())
            .unwrap_or(DEFAULT_PHOTO_NAME)
            .to_string();
        let content_type = non_empty(self.content_type.as_deref())
            .or(non_empty(media_type.as_deref()))
            .unwrap_or(FALLBACK_CONTENT_TYPE)
            .to_string();

        Ok(Attachment {
            file_name,
            content_type,
            bytes,
        })
    }
}

/// A story the foreground could not submit, as queued over the message channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStory {
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_coordinate")]
    pub lon: Option<f64>,
    #[serde(default)]
    pub photo_blob: Option<PhotoBlob>,
    /// Bearer token to replay the submission with, if the page supplied one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

/// A queued story as stored in the outbox.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxItem {
    pub id: i64,
    pub story: NewStory,
    pub queued_at: DateTime<Utc>,
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Split a `data:[<media type>][;base64],<data>` URL into its media type and
/// decoded bytes.
fn parse_data_url(url: &str) -> Result<(Option<String>, Vec<u8>), PayloadDecodeError> {
    let rest = url
        .get(..5)
        .filter(|scheme| scheme.eq_ignore_ascii_case("data:"))
        .map(|_| &url[5..])
        .ok_or_else(|| PayloadDecodeError::InvalidDataUrl(preview(url)))?;

    let (meta, data) = rest
        .split_once(',')
        .ok_or_else(|| PayloadDecodeError::InvalidDataUrl(preview(url)))?;

    let mut params = meta.split(';');
    let media_type = params
        .next()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string);
    let is_base64 = params.any(|p| p.trim().eq_ignore_ascii_case("base64"));

    let bytes = if is_base64 {
        let compact: String = data.chars().filter(|c| !c.is_whitespace()).collect();
        STANDARD.decode(compact)?
    } else {
        data.as_bytes().to_vec()
    };

    Ok((media_type, bytes))
}

fn preview(url: &str) -> String {
    url.chars().take(32).collect()
}

/// Coordinates come from form fields and may be numbers, numeric strings,
/// empty strings or null.
fn lenient_coordinate<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Coordinate {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Coordinate>::deserialize(deserializer)? {
        Some(Coordinate::Number(n)) if n.is_finite() => Some(n),
        Some(Coordinate::Text(s)) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    })
}
