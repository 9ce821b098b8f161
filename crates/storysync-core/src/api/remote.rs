use async_trait::async_trait;

use crate::error::PayloadDecodeError;
use crate::models::{Attachment, HttpRequest, HttpResponse, NewStory, PushSubscriptionRecord};

use super::ApiError;

/// Everything the engine needs from the network.
///
/// `fetch` returns `Ok` for any HTTP status; only a transport failure is an
/// `Err`. The remaining calls fail on non-success statuses as well.
#[async_trait]
pub trait RemoteApi: Send + Sync {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError>;

    /// `POST /v1/stories` as multipart form data.
    async fn submit_story(&self, story: &StorySubmission) -> Result<(), ApiError>;

    /// `POST /v1/notifications/subscribe`.
    async fn register_push(
        &self,
        token: &str,
        subscription: &PushSubscriptionRecord,
    ) -> Result<(), ApiError>;

    /// `DELETE /v1/notifications/subscribe`.
    async fn deregister_push(&self, token: &str, endpoint: &str) -> Result<(), ApiError>;
}

/// A story submission rebuilt from a queued item.
#[derive(Debug, Clone, PartialEq)]
pub struct StorySubmission {
    pub description: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub photo: Option<Attachment>,
    pub token: Option<String>,
}

impl StorySubmission {
    pub fn from_story(story: &NewStory) -> Result<Self, PayloadDecodeError> {
        let photo = story
            .photo_blob
            .as_ref()
            .filter(|blob| !blob.data_url.is_empty())
            .map(|blob| blob.decode())
            .transpose()?;

        Ok(Self {
            description: Some(story.description.clone()).filter(|d| !d.is_empty()),
            lat: story.lat,
            lon: story.lon,
            photo,
            token: story.token.clone().filter(|t| !t.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PhotoBlob;

    #[test]
    fn test_submission_from_story_decodes_photo() {
        let story = NewStory {
            description: "Morning run".to_string(),
            lat: Some(1.5),
            lon: None,
            photo_blob: Some(PhotoBlob {
                data_url: "data:image/png;base64,iVBO".to_string(),
                name: Some("run.png".to_string()),
                content_type: Some("image/png".to_string()),
            }),
            token: None,
        };
        let submission = StorySubmission::from_story(&story).unwrap();
        assert_eq!(submission.description.as_deref(), Some("Morning run"));
        assert_eq!(submission.lat, Some(1.5));
        let photo = submission.photo.unwrap();
        assert_eq!(photo.file_name, "run.png");
        assert_eq!(photo.bytes, vec![0x89, 0x50, 0x4e]);
    }

    #[test]
    fn test_submission_without_photo_or_description() {
        let story = NewStory {
            description: String::new(),
            lat: None,
            lon: None,
            photo_blob: None,
            token: Some(String::new()),
        };
        let submission = StorySubmission::from_story(&story).unwrap();
        assert!(submission.description.is_none());
        assert!(submission.photo.is_none());
        assert!(submission.token.is_none());
    }
}
