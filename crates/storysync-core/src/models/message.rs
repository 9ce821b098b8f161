use serde::{Deserialize, Serialize};

use super::NewStory;

/// A command sent by a foreground context: `{type, payload}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Command {
    QueueOfflineStory(NewStory),
    SyncOutbox,
    StorySuccess(StorySuccess),
    SubscribePush(SubscribeRequest),
    UnsubscribePush(UnsubscribeRequest),
}

impl Command {
    pub fn kind(&self) -> &'static str {
        match self {
            Command::QueueOfflineStory(_) => "QUEUE_OFFLINE_STORY",
            Command::SyncOutbox => "SYNC_OUTBOX",
            Command::StorySuccess(_) => "STORY_SUCCESS",
            Command::SubscribePush(_) => "SUBSCRIBE_PUSH",
            Command::UnsubscribePush(_) => "UNSUBSCRIBE_PUSH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorySuccess {
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscribeRequest {
    pub token: String,
    pub vapid_key: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsubscribeRequest {
    pub token: String,
}

/// Event broadcast from the engine to every foreground context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EngineEvent {
    PushSubscribeSuccess,
    PushSubscribeError { error: String },
    PushUnsubscribeSuccess,
    PushUnsubscribeError { error: String },
}
