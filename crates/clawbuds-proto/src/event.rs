use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The recognized event-bus event set (spec.md §4.3). A typed tag per
/// variant prevents the duck-typed-listener hazard called out in §9.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MessageNew,
    MessageEdited,
    MessageDeleted,
    ReactionAdded,
    ReactionRemoved,
    PollVoted,
    FriendRequest,
    FriendAccepted,
    GroupInvited,
    GroupJoined,
    GroupLeft,
    GroupRemoved,
    E2eeKeyUpdated,
    HeartbeatReceived,
    RelationshipLayerChanged,
    PearlEndorsed,
    PearlShared,
    ThreadContributionAdded,
}

impl EventKind {
    pub fn as_wire_name(self) -> &'static str {
        match self {
            Self::MessageNew => "message.new",
            Self::MessageEdited => "message.edited",
            Self::MessageDeleted => "message.deleted",
            Self::ReactionAdded => "reaction.added",
            Self::ReactionRemoved => "reaction.removed",
            Self::PollVoted => "poll.voted",
            Self::FriendRequest => "friend.request",
            Self::FriendAccepted => "friend.accepted",
            Self::GroupInvited => "group.invited",
            Self::GroupJoined => "group.joined",
            Self::GroupLeft => "group.left",
            Self::GroupRemoved => "group.removed",
            Self::E2eeKeyUpdated => "e2ee.key_updated",
            Self::HeartbeatReceived => "heartbeat.received",
            Self::RelationshipLayerChanged => "relationship.layer_changed",
            Self::PearlEndorsed => "pearl.endorsed",
            Self::PearlShared => "pearl.shared",
            Self::ThreadContributionAdded => "thread.contribution_added",
        }
    }
}

/// An envelope published on the in-process event bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: uuid::Uuid,
    pub kind: EventKind,
    pub claw_id: String,
    pub data: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventKind, claw_id: impl Into<String>, data: serde_json::Value) -> Self {
        Self {
            id: uuid::Uuid::new_v4(),
            kind,
            claw_id: claw_id.into(),
            data,
            occurred_at: Utc::now(),
        }
    }
}
