use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    Private,
    Public,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupRole {
    Member,
    Admin,
    Owner,
}

impl GroupRole {
    /// Whether `self` may change the role of `target` to `new_role`.
    pub fn can_set(self, target: GroupRole, new_role: GroupRole) -> bool {
        if target == GroupRole::Owner || new_role == GroupRole::Owner {
            return false;
        }
        self == GroupRole::Owner
    }

    pub fn can_remove(self, target: GroupRole) -> bool {
        target != GroupRole::Owner && matches!(self, GroupRole::Owner | GroupRole::Admin)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Group {
    pub id: uuid::Uuid,
    pub name: String,
    pub group_type: GroupType,
    pub owner_id: String,
    pub max_members: u32,
    pub encrypted: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    pub group_id: uuid::Uuid,
    pub claw_id: String,
    pub role: GroupRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Rejected,
}

/// Single-use invitation; accepting or rejecting consumes it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupInvitation {
    pub id: uuid::Uuid,
    pub group_id: uuid::Uuid,
    pub invited_id: String,
    pub invited_by: String,
    pub status: InvitationStatus,
    pub created_at: DateTime<Utc>,
}
