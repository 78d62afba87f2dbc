use crate::error::{classify, StorageResult};
use crate::util::{from_ts, to_ts};
use crate::Storage;
use clawbuds_proto::{Group, GroupInvitation, GroupMember, GroupRole, GroupType, InvitationStatus};
use sqlx::Row;
use uuid::Uuid;

fn group_type_str(t: GroupType) -> &'static str {
    match t {
        GroupType::Private => "private",
        GroupType::Public => "public",
    }
}

fn group_type_from(s: &str) -> GroupType {
    if s == "public" { GroupType::Public } else { GroupType::Private }
}

fn role_str(r: GroupRole) -> &'static str {
    match r {
        GroupRole::Member => "member",
        GroupRole::Admin => "admin",
        GroupRole::Owner => "owner",
    }
}

fn role_from(s: &str) -> GroupRole {
    match s {
        "owner" => GroupRole::Owner,
        "admin" => GroupRole::Admin,
        _ => GroupRole::Member,
    }
}

fn row_to_group(row: &sqlx::any::AnyRow) -> StorageResult<Group> {
    Ok(Group {
        id: parse_uuid(row.try_get("id")?)?,
        name: row.try_get("name")?,
        group_type: group_type_from(&row.try_get::<String, _>("group_type")?),
        owner_id: row.try_get("owner_id")?,
        max_members: row.try_get::<i64, _>("max_members")? as u32,
        encrypted: row.try_get::<i64, _>("encrypted")? != 0,
        created_at: from_ts(&row.try_get::<String, _>("created_at")?)?,
    })
}

fn parse_uuid(s: String) -> StorageResult<Uuid> {
    Uuid::parse_str(&s).map_err(|e| crate::StorageError::Database(sqlx::Error::Decode(Box::new(e))))
}

impl Storage {
    pub async fn create_group(
        &self,
        name: &str,
        group_type: GroupType,
        owner_id: &str,
        max_members: u32,
        encrypted: bool,
    ) -> StorageResult<Group> {
        let group = Group {
            id: Uuid::new_v4(),
            name: name.to_string(),
            group_type,
            owner_id: owner_id.to_string(),
            max_members,
            encrypted,
            created_at: chrono::Utc::now(),
        };
        sqlx::query(
            "INSERT INTO groups (id, name, group_type, owner_id, max_members, encrypted, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(group.id.to_string())
        .bind(&group.name)
        .bind(group_type_str(group.group_type))
        .bind(&group.owner_id)
        .bind(group.max_members as i64)
        .bind(group.encrypted as i64)
        .bind(to_ts(group.created_at))
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "groups"))?;
        self.add_group_member(group.id, owner_id, GroupRole::Owner).await?;
        Ok(group)
    }

    pub async fn get_group(&self, id: Uuid) -> StorageResult<Option<Group>> {
        let row = sqlx::query("SELECT * FROM groups WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(row_to_group).transpose()
    }

    /// Every group `claw_id` currently belongs to, for `GET /groups`.
    pub async fn list_groups_for_member(&self, claw_id: &str) -> StorageResult<Vec<Group>> {
        let rows = sqlx::query(
            "SELECT groups.* FROM groups \
             INNER JOIN group_members ON group_members.group_id = groups.id \
             WHERE group_members.claw_id = ? ORDER BY groups.created_at",
        )
        .bind(claw_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_group).collect()
    }

    pub async fn delete_group(&self, id: Uuid) -> StorageResult<()> {
        sqlx::query("DELETE FROM group_members WHERE group_id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM group_invitations WHERE group_id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM groups WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn count_group_members(&self, group_id: Uuid) -> StorageResult<i64> {
        let row = sqlx::query("SELECT COUNT(*) as n FROM group_members WHERE group_id = ?")
            .bind(group_id.to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get::<i64, _>("n")?)
    }

    pub async fn add_group_member(&self, group_id: Uuid, claw_id: &str, role: GroupRole) -> StorageResult<()> {
        sqlx::query(
            "INSERT INTO group_members (group_id, claw_id, role, joined_at) VALUES (?, ?, ?, ?)",
        )
        .bind(group_id.to_string())
        .bind(claw_id)
        .bind(role_str(role))
        .bind(to_ts(chrono::Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(|e| classify(e, "group_members"))?;
        Ok(())
    }

    pub async fn get_group_member(&self, group_id: Uuid, claw_id: &str) -> StorageResult<Option<GroupMember>> {
        let row = sqlx::query("SELECT * FROM group_members WHERE group_id = ? AND claw_id = ?")
            .bind(group_id.to_string())
            .bind(claw_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| {
            Ok(GroupMember {
                group_id,
                claw_id: row.try_get("claw_id")?,
                role: role_from(&row.try_get::<String, _>("role")?),
                joined_at: from_ts(&row.try_get::<String, _>("joined_at")?)?,
            })
        })
        .transpose()
    }

    pub async fn list_group_members(&self, group_id: Uuid) -> StorageResult<Vec<GroupMember>> {
        let rows = sqlx::query("SELECT * FROM group_members WHERE group_id = ? ORDER BY joined_at")
            .bind(group_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                Ok(GroupMember {
                    group_id,
                    claw_id: row.try_get("claw_id")?,
                    role: role_from(&row.try_get::<String, _>("role")?),
                    joined_at: from_ts(&row.try_get::<String, _>("joined_at")?)?,
                })
            })
            .collect()
    }

    pub async fn set_group_member_role(&self, group_id: Uuid, claw_id: &str, role: GroupRole) -> StorageResult<()> {
        sqlx::query("UPDATE group_members SET role = ? WHERE group_id = ? AND claw_id = ?")
            .bind(role_str(role))
            .bind(group_id.to_string())
            .bind(claw_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn remove_group_member(&self, group_id: Uuid, claw_id: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM group_members WHERE group_id = ? AND claw_id = ?")
            .bind(group_id.to_string())
            .bind(claw_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn create_invitation(
        &self,
        group_id: Uuid,
        invited_id: &str,
        invited_by: &str,
    ) -> StorageResult<GroupInvitation> {
        let invitation = GroupInvitation {
            id: Uuid::new_v4(),
            group_id,
            invited_id: invited_id.to_string(),
            invited_by: invited_by.to_string(),
            status: InvitationStatus::Pending,
            created_at: chrono::Utc::now(),
        };
        sqlx::query(
            "INSERT INTO group_invitations (id, group_id, invited_id, invited_by, status, created_at) \
             VALUES (?, ?, ?, ?, 'pending', ?)",
        )
        .bind(invitation.id.to_string())
        .bind(group_id.to_string())
        .bind(invited_id)
        .bind(invited_by)
        .bind(to_ts(invitation.created_at))
        .execute(&self.pool)
        .await?;
        Ok(invitation)
    }

    pub async fn find_pending_invitation(&self, group_id: Uuid, invited_id: &str) -> StorageResult<Option<GroupInvitation>> {
        let row = sqlx::query(
            "SELECT * FROM group_invitations WHERE group_id = ? AND invited_id = ? AND status = 'pending' \
             ORDER BY created_at DESC LIMIT 1",
        )
        .bind(group_id.to_string())
        .bind(invited_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|row| {
            Ok(GroupInvitation {
                id: parse_uuid(row.try_get("id")?)?,
                group_id,
                invited_id: row.try_get("invited_id")?,
                invited_by: row.try_get("invited_by")?,
                status: InvitationStatus::Pending,
                created_at: from_ts(&row.try_get::<String, _>("created_at")?)?,
            })
        })
        .transpose()
    }

    pub async fn set_invitation_status(&self, id: Uuid, status: InvitationStatus) -> StorageResult<()> {
        let s = match status {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Rejected => "rejected",
        };
        sqlx::query("UPDATE group_invitations SET status = ? WHERE id = ?")
            .bind(s)
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_invitations(&self, claw_id: &str) -> StorageResult<Vec<GroupInvitation>> {
        let rows = sqlx::query(
            "SELECT * FROM group_invitations WHERE invited_id = ? AND status = 'pending' ORDER BY created_at DESC",
        )
        .bind(claw_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                Ok(GroupInvitation {
                    id: parse_uuid(row.try_get("id")?)?,
                    group_id: parse_uuid(row.try_get("group_id")?)?,
                    invited_id: row.try_get("invited_id")?,
                    invited_by: row.try_get("invited_by")?,
                    status: InvitationStatus::Pending,
                    created_at: from_ts(&row.try_get::<String, _>("created_at")?)?,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::memory_storage;

    #[tokio::test]
    async fn owner_is_seeded_as_member() {
        let storage = memory_storage().await;
        let group = storage.create_group("g", GroupType::Public, "alice", 3, false).await.unwrap();
        let owner = storage.get_group_member(group.id, "alice").await.unwrap().unwrap();
        assert_eq!(owner.role, GroupRole::Owner);
        assert_eq!(storage.count_group_members(group.id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn invitation_is_single_use() {
        let storage = memory_storage().await;
        let group = storage.create_group("g", GroupType::Private, "alice", 10, false).await.unwrap();
        let inv = storage.create_invitation(group.id, "bob", "alice").await.unwrap();
        storage.set_invitation_status(inv.id, InvitationStatus::Accepted).await.unwrap();
        let still_pending = storage.find_pending_invitation(group.id, "bob").await.unwrap();
        assert!(still_pending.is_none());
    }
}
