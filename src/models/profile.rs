use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Профиль пользователя, один к одному с identity.
/// `id` совпадает с id identity и не меняется после создания.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, PartialEq)]
pub struct Profile {
    pub id: Uuid,
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Метаданные, переданные при регистрации; из них заполняется новый профиль
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileMetadata {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProfilePatch {
    pub username: Option<String>,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    /// Принимается только чтобы явно отклонить попытку сменить флаг
    pub is_admin: Option<bool>,
}

impl Profile {
    pub fn from_metadata(id: Uuid, metadata: ProfileMetadata) -> Self {
        let now = Utc::now();
        Self {
            id,
            username: metadata.username,
            full_name: metadata.full_name,
            avatar_url: metadata.avatar_url,
            is_admin: false,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn apply(&mut self, patch: &ProfilePatch) {
        if let Some(v) = &patch.username {
            self.username = Some(v.clone());
        }
        if let Some(v) = &patch.full_name {
            self.full_name = Some(v.clone());
        }
        if let Some(v) = &patch.avatar_url {
            self.avatar_url = Some(v.clone());
        }
        self.updated_at = Utc::now();
    }
}
