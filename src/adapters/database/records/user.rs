use crate::domain::user::User;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct UserRecord {
    pub(crate) id: Uuid,
    pub(crate) google_id: String,
    pub(crate) name: String,
    pub(crate) email: String,
    pub(crate) avatar: Option<String>,
    pub(crate) username: String,
    pub(crate) created_at: OffsetDateTime,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            google_id: record.google_id,
            name: record.name,
            email: record.email,
            avatar: record.avatar,
            username: record.username,
            created_at: record.created_at,
        }
    }
}
