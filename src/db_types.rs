use serde::Serialize;
use sqlx::types::time::OffsetDateTime;
use uuid::Uuid;

#[derive(sqlx::FromRow, Clone, Debug)]
pub struct User {
    pub user_id: Uuid,
    pub phone_number: String,
    pub password_hash: String,
    pub full_name: String,
    pub created_at: OffsetDateTime,
}

pub struct NewUser {
    pub phone_number: String,
    pub password_hash: String,
    pub full_name: String,
}

/// What leaves the service: a user row without its password hash.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct UserView {
    pub user_id: Uuid,
    pub phone_number: String,
    pub full_name: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl From<User> for UserView {
    fn from(user: User) -> Self {
        Self {
            user_id: user.user_id,
            phone_number: user.phone_number,
            full_name: user.full_name,
            created_at: user.created_at,
        }
    }
}
