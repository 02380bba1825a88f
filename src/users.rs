use crate::db_types::{NewUser, User};
use crate::error::AppError;

use argon2::password_hash::{rand_core::OsRng, SaltString};
use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier};
use sqlx::{Pool, Postgres};
use tokio::task::spawn_blocking;
use tracing::{debug, error, warn};

const USER_COLUMNS: &str = "user_id, phone_number, password_hash, full_name, created_at";

/// The remote user table. Postgres in production; tests swap in an in-memory table.
pub enum UserStore {
    Postgres(Pool<Postgres>),
    #[cfg(test)]
    Memory(std::sync::Mutex<Vec<User>>),
}

impl UserStore {
    #[cfg(test)]
    pub fn memory() -> Self {
        UserStore::Memory(std::sync::Mutex::new(Vec::new()))
    }

    pub async fn insert(&self, new_user: NewUser) -> Result<User, AppError> {
        match self {
            UserStore::Postgres(pool) => {
                let sql = format!(
                    "
                    insert into users (
                      phone_number,
                      password_hash,
                      full_name
                    ) values (
                      $1,
                      $2,
                      $3
                    )
                    returning {USER_COLUMNS}
                    "
                );
                sqlx::query_as::<_, User>(&sql)
                    .bind(&new_user.phone_number)
                    .bind(&new_user.password_hash)
                    .bind(&new_user.full_name)
                    .fetch_one(pool)
                    .await
                    .map_err(|e| {
                        error!(error = %e, "failed to insert user row");
                        AppError::from(e)
                    })
            }
            #[cfg(test)]
            UserStore::Memory(rows) => {
                let mut rows = rows.lock().unwrap();
                if rows.iter().any(|u| u.phone_number == new_user.phone_number) {
                    return Err(AppError::Database(
                        "duplicate key value violates unique constraint \"users_phone_number_key\""
                            .to_string(),
                    ));
                }
                let user = User {
                    user_id: uuid::Uuid::new_v4(),
                    phone_number: new_user.phone_number,
                    password_hash: new_user.password_hash,
                    full_name: new_user.full_name,
                    created_at: time::OffsetDateTime::now_utc(),
                };
                rows.push(user.clone());
                Ok(user)
            }
        }
    }

    pub async fn select_by_phone(&self, phone_number: &str) -> Result<Vec<User>, AppError> {
        match self {
            UserStore::Postgres(pool) => {
                let sql = format!(
                    "
                    select {USER_COLUMNS}
                    from users
                    where phone_number = $1
                    order by created_at
                    "
                );
                sqlx::query_as::<_, User>(&sql)
                    .bind(phone_number)
                    .fetch_all(pool)
                    .await
                    .map_err(|e| {
                        error!(error = %e, "failed to select user rows");
                        AppError::from(e)
                    })
            }
            #[cfg(test)]
            UserStore::Memory(rows) => Ok(rows
                .lock()
                .unwrap()
                .iter()
                .filter(|u| u.phone_number == phone_number)
                .cloned()
                .collect()),
        }
    }
}

fn required(value: &str, name: &str) -> Result<String, AppError> {
    let value = value.trim();
    if value.is_empty() {
        Err(AppError::bad_request(format!("{name} is required")))
    } else {
        Ok(value.to_string())
    }
}

// Argon2 takes tens of milliseconds per call, so both run on the blocking pool.

pub async fn hash_password(password: &str) -> Result<String, AppError> {
    let password = password.to_string();
    spawn_blocking(move || {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AppError::Internal(format!("failed to hash password: {e}")))
    })
    .await?
}

pub async fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let password = password.to_string();
    let password_hash = password_hash.to_string();
    let verified = spawn_blocking(move || match PasswordHash::new(&password_hash) {
        Ok(hash) => Argon2::default()
            .verify_password(password.as_bytes(), &hash)
            .is_ok(),
        Err(e) => {
            warn!(error = %e, "stored password hash is malformed");
            false
        }
    })
    .await?;
    Ok(verified)
}

pub async fn create_user(
    store: &UserStore,
    phone_number: &str,
    password: &str,
    full_name: &str,
) -> Result<User, AppError> {
    let phone_number = required(phone_number, "Phone number")?;
    let full_name = required(full_name, "Full name")?;
    if password.is_empty() {
        return Err(AppError::bad_request("Password is required"));
    }
    let user = store
        .insert(NewUser {
            phone_number,
            password_hash: hash_password(password).await?,
            full_name,
        })
        .await?;
    debug!(user_id = %user.user_id, "created user");
    Ok(user)
}

/// Unknown phone numbers and wrong passwords are indistinguishable to the caller.
pub async fn login(
    store: &UserStore,
    phone_number: &str,
    password: &str,
) -> Result<User, AppError> {
    let phone_number = required(phone_number, "Phone number")?;
    for user in store.select_by_phone(&phone_number).await? {
        if verify_password(password, &user.password_hash).await? {
            debug!(user_id = %user.user_id, "user logged in");
            return Ok(user);
        }
    }
    Err(AppError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hashes_are_salted_and_verifiable() {
        let a = hash_password("hunter2").await.unwrap();
        let b = hash_password("hunter2").await.unwrap();
        assert_ne!(a, b);
        assert!(a.starts_with("$argon2"));
        assert!(verify_password("hunter2", &a).await.unwrap());
        assert!(!verify_password("hunter3", &a).await.unwrap());
        assert!(!verify_password("hunter2", "plaintext").await.unwrap());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn hashing_does_not_hold_the_runtime_thread() {
        let hashing = tokio::spawn(async { hash_password("hunter2").await });
        // lets the spawned task run until it first waits; inline hashing would finish here
        tokio::task::yield_now().await;
        assert!(!hashing.is_finished());
        assert!(hashing.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn create_then_login() {
        let store = UserStore::memory();
        let created = create_user(&store, " +15551234567 ", "s3cret", "Ada Lovelace")
            .await
            .unwrap();
        assert_eq!(created.phone_number, "+15551234567");
        assert_ne!(created.password_hash, "s3cret");

        let user = login(&store, "+15551234567", "s3cret").await.unwrap();
        assert_eq!(user.user_id, created.user_id);
        assert_eq!(user.full_name, "Ada Lovelace");
    }

    #[tokio::test]
    async fn login_rejects_unknown_phone_and_wrong_password() {
        let store = UserStore::memory();
        create_user(&store, "+15551234567", "s3cret", "Ada")
            .await
            .unwrap();
        assert!(matches!(
            login(&store, "+15550000000", "s3cret").await,
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            login(&store, "+15551234567", "S3cret").await,
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            login(&store, "+15551234567", "").await,
            Err(AppError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn create_validates_and_surfaces_store_errors() {
        let store = UserStore::memory();
        assert!(matches!(
            create_user(&store, "", "pw", "Ada").await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            create_user(&store, "+1555", "", "Ada").await,
            Err(AppError::BadRequest(_))
        ));
        assert!(matches!(
            create_user(&store, "+1555", "pw", " ").await,
            Err(AppError::BadRequest(_))
        ));

        create_user(&store, "+1555", "pw", "Ada").await.unwrap();
        match create_user(&store, "+1555", "pw", "Ada again").await {
            Err(AppError::Database(message)) => assert!(message.contains("duplicate key")),
            other => panic!("expected a database error, got {other:?}"),
        }
    }
}
