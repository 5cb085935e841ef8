use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

use super::models::{Directory, MediaFile, Picture, Profile, User};
use super::store::{MediaStore, StoreError, UserQuery, UserStore};
use crate::types::Role;

const USER_COLUMNS: &str =
    "id, uid, email, password, role, first_name, last_name, picture, created_at, updated_at";

#[derive(Debug, FromRow)]
struct UserRow {
    id: Uuid,
    uid: Option<String>,
    email: String,
    password: String,
    role: String,
    first_name: String,
    last_name: String,
    picture: Option<Json<Picture>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let role: Role = row
            .role
            .parse()
            .map_err(|_| StoreError::InvalidRecord(format!("user {} has unknown role '{}'", row.id, row.role)))?;

        Ok(User {
            id: row.id,
            uid: row.uid,
            email: row.email,
            password_hash: row.password,
            role,
            profile: Profile {
                first_name: row.first_name,
                last_name: row.last_name,
                picture: row.picture.map(|Json(p)| p),
            },
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

fn into_users(rows: Vec<UserRow>) -> Result<Vec<User>, StoreError> {
    rows.into_iter().map(User::try_from).collect()
}

/// sqlx-backed store for users and course media
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn list(&self) -> Result<Vec<User>, StoreError> {
        let sql = format!("SELECT {} FROM users ORDER BY created_at, email", USER_COLUMNS);
        let rows = sqlx::query_as::<_, UserRow>(&sql).fetch_all(&self.pool).await?;
        into_users(rows)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn find_by_login(&self, login: &str) -> Result<Option<User>, StoreError> {
        let sql = format!(
            "SELECT {} FROM users WHERE lower(email) = lower($1) OR uid = $1 \
             ORDER BY (lower(email) = lower($1)) DESC LIMIT 1",
            USER_COLUMNS
        );
        sqlx::query_as::<_, UserRow>(&sql)
            .bind(login)
            .fetch_optional(&self.pool)
            .await?
            .map(User::try_from)
            .transpose()
    }

    async fn email_in_use(&self, email: &str, exclude: Option<Uuid>) -> Result<bool, StoreError> {
        let count: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM users WHERE lower(email) = lower($1) AND ($2::uuid IS NULL OR id <> $2)",
        )
        .bind(email)
        .bind(exclude)
        .fetch_one(&self.pool)
        .await?;
        Ok(count.0 > 0)
    }

    async fn search(&self, query: &UserQuery) -> Result<Vec<User>, StoreError> {
        let sql = format!(
            "SELECT {} FROM users WHERE role = $1 \
             AND (uid ~* $2 OR email ~* $2 OR first_name ~* $2 OR last_name ~* $2) \
             ORDER BY lower(last_name), lower(first_name) LIMIT $3",
            USER_COLUMNS
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(query.role.as_str())
            .bind(query.pattern())
            .bind(i64::from(query.limit))
            .fetch_all(&self.pool)
            .await?;
        into_users(rows)
    }

    async fn count_by_role(&self, role: Role) -> Result<i64, StoreError> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users WHERE role = $1")
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }

    async fn insert(&self, user: &User) -> Result<(), StoreError> {
        let sql = format!(
            "INSERT INTO users ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            USER_COLUMNS
        );
        sqlx::query(&sql)
            .bind(user.id)
            .bind(&user.uid)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.role.as_str())
            .bind(&user.profile.first_name)
            .bind(&user.profile.last_name)
            .bind(user.profile.picture.clone().map(Json))
            .bind(user.created_at)
            .bind(user.updated_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    StoreError::Conflict(format!("user {} already exists", user.email))
                }
                other => StoreError::Sqlx(other),
            })?;
        Ok(())
    }

    async fn update(&self, user: &User) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE users SET uid = $2, email = $3, password = $4, role = $5, first_name = $6, \
             last_name = $7, picture = $8, updated_at = $9 WHERE id = $1",
        )
        .bind(user.id)
        .bind(&user.uid)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .bind(&user.profile.first_name)
        .bind(&user.profile.last_name)
        .bind(user.profile.picture.clone().map(Json))
        .bind(user.updated_at)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("user {}", user.id)));
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

const DIRECTORY_COLUMNS: &str = "id, name, parent, course_id, created_at";
const FILE_COLUMNS: &str = "id, name, link, size, mime_type, directory, created_at";

#[async_trait]
impl MediaStore for PgStore {
    async fn root_for_course(&self, course_id: &str, candidate: Directory) -> Result<Directory, StoreError> {
        // Concurrent first accesses race on the partial unique index; the loser reads the winner's row.
        sqlx::query(
            "INSERT INTO directories (id, name, parent, course_id, created_at) VALUES ($1, $2, NULL, $3, $4) \
             ON CONFLICT (course_id) WHERE parent IS NULL DO NOTHING",
        )
        .bind(candidate.id)
        .bind(&candidate.name)
        .bind(course_id)
        .bind(candidate.created_at)
        .execute(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {} FROM directories WHERE course_id = $1 AND parent IS NULL",
            DIRECTORY_COLUMNS
        );
        Ok(sqlx::query_as::<_, Directory>(&sql)
            .bind(course_id)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn find_directory(&self, id: Uuid) -> Result<Option<Directory>, StoreError> {
        let sql = format!("SELECT {} FROM directories WHERE id = $1", DIRECTORY_COLUMNS);
        Ok(sqlx::query_as::<_, Directory>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn child_directories(&self, parent: Uuid) -> Result<Vec<Directory>, StoreError> {
        let sql = format!("SELECT {} FROM directories WHERE parent = $1", DIRECTORY_COLUMNS);
        Ok(sqlx::query_as::<_, Directory>(&sql)
            .bind(parent)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn insert_directory(&self, directory: &Directory) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO directories (id, name, parent, course_id, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(directory.id)
            .bind(&directory.name)
            .bind(directory.parent)
            .bind(&directory.course_id)
            .bind(directory.created_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn rename_directory(&self, id: Uuid, name: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE directories SET name = $2 WHERE id = $1")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_directory(&self, id: Uuid) -> Result<bool, StoreError> {
        // files rows go with the directory via ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM directories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn files_in(&self, directory: Uuid) -> Result<Vec<MediaFile>, StoreError> {
        let sql = format!("SELECT {} FROM files WHERE directory = $1", FILE_COLUMNS);
        Ok(sqlx::query_as::<_, MediaFile>(&sql)
            .bind(directory)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_file(&self, id: Uuid) -> Result<Option<MediaFile>, StoreError> {
        let sql = format!("SELECT {} FROM files WHERE id = $1", FILE_COLUMNS);
        Ok(sqlx::query_as::<_, MediaFile>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_file(&self, file: &MediaFile) -> Result<(), StoreError> {
        let sql = format!("INSERT INTO files ({}) VALUES ($1, $2, $3, $4, $5, $6, $7)", FILE_COLUMNS);
        sqlx::query(&sql)
            .bind(file.id)
            .bind(&file.name)
            .bind(&file.link)
            .bind(file.size)
            .bind(&file.mime_type)
            .bind(file.directory)
            .bind(file.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    StoreError::NotFound(format!("directory {}", file.directory))
                }
                other => StoreError::Sqlx(other),
            })?;
        Ok(())
    }

    async fn rename_file(&self, id: Uuid, name: &str) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE files SET name = $2 WHERE id = $1")
            .bind(id)
            .bind(name)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_file(&self, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(role: &str) -> UserRow {
        let now = Utc::now();
        UserRow {
            id: Uuid::new_v4(),
            uid: None,
            email: "row@example.org".to_string(),
            password: "hash".to_string(),
            role: role.to_string(),
            first_name: "Row".to_string(),
            last_name: "Mapper".to_string(),
            picture: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn maps_rows_with_known_roles() {
        let user = User::try_from(row("tutor")).unwrap();
        assert_eq!(user.role, Role::Tutor);
        assert_eq!(user.profile.last_name, "Mapper");
    }

    #[test]
    fn rejects_rows_with_unknown_roles() {
        assert!(matches!(User::try_from(row("superuser")), Err(StoreError::InvalidRecord(_))));
    }
}
