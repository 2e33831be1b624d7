use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict")] Conflict,
    #[error("internal: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn create_user(&self, new: NewUser) -> RepoResult<User>;
    async fn get_user(&self, id: Id) -> RepoResult<User>;
    async fn get_user_by_username(&self, username: &str) -> RepoResult<User>;
}

#[async_trait]
pub trait PostRepo: Send + Sync {
    /// Newest first.
    async fn list_posts(&self) -> RepoResult<Vec<Post>>;
    async fn create_post(&self, new: NewPost) -> RepoResult<Post>;
    /// Hard delete; returns the removed row so callers can clean up its photo.
    async fn delete_post(&self, id: Id) -> RepoResult<Post>;
}

#[async_trait]
pub trait FileRepo: Send + Sync {
    async fn create_file_record(&self, new: NewFileRecord) -> RepoResult<FileRecord>;
    /// Oldest record for `file_name`.
    async fn find_file(&self, file_name: &str) -> RepoResult<FileRecord>;
    async fn find_files(&self, file_name: &str) -> RepoResult<Vec<FileRecord>>;
    /// Removes every record for `file_name`, returning how many went away.
    async fn delete_files(&self, file_name: &str) -> RepoResult<u64>;
}

pub trait Repo: UserRepo + PostRepo + FileRepo {}

impl<T> Repo for T where T: UserRepo + PostRepo + FileRepo {}

pub mod inmem {
    use super::*;

    #[derive(Default)]
    struct State {
        users: Vec<User>,
        posts: Vec<Post>, // insertion order
        files: Vec<FileRecord>,
    }

    /// Process-local store used by tests and by builds without `postgres-store`.
    #[derive(Clone, Default)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
    }

    impl InMemRepo {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl UserRepo for InMemRepo {
        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            let mut s = self.state.write().unwrap();
            if s.users.iter().any(|u| u.username == new.username) {
                return Err(RepoError::Conflict);
            }
            let user = User {
                id: Uuid::new_v4(),
                username: new.username,
                password_hash: new.password_hash,
                created_at: Utc::now(),
            };
            s.users.push(user.clone());
            Ok(user)
        }
        async fn get_user(&self, id: Id) -> RepoResult<User> {
            let s = self.state.read().unwrap();
            s.users.iter().find(|u| u.id == id).cloned().ok_or(RepoError::NotFound)
        }
        async fn get_user_by_username(&self, username: &str) -> RepoResult<User> {
            let s = self.state.read().unwrap();
            s.users.iter().find(|u| u.username == username).cloned().ok_or(RepoError::NotFound)
        }
    }

    #[async_trait]
    impl PostRepo for InMemRepo {
        async fn list_posts(&self) -> RepoResult<Vec<Post>> {
            let s = self.state.read().unwrap();
            Ok(s.posts.iter().rev().cloned().collect())
        }
        async fn create_post(&self, new: NewPost) -> RepoResult<Post> {
            let mut s = self.state.write().unwrap();
            let post = Post {
                id: Uuid::new_v4(),
                title: new.title,
                text: new.text,
                photo: new.photo,
                created_at: Utc::now(),
            };
            s.posts.push(post.clone());
            Ok(post)
        }
        async fn delete_post(&self, id: Id) -> RepoResult<Post> {
            let mut s = self.state.write().unwrap();
            let idx = s.posts.iter().position(|p| p.id == id).ok_or(RepoError::NotFound)?;
            Ok(s.posts.remove(idx))
        }
    }

    #[async_trait]
    impl FileRepo for InMemRepo {
        async fn create_file_record(&self, new: NewFileRecord) -> RepoResult<FileRecord> {
            let mut s = self.state.write().unwrap();
            let rec = FileRecord {
                id: Uuid::new_v4(),
                file_name: new.file_name,
                storage_path: new.storage_path,
                created_at: Utc::now(),
            };
            s.files.push(rec.clone());
            Ok(rec)
        }
        async fn find_file(&self, file_name: &str) -> RepoResult<FileRecord> {
            let s = self.state.read().unwrap();
            s.files.iter().find(|f| f.file_name == file_name).cloned().ok_or(RepoError::NotFound)
        }
        async fn find_files(&self, file_name: &str) -> RepoResult<Vec<FileRecord>> {
            let s = self.state.read().unwrap();
            Ok(s.files.iter().filter(|f| f.file_name == file_name).cloned().collect())
        }
        async fn delete_files(&self, file_name: &str) -> RepoResult<u64> {
            let mut s = self.state.write().unwrap();
            let before = s.files.len();
            s.files.retain(|f| f.file_name != file_name);
            Ok((before - s.files.len()) as u64)
        }
    }
}

#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use sqlx::{Pool, Postgres};

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }
    }

    fn map_err(e: sqlx::Error) -> RepoError {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Conflict,
            other => RepoError::Internal(other.to_string()),
        }
    }

    #[async_trait]
    impl UserRepo for PgRepo {
        async fn create_user(&self, new: NewUser) -> RepoResult<User> {
            sqlx::query_as::<_, User>(
                "INSERT INTO users (id, username, password_hash) VALUES ($1,$2,$3) RETURNING id, username, password_hash, created_at"
            )
            .bind(Uuid::new_v4())
            .bind(&new.username)
            .bind(&new.password_hash)
            .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn get_user(&self, id: Id) -> RepoResult<User> {
            sqlx::query_as::<_, User>("SELECT id, username, password_hash, created_at FROM users WHERE id=$1")
                .bind(id)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn get_user_by_username(&self, username: &str) -> RepoResult<User> {
            sqlx::query_as::<_, User>("SELECT id, username, password_hash, created_at FROM users WHERE username=$1")
                .bind(username)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
    }

    #[async_trait]
    impl PostRepo for PgRepo {
        async fn list_posts(&self) -> RepoResult<Vec<Post>> {
            sqlx::query_as::<_, Post>("SELECT id, title, text, photo, created_at FROM posts ORDER BY created_at DESC")
                .fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn create_post(&self, new: NewPost) -> RepoResult<Post> {
            sqlx::query_as::<_, Post>(
                "INSERT INTO posts (id, title, text, photo) VALUES ($1,$2,$3,$4) RETURNING id, title, text, photo, created_at"
            )
            .bind(Uuid::new_v4())
            .bind(&new.title)
            .bind(&new.text)
            .bind(new.photo.as_ref())
            .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn delete_post(&self, id: Id) -> RepoResult<Post> {
            sqlx::query_as::<_, Post>("DELETE FROM posts WHERE id=$1 RETURNING id, title, text, photo, created_at")
                .bind(id)
                .fetch_one(&self.pool).await.map_err(map_err)
        }
    }

    #[async_trait]
    impl FileRepo for PgRepo {
        async fn create_file_record(&self, new: NewFileRecord) -> RepoResult<FileRecord> {
            sqlx::query_as::<_, FileRecord>(
                "INSERT INTO files (id, file_name, storage_path) VALUES ($1,$2,$3) RETURNING id, file_name, storage_path, created_at"
            )
            .bind(Uuid::new_v4())
            .bind(&new.file_name)
            .bind(&new.storage_path)
            .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn find_file(&self, file_name: &str) -> RepoResult<FileRecord> {
            sqlx::query_as::<_, FileRecord>(
                "SELECT id, file_name, storage_path, created_at FROM files WHERE file_name=$1 ORDER BY created_at ASC LIMIT 1"
            )
            .bind(file_name)
            .fetch_one(&self.pool).await.map_err(map_err)
        }
        async fn find_files(&self, file_name: &str) -> RepoResult<Vec<FileRecord>> {
            sqlx::query_as::<_, FileRecord>(
                "SELECT id, file_name, storage_path, created_at FROM files WHERE file_name=$1 ORDER BY created_at ASC"
            )
            .bind(file_name)
            .fetch_all(&self.pool).await.map_err(map_err)
        }
        async fn delete_files(&self, file_name: &str) -> RepoResult<u64> {
            let res = sqlx::query("DELETE FROM files WHERE file_name=$1")
                .bind(file_name)
                .execute(&self.pool).await.map_err(map_err)?;
            Ok(res.rows_affected())
        }
    }
}
