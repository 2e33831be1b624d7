#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use actix_web::web;
use tortuga::auth::AuthService;
use tortuga::config::AdminSeed;
use tortuga::files::FileService;
use tortuga::models::{FileRecord, Id, NewFileRecord, NewPost, NewUser, Post, User};
use tortuga::repo::inmem::InMemRepo;
use tortuga::repo::{FileRepo, PostRepo, RepoError, RepoResult, UserRepo};
use tortuga::storage::{ObjectStore, ObjectStoreError};
use tortuga::AppState;

pub const SECRET: &str = "test-secret-must-be-32-bytes-long!!";
pub const ADMIN_USER: &str = "admin";
pub const ADMIN_PASS: &str = "s3cret-pass";

// ---------------- In-memory Mock ObjectStore (tests only) ----------------
#[derive(Default)]
pub struct MockObjectStore {
    pub inner: Mutex<HashMap<String, (Vec<u8>, String)>>,
    pub fail_puts: AtomicBool,
    pub fail_gets: AtomicBool,
}

#[async_trait::async_trait]
impl ObjectStore for MockObjectStore {
    async fn put(&self, key: &str, content_type: &str, bytes: Vec<u8>) -> Result<(), ObjectStoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Other("put refused".into()));
        }
        self.inner.lock().unwrap().insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }
    async fn get(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        if self.fail_gets.load(Ordering::SeqCst) {
            return Err(ObjectStoreError::Other("get refused".into()));
        }
        let map = self.inner.lock().unwrap();
        map.get(key).map(|(b, _)| b.clone()).ok_or(ObjectStoreError::NotFound)
    }
    async fn delete(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.inner.lock().unwrap().remove(key);
        Ok(())
    }
}

impl MockObjectStore {
    pub fn keys(&self) -> Vec<String> {
        self.inner.lock().unwrap().keys().cloned().collect()
    }
}

// ---------------- Repo wrapper with switchable failures ----------------
#[derive(Default)]
pub struct FlakyRepo {
    pub inner: InMemRepo,
    pub fail_post_create: AtomicBool,
    pub fail_file_create: AtomicBool,
    pub fail_file_lookup: AtomicBool,
}

fn refuse(flag: &AtomicBool) -> RepoResult<()> {
    if flag.load(Ordering::SeqCst) {
        Err(RepoError::Internal("refused".into()))
    } else {
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserRepo for FlakyRepo {
    async fn create_user(&self, new: NewUser) -> RepoResult<User> {
        self.inner.create_user(new).await
    }
    async fn get_user(&self, id: Id) -> RepoResult<User> {
        self.inner.get_user(id).await
    }
    async fn get_user_by_username(&self, username: &str) -> RepoResult<User> {
        self.inner.get_user_by_username(username).await
    }
}

#[async_trait::async_trait]
impl PostRepo for FlakyRepo {
    async fn list_posts(&self) -> RepoResult<Vec<Post>> {
        self.inner.list_posts().await
    }
    async fn create_post(&self, new: NewPost) -> RepoResult<Post> {
        refuse(&self.fail_post_create)?;
        self.inner.create_post(new).await
    }
    async fn delete_post(&self, id: Id) -> RepoResult<Post> {
        self.inner.delete_post(id).await
    }
}

#[async_trait::async_trait]
impl FileRepo for FlakyRepo {
    async fn create_file_record(&self, new: NewFileRecord) -> RepoResult<FileRecord> {
        refuse(&self.fail_file_create)?;
        self.inner.create_file_record(new).await
    }
    async fn find_file(&self, file_name: &str) -> RepoResult<FileRecord> {
        self.inner.find_file(file_name).await
    }
    async fn find_files(&self, file_name: &str) -> RepoResult<Vec<FileRecord>> {
        refuse(&self.fail_file_lookup)?;
        self.inner.find_files(file_name).await
    }
    async fn delete_files(&self, file_name: &str) -> RepoResult<u64> {
        self.inner.delete_files(file_name).await
    }
}

pub struct FlakyEnv {
    pub repo: Arc<FlakyRepo>,
    pub store: Arc<MockObjectStore>,
    pub state: web::Data<AppState>,
    pub cache: tempfile::TempDir,
}

pub fn flaky_env() -> FlakyEnv {
    let repo = Arc::new(FlakyRepo::default());
    let store = Arc::new(MockObjectStore::default());
    let cache = tempfile::tempdir().unwrap();
    let state = web::Data::new(AppState {
        repo: repo.clone(),
        files: FileService::new(repo.clone(), store.clone(), cache.path()),
        auth: auth_service(chrono::Duration::hours(1)),
    });
    FlakyEnv { repo, store, state, cache }
}

impl FlakyEnv {
    pub async fn admin_token(&self) -> String {
        let seed = AdminSeed { username: ADMIN_USER.into(), password: ADMIN_PASS.into() };
        self.state.auth.ensure_admin(&self.repo.inner, &seed).await.unwrap();
        let user = self.repo.inner.get_user_by_username(ADMIN_USER).await.unwrap();
        self.state.auth.issue_token(user.id).unwrap()
    }
}

pub fn flag(f: &AtomicBool, on: bool) {
    f.store(on, Ordering::SeqCst);
}

pub struct TestEnv {
    pub repo: InMemRepo,
    pub store: Arc<MockObjectStore>,
    pub state: web::Data<AppState>,
    pub cache: tempfile::TempDir,
}

pub fn auth_service(ttl: chrono::Duration) -> AuthService {
    // bcrypt's minimum cost keeps the suite fast
    AuthService::new(SECRET, ttl, "token", 4)
}

pub fn test_env() -> TestEnv {
    let repo = InMemRepo::new();
    let store = Arc::new(MockObjectStore::default());
    let cache = tempfile::tempdir().unwrap();
    let state = web::Data::new(AppState {
        repo: Arc::new(repo.clone()),
        files: FileService::new(Arc::new(repo.clone()), store.clone(), cache.path()),
        auth: auth_service(chrono::Duration::hours(1)),
    });
    TestEnv { repo, store, state, cache }
}

/// Seeds the admin user and returns it with a fresh token.
pub async fn seed_admin(env: &TestEnv) -> (User, String) {
    let seed = AdminSeed { username: ADMIN_USER.into(), password: ADMIN_PASS.into() };
    env.state.auth.ensure_admin(&env.repo, &seed).await.unwrap();
    let user = env.repo.get_user_by_username(ADMIN_USER).await.unwrap();
    let token = env.state.auth.issue_token(user.id).unwrap();
    (user, token)
}

pub fn bearer(token: &str) -> (&'static str, String) {
    ("Authorization", format!("Bearer {token}"))
}

pub enum Part<'a> {
    Text(&'a str, &'a str),
    File { field: &'a str, file_name: &'a str, bytes: &'a [u8] },
}

/// Builds a multipart/form-data body, returning (content type, body).
pub fn multipart(parts: &[Part<'_>]) -> (String, Vec<u8>) {
    let boundary = "TORTUGABOUNDARY";
    let mut body: Vec<u8> = Vec::new();
    for part in parts {
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\nContent-Type: text/plain\r\n\r\n{value}\r\n")
                        .as_bytes(),
                );
            }
            Part::File { field, file_name, bytes } => {
                body.extend_from_slice(
                    format!("--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n")
                        .as_bytes(),
                );
                body.extend_from_slice(bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}

/// Minimal PDF; `tag` makes payloads distinguishable.
pub fn sample_pdf(tag: &str) -> Vec<u8> {
    format!("%PDF-1.4\n% {tag}\n1 0 obj\n<< /Type /Catalog >>\nendobj\ntrailer\n<< /Root 1 0 R >>\n%%EOF").into_bytes()
}

// Minimal 1x1 PNG (transparent)
pub fn sample_png() -> Vec<u8> {
    vec![
        0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, // signature
        0x00, 0x00, 0x00, 0x0D, b'I', b'H', b'D', b'R', 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00,
        0x01, 0x08, 0x06, 0x00, 0x00, 0x00, 0x1F, 0x15, 0xC4, 0x89, 0x00, 0x00, 0x00, 0x0A, b'I',
        b'D', b'A', b'T', 0x78, 0x9C, 0x63, 0x00, 0x01, 0x00, 0x00, 0x05, 0x00, 0x01, 0x0D, 0x0A,
        0x2D, 0xB4, 0x00, 0x00, 0x00, 0x00, b'I', b'E', b'N', b'D', 0xAE, 0x42, 0x60, 0x82,
    ]
}
