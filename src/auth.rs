use actix_web::cookie::{Cookie, SameSite};
use actix_web::{dev::Payload, web, FromRequest, HttpRequest};
use actix_web_httpauth::extractors::bearer::BearerAuth;
use futures_util::future::LocalBoxFuture;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config::{AdminSeed, Config};
use crate::error::ApiError;
use crate::models::{Id, NewUser, User};
use crate::repo::{RepoError, UserRepo};
use crate::routes::AppState;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid username or password")]
    InvalidCredentials,
    #[error("no bearer token or auth cookie")]
    MissingToken,
    #[error("invalid or expired token")]
    InvalidToken,
    #[error("token subject does not exist")]
    UnknownUser,
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
    #[error("token signing failed: {0}")]
    Sign(jsonwebtoken::errors::Error),
    #[error("repository error: {0}")]
    Repo(#[from] RepoError),
    #[error("blocking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Token payload: the user id is the only application claim.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

/// Password hashing plus issuing and checking of HS256 bearer tokens.
#[derive(Clone)]
pub struct AuthService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: chrono::Duration,
    cookie_key: String,
    bcrypt_cost: u32,
}

impl AuthService {
    pub fn new(secret: &str, ttl: chrono::Duration, cookie_key: impl Into<String>, bcrypt_cost: u32) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
            cookie_key: cookie_key.into(),
            bcrypt_cost,
        }
    }

    pub fn from_config(cfg: &Config) -> Self {
        Self::new(&cfg.jwt_secret, cfg.token_ttl, cfg.cookie_key.clone(), cfg.bcrypt_cost)
    }

    pub fn cookie_key(&self) -> &str {
        &self.cookie_key
    }

    pub async fn hash_password(&self, password: &str) -> Result<String, AuthError> {
        let password = password.to_owned();
        let cost = self.bcrypt_cost;
        Ok(tokio::task::spawn_blocking(move || bcrypt::hash(password, cost)).await??)
    }

    /// Looks the user up by name and checks the password against the stored bcrypt hash.
    pub async fn authenticate<R>(&self, users: &R, username: &str, password: &str) -> Result<User, AuthError>
    where
        R: UserRepo + ?Sized,
    {
        let user = match users.get_user_by_username(username).await {
            Ok(u) => Some(u),
            Err(RepoError::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
        let hash = user.as_ref().map(|u| u.password_hash.clone());
        let ok = self.check_password(password, hash).await?;
        match user {
            Some(user) if ok => Ok(user),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    /// Verifies against `hash`. Without a hash the same bcrypt work is done on
    /// a throwaway hash so unknown usernames cost as much as wrong passwords.
    async fn check_password(&self, password: &str, hash: Option<String>) -> Result<bool, AuthError> {
        let password = password.to_owned();
        let cost = self.bcrypt_cost;
        let ok = tokio::task::spawn_blocking(move || match hash {
            Some(hash) => bcrypt::verify(password, &hash),
            None => bcrypt::hash(password, cost).map(|_| false),
        })
        .await??;
        Ok(ok)
    }

    pub fn issue_token(&self, user_id: Id) -> Result<String, AuthError> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            iat: now.timestamp() as usize,
            exp: (now + self.ttl).timestamp().max(0) as usize,
        };
        encode(&Header::default(), &claims, &self.encoding).map_err(AuthError::Sign)
    }

    /// Signature and expiry only; there is no revocation list.
    pub fn verify_token(&self, token: &str) -> Result<Id, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.leeway = 0;
        let data = decode::<Claims>(token, &self.decoding, &validation).map_err(|_| AuthError::InvalidToken)?;
        data.claims.sub.parse().map_err(|_| AuthError::InvalidToken)
    }

    pub fn token_cookie(&self, token: &str) -> Cookie<'static> {
        Cookie::build(self.cookie_key.clone(), token.to_owned())
            .path("/")
            .http_only(true)
            .secure(true)
            .same_site(SameSite::None)
            .max_age(actix_web::cookie::time::Duration::seconds(self.ttl.num_seconds()))
            .finish()
    }

    /// Creates the configured admin when no user of that name exists yet. Returns true if created.
    pub async fn ensure_admin<R>(&self, users: &R, seed: &AdminSeed) -> Result<bool, AuthError>
    where
        R: UserRepo + ?Sized,
    {
        match users.get_user_by_username(&seed.username).await {
            Ok(_) => return Ok(false),
            Err(RepoError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }
        let password_hash = self.hash_password(&seed.password).await?;
        match users.create_user(NewUser { username: seed.username.clone(), password_hash }).await {
            Ok(_) => Ok(true),
            Err(RepoError::Conflict) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

/// Bearer header first, auth cookie second; the first one present is used.
fn extract_token(req: &HttpRequest, pl: &mut Payload, cookie_key: &str) -> Option<String> {
    if let Ok(bearer) = BearerAuth::from_request(req, pl).into_inner() {
        return Some(bearer.token().to_owned());
    }
    req.cookie(cookie_key).map(|c| c.value().to_owned())
}

/// Extractor yielding the persisted user behind a valid token.
pub struct AuthUser(pub User);

impl FromRequest for AuthUser {
    type Error = ApiError;
    type Future = LocalBoxFuture<'static, Result<Self, ApiError>>;

    fn from_request(req: &HttpRequest, pl: &mut Payload) -> Self::Future {
        let Some(state) = req.app_data::<web::Data<AppState>>().cloned() else {
            return Box::pin(async { Err::<AuthUser, _>(ApiError::Internal) });
        };
        let token = extract_token(req, pl, state.auth.cookie_key());
        Box::pin(resolve_user(state, token))
    }
}

async fn resolve_user(state: web::Data<AppState>, token: Option<String>) -> Result<AuthUser, ApiError> {
    let token = token.ok_or(AuthError::MissingToken)?;
    let user_id = state.auth.verify_token(&token)?;
    match state.repo.get_user(user_id).await {
        Ok(user) => Ok(AuthUser(user)),
        Err(RepoError::NotFound) => Err(AuthError::UnknownUser.into()),
        Err(e) => Err(e.into()),
    }
}
