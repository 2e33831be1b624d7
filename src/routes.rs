use std::sync::Arc;

use actix_multipart::Multipart;
use actix_web::{web, Either, HttpResponse};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::{error, info, warn};

use crate::auth::{AuthService, AuthUser};
use crate::error::ApiError;
use crate::files::FileService;
use crate::models::*;
use crate::repo::{Repo, RepoError};
use crate::upload::buffer_form;

pub const PDF_SIZE_LIMIT: usize = 20 * 1024 * 1024; // 20 MB
pub const PHOTO_SIZE_LIMIT: usize = 10 * 1024 * 1024; // 10 MB

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/user")
            .service(web::resource("/login").route(web::post().to(login)))
            .service(web::resource("/me").route(web::get().to(me))),
    )
    .service(
        web::scope("/file")
            .service(
                web::resource("/menu")
                    .route(web::post().to(upload_menu))
                    .route(web::get().to(get_menu_by_name)),
            )
            .service(web::resource("/{file_name}").route(web::get().to(get_file))),
    )
    .service(
        web::scope("/post")
            .service(
                web::resource("")
                    .route(web::get().to(list_posts))
                    .route(web::post().to(create_post)),
            )
            .service(web::resource("/{id}").route(web::delete().to(delete_post))),
    )
    .route("/keepalive", web::get().to(keepalive))
    .app_data(web::JsonConfig::default().error_handler(|e, _| {
        ApiError::BadRequest(format!("Invalid JSON body: {e}")).into()
    }))
    .app_data(web::FormConfig::default().error_handler(|e, _| {
        ApiError::BadRequest(format!("Invalid form body: {e}")).into()
    }));
}

#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn Repo>,
    pub files: FileService,
    pub auth: AuthService,
}

// ---------------- Users ----------------

#[derive(Debug, Deserialize, utoipa::ToSchema)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct LoginResponse {
    pub token: String,
}

#[utoipa::path(
    post,
    path = "/user/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued (also set as cookie)", body = LoginResponse),
        (status = 401, description = "Invalid username or password", body = crate::error::ApiErrorBody)
    )
)]
pub async fn login(
    data: web::Data<AppState>,
    payload: Either<web::Json<LoginRequest>, web::Form<LoginRequest>>,
) -> Result<HttpResponse, ApiError> {
    let creds = match payload {
        Either::Left(json) => json.into_inner(),
        Either::Right(form) => form.into_inner(),
    };
    let user = data.auth.authenticate(&*data.repo, &creds.username, &creds.password).await.map_err(|e| {
        warn!(username = %creds.username, "login rejected: {e}");
        ApiError::from(e)
    })?;
    let token = data.auth.issue_token(user.id)?;
    info!(user = %user.username, "login ok");
    Ok(HttpResponse::Ok()
        .cookie(data.auth.token_cookie(&token))
        .json(LoginResponse { token }))
}

#[utoipa::path(
    get,
    path = "/user/me",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorBody)
    )
)]
pub async fn me(auth: AuthUser) -> Result<HttpResponse, ApiError> {
    Ok(HttpResponse::Ok().json(UserProfile::from(&auth.0)))
}

// ---------------- Files (menu / bar PDFs) ----------------

/// The two document slots, keyed by multipart field name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileSlot {
    Menu,
    Bar,
}

impl FileSlot {
    pub const FIELDS: [&'static str; 2] = ["menu", "bar"];

    pub fn from_field(field: &str) -> Option<Self> {
        match field {
            "menu" => Some(FileSlot::Menu),
            "bar" => Some(FileSlot::Bar),
            _ => None,
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            FileSlot::Menu => "menu.pdf",
            FileSlot::Bar => "bar.pdf",
        }
    }
}

#[utoipa::path(
    get,
    path = "/file/{file_name}",
    params(("file_name" = String, Path, description = "Logical file name, e.g. menu.pdf")),
    responses(
        (status = 200, description = "File content"),
        (status = 404, description = "File Not Found!", body = crate::error::ApiErrorBody),
        (status = 500, description = "Cannot read file", body = crate::error::ApiErrorBody)
    )
)]
pub async fn get_file(data: web::Data<AppState>, path: web::Path<String>) -> Result<HttpResponse, ApiError> {
    stream_file(&data, &path.into_inner()).await
}

/// `GET /file/menu` lands on the upload resource; it is still a plain name lookup.
async fn get_menu_by_name(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    stream_file(&data, "menu").await
}

async fn stream_file(data: &AppState, file_name: &str) -> Result<HttpResponse, ApiError> {
    let Some((file, rec)) = data.files.get_file_read_stream(file_name).await? else {
        return Err(ApiError::NotFound("File Not Found!".into()));
    };
    let mime = mime_guess::from_path(&rec.file_name).first_or_octet_stream();
    // dropping the body on disconnect closes the file
    Ok(HttpResponse::Ok()
        .content_type(mime.as_ref())
        .streaming(ReaderStream::new(file)))
}

#[utoipa::path(
    post,
    path = "/file/menu",
    responses(
        (status = 200, description = "Slots replaced"),
        (status = 400, description = "No files uploaded.", body = crate::error::ApiErrorBody),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorBody),
        (status = 415, description = "Not a PDF", body = crate::error::ApiErrorBody)
    )
)]
pub async fn upload_menu(
    _auth: AuthUser,
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let form = buffer_form(payload, &FileSlot::FIELDS, PDF_SIZE_LIMIT).await?;
    if form.files.is_empty() {
        return Err(ApiError::BadRequest("No files uploaded.".into()));
    }
    if let Some(bad) = form.files.iter().find(|f| f.content_type != "application/pdf") {
        return Err(ApiError::UnsupportedMediaType(format!("Field {} must be a PDF.", bad.field)));
    }
    for file in form.files {
        let Some(slot) = FileSlot::from_field(&file.field) else { continue };
        let key = data.files.upload_file(file).await?;
        if let Err(e) = data.files.delete_file(slot.file_name()).await {
            data.files.discard_upload(&key).await;
            return Err(e.into());
        }
        if let Err(e) = data.files.save_file(slot.file_name(), &key).await {
            data.files.discard_upload(&key).await;
            return Err(e.into());
        }
        info!(file_name = slot.file_name(), key = %key, "slot replaced");
    }
    Ok(HttpResponse::Ok().finish())
}

// ---------------- Posts ----------------

#[utoipa::path(
    get,
    path = "/post",
    responses((status = 200, description = "All posts, newest first", body = [Post]))
)]
pub async fn list_posts(data: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let posts = data.repo.list_posts().await?;
    Ok(HttpResponse::Ok().json(posts))
}

#[utoipa::path(
    post,
    path = "/post",
    responses(
        (status = 200, description = "Post created", body = Post),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorBody),
        (status = 415, description = "Only image files are allowed.", body = crate::error::ApiErrorBody),
        (status = 422, description = "Missing title or text", body = crate::error::ApiErrorBody)
    )
)]
pub async fn create_post(
    _auth: AuthUser,
    data: web::Data<AppState>,
    payload: Multipart,
) -> Result<HttpResponse, ApiError> {
    let mut form = buffer_form(payload, &["photo"], PHOTO_SIZE_LIMIT).await?;
    let title = form.text("title").ok_or_else(|| ApiError::Validation("Field title is required.".into()))?.to_owned();
    let text = form.text("text").ok_or_else(|| ApiError::Validation("Field text is required.".into()))?.to_owned();

    let photo = match form.take_file("photo") {
        Some(file) if !file.content_type.starts_with("image/") => {
            return Err(ApiError::UnsupportedMediaType("Only image files are allowed.".into()));
        }
        Some(file) => {
            let key = data.files.upload_file(file).await?;
            if let Err(e) = data.files.save_file(&key, &key).await {
                data.files.discard_upload(&key).await;
                return Err(e.into());
            }
            Some(key)
        }
        None => None,
    };

    match data.repo.create_post(NewPost { title, text, photo: photo.clone() }).await {
        Ok(post) => {
            info!(post = %post.id, "post created");
            Ok(HttpResponse::Ok().json(post))
        }
        Err(e) => {
            if let Some(key) = photo {
                if let Err(cleanup) = data.files.delete_file(&key).await {
                    warn!(key = %key, "orphaned photo left behind: {cleanup}");
                }
            }
            Err(e.into())
        }
    }
}

#[utoipa::path(
    delete,
    path = "/post/{id}",
    params(("id" = String, Path, description = "Post id (UUID)")),
    responses(
        (status = 204, description = "Post deleted"),
        (status = 400, description = "Invalid post ID", body = crate::error::ApiErrorBody),
        (status = 401, description = "Unauthorized", body = crate::error::ApiErrorBody),
        (status = 404, description = "Post not found", body = crate::error::ApiErrorBody)
    )
)]
pub async fn delete_post(
    _auth: AuthUser,
    data: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, ApiError> {
    let id: Id = path.parse().map_err(|_| ApiError::BadRequest("Invalid post ID".into()))?;
    let post = data.repo.delete_post(id).await.map_err(|e| match e {
        RepoError::NotFound => ApiError::NotFound("Post not found".into()),
        other => other.into(),
    })?;
    if let Some(photo) = post.photo.as_deref() {
        // the row is already gone; a failed cleanup is still reported
        data.files.delete_file(photo).await.map_err(|e| {
            error!(post = %post.id, photo, "photo cleanup failed: {e}");
            ApiError::from(e)
        })?;
    }
    info!(post = %post.id, "post deleted");
    Ok(HttpResponse::NoContent().finish())
}

// ---------------- Keepalive ----------------

#[utoipa::path(get, path = "/keepalive", responses((status = 200, description = "Alive")))]
pub async fn keepalive() -> HttpResponse {
    HttpResponse::Ok().finish()
}
