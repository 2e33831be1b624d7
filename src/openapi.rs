use crate::error::ApiErrorBody;
use crate::models::{FileRecord, NewPost, Post, UserProfile};
use crate::routes::{LoginRequest, LoginResponse};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::routes::login,
        crate::routes::me,
        crate::routes::get_file,
        crate::routes::upload_menu,
        crate::routes::list_posts,
        crate::routes::create_post,
        crate::routes::delete_post,
        crate::routes::keepalive,
    ),
    components(schemas(
        Post, NewPost, UserProfile, FileRecord, LoginRequest, LoginResponse, ApiErrorBody
    )),
    tags(
        (name = "user", description = "Admin login"),
        (name = "file", description = "Menu and bar PDFs"),
        (name = "post", description = "Photo posts"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_every_route() {
        let doc = ApiDoc::openapi();
        for p in ["/user/login", "/user/me", "/file/{file_name}", "/file/menu", "/post", "/post/{id}", "/keepalive"] {
            assert!(doc.paths.paths.contains_key(p), "missing {p}");
        }
    }
}
