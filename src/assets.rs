use std::path::{Component, Path, PathBuf};

use actix_web::{http::header, web, HttpRequest, HttpResponse};

/// Root directory of the frontend build, served for unmatched GETs.
#[derive(Clone, Debug)]
pub struct StaticDir(pub PathBuf);

/// Maps a request path onto the static directory, refusing anything that
/// could climb out of it.
fn resolve(root: &Path, request_path: &str) -> Option<PathBuf> {
    let rel = request_path.trim_start_matches('/');
    let rel = if rel.is_empty() || rel.ends_with('/') { format!("{rel}index.html") } else { rel.to_string() };
    let rel = Path::new(&rel);
    if !rel.components().all(|c| matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(root.join(rel))
}

pub async fn serve(req: HttpRequest, dir: Option<web::Data<StaticDir>>) -> HttpResponse {
    let Some(dir) = dir else { return HttpResponse::NotFound().finish() };
    if req.method() != actix_web::http::Method::GET && req.method() != actix_web::http::Method::HEAD {
        return HttpResponse::NotFound().finish();
    }
    let Some(path) = resolve(&dir.0, req.path()) else { return HttpResponse::NotFound().finish() };
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mime = mime_guess::from_path(&path).first_or_octet_stream();
            HttpResponse::Ok()
                .insert_header((header::CONTENT_TYPE, mime.as_ref()))
                .insert_header((header::CACHE_CONTROL, "public, max-age=3600"))
                .body(bytes)
        }
        Err(_) => HttpResponse::NotFound().finish(),
    }
}
