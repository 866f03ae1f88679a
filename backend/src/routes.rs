use std::path::PathBuf;

use actix_files::{Files, NamedFile};
use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{HttpRequest, HttpResponse, web};
use futures::{StreamExt, TryStreamExt};
use log::{info, warn};
use shared::{ErrorResponse, UploadResponse};

use crate::error::PipelineError;
use crate::pipeline::{UploadPipeline, UploadedImage};

const IMAGE_FIELD: &str = "image";

#[derive(Clone)]
pub struct PagesDir(pub PathBuf);

pub fn configure_routes(cfg: &mut web::ServiceConfig, pages_dir: PathBuf) {
    cfg.app_data(web::Data::new(PagesDir(pages_dir.clone())))
        .route("/", page("index.html"))
        .route("/app", page("app.html"))
        .route("/blog", page("blog.html"))
        .route("/contact", page("page-contact.html"))
        .service(web::resource("/upload").route(web::post().to(upload_image)))
        .service(web::resource("/uploads/{filename}").route(web::get().to(uploaded_file)))
        .service(Files::new("/static", pages_dir.join("static")));
}

fn page(name: &'static str) -> actix_web::Route {
    web::get().to(move |pages: web::Data<PagesDir>| async move {
        NamedFile::open_async(pages.0.join(name)).await
    })
}

fn is_multipart(req: &HttpRequest) -> bool {
    req.headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_ascii_lowercase().starts_with("multipart/form-data"))
        .unwrap_or(false)
}

/// Pulls the `image` file part out of the form, enforcing the upload size cap.
/// Other parts are skipped.
async fn read_image_field(
    mut payload: Multipart,
    max_bytes: usize,
) -> Result<Option<UploadedImage>, PipelineError> {
    while let Some(mut field) = payload
        .try_next()
        .await
        .map_err(|e| PipelineError::InvalidUpload(e.to_string()))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }
        let Some(filename) = field
            .content_disposition()
            .and_then(|cd| cd.get_filename())
            .map(str::to_string)
        else {
            continue;
        };

        let mut data = Vec::new();
        while let Some(chunk) = field.next().await {
            let chunk = chunk.map_err(|e| PipelineError::InvalidUpload(e.to_string()))?;
            if data.len() + chunk.len() > max_bytes {
                return Err(PipelineError::FileTooLarge);
            }
            data.extend_from_slice(&chunk);
        }
        return Ok(Some(UploadedImage { filename, data }));
    }
    Ok(None)
}

async fn upload_image(
    req: HttpRequest,
    pipeline: web::Data<UploadPipeline>,
    payload: Multipart,
) -> Result<HttpResponse, PipelineError> {
    let upload = if is_multipart(&req) {
        read_image_field(payload, pipeline.store().max_bytes()).await?
    } else {
        warn!("Upload request without a multipart body");
        None
    };

    let result = pipeline.handle(upload).await?;
    info!("Upload {} classified as '{}'", result.image_url, result.class_name);
    Ok(HttpResponse::Ok().json(UploadResponse::from(result)))
}

async fn uploaded_file(
    req: HttpRequest,
    pipeline: web::Data<UploadPipeline>,
    path: web::Path<String>,
) -> HttpResponse {
    let filename = path.into_inner();
    let not_found = || HttpResponse::NotFound().json(ErrorResponse::new("File not found"));

    let Some(object_path) = pipeline.store().resolve(&filename).await else {
        return not_found();
    };
    match NamedFile::open_async(&object_path).await {
        Ok(file) => file.into_response(&req),
        Err(e) => {
            warn!("Indexed upload {} unreadable: {}", filename, e);
            not_found()
        }
    }
}
