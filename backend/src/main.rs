mod config;
mod detector;
mod error;
mod pipeline;
mod routes;
mod search;
mod storage;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{App, HttpServer, web};
use config::AppConfig;
use detector::ObjectDetector;
use detector::config::DetectorConfig;
use pipeline::UploadPipeline;
use routes::configure_routes;
use search::youtube::YouTubeClient;
use std::sync::Arc;
use storage::local_store::LocalStore;

fn startup_error(context: &str, err: impl std::fmt::Display) -> std::io::Error {
    log::error!("{}: {}", context, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", context, err))
}

#[cfg(feature = "torch")]
fn load_detector(config: DetectorConfig) -> std::io::Result<Arc<dyn ObjectDetector>> {
    let detector = detector::torch::TorchDetector::load(config)
        .map_err(|e| startup_error("Model loading failed", e))?;
    Ok(Arc::new(detector))
}

#[cfg(not(feature = "torch"))]
fn load_detector(config: DetectorConfig) -> std::io::Result<Arc<dyn ObjectDetector>> {
    Err(startup_error(
        "Model loading failed",
        format!(
            "cannot load {}: no detection backend compiled in; rebuild with \
             `cargo build --features torch` (needs libtorch, see LIBTORCH)",
            config.model_path.display()
        ),
    ))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = AppConfig::from_env().map_err(|e| startup_error("Invalid configuration", e))?;

    let store = LocalStore::open(&config.upload_dir, config.max_upload_bytes)
        .map_err(|e| startup_error("Failed to open upload directory", e))?;

    let detector_config = DetectorConfig::load(&config.detector_config)
        .map_err(|e| startup_error("Invalid detector configuration", e))?;
    let detector = load_detector(detector_config)?;

    let youtube = YouTubeClient::new(
        config.youtube_api_url.clone(),
        config.youtube_api_key.clone(),
        config.search_timeout,
    )
    .map_err(|e| startup_error("Failed to build HTTP client", e))?;
    if !youtube.has_api_key() {
        log::warn!("YOUTUBE_API_KEY is not set; video suggestions will be empty");
    }

    let pipeline = UploadPipeline::new(Arc::new(store), detector, Arc::new(youtube));

    let pages_dir = config.pages_dir.clone();
    let bind_address = config.bind_address();
    log::info!(
        "Serving pages from {}, uploads in {}",
        pages_dir.display(),
        config.upload_dir.display()
    );
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allowed_methods(vec!["GET", "POST", "OPTIONS"])
                    .allowed_headers(vec![
                        actix_web::http::header::ACCEPT,
                        actix_web::http::header::CONTENT_TYPE,
                    ])
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .app_data(web::Data::new(pipeline.clone()))
            .configure(|cfg| configure_routes(cfg, pages_dir.clone()))
    })
    .bind(&bind_address)?
    .run()
    .await
}

#[cfg(all(test, not(feature = "torch")))]
mod tests {
    use super::*;

    #[test]
    fn missing_backend_names_the_torch_feature() {
        let config = DetectorConfig::from_yaml("model_path: models/food.torchscript\nnames: [cat]\n")
            .unwrap();
        let err = match load_detector(config) {
            Ok(_) => panic!("loaded a detector without a backend"),
            Err(err) => err,
        };
        let message = err.to_string();
        assert!(message.starts_with("Model loading failed"), "{message}");
        assert!(message.contains("--features torch"), "{message}");
        assert!(message.contains("models/food.torchscript"), "{message}");
    }
}
