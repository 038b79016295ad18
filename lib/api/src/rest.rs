use actix_cors::Cors;
use actix_web::error::InternalError;
use actix_web::{web, App, HttpResponse, HttpServer, Result as ActixResult};
use featx_core::{Error, JoinKeys};
use featx_engine::{FeatureViewInfo, Registry};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Deserialize)]
struct OnlineFeaturesRequest {
    #[serde(default)]
    join_keys: JoinKeys,
    #[serde(default)]
    request_data: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize)]
struct OnlineFeaturesResponse<'a> {
    feature_service: &'a str,
    features: featx_engine::FeatureVector,
}

#[derive(Deserialize)]
struct RunRequest {
    inputs: serde_json::Map<String, serde_json::Value>,
}

#[derive(Serialize)]
struct ServiceSummary {
    name: String,
    feature_views: Vec<String>,
}

pub struct RestApi;

impl RestApi {
    pub async fn start(registry: Arc<Registry>, port: u16) -> std::io::Result<()> {
        info!(port, "starting REST API");
        HttpServer::new(move || {
            let cors = Cors::default()
                .allow_any_origin()
                .allow_any_method()
                .allow_any_header()
                .max_age(3600);

            App::new()
                .wrap(cors)
                .app_data(web::Data::new(registry.clone()))
                .configure(routes)
        })
        .bind(("0.0.0.0", port))?
        .run()
        .await
    }
}

/// Route table, shared by the server and tests
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| {
        let response = error_response(&Error::Serialization(err.to_string()));
        InternalError::from_response(err, response).into()
    }))
    .route("/health", web::get().to(health))
        .route("/feature-services", web::get().to(list_feature_services))
        .route("/feature-services/{name}", web::get().to(get_feature_service))
        .route("/feature-services/{name}/online", web::post().to(get_online_features))
        .route("/feature-views", web::get().to(list_feature_views))
        .route("/feature-views/{name}", web::get().to(get_feature_view))
        .route("/feature-views/{name}/run", web::post().to(run_feature_view));
}

async fn health() -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(serde_json::json!({"status": "ok"})))
}

async fn list_feature_services(registry: web::Data<Arc<Registry>>) -> ActixResult<HttpResponse> {
    let services: Vec<ServiceSummary> = registry
        .list_feature_services()
        .into_iter()
        .filter_map(|name| registry.get_feature_service(&name))
        .map(|service| ServiceSummary {
            name: service.name().to_string(),
            feature_views: service.views().iter().map(|v| v.name().to_string()).collect(),
        })
        .collect();
    Ok(HttpResponse::Ok().json(services))
}

async fn get_feature_service(
    registry: web::Data<Arc<Registry>>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    let name = path.into_inner();
    match registry.feature_service(&name) {
        Ok(service) => Ok(HttpResponse::Ok().json(service.info())),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn get_online_features(
    registry: web::Data<Arc<Registry>>,
    path: web::Path<String>,
    req: web::Json<OnlineFeaturesRequest>,
) -> ActixResult<HttpResponse> {
    let name = path.into_inner();
    let service = match registry.feature_service(&name) {
        Ok(service) => service,
        Err(e) => return Ok(error_response(&e)),
    };
    let request_data = match service.decode_request_data(&req.request_data) {
        Ok(row) => row,
        Err(e) => return Ok(error_response(&e)),
    };

    match service
        .get_online_features(&req.join_keys, &request_data, &registry.serving_options())
        .await
    {
        Ok(features) => Ok(HttpResponse::Ok().json(OnlineFeaturesResponse {
            feature_service: service.name(),
            features,
        })),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn list_feature_views(registry: web::Data<Arc<Registry>>) -> ActixResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(registry.list_feature_views()))
}

async fn get_feature_view(
    registry: web::Data<Arc<Registry>>,
    path: web::Path<String>,
) -> ActixResult<HttpResponse> {
    match registry.feature_view(&path.into_inner()) {
        Ok(view) => Ok(HttpResponse::Ok().json(FeatureViewInfo::from(view.as_ref()))),
        Err(e) => Ok(error_response(&e)),
    }
}

async fn run_feature_view(
    registry: web::Data<Arc<Registry>>,
    path: web::Path<String>,
    req: web::Json<RunRequest>,
) -> ActixResult<HttpResponse> {
    let view = match registry.feature_view(&path.into_inner()) {
        Ok(view) => view,
        Err(e) => return Ok(error_response(&e)),
    };
    match view.run_json(&req.inputs) {
        Ok(record) => Ok(HttpResponse::Ok().json(record)),
        Err(e) => Ok(error_response(&e)),
    }
}

fn error_response(err: &Error) -> HttpResponse {
    let mut response = match err {
        Error::SchemaMismatch { .. } | Error::Serialization(_) => HttpResponse::BadRequest(),
        Error::NotFound(_) => HttpResponse::NotFound(),
        Error::LookupTimeout { .. } => HttpResponse::GatewayTimeout(),
        _ => {
            warn!(error = %err, "request failed");
            HttpResponse::InternalServerError()
        }
    };
    response.json(serde_json::json!({
        "error": err.to_string(),
        "retryable": err.is_retryable(),
    }))
}
