//! Demo HTTP gateway: exposes `POST /v1/scan` in front of
//! `guardian_scan_core::GuardianScanService`, plus a health check. Auth and
//! billing are left as a single stub check — real deployments would swap
//! it for their own API-key/JWT verification without touching the scan
//! path itself.

use actix_cors::Cors;
use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer, Responder};
use guardian_scan_core::cache::InMemoryCache;
use guardian_scan_core::config::ScanConfig;
use guardian_scan_core::types::{ScanRequest, ScanType};
use guardian_scan_core::GuardianScanService;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct ScanApiRequest {
    wallet_address: String,
    transaction_blob: String,
    #[serde(default)]
    scan_type: ScanType,
}

/// Placeholder auth/billing check: requires an `Authorization` header to be
/// present at all, without validating its contents. A production gateway
/// would verify an API key or JWT here and meter usage before admitting
/// the request to the scan pipeline.
fn has_auth_header(req: &HttpRequest) -> bool {
    req.headers().contains_key("authorization")
}

async fn scan(
    req: HttpRequest,
    service: web::Data<GuardianScanService<InMemoryCache>>,
    body: web::Json<ScanApiRequest>,
) -> impl Responder {
    if !has_auth_header(&req) {
        return HttpResponse::Unauthorized().json(serde_json::json!({
            "error": "missing Authorization header"
        }));
    }

    let request = ScanRequest {
        transaction_blob: body.transaction_blob.clone(),
        wallet_address: body.wallet_address.clone(),
        scan_type: body.scan_type,
        priority: None,
    };

    match service.submit(request).await {
        Ok(result) => HttpResponse::Ok().json(result),
        Err(err) => {
            let status = actix_web::http::StatusCode::from_u16(err.status_hint())
                .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
            HttpResponse::build(status).json(serde_json::json!({
                "error": err.to_string(),
                "retriable": err.is_retriable(),
            }))
        }
    }
}

async fn health() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "ok",
        "service": "guardian-gateway",
        "version": "1.0.0"
    }))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("starting guardian-gateway");

    let config = ScanConfig::default();
    let cache_backend = InMemoryCache::new(&config.cache);
    let service = web::Data::new(GuardianScanService::new(
        config.clone(),
        vec![],
        vec!["11111111111111111111111111111111".to_string()],
        vec![],
        guardian_ml::AnomalyModel::new(),
        cache_backend,
        std::sync::Arc::new(guardian_scan_core::explainer::TemplateExplainer),
        std::sync::Arc::new(guardian_scan_core::events::NullEventSink),
    ));

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .app_data(service.clone())
            .route("/health", web::get().to(health))
            .route("/v1/scan", web::post().to(scan))
    })
    .bind(("0.0.0.0", 8080))?
    .run()
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test;

    #[actix_web::test]
    async fn health_endpoint_reports_ok() {
        let app = test::init_service(App::new().route("/health", web::get().to(health))).await;
        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;
        assert!(resp.status().is_success());
    }
}
