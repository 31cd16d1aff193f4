use std::sync::Arc;

use ::metrics::prometheus::{self, Encoder, Registry, TextEncoder};
use actix_web::{
    App, HttpResponse, HttpServer, Responder, error::InternalError, get, http::StatusCode, web,
};
use services::HealthReporter;

use crate::{
    config::Config,
    errors::{Error, Result},
};

pub async fn launch_api_server(
    config: &Config,
    metrics_registry: Registry,
    health_reporter: HealthReporter,
) -> Result<()> {
    let metrics_registry = Arc::new(metrics_registry);
    let health_reporter = Arc::new(health_reporter);
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(Arc::clone(&metrics_registry)))
            .app_data(web::Data::new(Arc::clone(&health_reporter)))
            .configure(routes)
    })
    .bind((config.app.host, config.app.port))
    .map_err(|e| Error::Other(e.to_string()))?
    .run()
    .await
    .map_err(|e| Error::Other(e.to_string()))
}

fn routes(cfg: &mut web::ServiceConfig) {
    cfg.service(metrics).service(health);
}

#[get("/health")]
async fn health(data: web::Data<Arc<HealthReporter>>) -> impl Responder {
    let report = data.report();

    let mut response = if report.healthy() {
        HttpResponse::Ok()
    } else {
        HttpResponse::InternalServerError()
    };

    response.json(report)
}

#[get("/metrics")]
async fn metrics(registry: web::Data<Arc<Registry>>) -> impl Responder {
    let encoder = TextEncoder::new();
    let mut buf: Vec<u8> = vec![];
    let mut encode = |metrics: &_| {
        encoder
            .encode(metrics, &mut buf)
            .map_err(map_to_internal_err)
    };

    encode(&registry.gather())?;
    encode(&prometheus::gather())?;

    let text = String::from_utf8(buf).map_err(map_to_internal_err)?;

    std::result::Result::<_, InternalError<_>>::Ok(text)
}

fn map_to_internal_err(error: impl std::error::Error) -> InternalError<String> {
    InternalError::new(error.to_string(), StatusCode::INTERNAL_SERVER_ERROR)
}
