use actix_web::dev::Server;
use actix_web::{web, App, HttpResponse, HttpServer, Responder};
use prometheus::{Encoder, TextEncoder};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use super::GroupMetrics;
use crate::actors::GroupHealth;

/// Shared state handed to the request handlers
#[derive(Clone)]
pub(crate) struct ServerState {
    pub health: Arc<GroupHealth>,
    pub metrics: Option<Arc<GroupMetrics>>,
}

pub(crate) fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_handler))
        .route("/metrics", web::get().to(metrics_handler));
}

/// Bind the health/metrics server. Signal handling is left to the group,
/// so actix does not install its own handlers.
pub(crate) fn build_server(
    addr: SocketAddr,
    workers: usize,
    shutdown_timeout: Duration,
    state: ServerState,
) -> std::io::Result<(Server, Vec<SocketAddr>)> {
    tracing::info!("📊 Starting health server on http://{}/health", addr);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .configure(routes)
    })
    .workers(workers)
    .shutdown_timeout(shutdown_timeout.as_secs())
    .disable_signals()
    .bind(addr)?;

    let bound = server.addrs();
    Ok((server.run(), bound))
}

async fn metrics_handler(state: web::Data<ServerState>) -> impl Responder {
    let Some(metrics) = state.metrics.as_ref() else {
        return HttpResponse::NotFound().body("metrics are not enabled");
    };

    let encoder = TextEncoder::new();
    let metric_families = metrics.registry().gather();

    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
        return HttpResponse::InternalServerError().finish();
    }

    HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(buffer)
}

async fn health_handler(state: web::Data<ServerState>) -> impl Responder {
    let report = state.health.report();
    if report.status.is_unhealthy() {
        HttpResponse::ServiceUnavailable().json(report)
    } else {
        HttpResponse::Ok().json(report)
    }
}
