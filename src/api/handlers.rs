use actix_web::{web, HttpResponse};
use std::time::Instant;

use crate::metrics::Metrics;
use crate::service::{OrderService, ServiceError};

const ORDER_ROUTE: &str = "/order/{id}";

pub async fn get_order(
    path: web::Path<String>,
    service: web::Data<OrderService>,
    metrics: web::Data<Metrics>,
) -> HttpResponse {
    let started = Instant::now();
    let order_uid = path.into_inner();

    let response = if order_uid.trim().is_empty() {
        HttpResponse::BadRequest().body("id is required")
    } else {
        match service.get_order(&order_uid).await {
            Ok(order) => HttpResponse::Ok().json(order),
            Err(ServiceError::NotFound(_)) => {
                tracing::debug!(order_uid = %order_uid, "Order not found");
                HttpResponse::NotFound().body("order not found")
            }
            Err(e) => {
                tracing::error!(order_uid = %order_uid, error = %e, "Failed to load order");
                HttpResponse::InternalServerError().body("internal server error")
            }
        }
    };

    metrics.record_http_request(
        "GET",
        ORDER_ROUTE,
        response.status().as_u16(),
        started.elapsed().as_secs_f64(),
    );
    response
}

/// `/order/` with nothing after the slash
pub async fn missing_order_id(metrics: web::Data<Metrics>) -> HttpResponse {
    metrics.record_http_request("GET", "/order/", 400, 0.0);
    HttpResponse::BadRequest().body("id is required")
}

pub async fn metrics_handler(metrics: web::Data<Metrics>) -> HttpResponse {
    match metrics.encode_text() {
        Ok(buffer) => HttpResponse::Ok()
            .content_type("text/plain; version=0.0.4")
            .body(buffer),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            HttpResponse::InternalServerError().body("internal server error")
        }
    }
}

pub async fn health_handler() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "order-pipeline"
    }))
}
