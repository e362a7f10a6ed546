mod handlers;

use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::SocketAddr;
use std::sync::Arc;

use crate::metrics::Metrics;
use crate::service::OrderService;

pub use handlers::{get_order, health_handler, metrics_handler, missing_order_id};

// ============================================================================
// HTTP Read API
// ============================================================================
//
// GET /order/{id}  - 200 JSON order, 404 unknown id, 500 store failure
// GET /order/      - 400, id missing
// GET /metrics     - Prometheus text format
// GET /health      - liveness
//
// ============================================================================

/// Register every route on an actix service config
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/order/", web::get().to(missing_order_id))
        .route("/order/{id}", web::get().to(get_order))
        .route("/metrics", web::get().to(metrics_handler))
        .route("/health", web::get().to(health_handler));
}

/// Bind and build the server. The caller awaits it and stops it through its
/// handle; OS signals are handled by the caller too.
pub fn start_http_server(
    addr: SocketAddr,
    service: Arc<OrderService>,
    metrics: Arc<Metrics>,
) -> std::io::Result<Server> {
    tracing::info!(addr = %addr, "Starting HTTP server");

    let service = web::Data::from(service);
    let metrics = web::Data::from(metrics);

    let server = HttpServer::new(move || {
        App::new()
            .app_data(service.clone())
            .app_data(metrics.clone())
            .configure(configure)
    })
    .bind(addr)?
    .disable_signals()
    .run();

    Ok(server)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::domain::order::{sample_order, Order};
    use crate::service::ServiceSettings;
    use crate::store::MemoryOrderStore;
    use actix_web::{http::StatusCode, test};

    fn wiring() -> (Arc<MemoryOrderStore>, Arc<OrderService>, Arc<Metrics>) {
        let store = Arc::new(MemoryOrderStore::new());
        let metrics = Arc::new(Metrics::new().unwrap());
        let service = Arc::new(OrderService::new(
            store.clone(),
            Arc::new(MemoryCache::new()),
            metrics.clone(),
            ServiceSettings::default(),
        ));
        (store, service, metrics)
    }

    macro_rules! app {
        ($service:expr, $metrics:expr) => {
            test::init_service(
                App::new()
                    .app_data(web::Data::from($service.clone()))
                    .app_data(web::Data::from($metrics.clone()))
                    .configure(configure),
            )
            .await
        };
    }

    #[actix_web::test]
    async fn test_get_existing_order() {
        let (_store, service, metrics) = wiring();
        let order = sample_order("A1");
        service.create_order(&order).await.unwrap();
        let app = app!(service, metrics);

        let req = test::TestRequest::get().uri("/order/A1").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: Order = test::read_body_json(resp).await;
        assert_eq!(body, order);
    }

    #[actix_web::test]
    async fn test_unknown_order_is_404() {
        let (_store, service, metrics) = wiring();
        let app = app!(service, metrics);

        let req = test::TestRequest::get().uri("/order/ZZZ").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            metrics
                .http_requests
                .with_label_values(&["GET", "/order/{id}", "404"])
                .get(),
            1
        );
    }

    #[actix_web::test]
    async fn test_missing_id_is_400() {
        let (_store, service, metrics) = wiring();
        let app = app!(service, metrics);

        let req = test::TestRequest::get().uri("/order/").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn test_store_failure_is_500() {
        let (store, service, metrics) = wiring();
        store.fail_reads(true);
        let app = app!(service, metrics);

        let req = test::TestRequest::get().uri("/order/A1").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[actix_web::test]
    async fn test_metrics_endpoint_exposes_counters() {
        let (_store, service, metrics) = wiring();
        service.create_order(&sample_order("A1")).await.unwrap();
        let app = app!(service, metrics);

        let req = test::TestRequest::get().uri("/metrics").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body = test::read_body(resp).await;
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("orders_created_total 1"));
    }

    #[actix_web::test]
    async fn test_health() {
        let (_store, service, metrics) = wiring();
        let app = app!(service, metrics);

        let req = test::TestRequest::get().uri("/health").to_request();
        let resp = test::call_service(&app, req).await;

        assert_eq!(resp.status(), StatusCode::OK);
        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["status"], "healthy");
    }

    #[actix_web::test]
    async fn test_health_handler_is_json() {
        let resp = health_handler().await;

        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(actix_web::http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }

    #[actix_web::test]
    async fn test_start_fails_when_address_is_taken() {
        let (_store, service, metrics) = wiring();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();

        let result = start_http_server(addr, service, metrics);

        assert!(result.is_err());
    }
}
