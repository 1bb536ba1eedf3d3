mod handlers;
mod middleware;

pub use middleware::{RateLimiter, SecurityConfig};

use axum::{
    http::HeaderValue,
    middleware::from_fn_with_state,
    routing::{delete, get, post, put},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::tracker::Tracker;

/// Router with security settings from the environment.
pub fn create_router(tracker: Tracker) -> Router {
    create_router_with_config(tracker, SecurityConfig::from_env())
}

pub fn create_router_with_config(tracker: Tracker, config: SecurityConfig) -> Router {
    let mut protected = Router::new()
        // Subjects
        .route("/subjects", get(handlers::list_subjects))
        .route("/subjects", post(handlers::create_subject))
        .route("/subjects/{id}", get(handlers::get_subject))
        .route("/subjects/{id}", delete(handlers::delete_subject))
        // Topics
        .route("/subjects/{id}/topics", post(handlers::add_topic))
        .route("/subjects/{id}/topics/{topic_id}", put(handlers::edit_topic))
        .route("/subjects/{id}/topics/{topic_id}", delete(handlers::delete_topic))
        .route(
            "/subjects/{id}/topics/{topic_id}/toggle",
            post(handlers::toggle_topic),
        )
        .route(
            "/subjects/{id}/topics/{topic_id}/note",
            put(handlers::set_topic_note),
        )
        .route(
            "/subjects/{id}/topics/{topic_id}/links",
            post(handlers::add_topic_link),
        )
        .route(
            "/subjects/{id}/topics/{topic_id}/links/{link_id}",
            delete(handlers::remove_topic_link),
        )
        .route(
            "/subjects/{id}/topics/{topic_id}/images",
            get(handlers::list_topic_images),
        )
        .route(
            "/subjects/{id}/topics/{topic_id}/images",
            post(handlers::add_topic_image),
        )
        .route(
            "/subjects/{id}/topics/{topic_id}/images/{image_id}",
            delete(handlers::remove_topic_image),
        )
        // Exams
        .route("/exams", get(handlers::list_exams))
        .route("/exams", post(handlers::create_exam))
        .route("/exams/{id}", delete(handlers::delete_exam))
        // Dashboard and dataset
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/seed", post(handlers::seed))
        .route("/data", delete(handlers::clear_all))
        // Ancillary documents
        .route("/resources/{id}", get(handlers::get_resource))
        .route("/resources/{id}", put(handlers::save_resource))
        .route("/notes/{id}", get(handlers::get_note))
        .route("/notes/{id}", put(handlers::save_note))
        .route_layer(from_fn_with_state(
            config.clone(),
            middleware::auth_middleware,
        ));

    if let Some(limiter) = config.rate_limiter.clone() {
        protected =
            protected.route_layer(from_fn_with_state(limiter, middleware::rate_limit_middleware));
    }

    let api = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected);

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&config)),
        )
        .with_state(tracker)
}

fn cors_layer(config: &SecurityConfig) -> CorsLayer {
    let Some(origins) = &config.cors_origins else {
        return CorsLayer::permissive();
    };
    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin: {}", o);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
