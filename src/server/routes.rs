use crate::server::handlers::{
    breed_handler, breeds_handler, health_handler, index_handler, name_handler, names_handler,
    process_handler, zipcode_handler,
};
use crate::server::state::AppState;
use axum::routing::get;
use axum::Router;
use tower_http::classify::{ServerErrorsAsFailures, SharedClassifier};
use tower_http::services::ServeDir;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;

/// Request span plus one line per response with its latency.
pub fn trace_layer() -> TraceLayer<SharedClassifier<ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        )
}

pub fn app_router(state: AppState) -> Router {
    let output = &state.config.output;
    let maps_dir = state.storage.full_path(&output.maps_dir);
    let data_dir = state.storage.full_path(&output.data_dir);
    let static_dir = state.storage.full_path(&state.config.server.static_dir);

    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/zipcode/{zip}", get(zipcode_handler))
        .route("/breed/{breed}", get(breed_handler))
        .route("/name/{name}", get(name_handler))
        .route("/breeds", get(breeds_handler))
        .route("/names", get(names_handler));

    Router::new()
        .route("/", get(index_handler))
        .route("/process", get(process_handler))
        .nest("/api", api)
        .nest_service("/maps", ServeDir::new(maps_dir))
        .nest_service("/data", ServeDir::new(data_dir))
        .nest_service("/static", ServeDir::new(static_dir))
        .with_state(state)
        .layer(trace_layer())
}
