use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue};
use axum::middleware::map_response;
use axum::response::Response;
use axum::routing::{get, post, put};
use axum::Router;
use depot_core::Catalog;
use tower_http::trace::TraceLayer;

use crate::handler::{self, AppState};

/// Build the axum router with all depot endpoints.
pub fn build_router<C: Catalog + 'static>(state: AppState<C>, max_body: usize) -> Router {
    Router::new()
        .route("/v1/health", get(handler::health))
        .route("/v1/check", post(handler::check_hashes::<C>))
        .route(
            "/v1/objects/:hash",
            put(handler::put_object::<C>).get(handler::get_object::<C>),
        )
        .route("/v1/references", post(handler::query_references::<C>))
        .route("/v1/releases", post(handler::submit_release::<C>))
        .route(
            "/v1/releases/:owner/:project/:revision",
            get(handler::query_release::<C>).delete(handler::delete_release::<C>),
        )
        .route(
            "/v1/releases/:owner/:project/:revision/latest",
            get(handler::get_commit::<C>),
        )
        .route("/v1/owners", get(handler::list_owners::<C>))
        .route("/v1/projects", get(handler::list_projects::<C>))
        .route(
            "/v1/projects/:owner/:project/commits",
            get(handler::list_commits::<C>),
        )
        .route(
            "/raw/:owner/:project/:revision/*path",
            get(handler::raw_file::<C>),
        )
        .layer(map_response(no_cache))
        .layer(DefaultBodyLimit::max(max_body))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Releases can be replaced under the same URL, so nothing is cacheable.
async fn no_cache(mut response: Response) -> Response {
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    response
}
