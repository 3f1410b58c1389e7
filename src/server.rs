use axum::{extract::Request, http::StatusCode, response::IntoResponse, routing::get, Router};
use std::sync::Arc;
use tower::util::MapRequest;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::catalog::{ResponseCache, Shaper};
use crate::config::Config;
use crate::upstream::MovieApi;

#[derive(Clone)]
pub struct AppState {
    pub movies: Arc<dyn MovieApi>,
    pub shaper: Arc<Shaper>,
    pub cache: ResponseCache,
}

impl AppState {
    pub fn new(config: &Config, movies: Arc<dyn MovieApi>) -> Self {
        let shaper = Shaper::new(&config.tmdb.image_base_url);
        let cache = ResponseCache::new(config.cache_ttl(), config.cache.key);
        Self {
            movies,
            shaper: Arc::new(shaper),
            cache,
        }
    }
}

/// The router wrapped in path normalization, which has to run before routing.
pub type App = MapRequest<Router, fn(Request) -> Request>;

pub fn build_app(state: AppState) -> App {
    MapRequest::new(build_router(state), crate::middleware::normalize_path as fn(Request) -> Request)
}

pub fn build_router(state: AppState) -> Router {
    let catalog_routes = Router::new()
        .route("/trending/", get(crate::catalog::trending))
        .route("/details/:movie_id/", get(crate::catalog::details))
        .route("/search/", get(crate::catalog::search));

    Router::new()
        .route("/robots.txt", get(robots_txt_handler))
        .merge(catalog_routes)
        .fallback(fallback_handler)
        .layer(axum::middleware::from_fn(crate::middleware::log_request))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn robots_txt_handler() -> &'static str {
    "User-agent: *\nDisallow: /\n"
}

async fn fallback_handler(req: Request) -> impl IntoResponse {
    if req.method() == axum::http::Method::OPTIONS {
        return StatusCode::OK.into_response();
    }
    StatusCode::NOT_FOUND.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{UpstreamError, UpstreamResult};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::header;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tower::ServiceExt;

    type Responder = Box<dyn Fn() -> UpstreamResult<Value> + Send + Sync>;

    struct FakeMovies {
        respond: Responder,
        calls: AtomicUsize,
        last_query: Mutex<Option<String>>,
        last_id: Mutex<Option<u64>>,
    }

    impl FakeMovies {
        fn new(respond: impl Fn() -> UpstreamResult<Value> + Send + Sync + 'static) -> Arc<Self> {
            Arc::new(Self {
                respond: Box::new(respond),
                calls: AtomicUsize::new(0),
                last_query: Mutex::new(None),
                last_id: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn call(&self) -> UpstreamResult<Value> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.respond)()
        }
    }

    #[async_trait]
    impl MovieApi for FakeMovies {
        async fn trending(&self) -> UpstreamResult<Value> {
            self.call()
        }

        async fn details(&self, movie_id: u64) -> UpstreamResult<Value> {
            *self.last_id.lock().unwrap() = Some(movie_id);
            self.call()
        }

        async fn search(&self, query: &str) -> UpstreamResult<Value> {
            *self.last_query.lock().unwrap() = Some(query.to_string());
            self.call()
        }
    }

    fn app(movies: Arc<FakeMovies>) -> App {
        build_app(AppState::new(&Config::default(), movies))
    }

    async fn fetch(app: &App, uri: &str) -> (StatusCode, axum::http::HeaderMap, Value) {
        let req = axum::http::Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, headers, value)
    }

    #[tokio::test]
    async fn test_trending_shapes_results() {
        let movies = FakeMovies::new(|| {
            Ok(json!({"results": [{"id": 1, "title": "X", "poster_path": "/a.jpg", "vote_average": 7.5}]}))
        });
        let app = app(movies.clone());

        let (status, headers, body) = fetch(&app, "/trending/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
        assert_eq!(headers[header::CACHE_CONTROL], "max-age=600");
        assert_eq!(
            body,
            json!([{
                "id": 1,
                "title": "X",
                "overview": null,
                "poster_path": "/a.jpg",
                "poster_url": "https://image.tmdb.org/t/p/w500/a.jpg",
                "rating": 7.5,
                "release_date": null
            }])
        );
    }

    #[tokio::test]
    async fn test_trending_timeout() {
        let movies = FakeMovies::new(|| Err(UpstreamError::Timeout { url: "u".to_string() }));
        let (status, _, body) = fetch(&app(movies), "/trending/").await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body, json!({"detail": "Upstream timed out"}));
    }

    #[tokio::test]
    async fn test_trending_connection_failure() {
        let movies = FakeMovies::new(|| Err(UpstreamError::Connect { url: "u".to_string() }));
        let (status, _, body) = fetch(&app(movies), "/trending/").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, json!({"detail": "Could not connect to upstream service"}));
    }

    #[tokio::test]
    async fn test_trending_upstream_status() {
        let movies = FakeMovies::new(|| {
            Err(UpstreamError::Http {
                status: 401,
                url: "u".to_string(),
            })
        });
        let (status, _, body) = fetch(&app(movies), "/trending/").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body, json!({"detail": "Upstream service error"}));
    }

    #[tokio::test]
    async fn test_trending_missing_results() {
        let movies = FakeMovies::new(|| Ok(json!({"page": 1})));
        let (status, _, body) = fetch(&app(movies), "/trending/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([]));
    }

    #[tokio::test]
    async fn test_trending_malformed_record() {
        let movies = FakeMovies::new(|| Ok(json!({"results": [{"title": "no id"}]})));
        let (status, _, body) = fetch(&app(movies), "/trending/").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, json!({"detail": "Upstream returned a malformed movie record"}));
    }

    #[tokio::test]
    async fn test_trending_is_cached() {
        let movies = FakeMovies::new(|| Ok(json!({"results": [{"id": 1, "title": "X"}]})));
        let app = app(movies.clone());

        let (_, headers, first) = fetch(&app, "/trending/").await;
        assert_eq!(headers["x-cache"], "MISS");
        let (status, headers, second) = fetch(&app, "/trending").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["x-cache"], "HIT");
        assert_eq!(first, second);
        assert_eq!(movies.calls(), 1);

        // A different query string is a different cache entry.
        fetch(&app, "/trending/?page=2").await;
        assert_eq!(movies.calls(), 2);
    }

    #[tokio::test]
    async fn test_trending_cache_disabled() {
        let movies = FakeMovies::new(|| Ok(json!({"results": []})));
        let mut config = Config::default();
        config.cache.ttl = 0;
        let app = build_app(AppState::new(&config, movies.clone()));

        let (status, headers, _) = fetch(&app, "/trending/").await;
        fetch(&app, "/trending/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(headers.get(header::CACHE_CONTROL).is_none());
        assert!(headers.get("x-cache").is_none());
        assert_eq!(movies.calls(), 2);
    }

    #[tokio::test]
    async fn test_trending_retries_exhausted() {
        use crate::config::TmdbConfig;
        use crate::upstream::{RetryPolicy, TmdbClient};
        use std::time::Duration;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/trending/movie/day"))
            .respond_with(ResponseTemplate::new(503))
            .expect(4)
            .mount(&server)
            .await;

        let tmdb = TmdbConfig {
            base_url: server.uri(),
            ..TmdbConfig::default()
        };
        let policy = RetryPolicy {
            backoff_factor: Duration::from_millis(1),
            ..RetryPolicy::default()
        };
        let client = TmdbClient::new(&tmdb, "test-token".to_string(), policy).unwrap();
        let app = build_app(AppState::new(&Config::default(), Arc::new(client)));

        let (status, _, body) = fetch(&app, "/trending/").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, json!({"detail": "Upstream request failed"}));
    }

    #[tokio::test]
    async fn test_trending_errors_not_cached() {
        let movies = FakeMovies::new(|| Err(UpstreamError::Timeout { url: "u".to_string() }));
        let app = app(movies.clone());
        fetch(&app, "/trending/").await;
        fetch(&app, "/trending/").await;
        assert_eq!(movies.calls(), 2);
    }

    #[tokio::test]
    async fn test_details_returns_raw_json() {
        let movies = FakeMovies::new(|| Ok(json!({"id": 550, "title": "Fight Club", "runtime": 139})));
        let app = app(movies.clone());
        let (status, _, body) = fetch(&app, "/details/550/").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"id": 550, "title": "Fight Club", "runtime": 139}));
        assert_eq!(*movies.last_id.lock().unwrap(), Some(550));
    }

    #[tokio::test]
    async fn test_details_invalid_id() {
        let movies = FakeMovies::new(|| Ok(json!({})));
        let (status, _, body) = fetch(&app(movies.clone()), "/details/abc/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"detail": "Not found."}));
        assert_eq!(movies.calls(), 0);
    }

    #[tokio::test]
    async fn test_details_upstream_error() {
        let movies = FakeMovies::new(|| {
            Err(UpstreamError::Http {
                status: 404,
                url: "u".to_string(),
            })
        });
        let (status, _, body) = fetch(&app(movies), "/details/1/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, json!({"detail": "Upstream service error"}));
    }

    #[tokio::test]
    async fn test_search_passes_query() {
        let movies = FakeMovies::new(|| Ok(json!({"page": 1, "results": []})));
        let app = app(movies.clone());
        let (status, _, body) = fetch(&app, "/search/?q=star%20wars").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"page": 1, "results": []}));
        assert_eq!(movies.last_query.lock().unwrap().as_deref(), Some("star wars"));
    }

    #[tokio::test]
    async fn test_search_defaults_to_empty_query() {
        let movies = FakeMovies::new(|| Ok(json!({"results": []})));
        let app = app(movies.clone());
        let (status, _, _) = fetch(&app, "/search").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(movies.last_query.lock().unwrap().as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_search_connection_failure() {
        let movies = FakeMovies::new(|| Err(UpstreamError::Connect { url: "u".to_string() }));
        let (status, _, body) = fetch(&app(movies), "/search/?q=x").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body, json!({"detail": "Could not connect to upstream service"}));
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let movies = FakeMovies::new(|| Ok(json!({})));
        let (status, _, _) = fetch(&app(movies), "/nope/").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_robots_txt() {
        let movies = FakeMovies::new(|| Ok(json!({})));
        let app = app(movies);
        let req = axum::http::Request::builder().uri("/robots.txt").body(Body::empty()).unwrap();
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"User-agent: *\nDisallow: /\n");
    }
}
