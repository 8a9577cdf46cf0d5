use crate::config::Config;
use crate::error::StartupError;
use crate::frontend::Frontend;
use crate::handlers::{handle_request, SharedState};
use crate::lifecycle::Shutdown;
use crate::middleware::logging_middleware;
use axum::routing::any;
use axum::{middleware, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Build the router: every path is a key, every method goes to the same
/// handler, which decides what to do with it.
pub fn create_app(state: SharedState) -> Router {
    Router::new()
        .route("/", any(handle_request))
        .route("/*key", any(handle_request))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(middleware::from_fn(logging_middleware)),
        )
}

/// HTTP server with a bound listener.
pub struct Server {
    app: Router,
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl Server {
    /// Bind the listener for `config` and serve `frontend` on it.
    pub async fn bind(config: &Config, frontend: Frontend) -> Result<Self, StartupError> {
        let addr = config.bind_address();
        let bind_error = |source| StartupError::Bind {
            addr: addr.clone(),
            source,
        };

        let listener = TcpListener::bind(&addr).await.map_err(bind_error)?;
        let local_addr = listener.local_addr().map_err(bind_error)?;

        Ok(Self {
            app: create_app(Arc::new(frontend)),
            listener,
            local_addr,
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Serve until `shutdown` fires, then stop accepting and let in-flight
    /// requests finish.
    pub async fn run(self, shutdown: Shutdown) -> std::io::Result<()> {
        tracing::info!("Frontend server listening on {}", self.local_addr);

        axum::serve(self.listener, self.app)
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await?;

        tracing::info!("Frontend server stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn app() -> Router {
        create_app(Arc::new(Frontend::in_memory()))
    }

    fn request(method: &str, uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(body.into())
            .unwrap()
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn test_put_then_get() {
        let app = app();

        let response = app
            .clone()
            .oneshot(request("PUT", "/abc", "12345"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "text/html");
        assert_eq!(body_string(response).await, "");

        let response = app.oneshot(request("GET", "/abc", Body::empty())).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "application/octet-stream"
        );
        assert_eq!(body_string(response).await, "12345");
    }

    #[tokio::test]
    async fn test_get_missing_key() {
        let response = app()
            .oneshot(request("GET", "/missing", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(body_string(response).await.contains("Key not found"));
    }

    #[tokio::test]
    async fn test_put_too_large() {
        let response = app()
            .oneshot(request("PUT", "/x", vec![b'a'; 2000]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_string(response).await.contains("too large"));
    }

    #[tokio::test]
    async fn test_put_exactly_at_limit() {
        let app = app();
        let response = app
            .clone()
            .oneshot(request("PUT", "/edge", vec![b'z'; 1024]))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(request("GET", "/edge", Body::empty())).await.unwrap();
        assert_eq!(body_string(response).await.len(), 1024);
    }

    #[tokio::test]
    async fn test_chunked_body_over_limit() {
        let frontend = Arc::new(Frontend::in_memory());
        let chunks = (0..20).map(|_| Ok::<_, std::io::Error>(vec![b'c'; 100]));
        let body = Body::from_stream(futures_util::stream::iter(chunks));

        let response = create_app(frontend.clone())
            .oneshot(request("PUT", "/chunked", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_string(response).await, "Content body is too large");
        assert_eq!(frontend.quota().usage(), 0);
    }

    #[tokio::test]
    async fn test_body_read_failure() {
        let frontend = Arc::new(Frontend::in_memory());
        let chunks = vec![
            Ok(b"abc".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "client went away")),
        ];
        let body = Body::from_stream(futures_util::stream::iter(chunks));

        let response = create_app(frontend.clone())
            .oneshot(request("PUT", "/broken", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "Unable to read request body");
        assert_eq!(frontend.quota().usage(), 0);

        let response = create_app(frontend)
            .oneshot(request("GET", "/broken", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_other_methods_not_allowed() {
        for method in ["DELETE", "POST", "PATCH", "HEAD", "OPTIONS"] {
            let response = app()
                .oneshot(request(method, "/abc", Body::empty()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED, "{}", method);
            assert_eq!(response.headers()[header::ALLOW], "GET, PUT");
        }
    }

    #[tokio::test]
    async fn test_root_path_has_no_key() {
        let response = app()
            .oneshot(request("GET", "/", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app()
            .oneshot(request("DELETE", "/", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_query_string_is_not_part_of_key() {
        let app = app();
        app.clone()
            .oneshot(request("PUT", "/k?version=1", "v1"))
            .await
            .unwrap();

        let response = app.oneshot(request("GET", "/k", Body::empty())).await.unwrap();
        assert_eq!(body_string(response).await, "v1");
    }

    #[tokio::test]
    async fn test_nested_path_key() {
        let app = app();
        app.clone()
            .oneshot(request("PUT", "/a/b/c", "nested"))
            .await
            .unwrap();

        let response = app
            .clone()
            .oneshot(request("GET", "/a/b/c", Body::empty()))
            .await
            .unwrap();
        assert_eq!(body_string(response).await, "nested");

        let response = app.oneshot(request("GET", "/a", Body::empty())).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_storage_exhausted() {
        use crate::backend::MemoryBackend;
        use crate::quota::QuotaLimits;

        let frontend = Frontend::new(
            Arc::new(MemoryBackend::new()),
            QuotaLimits {
                max_content_length: 1024,
                max_storage_size: 10,
            },
        );
        let app = create_app(Arc::new(frontend));

        let response = app
            .clone()
            .oneshot(request("PUT", "/a", "0123456789"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(request("PUT", "/b", "x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body_string(response).await, "Storage server(s) exhausted");

        let response = app.oneshot(request("GET", "/b", Body::empty())).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
