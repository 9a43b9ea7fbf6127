//! HTTP front for the lazy build router.
//!
//! Every request passes through the `lazy_build` middleware, which builds
//! the bundle the path asks for (if any) before the static file layer serves
//! it from the repository root.

use crate::bundles::{Dispatch, LazyBuildRouter, ServeMode};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::services::ServeDir;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Builds the axum app serving `root`. Without a router, files are served
/// as they are on disk.
pub fn app(root: &Path, router: Option<Arc<LazyBuildRouter>>) -> Router {
    let files = Router::new().fallback_service(ServeDir::new(root));
    match router {
        Some(router) => files.layer(middleware::from_fn_with_state(router, lazy_build)),
        None => files,
    }
}

async fn lazy_build(
    State(router): State<Arc<LazyBuildRouter>>,
    request: Request,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    match router.handle(&path).await {
        Ok(Dispatch::Built(name)) => {
            tracing::debug!(bundle = %name, path = %path, "serving built bundle");
            next.run(request).await
        }
        Ok(Dispatch::PassThrough) => next.run(request).await,
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}

/// Serves until ctrl-c.
///
/// # Errors
///
/// Returns [`ServerError`] if the address cannot be bound or serving fails.
pub async fn serve(
    root: &Path,
    addr: SocketAddr,
    mode: ServeMode,
    router: Option<Arc<LazyBuildRouter>>,
) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    let local_addr = listener.local_addr()?;

    tracing::info!("serving {} at http://{local_addr}", root.display());
    tracing::info!("{}", mode.describe());

    axum::serve(listener, app(root, router))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::bundles::builder::tests::FakeCompiler;
    use crate::bundles::{Bundle, BundleBuilder, BundleRegistry};
    use axum::body::{to_bytes, Body};
    use axum::http::Request as HttpRequest;
    use std::fs;
    use tempfile::{tempdir, TempDir};
    use tower::ServiceExt;

    fn setup(compiler: Arc<FakeCompiler>) -> (Router, TempDir) {
        let dir = tempdir().unwrap();
        fs::create_dir_all(dir.path().join("dist/v0")).unwrap();
        fs::write(dir.path().join("dist/v0/amp-foo.mjs"), "export {};").unwrap();

        let registry = BundleRegistry::new(vec![Bundle::component("amp-foo", "0.1", false)])
            .unwrap()
            .into_shared();
        let builder = Arc::new(BundleBuilder::new(registry, compiler, false, true));
        let mode = ServeMode { esm: true, ..ServeMode::default() };
        let router = LazyBuildRouter::new(builder, mode).unwrap();
        (app(dir.path(), Some(Arc::new(router))), dir)
    }

    fn get(path: &str) -> HttpRequest<Body> {
        HttpRequest::builder().uri(path).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn builds_before_serving() {
        let compiler = Arc::new(FakeCompiler::default());
        let (app, _dir) = setup(Arc::clone(&compiler));

        let response = app.oneshot(get("/dist/v0/amp-foo.mjs")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"export {};");
        assert_eq!(compiler.calls(), 1);
    }

    #[tokio::test]
    async fn build_failure_is_500_naming_bundle() {
        let compiler = Arc::new(FakeCompiler {
            fail_first: 1,
            ..Default::default()
        });
        let (app, _dir) = setup(compiler);

        let response = app.oneshot(get("/dist/v0/amp-foo.mjs")).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(String::from_utf8_lossy(&body).contains("amp-foo"));
    }

    #[tokio::test]
    async fn without_router_files_are_served_as_is() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("index.html"), "<html></html>").unwrap();

        let response = app(dir.path(), None).oneshot(get("/index.html")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn other_paths_go_straight_to_files() {
        let compiler = Arc::new(FakeCompiler::default());
        let (app, _dir) = setup(Arc::clone(&compiler));

        let response = app.oneshot(get("/missing.html")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(compiler.calls(), 0);
    }
}
