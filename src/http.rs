//! axum adapter: runs every request through `before`/`after` and turns a shed
//! decision into `503 Service Unavailable` + `Retry-After`.

use crate::interceptor::{Interceptor, RejectResponse, RequestContext};
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;
use std::sync::Arc;

impl IntoResponse for RejectResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::RETRY_AFTER, self.retry_after_secs().to_string())],
        )
            .into_response()
    }
}

/// Middleware for `axum::middleware::from_fn_with_state`.
///
/// A shed request is answered right away; its reclamation then runs on the blocking
/// pool so the pause never stalls an executor thread.
pub async fn gci_middleware(State(gci): State<Arc<Interceptor>>, request: Request, next: Next) -> Response {
    let mut ctx = RequestContext::new();
    if let Some(reject) = gci.before(&mut ctx) {
        tokio::task::spawn_blocking(move || gci.after(&mut ctx));
        return reject.into_response();
    }
    let response = next.run(request).await;
    gci.after(&mut ctx);
    response
}

/// Wrap every route of `router` with the interceptor.
pub fn with_gci<S>(router: Router<S>, gci: Arc<Interceptor>) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(from_fn_with_state(gci, gci_middleware))
}
