use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

use crate::api_state::ApiState;

/// Readiness probe: 200 only when the database and the artifact cache both
/// respond. The configured TeX engine command is echoed so an operator can
/// spot a misconfigured deployment from the probe output.
pub async fn ready(State(state): State<ApiState>) -> impl IntoResponse {
    let db_ok = state.db.client.query("RETURN true").await.is_ok();
    // An empty-content lookup is a cheap round trip to the cache backend; a
    // miss is Ok(None), only a backend fault is Err.
    let cache_ok = state.compiler.cached_artifact("").await.is_ok();

    let all_ok = db_ok && cache_ok;
    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let verdict = |ok: bool| if ok { "ok" } else { "fail" };

    (
        status,
        Json(json!({
            "status": verdict(all_ok),
            "checks": {
                "db": verdict(db_ok),
                "artifact_cache": verdict(cache_ok)
            },
            "engine": state.config.latex_command
        })),
    )
}
