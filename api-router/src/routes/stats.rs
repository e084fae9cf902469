use axum::{extract::State, response::IntoResponse, Json};
use common::storage::stats::Stats;

use crate::{api_state::ApiState, error::ApiError};

pub async fn get_stats(State(state): State<ApiState>) -> Result<impl IntoResponse, ApiError> {
    let stats = Stats::collect(&state.db).await?;
    Ok(Json(stats))
}
