use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use nd_core::{
    CategorySet, DigestResult, DigestRun, Error, Frequency, Preference, RunId, RunStatus,
    RECOMMENDED_MIN_CATEGORIES,
};
use nd_pipeline::TriggerEvent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Serialize, Deserialize)]
pub struct TriggerAccepted {
    pub run_id: RunId,
    pub status: RunStatus,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RunView {
    pub run: DigestRun,
    pub digest: Option<DigestResult>,
}

#[derive(Debug, Deserialize)]
pub struct PreferenceForm {
    pub principal: String,
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub frequency: Option<Frequency>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PreferenceSaved {
    pub preference: Preference,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Creates a run and executes it in the background.
pub async fn trigger_digest(
    State(state): State<Arc<AppState>>,
    Json(event): Json<TriggerEvent>,
) -> ApiResult<(StatusCode, Json<TriggerAccepted>)> {
    let run = state.runner.trigger(event).await?;
    state
        .background
        .start(&state.runner, run.id, state.shutdown.child_token())
        .await;
    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerAccepted {
            run_id: run.id,
            status: run.status,
        }),
    ))
}

pub async fn list_digests(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<DigestRun>>> {
    Ok(Json(state.runner.list().await?))
}

pub async fn get_digest(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<RunView>> {
    let id: RunId = id.parse()?;
    let run = state.runner.load(id).await?;
    let digest = if run.status == RunStatus::Completed {
        state.runner.result(id).await?
    } else {
        None
    };
    Ok(Json(RunView { run, digest }))
}

pub async fn save_preference(
    State(state): State<Arc<AppState>>,
    Json(form): Json<PreferenceForm>,
) -> ApiResult<Json<PreferenceSaved>> {
    if form.categories.iter().all(|c| c.trim().is_empty()) {
        return Err(Error::Configuration("select at least one category".to_string()).into());
    }
    let categories = CategorySet::new(form.categories.iter().filter(|c| !c.trim().is_empty()))?;
    let preference = Preference::new(&form.principal, categories, form.frequency.unwrap_or_default())?;
    if let Err(e) = state.preferences.save_preference(&preference).await {
        tracing::error!(principal = %preference.principal, error = %e, "Saving preference failed");
        return Err(ApiError::Internal("could not save preferences, please retry"));
    }

    let warning = preference.below_recommended_size().then(|| {
        format!(
            "selecting at least {} categories gives a more varied digest",
            RECOMMENDED_MIN_CATEGORIES
        )
    });
    tracing::info!(
        principal = %preference.principal,
        categories = %preference.categories,
        frequency = %preference.frequency,
        "Preference saved"
    );
    Ok(Json(PreferenceSaved { preference, warning }))
}

pub async fn get_preference(
    State(state): State<Arc<AppState>>,
    Path(principal): Path<String>,
) -> ApiResult<Json<Preference>> {
    state
        .preferences
        .get_preference(&principal)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("preference for '{}'", principal)))
}
