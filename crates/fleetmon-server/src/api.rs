use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use fleetmon_storage::error::StorageError;
use serde::Serialize;
use std::collections::HashMap;

/// Storage failures surface as an opaque 500; details go to the log only.
pub struct ApiError(StorageError);

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!(error = %self.0, "API request failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(serde_json::json!({ "error": "internal server error" })),
        )
            .into_response()
    }
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub uptime_secs: i64,
}

#[derive(Serialize)]
pub struct MachineView {
    pub id: String,
    pub name: String,
    pub url: String,
}

#[derive(Serialize)]
pub struct IncidentView {
    pub id: String,
    /// Machine name, matching what operators know the host as.
    pub machine: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub value: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

pub async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: (Utc::now() - state.start_time).num_seconds(),
    })
}

pub async fn list_machines(
    State(state): State<AppState>,
) -> Result<Json<Vec<MachineView>>, ApiError> {
    let machines = state
        .store
        .list_machines()?
        .into_iter()
        .map(|m| MachineView {
            id: m.id,
            name: m.name,
            url: m.url,
        })
        .collect();
    Ok(Json(machines))
}

/// All incidents, newest first.
pub async fn list_incidents(
    State(state): State<AppState>,
) -> Result<Json<Vec<IncidentView>>, ApiError> {
    let names: HashMap<String, String> = state
        .store
        .list_machines()?
        .into_iter()
        .map(|m| (m.id, m.name))
        .collect();

    let incidents = state
        .store
        .list_incidents()?
        .into_iter()
        .map(|incident| {
            let machine = names
                .get(&incident.machine_id)
                .cloned()
                .unwrap_or_else(|| incident.machine_id.clone());
            IncidentView {
                id: incident.id,
                machine,
                kind: incident.kind.to_string(),
                value: incident.value,
                start_time: incident.start_time,
                end_time: incident.end_time,
            }
        })
        .collect();
    Ok(Json(incidents))
}
