//! Saved-script endpoints, scoped to the calling user.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use scriptflow_core::{NewScript, Script, ScriptId, ScriptUpdate};
use tracing::info;

use crate::auth::Caller;
use crate::error::ServerError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/scripts", get(list_scripts).post(create_script))
        .route(
            "/scripts/{id}",
            get(get_script).put(update_script).delete(delete_script),
        )
}

/// Load a script the caller owns.
async fn owned(state: &AppState, caller: &Caller, id: &str) -> Result<Script, ServerError> {
    let not_found = || ServerError::NotFound(format!("script {id} not found"));
    let script_id: ScriptId = id.parse().map_err(|_| not_found())?;
    let script = state.scripts.get(script_id).await?.ok_or_else(not_found)?;
    if script.owner_id != caller.0 {
        return Err(ServerError::Forbidden(format!("script {id} belongs to another user")));
    }
    Ok(script)
}

pub async fn create_script(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    body: Result<Json<NewScript>, JsonRejection>,
) -> Result<(StatusCode, Json<Script>), ServerError> {
    let Json(new) = body?;
    let script = state.scripts.create(new, &caller.0).await?;
    info!(script_id = %script.id, owner = %caller.0, "script saved");
    Ok((StatusCode::CREATED, Json(script)))
}

pub async fn list_scripts(
    State(state): State<Arc<AppState>>,
    caller: Caller,
) -> Result<Json<Vec<Script>>, ServerError> {
    Ok(Json(state.scripts.list(&caller.0).await?))
}

pub async fn get_script(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<Script>, ServerError> {
    Ok(Json(owned(&state, &caller, &id).await?))
}

pub async fn update_script(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
    body: Result<Json<ScriptUpdate>, JsonRejection>,
) -> Result<Json<Script>, ServerError> {
    let Json(update) = body?;
    let script = owned(&state, &caller, &id).await?;
    Ok(Json(state.scripts.update(script.id, update).await?))
}

pub async fn delete_script(
    State(state): State<Arc<AppState>>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<StatusCode, ServerError> {
    let script = owned(&state, &caller, &id).await?;
    state.scripts.delete(script.id).await?;
    info!(script_id = %script.id, "script deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use crate::routes::testing::{app, send};
    use axum::http::StatusCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_script_crud() {
        let app = app();
        let (status, created) = send(
            &app,
            "POST",
            "/scripts",
            Some("alice"),
            Some(json!({"title": "The Vault", "scriptType": "film", "episodeCount": 1})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["title"], "The Vault");
        let uri = format!("/scripts/{}", created["id"].as_str().unwrap());

        let (status, updated) = send(
            &app,
            "PUT",
            &uri,
            Some("alice"),
            Some(json!({"content": "FADE IN."})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["content"], "FADE IN.");
        assert_eq!(updated["title"], "The Vault");

        let (_, listed) = send(&app, "GET", "/scripts", Some("alice"), None).await;
        assert_eq!(listed.as_array().unwrap().len(), 1);

        let (status, _) = send(&app, "DELETE", &uri, Some("alice"), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "GET", &uri, Some("alice"), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_scripts_are_owner_scoped() {
        let app = app();
        let (_, created) =
            send(&app, "POST", "/scripts", Some("alice"), Some(json!({}))).await;
        let uri = format!("/scripts/{}", created["id"].as_str().unwrap());

        let (status, _) = send(&app, "GET", &uri, Some("bob"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        let (status, _) = send(&app, "DELETE", &uri, Some("bob"), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (_, listed) = send(&app, "GET", "/scripts", Some("bob"), None).await;
        assert!(listed.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_script_body_is_json_bad_request() {
        let app = app();
        let (status, body) = send(
            &app,
            "POST",
            "/scripts",
            Some("alice"),
            Some(json!({"episodeCount": "many"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }
}
