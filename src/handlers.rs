use crate::{
    models::{UserChanges, UserDto, UserPayload},
    service::{UserError, UserService},
    validation::{validate_id, validate_user},
};
use axum::{
    Json,
    extract::{Path, State, rejection::JsonRejection},
    http::StatusCode,
};
use serde_json::Value;

/// The body of every failed request: a status and a human-readable message.
pub type Rejection = (StatusCode, String);

/// bad_request
///
/// Every failure outside of listing is reported as 400, including not-found and
/// store errors.
fn bad_request(err: impl Into<UserError>) -> Rejection {
    let err = err.into();
    tracing::warn!(error = %err, "request rejected");
    (StatusCode::BAD_REQUEST, err.to_string())
}

/// Unwraps a JSON body, reporting malformed bodies as 400 with the parser's message.
fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, Rejection> {
    body.map(|Json(value)| value).map_err(|rejection| {
        tracing::warn!(error = %rejection, "malformed request body");
        (StatusCode::BAD_REQUEST, rejection.body_text())
    })
}

// --- Handlers ---

/// list_users
///
/// Lists every user that has not been soft-deleted. Unlike the other routes, a store
/// failure here is a 500.
#[utoipa::path(
    get,
    path = "/worko/user",
    responses(
        (status = 200, description = "Live users", body = [UserDto]),
        (status = 500, description = "Store failure")
    )
)]
pub async fn list_users(
    State(users): State<UserService>,
) -> Result<Json<Vec<UserDto>>, Rejection> {
    match users.list_users().await {
        Ok(list) => Ok(Json(list)),
        Err(e) => {
            tracing::error!(error = %e, "listing users failed");
            Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
        }
    }
}

/// get_user
///
/// Fetches a single live user. Unknown and soft-deleted ids are a 400, not a 404.
#[utoipa::path(
    get,
    path = "/worko/user/{userId}",
    params(("userId" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Found", body = UserDto),
        (status = 400, description = "Invalid id, not found, or store failure")
    )
)]
pub async fn get_user(
    State(users): State<UserService>,
    Path(user_id): Path<String>,
) -> Result<Json<UserDto>, Rejection> {
    let id = validate_id(&user_id).map_err(bad_request)?;
    let user = users.get_user(id).await.map_err(bad_request)?;
    Ok(Json(user))
}

/// create_user
///
/// Validates the full payload before anything reaches the store.
#[utoipa::path(
    post,
    path = "/worko/user",
    request_body = UserPayload,
    responses(
        (status = 201, description = "Created", body = UserDto),
        (status = 400, description = "Validation or store failure")
    )
)]
pub async fn create_user(
    State(users): State<UserService>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<UserDto>), Rejection> {
    let payload = json_body(body)?;
    let new_user = validate_user(&payload).map_err(bad_request)?;
    let created = users.create_user(new_user).await.map_err(bad_request)?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// update_user
///
/// Full update: both the id and the complete payload are validated.
#[utoipa::path(
    put,
    path = "/worko/user/{userId}",
    params(("userId" = String, Path, description = "User ID")),
    request_body = UserPayload,
    responses(
        (status = 200, description = "Updated", body = UserDto),
        (status = 400, description = "Validation failure, not found, or store failure")
    )
)]
pub async fn update_user(
    State(users): State<UserService>,
    Path(user_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<UserDto>, Rejection> {
    let payload = json_body(body)?;
    let id = validate_id(&user_id).map_err(bad_request)?;
    let new_user = validate_user(&payload).map_err(bad_request)?;
    let updated = users
        .update_user(id, UserChanges::from(new_user))
        .await
        .map_err(bad_request)?;
    Ok(Json(updated))
}

/// patch_user
///
/// Partial update: only the id is validated. The body goes to the store as sent,
/// so values that would fail full validation are accepted here.
#[utoipa::path(
    patch,
    path = "/worko/user/{userId}",
    params(("userId" = String, Path, description = "User ID")),
    responses(
        (status = 200, description = "Updated", body = UserDto),
        (status = 400, description = "Invalid id, not found, or store failure")
    )
)]
pub async fn patch_user(
    State(users): State<UserService>,
    Path(user_id): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<UserDto>, Rejection> {
    let document = json_body(body)?;
    let id = validate_id(&user_id).map_err(bad_request)?;
    let changes = UserChanges::from_document(&document).map_err(bad_request)?;
    let updated = users.update_user(id, changes).await.map_err(bad_request)?;
    Ok(Json(updated))
}

/// delete_user
///
/// Soft delete. Deleting an already-deleted user succeeds again.
#[utoipa::path(
    delete,
    path = "/worko/user/{userId}",
    params(("userId" = String, Path, description = "User ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 400, description = "Invalid id, not found, or store failure")
    )
)]
pub async fn delete_user(
    State(users): State<UserService>,
    Path(user_id): Path<String>,
) -> Result<StatusCode, Rejection> {
    let id = validate_id(&user_id).map_err(bad_request)?;
    users.delete_user(id).await.map_err(bad_request)?;
    Ok(StatusCode::NO_CONTENT)
}
