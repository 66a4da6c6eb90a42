use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// The user resource. `create_router` wraps this router in the auth gate, so none of
/// these handlers runs for a rejected request.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /worko/user lists live users; POST /worko/user creates one.
        .route(
            "/worko/user",
            get(handlers::list_users).post(handlers::create_user),
        )
        // GET/PUT/PATCH/DELETE /worko/user/{userId}
        // PATCH validates only the id and forwards the body as sent.
        .route(
            "/worko/user/{userId}",
            get(handlers::get_user)
                .put(handlers::update_user)
                .patch(handlers::patch_user)
                .delete(handlers::delete_user),
        )
}
