use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::returns::{CreateReturnRequest, ReturnList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::ReturnRequest,
    response::ApiResponse,
    services::return_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(list_returns).post(create_return))
}

#[utoipa::path(
    post,
    path = "/api/returns",
    request_body = CreateReturnRequest,
    responses(
        (status = 200, description = "Request a return for a delivered line", body = ApiResponse<ReturnRequest>),
        (status = 400, description = "Order not delivered or return already open"),
        (status = 404, description = "Order or order item not found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Returns"
)]
pub async fn create_return(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateReturnRequest>,
) -> AppResult<Json<ApiResponse<ReturnRequest>>> {
    let resp = return_service::create_return(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/returns",
    responses(
        (status = 200, description = "Return requests of the current user", body = ApiResponse<ReturnList>)
    ),
    security(("bearer_auth" = [])),
    tag = "Returns"
)]
pub async fn list_returns(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<ReturnList>>> {
    let resp = return_service::list_returns(&state, &user).await?;
    Ok(Json(resp))
}
