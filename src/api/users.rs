/// User account endpoints
use crate::{
    account::{
        ChangePasswordRequest, FullUser, HomeStatistics, LoginRequest, LoginResponse,
        MessageResponse, PublicUser, RegisterRequest, ResendEmailRequest, UpdateProfileRequest,
    },
    api::extract::ApiJson,
    auth::AuthContext,
    context::AppContext,
    error::{ApiError, ApiResult},
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};

/// Build user routes
pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/user/confirm_email/:token", get(confirm_email))
        .route("/user/resend_email", post(resend_email))
        .route(
            "/user",
            get(get_self).put(update_self).delete(delete_self),
        )
        .route("/user/change_password", put(change_password))
        .route("/users", get(list_users))
        .route("/users/verified", get(list_verified_users))
        .route("/users/:id", get(get_user))
        .route("/home", get(home))
}

/// `POST /register`
async fn register(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<MessageResponse>)> {
    tracing::debug!("register: creating account for {}", req.username);

    ctx.accounts.register(req).await?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new(
            "User was created successfully. A confirmation email has been sent via email. \
             After confirming your email you can login.",
        )),
    ))
}

/// `POST /login`
async fn login(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let token = ctx
        .accounts
        .login(req.username.as_deref(), req.password.as_deref())
        .await?;

    Ok(Json(LoginResponse {
        access_token: token.token,
        expiry: token.expires_at.timestamp_millis() as f64 / 1000.0,
    }))
}

/// `GET /user/confirm_email/{token}`
async fn confirm_email(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
) -> ApiResult<Json<MessageResponse>> {
    ctx.accounts.confirm_email(&token).await?;

    Ok(Json(MessageResponse::new(
        "You have confirmed your account. Thanks!",
    )))
}

/// `POST /user/resend_email`
async fn resend_email(
    State(ctx): State<AppContext>,
    ApiJson(req): ApiJson<ResendEmailRequest>,
) -> ApiResult<Json<MessageResponse>> {
    ctx.accounts.resend_verification(req).await?;

    Ok(Json(MessageResponse::new(
        "Check your email, a new verification email was sent.",
    )))
}

/// `GET /user`
async fn get_self(State(ctx): State<AppContext>, auth: AuthContext) -> ApiResult<Json<FullUser>> {
    let user = ctx.accounts.get_user(auth.user_id).await?;
    Ok(Json(FullUser::from(&user)))
}

/// `PUT /user`
async fn update_self(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<MessageResponse>> {
    ctx.accounts.update_profile(auth.user_id, req).await?;
    Ok(Json(MessageResponse::new("User was updated successfully.")))
}

/// `DELETE /user`
async fn delete_self(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> ApiResult<Json<MessageResponse>> {
    ctx.accounts.delete_account(auth.user_id).await?;
    Ok(Json(MessageResponse::new("User was deleted successfully.")))
}

/// `PUT /user/change_password`
async fn change_password(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<MessageResponse>> {
    ctx.accounts.change_password(auth.user_id, req).await?;
    Ok(Json(MessageResponse::new("Password was updated successfully.")))
}

/// `GET /users`
async fn list_users(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<PublicUser>>> {
    let users = ctx.accounts.list_users(auth.user_id, false).await?;
    Ok(Json(users.iter().map(PublicUser::from).collect()))
}

/// `GET /users/verified`
async fn list_verified_users(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> ApiResult<Json<Vec<PublicUser>>> {
    let users = ctx.accounts.list_users(auth.user_id, true).await?;
    Ok(Json(users.iter().map(PublicUser::from).collect()))
}

/// `GET /users/{id}`
async fn get_user(
    State(ctx): State<AppContext>,
    _auth: AuthContext,
    Path(id): Path<String>,
) -> ApiResult<Json<PublicUser>> {
    let id = parse_user_id(&id)?;
    let user = ctx.accounts.get_user(id).await?;
    Ok(Json(PublicUser::from(&user)))
}

/// `GET /home`
async fn home(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> ApiResult<Json<HomeStatistics>> {
    Ok(Json(ctx.accounts.home_statistics(auth.user_id).await?))
}

fn parse_user_id(raw: &str) -> ApiResult<i64> {
    raw.parse::<i64>().map_err(|_| ApiError::InvalidId)
}
