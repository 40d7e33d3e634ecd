pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod utils;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    metrics::metrics_middleware,
    rate_limit::{create_ip_rate_limiter, ip_rate_limit_middleware, IpRateLimiter},
    security_headers::security_headers_middleware,
    tracing::request_id_middleware,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ConductorConfig;
use crate::middleware::{auth_middleware, require_role, RoleRequirement};
use crate::models::Role;
use crate::services::{
    ApiClientService, AuthService, AuthzContext, Clock, ConductorStore, EmailProvider,
    IdentityProvider, InvitationService, InvitationSettings, Outbox, SessionService,
    WorkbenchSync,
};

/// External collaborators the state is assembled from. Production wires
/// MongoDB, SMTP, the OIDC provider and the workbench API; tests wire the
/// in-memory and mock implementations.
pub struct Integrations {
    pub store: Arc<dyn ConductorStore>,
    pub sso: Arc<dyn IdentityProvider>,
    pub email: Arc<dyn EmailProvider>,
    pub workbench: Arc<dyn WorkbenchSync>,
    pub clock: Arc<dyn Clock>,
}

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ConductorConfig>,
    pub authz: AuthzContext,
    pub store: Arc<dyn ConductorStore>,
    pub sso: Arc<dyn IdentityProvider>,
    pub sessions: SessionService,
    pub auth_service: AuthService,
    pub api_clients: ApiClientService,
    pub invitations: InvitationService,
    pub outbox: Outbox,
    pub login_rate_limiter: IpRateLimiter,
}

impl AppState {
    pub fn new(config: ConductorConfig, deps: Integrations) -> Self {
        let authz = AuthzContext::new(config.org.org_id.clone(), config.org.global_org_id.clone());
        let outbox = Outbox::new();
        let sessions = SessionService::new(&config.session, deps.clock.clone());

        let auth_service = AuthService::new(
            deps.store.clone(),
            sessions.clone(),
            deps.sso.clone(),
            authz.clone(),
        );
        let api_clients = ApiClientService::new(deps.store.clone(), deps.clock.clone());
        let invitations = InvitationService::new(
            deps.store.clone(),
            deps.email,
            deps.workbench,
            outbox.clone(),
            authz.clone(),
            deps.clock,
            InvitationSettings {
                expiry_days: config.invitations.expiry_days,
                frontend_url: config.frontend_url.clone(),
            },
        );
        let login_rate_limiter = create_ip_rate_limiter(
            config.rate_limit.login_attempts,
            config.rate_limit.login_window_seconds,
        );

        Self {
            config: Arc::new(config),
            authz,
            store: deps.store,
            sso: deps.sso,
            sessions,
            auth_service,
            api_clients,
            invitations,
            outbox,
            login_rate_limiter,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let login_route = Router::new()
        .route("/auth/login", post(handlers::auth::login))
        .layer(from_fn_with_state(
            state.login_rate_limiter.clone(),
            ip_rate_limit_middleware,
        ));

    let campus_admin = RoleRequirement::new(state.authz.deployment_org.clone(), Role::CampusAdmin);
    let role_admin_routes = Router::new()
        .route(
            "/users/:userID/roles",
            get(handlers::get_user_roles).put(handlers::set_user_role),
        )
        .route_layer(from_fn_with_state(
            (state.clone(), campus_admin),
            require_role,
        ));

    let authenticated = Router::new()
        .route("/users/me", get(handlers::get_me))
        .route("/oauth2/authorize", get(handlers::authorize))
        .route(
            "/projects/:projectID/invitations",
            post(handlers::create_invitation).get(handlers::list_invitations),
        )
        .route(
            "/projects/invitations/:inviteID",
            get(handlers::get_invitation)
                .put(handlers::update_invitation)
                .delete(handlers::delete_invitation),
        )
        .route(
            "/projects/invitations/:inviteID/accept",
            post(handlers::accept_invitation),
        )
        .merge(role_admin_routes)
        .route_layer(from_fn_with_state(state.clone(), auth_middleware));

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(handlers::metrics::metrics))
        .merge(login_route)
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/logout", post(handlers::auth::logout))
        .route("/auth/sso", get(handlers::auth::sso_login))
        .route("/oauth/:provider", get(handlers::auth::sso_callback))
        .route("/auth/token", post(handlers::token))
        .merge(authenticated)
        .with_state(state.clone())
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get("x-request-id")
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            },
        ))
        .layer(from_fn(request_id_middleware))
        .layer(from_fn(security_headers_middleware))
        .layer(cors_layer(&state.config.security.allowed_origins))
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    if origins.iter().any(|o| o == "*") {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::error!(origin = %o, error = %e, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    // Session cookies must reach the API from the web app's origin.
    cors.allow_origin(origins).allow_credentials(true)
}

pub async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, AppError> {
    state.store.health_check().await.map_err(|e| {
        tracing::error!(error = %e, "Store health check failed");
        AppError::DatabaseError(e)
    })?;

    Ok(Json(serde_json::json!({
        "err": false,
        "status": "healthy",
        "service": state.config.service_name,
        "version": state.config.service_version,
        "environment": format!("{:?}", state.config.environment),
    })))
}
