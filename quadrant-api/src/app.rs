/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use quadrant_api::{app::AppState, config::Config};
/// use quadrant_shared::db::pool::create_pool;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(config.database.clone()).await?;
/// let state = AppState::postgres(pool, config);
/// let app = quadrant_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::config::Config;
use crate::error::ApiError;
use axum::{
    extract::{Request, State},
    http::{header, HeaderValue, Method},
    middleware::Next,
    response::Response,
    routing::{get, patch, post},
    Router,
};
use quadrant_shared::auth::oauth::{DisabledOAuthVerifier, GoogleTokenVerifier, OAuthVerifier};
use quadrant_shared::clock::{Clock, SystemClock};
use quadrant_shared::config::AuthSettings;
use quadrant_shared::models::user::User;
use quadrant_shared::services::{AuthService, ProjectService, TaskService, UserService};
use quadrant_shared::store::{PgStore, ProjectStore, TaskStore, UserStore};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Every field is an `Arc` or a handle around one, so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Database pool, absent when running over the in-memory store
    pub db: Option<PgPool>,

    /// Application configuration
    pub config: Arc<Config>,

    pub auth: AuthService,
    pub users: UserService,
    pub projects: ProjectService,
    pub tasks: TaskService,
}

impl AppState {
    /// Wires every service to one store
    pub fn new<S>(
        config: Config,
        store: Arc<S>,
        oauth: Arc<dyn OAuthVerifier>,
        clock: Arc<dyn Clock>,
    ) -> Self
    where
        S: UserStore + ProjectStore + TaskStore + 'static,
    {
        let settings = Arc::new(config.auth.clone());

        Self {
            db: None,
            auth: AuthService::new(store.clone(), settings.clone(), oauth, clock.clone()),
            users: UserService::new(store.clone(), settings),
            projects: ProjectService::new(store.clone()),
            tasks: TaskService::new(store.clone(), store, clock),
            config: Arc::new(config),
        }
    }

    /// Production wiring: PostgreSQL store, wall clock, provider-backed OAuth
    pub fn postgres(pool: PgPool, config: Config) -> Self {
        let oauth = oauth_verifier(&config.auth);
        let store = Arc::new(PgStore::new(pool.clone()));
        Self::new(config, store, oauth, Arc::new(SystemClock)).with_database(pool)
    }

    /// Attaches the pool used by the health check
    pub fn with_database(mut self, pool: PgPool) -> Self {
        self.db = Some(pool);
        self
    }
}

/// Google verification when a client id is configured, otherwise every
/// OAuth login is refused
pub fn oauth_verifier(settings: &AuthSettings) -> Arc<dyn OAuthVerifier> {
    match &settings.oauth_client_id {
        Some(client_id) => Arc::new(GoogleTokenVerifier::new(client_id.clone())),
        None => Arc::new(DisabledOAuthVerifier),
    }
}

/// The authenticated caller, inserted by [`jwt_auth_layer`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── /health                          # Health check (public)
/// ├── /health/live                     # Liveness probe (public)
/// └── /v1/
///     ├── /auth/
///     │   ├── POST /register           # public
///     │   ├── POST /login              # public
///     │   ├── POST /google             # public
///     │   ├── POST /refresh            # public
///     │   └── GET  /me                 # authenticated
///     ├── /users/me                    # GET, PATCH, DELETE
///     │   └── POST /password
///     ├── /projects                    # GET, POST
///     │   └── /:id                     # GET, PATCH, DELETE
///     └── /tasks                       # GET, POST
///         ├── GET /overdue
///         └── /:id                     # GET, PATCH, DELETE
///             ├── PATCH /quadrant
///             └── PATCH /status
/// ```
///
/// # Middleware Stack
///
/// Applied in order (bottom to top):
/// 1. Request tracing (tower-http TraceLayer)
/// 2. CORS (tower-http CorsLayer)
/// 3. Bearer authentication (everything except health and the public auth routes)
pub fn build_router(state: AppState) -> Router {
    use crate::routes;

    let health_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route("/health/live", get(routes::health::liveness));

    let auth_routes = Router::new()
        .route("/register", post(routes::auth::register))
        .route("/login", post(routes::auth::login))
        .route("/google", post(routes::auth::google))
        .route("/refresh", post(routes::auth::refresh))
        .route(
            "/me",
            get(routes::auth::me).route_layer(axum::middleware::from_fn_with_state(
                state.clone(),
                jwt_auth_layer,
            )),
        );

    let user_routes = Router::new()
        .route(
            "/me",
            get(routes::users::get_me)
                .patch(routes::users::update_me)
                .delete(routes::users::delete_me),
        )
        .route("/me/password", post(routes::users::change_password));

    let project_routes = Router::new()
        .route(
            "/",
            get(routes::projects::list_projects).post(routes::projects::create_project),
        )
        .route(
            "/:id",
            get(routes::projects::get_project)
                .patch(routes::projects::update_project)
                .delete(routes::projects::delete_project),
        );

    let task_routes = Router::new()
        .route(
            "/",
            get(routes::tasks::list_tasks).post(routes::tasks::create_task),
        )
        .route("/overdue", get(routes::tasks::list_overdue))
        .route(
            "/:id",
            get(routes::tasks::get_task)
                .patch(routes::tasks::update_task)
                .delete(routes::tasks::delete_task),
        )
        .route("/:id/quadrant", patch(routes::tasks::move_quadrant))
        .route("/:id/status", patch(routes::tasks::update_status));

    let protected_routes = Router::new()
        .nest("/users", user_routes)
        .nest("/projects", project_routes)
        .nest("/tasks", task_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            jwt_auth_layer,
        ));

    let v1_routes = Router::new()
        .nest("/auth", auth_routes)
        .merge(protected_routes);

    let cors = cors_layer(&state.config);

    Router::new()
        .merge(health_routes)
        .nest("/v1", v1_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .with_state(state)
}

fn cors_layer(config: &Config) -> CorsLayer {
    if config.api.allows_any_origin() {
        // Development mode: permissive CORS
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .api
        .cors_origins
        .iter()
        .filter_map(|origin| origin.parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
        .max_age(std::time::Duration::from_secs(3600))
}

/// Bearer authentication middleware layer
///
/// Resolves the access token in the Authorization header to an active user
/// and injects it as [`CurrentUser`] into request extensions.
async fn jwt_auth_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req)
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".to_string()))?;

    let user = state.auth.resolve_caller(&token).await?;

    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}

fn bearer_token(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(|t| t.trim().to_string())
}
