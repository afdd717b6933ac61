//! # Web crate: the HTTP server
//!
//! An axum application over the `api` crate. [`router`] wires the routes for
//! any [`DataStore`]; [`start_server`] picks the store, sign-in method and
//! session backend from [`Settings`] and serves until Ctrl+C or SIGTERM.
//!
//! | Path | Methods |
//! |------|---------|
//! | `/` | GET |
//! | `/auth` | GET |
//! | `/auth/sign-in`, `/auth/sign-up`, `/auth/sign-out` | POST |
//! | `/auth/oauth`, `/auth/callback` | GET |
//! | `/signup`, `/profile` | GET, POST |
//! | `/todos`, `/todos/{id}/toggle`, `/todos/{id}/delete` | POST |

use anyhow::Context as _;
use api::auth::{LocalProvider, OAuthProvider, PasswordProvider};
use api::db::PgStore;
use api::{AuthMethod, Provider, SessionGate};
use axum::{
    routing::{get, post},
    Router,
};
use store::{DataStore, FileStore, MemoryStore};
use tokio::{net::TcpListener, signal};
use tower_http::trace::TraceLayer;
use tower_sessions::cookie::SameSite;
use tower_sessions::{Expiry, SessionManagerLayer};
use tower_sessions_sqlx_store::PostgresStore;
use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod error;
pub mod flash;
pub mod routes;
pub mod settings;
pub mod state;
pub mod views;

use settings::{Backend, Settings};
use state::AppState;

/// Log filter used when `RUST_LOG` is unset.
const DEFAULT_LOG_FILTER: &str = "web=debug,api=debug,tower_http=info";

/// All routes, without the session layer.
pub fn router<S: DataStore>(state: AppState<S>) -> Router {
    Router::new()
        .route("/", get(routes::home::<S>))
        .route("/auth", get(routes::auth::page::<S>))
        .route("/auth/sign-in", post(routes::auth::sign_in::<S>))
        .route("/auth/sign-up", post(routes::auth::sign_up::<S>))
        .route("/auth/oauth", get(routes::auth::oauth::<S>))
        .route("/auth/callback", get(routes::auth::callback::<S>))
        .route("/auth/sign-out", post(routes::auth::sign_out::<S>))
        .route(
            "/signup",
            get(routes::profile::onboarding::<S>).post(routes::profile::complete_onboarding::<S>),
        )
        .route(
            "/profile",
            get(routes::profile::page::<S>).post(routes::profile::save::<S>),
        )
        .route("/todos", post(routes::todos::add::<S>))
        .route("/todos/{id}/toggle", post(routes::todos::toggle::<S>))
        .route("/todos/{id}/delete", post(routes::todos::delete::<S>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Cookie sessions kept in `store`.
pub fn session_layer<T>(store: T, settings: &settings::Session) -> SessionManagerLayer<T>
where
    T: tower_sessions::SessionStore + Clone,
{
    SessionManagerLayer::new(store)
        .with_secure(settings.secure)
        .with_same_site(SameSite::Lax)
        .with_expiry(Expiry::OnInactivity(time::Duration::days(
            settings.expiry_days,
        )))
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with(fmt::layer())
        .init();
}

/// The configured sign-in method over `store`. The local method only works
/// with the file backend and is built by the caller.
fn provider_for<S>(settings: &Settings, store: S) -> anyhow::Result<Provider<S>> {
    match settings.auth.method {
        AuthMethod::Local => {
            anyhow::bail!("auth.method = \"local\" requires storage.backend = \"file\"")
        }
        AuthMethod::Password => Ok(Provider::Password(PasswordProvider::new(store))),
        AuthMethod::OAuth => {
            let config = settings.auth.oauth.client_config()?;
            info!("OAuth sign-in with {}", config.service);
            Ok(Provider::OAuth(OAuthProvider::new(config, store)?))
        }
    }
}

pub async fn start_server() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    info!("Loading settings...");
    let settings = Settings::new().context("Failed to load settings")?;
    let gate = SessionGate::new(settings.auth.landing);

    match settings.storage.backend {
        Backend::Memory => {
            let store = MemoryStore::new();
            let provider = provider_for(&settings, store.clone())?;
            let app = router(AppState::new(store, provider, gate));
            serve(&settings, app, tower_sessions::MemoryStore::default()).await
        }
        Backend::File => {
            info!("Storing data in {}", settings.storage.data_dir.display());
            let store = FileStore::new(&settings.storage.data_dir);
            let provider = match settings.auth.method {
                AuthMethod::Local => Provider::Local(LocalProvider::new(store.clone())),
                _ => provider_for(&settings, store.clone())?,
            };
            let app = router(AppState::new(store, provider, gate));
            serve(&settings, app, tower_sessions::MemoryStore::default()).await
        }
        Backend::Postgres => {
            let pool = api::db::connect(&settings.database.url)
                .await
                .context("Failed to connect to database")?;
            api::db::migrate(&pool)
                .await
                .context("Failed to run migrations")?;

            let sessions = PostgresStore::new(pool.clone());
            sessions
                .migrate()
                .await
                .context("Failed to create session table")?;

            let store = PgStore::new(pool);
            let provider = provider_for(&settings, store.clone())?;
            let app = router(AppState::new(store, provider, gate));
            serve(&settings, app, sessions).await
        }
    }
}

async fn serve<T>(settings: &Settings, app: Router, sessions: T) -> anyhow::Result<()>
where
    T: tower_sessions::SessionStore + Clone,
{
    let app = app.layer(session_layer(sessions, &settings.session));

    let address = settings.server.address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
