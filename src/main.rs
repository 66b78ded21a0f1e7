//! Live Trivia Back binary entrypoint wiring REST, WebSocket, fan-out and storage layers.

use std::{env, net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::Router;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use live_trivia_back::{
    config::AppConfig,
    dao::{
        game_store::{GameStore, memory::MemoryGameStore},
        relay::FanoutRelay,
        session_store::{SessionStore, memory::MemorySessionStore},
    },
    routes,
    state::{AppState, SharedState},
};

/// Storage backends selected at startup.
struct Backends {
    game_store: Arc<dyn GameStore>,
    session_store: Arc<dyn SessionStore>,
    relay: Option<Arc<dyn FanoutRelay>>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = AppConfig::load();
    let backend = env::var("STORE_BACKEND").unwrap_or_else(|_| "memory".into());
    let backends = select_backends(&backend, &config).await?;

    let app_state = AppState::new(
        config,
        backends.game_store,
        backends.session_store,
        backends.relay,
    );
    let _relay_listener = app_state.hub().spawn_relay_listener().await;

    // Build the HTTP router once the shared state is ready.
    let app = build_router(app_state);

    let port = env::var("PORT")
        .or_else(|_| env::var("SERVER_PORT"))
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(8080);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, backend = %backend, "starting server");

    let listener = TcpListener::bind(addr).await.context("binding server")?;
    let service = app.into_make_service();
    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("serving axum")?;

    Ok(())
}

async fn select_backends(backend: &str, config: &AppConfig) -> anyhow::Result<Backends> {
    match backend {
        "memory" => {
            let game_store = match config.load_seed() {
                Some(seed) => MemoryGameStore::with_seed(seed),
                None => MemoryGameStore::new(),
            };
            info!("using in-memory stores; state is lost on restart");
            Ok(Backends {
                game_store: Arc::new(game_store),
                session_store: Arc::new(MemorySessionStore::new()),
                relay: None,
            })
        }
        #[cfg(feature = "mongo-store")]
        "mongo" => mongo_backends().await,
        other => anyhow::bail!("unsupported STORE_BACKEND `{other}`"),
    }
}

#[cfg(feature = "mongo-store")]
async fn mongo_backends() -> anyhow::Result<Backends> {
    use live_trivia_back::dao::game_store::mongodb::{
        MongoConfig, MongoEventRelay, MongoGameStore, MongoSessionStore,
    };

    let mongo_config = MongoConfig::from_env()
        .await
        .context("reading MongoDB configuration")?;
    let store = MongoGameStore::connect(mongo_config)
        .await
        .context("connecting to MongoDB")?;
    let database = store.database();
    let relay = MongoEventRelay::new(&database)
        .await
        .context("preparing the event relay")?;
    info!(database = %database.name(), "connected to MongoDB");

    Ok(Backends {
        session_store: Arc::new(MongoSessionStore::new(&database)),
        relay: Some(Arc::new(relay)),
        game_store: Arc::new(store),
    })
}

/// Build the top-level router and attach cross-cutting middleware layers.
fn build_router(state: SharedState) -> Router<()> {
    routes::router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Configure tracing subscribers so logs include spans by default.
fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,tower_http=debug".into());
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Wait for Ctrl+C or SIGTERM and shut the server down gracefully.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = term.recv() => {},
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
