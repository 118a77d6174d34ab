use crate::config::ServiceConfig;
use crate::coordinator::{CoordinatorError, TurnCoordinator};
use crate::handlers;
use crate::invoker::{EngineInvoker, ProcessInvoker};
use crate::middleware::with_request_logging;
use crate::store::{StateStore, StoreError};
use std::convert::Infallible;
use std::fs;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::info;
use warp::filters::BoxedFilter;
use warp::reply::{Reply, Response};
use warp::Filter;

/// Largest accepted request body.
const MAX_BODY_BYTES: u64 = 4 * 1024;

#[derive(Debug, Clone)]
pub struct AppContext {
    config: ServiceConfig,
    coordinator: Arc<TurnCoordinator>,
}

impl AppContext {
    /// Wires the file-backed store and the process engine from `config`.
    ///
    /// `state_dir` is made absolute first. The engine starts inside it, so a
    /// relative engine path joined to a relative `state_dir` would otherwise
    /// be resolved twice.
    pub fn new(mut config: ServiceConfig) -> Result<Self, ServerError> {
        config
            .validate()
            .map_err(|err| ServerError::ConfigError(err.to_string()))?;
        if !config.state_dir.exists() {
            fs::create_dir_all(&config.state_dir)
                .map_err(|err| ServerError::ConfigError(err.to_string()))?;
        }
        config.state_dir = fs::canonicalize(&config.state_dir).map_err(|err| {
            ServerError::ConfigError(format!(
                "state directory {}: {err}",
                config.state_dir.display()
            ))
        })?;

        let store = StateStore::file(config.state_dir.clone(), &config.state_file);
        let invoker = ProcessInvoker::new(config.resolved_engine_path(), config.engine_timeout())
            .with_args(config.engine_args.clone());
        let coordinator = TurnCoordinator::new(store, Arc::new(invoker), config.engine_first);

        Ok(Self::with_coordinator(config, Arc::new(coordinator)))
    }

    /// Context around an already built coordinator, e.g. one with an
    /// in-memory store.
    pub fn with_coordinator(config: ServiceConfig, coordinator: Arc<TurnCoordinator>) -> Self {
        Self {
            config,
            coordinator,
        }
    }

    pub fn from_parts(
        config: ServiceConfig,
        store: StateStore,
        invoker: Arc<dyn EngineInvoker>,
    ) -> Self {
        let coordinator = TurnCoordinator::new(store, invoker, config.engine_first);
        Self::with_coordinator(config, Arc::new(coordinator))
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn coordinator(&self) -> Arc<TurnCoordinator> {
        Arc::clone(&self.coordinator)
    }
}

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind to address: {0}")]
    BindError(#[from] std::io::Error),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Failed to initialize game state: {0}")]
    Storage(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct WebServer {
    context: AppContext,
}

impl WebServer {
    pub fn new(config: ServiceConfig) -> Result<Self, ServerError> {
        let context = AppContext::new(config)?;
        Ok(Self { context })
    }

    pub fn from_context(context: AppContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    /// Resets the game, then serves until the handle is shut down or dropped.
    ///
    /// An engine failure during an engine-first reset is logged and the
    /// server still starts with the fresh board. Failing to write the state
    /// resource is fatal.
    pub async fn start(self) -> Result<ServerHandle, ServerError> {
        let WebServer { context } = self;
        let config = context.config().clone();
        let bind_addr = Self::bind_addr(&config)?;

        match context.coordinator().initialize().await {
            Ok(state) => info!(phase = ?state.turn(), "game initialized"),
            Err(CoordinatorError::Storage(err)) => return Err(ServerError::Storage(err)),
            Err(err) => {
                tracing::warn!(error = %err, "opening engine move failed; serving fresh board")
            }
        }

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let routes = routes(&context);
        let shutdown_signal = async move {
            let _ = shutdown_rx.await;
        };

        let (addr, server_future) = warp::serve(routes)
            .try_bind_with_graceful_shutdown(bind_addr, shutdown_signal)
            .map_err(Self::map_warp_error)?;

        info!(
            %addr,
            state = %context.coordinator().store().describe(),
            "chain reaction server listening"
        );

        let task = tokio::spawn(async move {
            server_future.await;
            Ok(())
        });

        Ok(ServerHandle::new(addr, shutdown_tx, task, context))
    }

    fn bind_addr(config: &ServiceConfig) -> Result<SocketAddr, ServerError> {
        let host = config.host.as_str();

        if let Ok(addr) = host.parse::<SocketAddr>() {
            return Ok(addr);
        }

        if let Ok(ip) = host.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, config.port));
        }

        let candidate = format!("{}:{}", host, config.port);
        let mut addrs = candidate.to_socket_addrs().map_err(|err| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`: {err}"))
        })?;

        addrs.next().ok_or_else(|| {
            ServerError::ConfigError(format!("failed to resolve address `{candidate}`"))
        })
    }

    fn map_warp_error(err: warp::Error) -> ServerError {
        use std::error::Error as StdError;

        if let Some(source) = err.source() {
            if let Some(io_err) = source.downcast_ref::<std::io::Error>() {
                let recreated = std::io::Error::new(io_err.kind(), io_err.to_string());
                return ServerError::BindError(recreated);
            }
        }

        ServerError::ConfigError(err.to_string())
    }
}

/// Every route of the service, with CORS, request logging and JSON
/// rejection bodies applied.
pub fn routes(context: &AppContext) -> BoxedFilter<(Response,)> {
    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST", "OPTIONS"])
        .allow_headers(vec!["content-type"]);

    let routes = health_route(context)
        .or(api_routes(context))
        .unify()
        .recover(handlers::handle_rejection)
        .unify()
        .with(cors);

    with_request_logging(routes).boxed()
}

fn health_route(context: &AppContext) -> BoxedFilter<(Response,)> {
    warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and(with_coordinator(context.coordinator()))
        .map(|coordinator: Arc<TurnCoordinator>| handlers::health(&coordinator).into_response())
        .boxed()
}

fn api_routes(context: &AppContext) -> BoxedFilter<(Response,)> {
    let coordinator = context.coordinator();

    let state = warp::path!("api" / "state")
        .and(warp::get())
        .and(with_coordinator(coordinator.clone()))
        .then(handlers::get_state);

    let submit = warp::path!("api" / "move")
        .and(warp::post())
        .and(with_coordinator(coordinator.clone()))
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::json())
        .then(handlers::submit_move);

    let reset = warp::path!("api" / "reset")
        .and(warp::post())
        .and(with_coordinator(coordinator.clone()))
        .then(handlers::reset);

    let retry = warp::path!("api" / "engine" / "retry")
        .and(warp::post())
        .and(with_coordinator(coordinator))
        .then(handlers::retry_engine);

    state
        .or(submit)
        .unify()
        .or(reset)
        .unify()
        .or(retry)
        .unify()
        .boxed()
}

fn with_coordinator(
    coordinator: Arc<TurnCoordinator>,
) -> impl Filter<Extract = (Arc<TurnCoordinator>,), Error = Infallible> + Clone {
    warp::any().map(move || Arc::clone(&coordinator))
}

#[derive(Debug)]
pub struct ServerHandle {
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<Result<(), ServerError>>>,
    context: AppContext,
}

impl ServerHandle {
    fn new(
        addr: SocketAddr,
        shutdown: oneshot::Sender<()>,
        task: JoinHandle<Result<(), ServerError>>,
        context: AppContext,
    ) -> Self {
        Self {
            addr,
            shutdown: Some(shutdown),
            task: Some(task),
            context,
        }
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub async fn shutdown(mut self) -> Result<(), ServerError> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            match task.await {
                Ok(result) => result?,
                Err(err) => {
                    return Err(ServerError::ConfigError(format!(
                        "server task join error: {err}"
                    )))
                }
            }
        }

        Ok(())
    }
}

impl Drop for ServerHandle {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }

        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
