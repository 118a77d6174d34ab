//! HTTP turn service for a chain reaction game against an external engine.
//!
//! The human client talks JSON over HTTP; the engine is a separate program
//! that reads and rewrites one shared state file. [`TurnCoordinator`]
//! serializes the two so that every request sees either the state before a
//! turn or the state after it.

pub mod config;
pub mod coordinator;
pub mod errors;
pub mod handlers;
pub mod invoker;
pub mod logging;
pub mod middleware;
pub mod server;
pub mod store;

pub use config::{ConfigError, ConfigOverrides, LogFormat, ServiceConfig};
pub use coordinator::{CoordinatorError, MoveRequest, TurnCoordinator};
pub use errors::{ErrorResponse, ErrorSeverity, IntoErrorResponse};
pub use handlers::{CellView, GameStateResponse};
pub use invoker::{EngineError, EngineInvoker, EngineOutput, ProcessInvoker};
pub use logging::{init_logging, LogEntry, TestLogSubscriber};
pub use middleware::{log_response, with_request_logging};
pub use server::{routes, AppContext, ServerError, ServerHandle, WebServer};
pub use store::{FileResource, MemoryResource, StateResource, StateStore, StoreError};

#[cfg(test)]
mod tests {
    use super::*;
    use chain_reaction_core::state::TurnState;
    use std::sync::Arc;

    #[derive(Debug)]
    struct IdleEngine;

    #[async_trait::async_trait]
    impl EngineInvoker for IdleEngine {
        async fn run(
            &self,
            _working_dir: Option<&std::path::Path>,
        ) -> Result<EngineOutput, EngineError> {
            Ok(EngineOutput::default())
        }
    }

    #[test]
    fn context_shares_one_coordinator() {
        let ctx = AppContext::from_parts(
            ServiceConfig::for_tests("."),
            StateStore::new(Arc::new(MemoryResource::new())),
            Arc::new(IdleEngine),
        );

        assert!(Arc::ptr_eq(&ctx.coordinator(), &ctx.coordinator()));
        assert_eq!(ctx.coordinator().turn_state(), TurnState::Idle);
        assert_eq!(ctx.config().port, 0);
    }
}
