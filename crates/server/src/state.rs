use std::sync::Arc;

use encodeq_core::{Config, ConversionEngine, StrategyFactory};

/// Engine type used by the server, with the strategy factory erased.
pub type Engine = ConversionEngine<Arc<dyn StrategyFactory>>;

/// Shared application state
pub struct AppState {
    config: Config,
    engine: Engine,
}

impl AppState {
    pub fn new(config: Config, engine: Engine) -> Self {
        Self { config, engine }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }
}
