//! Chain registration.
//!
//! The registry knows every built-in interceptor at compile time and
//! assembles them in chain order for a service handle. A handle is
//! registered at most once; later calls return the chain already built.

use std::sync::{Arc, OnceLock};

use crate::config::InterceptionConfig;
use crate::intercept::chain::InterceptorChain;
use crate::intercept::interceptor::Interceptor;
use crate::intercept::layers::{
    AuthInterceptor, Authenticator, DatabaseInterceptor, ErrorInterceptor, RouterInterceptor,
    ServiceInterceptor,
};
use crate::intercept::Layer;
use crate::telemetry::LoggingService;

/// An instrumentable service. Holds its chain once registered.
pub struct ServiceHandle {
    name: String,
    chain: OnceLock<Arc<InterceptorChain>>,
}

impl ServiceHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            chain: OnceLock::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn chain(&self) -> Option<&Arc<InterceptorChain>> {
        self.chain.get()
    }

    pub fn is_registered(&self) -> bool {
        self.chain.get().is_some()
    }
}

/// Builds interceptor chains sharing one logging service and authenticator.
#[derive(Clone)]
pub struct Registry {
    telemetry: LoggingService,
    authenticator: Arc<dyn Authenticator>,
    public_paths: Vec<String>,
}

impl Registry {
    pub fn new(
        telemetry: LoggingService,
        authenticator: Arc<dyn Authenticator>,
        public_paths: Vec<String>,
    ) -> Self {
        Self {
            telemetry,
            authenticator,
            public_paths,
        }
    }

    /// Attach the interceptor chain to `handle`.
    ///
    /// Idempotent: if the handle already has a chain it is returned as is
    /// and `config` is ignored.
    pub fn register(
        &self,
        handle: &ServiceHandle,
        config: &InterceptionConfig,
    ) -> Arc<InterceptorChain> {
        let mut built = false;
        let chain = handle.chain.get_or_init(|| {
            built = true;
            Arc::new(self.build_chain(config))
        });

        if built {
            tracing::info!(
                service = %handle.name,
                debug = config.debug,
                layers = ?chain.enabled_layers(),
                "Interceptor chain registered"
            );
        } else {
            tracing::debug!(service = %handle.name, "Interceptor chain already registered");
        }
        chain.clone()
    }

    fn build_chain(&self, config: &InterceptionConfig) -> InterceptorChain {
        let layers = Layer::ALL.map(|layer| {
            if !config.is_enabled(layer) {
                return None;
            }
            let interceptor: Box<dyn Interceptor> = match layer {
                Layer::Auth => Box::new(AuthInterceptor::new(
                    self.telemetry.clone(),
                    self.authenticator.clone(),
                    self.public_paths.clone(),
                )),
                Layer::Router => Box::new(RouterInterceptor::new(self.telemetry.clone())),
                Layer::Service => Box::new(ServiceInterceptor::new(self.telemetry.clone())),
                Layer::Database => Box::new(DatabaseInterceptor::new(self.telemetry.clone())),
            };
            Some(interceptor)
        });

        InterceptorChain::new(
            config.clone(),
            layers,
            ErrorInterceptor::new(self.telemetry.clone(), config.debug),
        )
    }
}
