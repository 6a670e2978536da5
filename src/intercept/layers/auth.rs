//! Authentication layer.
//!
//! # Responsibilities
//! - Resolve the bearer credential to a principal through an [`Authenticator`]
//! - Attach the principal to the correlation context (sets `user_id`)
//! - Reject unauthenticated calls outside the public path prefixes
//! - Record every invocation, and every rejection as an audit entry

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::AuthConfig;
use crate::context::{CorrelationContext, Principal};
use crate::intercept::error::InterceptError;
use crate::intercept::interceptor::{CallInfo, CallOutcome, Decision, Interceptor};
use crate::intercept::Layer;
use crate::telemetry::{LogEntry, LoggingService};

/// Resolves a presented credential to a principal.
pub trait Authenticator: Send + Sync {
    fn authenticate(&self, credential: &str) -> Option<Principal>;
}

/// Bearer tokens listed in the configuration.
#[derive(Debug, Default)]
pub struct StaticTokenAuthenticator {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenAuthenticator {
    pub fn from_config(config: &AuthConfig) -> Self {
        let tokens = config
            .tokens
            .iter()
            .map(|t| {
                (
                    t.token.clone(),
                    Principal {
                        user_id: t.user_id.clone(),
                        admin: t.admin,
                    },
                )
            })
            .collect();
        Self { tokens }
    }
}

impl Authenticator for StaticTokenAuthenticator {
    fn authenticate(&self, credential: &str) -> Option<Principal> {
        self.tokens.get(credential).cloned()
    }
}

pub struct AuthInterceptor {
    telemetry: LoggingService,
    authenticator: Arc<dyn Authenticator>,
    public_paths: Vec<String>,
}

impl AuthInterceptor {
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

    /// True if `path` equals a public prefix or lies beneath it.
    fn is_public(&self, path: &str) -> bool {
        self.public_paths.iter().any(|prefix| {
            let prefix = prefix.trim_end_matches('/');
            if prefix.is_empty() {
                return true;
            }
            path.strip_prefix(prefix)
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }

    fn reject(&self, ctx: &CorrelationContext, call: &CallInfo, reason: &str) -> Decision {
        let path = call.attribute_str("path").unwrap_or_default();
        tracing::debug!(
            request_id = %ctx.request_id(),
            path = %path,
            reason,
            "Authentication rejected"
        );
        self.telemetry.emit(
            LogEntry::audit("auth.rejected", format!("Authentication rejected: {reason}"))
                .with_layer(Layer::Auth)
                .with_module(call.module.clone())
                .with_component(call.component.clone())
                .with_target(path)
                .with_extra("reason", reason)
                .with_context(ctx),
        );
        Decision::Reject(InterceptError::unauthenticated(reason))
    }
}

impl Interceptor for AuthInterceptor {
    fn layer(&self) -> Layer {
        Layer::Auth
    }

    fn before(&self, ctx: &CorrelationContext, call: &CallInfo) -> Decision {
        if call.attribute_str("path").is_some_and(|p| self.is_public(p)) {
            return Decision::Continue;
        }

        let Some(credential) = call.credential.as_deref() else {
            return self.reject(ctx, call, "missing credential");
        };
        match self.authenticator.authenticate(credential) {
            Some(principal) => {
                ctx.set_principal(principal);
                Decision::Continue
            }
            None => self.reject(ctx, call, "invalid credential"),
        }
    }

    fn after(&self, ctx: &CorrelationContext, call: &CallInfo, outcome: &CallOutcome) {
        let message = if outcome.abandoned {
            "Request abandoned"
        } else if outcome.failed {
            "Authentication failed"
        } else if ctx.user_id().is_some() {
            "Request authenticated"
        } else {
            "Public request"
        };
        self.telemetry.emit(
            LogEntry::application(message)
                .with_layer(Layer::Auth)
                .with_module(call.module.clone())
                .with_component(call.component.clone())
                .with_file_path(call.file_path.clone())
                .with_extra_map(call.attributes.clone())
                .with_extra("duration_ms", outcome.elapsed_ms())
                .with_context(ctx),
        );
    }
}
