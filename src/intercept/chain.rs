//! Ordered interceptor chain.
//!
//! # Responsibilities
//! - Hold one optional interceptor per layer, in fixed chain order
//! - Open a timed call at a layer and close it exactly once
//! - Tag errors with the innermost layer that saw them
//! - Advance the request phase as calls enter layers

use std::future::Future;
use std::time::Instant;

use crate::config::InterceptionConfig;
use crate::context::{CorrelationContext, RequestPhase};
use crate::intercept::error::{InterceptError, Origin};
use crate::intercept::interceptor::{CallInfo, CallOutcome, Decision, ErrorAction, Interceptor};
use crate::intercept::layers::ErrorInterceptor;
use crate::intercept::Layer;

/// The composed chain: Error (outermost) → Auth → Router → Service → Database.
///
/// Built once per service handle by the registry. Slots of disabled layers
/// stay empty, so calls at those layers pass through untouched.
pub struct InterceptorChain {
    config: InterceptionConfig,
    layers: [Option<Box<dyn Interceptor>>; 4],
    error: ErrorInterceptor,
}

impl InterceptorChain {
    pub(crate) fn new(
        config: InterceptionConfig,
        layers: [Option<Box<dyn Interceptor>>; 4],
        error: ErrorInterceptor,
    ) -> Self {
        for (slot, layer) in layers.iter().zip(Layer::ALL) {
            if let Some(interceptor) = slot {
                debug_assert_eq!(interceptor.layer(), layer, "interceptor in wrong slot");
            }
        }
        Self {
            config,
            layers,
            error,
        }
    }

    pub fn config(&self) -> &InterceptionConfig {
        &self.config
    }

    pub fn debug(&self) -> bool {
        self.config.debug
    }

    /// Returns true if the layer has an active interceptor.
    pub fn is_enabled(&self, layer: Layer) -> bool {
        self.layers[layer.index()].is_some()
    }

    pub fn enabled_layers(&self) -> Vec<Layer> {
        Layer::ALL
            .into_iter()
            .filter(|layer| self.is_enabled(*layer))
            .collect()
    }

    pub fn error_interceptor(&self) -> &ErrorInterceptor {
        &self.error
    }

    /// Enter `layer` for one call.
    ///
    /// Runs the layer's `before` hook. A rejection is returned as the error
    /// (already tagged and observed); otherwise the returned guard should be
    /// closed with [`CallGuard::complete`] or [`CallGuard::fail`]. A guard
    /// dropped without being closed reports an abandoned call.
    pub fn begin_call<'a>(
        &'a self,
        layer: Layer,
        ctx: &'a CorrelationContext,
        call: CallInfo,
    ) -> Result<CallGuard<'a>, InterceptError> {
        let interceptor = self.layers[layer.index()].as_deref();
        let started = Instant::now();

        if let Some(interceptor) = interceptor {
            ctx.advance(RequestPhase::from(layer));

            if let Decision::Reject(mut error) = interceptor.before(ctx, &call) {
                error.tag_origin(Origin::from_call(layer, &call));
                let outcome = CallOutcome {
                    elapsed: started.elapsed(),
                    status: Some(error.kind().status().as_u16()),
                    failed: true,
                    abandoned: false,
                };
                interceptor.after(ctx, &call, &outcome);
                ctx.advance(RequestPhase::Errored);
                return Err(error);
            }
        }

        Ok(CallGuard {
            layer,
            interceptor,
            ctx,
            call,
            started,
            closed: false,
        })
    }

    /// Run `future` as one call at `layer`.
    pub async fn intercept<F, T>(
        &self,
        layer: Layer,
        ctx: &CorrelationContext,
        call: CallInfo,
        future: F,
    ) -> Result<T, InterceptError>
    where
        F: Future<Output = Result<T, InterceptError>>,
    {
        let guard = self.begin_call(layer, ctx, call)?;
        match future.await {
            Ok(value) => {
                guard.complete();
                Ok(value)
            }
            Err(error) => Err(guard.fail(error)),
        }
    }
}

/// An open call at one layer.
pub struct CallGuard<'a> {
    layer: Layer,
    interceptor: Option<&'a dyn Interceptor>,
    ctx: &'a CorrelationContext,
    call: CallInfo,
    started: Instant,
    closed: bool,
}

impl CallGuard<'_> {
    pub fn layer(&self) -> Layer {
        self.layer
    }

    /// Close a successful call.
    pub fn complete(self) {
        self.finish(None);
    }

    /// Close a call that produced an HTTP status. 5xx counts as failed.
    pub fn complete_with_status(self, status: u16) {
        self.finish(Some(status));
    }

    fn finish(mut self, status: Option<u16>) {
        self.closed = true;
        if let Some(interceptor) = self.interceptor {
            let outcome = CallOutcome {
                elapsed: self.started.elapsed(),
                status,
                failed: status.is_some_and(|s| s >= 500),
                abandoned: false,
            };
            interceptor.after(self.ctx, &self.call, &outcome);
        }
    }

    /// Close a failed call and hand the (possibly tagged) error back.
    pub fn fail(mut self, mut error: InterceptError) -> InterceptError {
        self.closed = true;
        if let Some(interceptor) = self.interceptor {
            error.tag_origin(Origin::from_call(self.layer, &self.call));

            let outcome = CallOutcome {
                elapsed: self.started.elapsed(),
                status: Some(error.kind().status().as_u16()),
                failed: true,
                abandoned: false,
            };
            interceptor.after(self.ctx, &self.call, &outcome);

            if interceptor.on_error(self.ctx, &self.call, &error) == ErrorAction::Suppress {
                error.mark_suppressed();
            }
            self.ctx.advance(RequestPhase::Errored);
        }
        error
    }
}

impl Drop for CallGuard<'_> {
    /// A guard dropped unclosed means the call's future was dropped: the
    /// layer still sees one `after`, flagged as abandoned.
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        if let Some(interceptor) = self.interceptor {
            tracing::debug!(
                layer = %self.layer,
                component = %self.call.component,
                request_id = %self.ctx.request_id(),
                cancelled = self.ctx.is_cancelled(),
                "Call abandoned before completion"
            );
            let outcome = CallOutcome {
                elapsed: self.started.elapsed(),
                status: None,
                failed: true,
                abandoned: true,
            };
            interceptor.after(self.ctx, &self.call, &outcome);
        }
    }
}
