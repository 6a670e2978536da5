//! Service layer: times business operations.

use crate::context::CorrelationContext;
use crate::intercept::interceptor::{CallInfo, CallOutcome, Interceptor};
use crate::intercept::Layer;
use crate::telemetry::{LogEntry, LoggingService};

pub const SERVICE_DURATION_METRIC: &str = "service.duration";

pub struct ServiceInterceptor {
    telemetry: LoggingService,
}

impl ServiceInterceptor {
    pub fn new(telemetry: LoggingService) -> Self {
        Self { telemetry }
    }
}

impl Interceptor for ServiceInterceptor {
    fn layer(&self) -> Layer {
        Layer::Service
    }

    fn after(&self, ctx: &CorrelationContext, call: &CallInfo, outcome: &CallOutcome) {
        if ctx.is_cancelled() {
            return;
        }
        let mut entry = LogEntry::performance(SERVICE_DURATION_METRIC, outcome.elapsed_ms())
            .with_layer(Layer::Service)
            .with_module(call.module.clone())
            .with_component(call.component.clone())
            .with_file_path(call.file_path.clone())
            .with_extra_map(call.attributes.clone())
            .with_extra("failed", outcome.failed)
            .with_context(ctx);
        if outcome.abandoned {
            entry = entry.with_extra("abandoned", true);
        }
        self.telemetry.emit(entry);
    }
}
