//! Routing layer: times each HTTP request from route match to response.

use crate::context::CorrelationContext;
use crate::intercept::interceptor::{CallInfo, CallOutcome, Interceptor};
use crate::intercept::Layer;
use crate::telemetry::{LogEntry, LoggingService};

pub const REQUEST_DURATION_METRIC: &str = "http.request_duration";

pub struct RouterInterceptor {
    telemetry: LoggingService,
}

impl RouterInterceptor {
    pub fn new(telemetry: LoggingService) -> Self {
        Self { telemetry }
    }
}

impl Interceptor for RouterInterceptor {
    fn layer(&self) -> Layer {
        Layer::Router
    }

    fn after(&self, ctx: &CorrelationContext, call: &CallInfo, outcome: &CallOutcome) {
        // A client that went away gets no request span.
        if ctx.is_cancelled() {
            return;
        }

        let mut entry = LogEntry::performance(REQUEST_DURATION_METRIC, outcome.elapsed_ms())
            .with_layer(Layer::Router)
            .with_module(call.module.clone())
            .with_component(call.component.clone())
            .with_file_path(call.file_path.clone())
            .with_extra_map(call.attributes.clone())
            .with_context(ctx);
        if let Some(status) = outcome.status {
            entry = entry.with_extra("status", status);
        }
        if outcome.abandoned {
            entry = entry.with_extra("abandoned", true);
        }
        self.telemetry.emit(entry);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QueueConfig, ThresholdRule};
    use crate::telemetry::threshold::Direction;
    use crate::telemetry::{PipelineStats, ThresholdEvaluator, THRESHOLD_EXCEEDED};
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_request_duration_entry() {
        let evaluator = Arc::new(ThresholdEvaluator::new());
        let mut rules = BTreeMap::new();
        rules.insert(
            REQUEST_DURATION_METRIC.to_string(),
            ThresholdRule::new(10.0, Direction::GreaterIsWorse),
        );
        evaluator.configure(&rules);
        let (telemetry, mut rx) = LoggingService::new(
            &QueueConfig::default(),
            evaluator,
            Arc::new(PipelineStats::default()),
        );
        let router = RouterInterceptor::new(telemetry);
        let ctx = CorrelationContext::begin(None);
        let call = CallInfo::new("http", "/api/orders/{id}")
            .with_attribute("method", "GET")
            .with_attribute("path", "/api/orders/9");
        let outcome = CallOutcome {
            elapsed: Duration::from_millis(25),
            status: Some(200),
            failed: false,
            abandoned: false,
        };

        router.after(&ctx, &call, &outcome);
        let record = rx.try_recv().unwrap();
        let perf = record.performance().unwrap();
        assert_eq!(perf.metric_name, REQUEST_DURATION_METRIC);
        assert!(perf.metric_value >= 25.0);
        assert_eq!(perf.performance_issue.as_deref(), Some(THRESHOLD_EXCEEDED));
        assert_eq!(record.extra_data()["method"], "GET");
        assert_eq!(record.extra_data()["status"], 200);
        assert_eq!(record.component_name(), Some("/api/orders/{id}"));

        ctx.cancel();
        router.after(&ctx, &call, &outcome);
        assert!(rx.try_recv().is_err());
    }
}
