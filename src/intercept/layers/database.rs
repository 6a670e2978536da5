//! Database layer: times individual queries.
//!
//! Query timings are recorded even for cancelled requests; the query ran.

use crate::context::CorrelationContext;
use crate::intercept::interceptor::{CallInfo, CallOutcome, Interceptor};
use crate::intercept::Layer;
use crate::telemetry::{LogEntry, LoggingService};

pub const QUERY_TIME_METRIC: &str = "database.query_time";

pub struct DatabaseInterceptor {
    telemetry: LoggingService,
}

impl DatabaseInterceptor {
    pub fn new(telemetry: LoggingService) -> Self {
        Self { telemetry }
    }
}

impl Interceptor for DatabaseInterceptor {
    fn layer(&self) -> Layer {
        Layer::Database
    }

    fn after(&self, ctx: &CorrelationContext, call: &CallInfo, outcome: &CallOutcome) {
        let mut entry = LogEntry::performance(QUERY_TIME_METRIC, outcome.elapsed_ms())
            .with_layer(Layer::Database)
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueConfig;
    use crate::telemetry::{LogCategory, PipelineStats, ThresholdEvaluator};
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_query_time_recorded_when_cancelled() {
        let (telemetry, mut rx) = LoggingService::new(
            &QueueConfig::default(),
            Arc::new(ThresholdEvaluator::new()),
            Arc::new(PipelineStats::default()),
        );
        let db = DatabaseInterceptor::new(telemetry);
        let ctx = CorrelationContext::begin(None);
        ctx.cancel();

        db.after(
            &ctx,
            &CallInfo::new("orders", "OrderRepository").with_attribute("query", "select_order"),
            &CallOutcome {
                elapsed: Duration::from_millis(3),
                status: None,
                failed: true,
                abandoned: false,
            },
        );
        let record = rx.try_recv().unwrap();
        assert_eq!(record.category(), LogCategory::Performance);
        assert_eq!(record.layer(), Some(Layer::Database));
        assert_eq!(record.extra_data()["query"], "select_order");
        assert_eq!(record.extra_data()["failed"], true);
        // Unconfigured evaluator: never flagged.
        assert_eq!(record.performance().unwrap().performance_issue, None);
    }
}
