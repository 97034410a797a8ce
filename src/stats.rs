use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::strategies::{ConversionResult, StrategyKind};

/// Process-wide conversion counters. Shared by every in-flight request, so
/// every field is atomic; `record` is the single mutation point. Counters
/// live for the life of the process and are never reset.
#[derive(Debug, Default)]
pub struct ConversionStats {
    total: AtomicU64,
    successful: AtomicU64,
    failed: AtomicU64,
    render_engine: AtomicU64,
    external_api: AtomicU64,
    layout_engine: AtomicU64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub by_strategy: ByStrategy,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ByStrategy {
    #[serde(rename = "render-engine")]
    pub render_engine: u64,
    #[serde(rename = "external-api")]
    pub external_api: u64,
    #[serde(rename = "layout-engine")]
    pub layout_engine: u64,
}

impl ConversionStats {
    /// Exactly one call per completed request: total always increments, a
    /// success additionally bumps its strategy counter.
    pub fn record(&self, result: &ConversionResult) {
        self.total.fetch_add(1, Ordering::Relaxed);
        if result.outcome.is_ok() {
            self.successful.fetch_add(1, Ordering::Relaxed);
            self.strategy_counter(result.strategy_used)
                .fetch_add(1, Ordering::Relaxed);
        } else {
            self.failed.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn strategy_counter(&self, kind: StrategyKind) -> &AtomicU64 {
        match kind {
            StrategyKind::RenderEngine => &self.render_engine,
            StrategyKind::ExternalApi => &self.external_api,
            StrategyKind::LayoutEngine => &self.layout_engine,
        }
    }

    pub fn by_strategy(&self, kind: StrategyKind) -> u64 {
        self.strategy_counter(kind).load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            successful: self.successful.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            by_strategy: ByStrategy {
                render_engine: self.render_engine.load(Ordering::Relaxed),
                external_api: self.external_api.load(Ordering::Relaxed),
                layout_engine: self.layout_engine.load(Ordering::Relaxed),
            },
        }
    }
}
