use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{ConvertError, Result};
use crate::stats::ConversionStats;
use crate::strategies::{
    ConversionRequest, ConversionResult, ConvertOptions, ConvertStrategy, DocumentClass,
    ExternalApiStrategy, LayoutEngineStrategy, Payload, RenderEngineStrategy, StrategyKind,
};

/// Runs one conversion request through its primary strategy and, when
/// enabled and worthwhile, through the single fallback attempt. Per request
/// the flow is strictly sequential: Start -> TryPrimary -> (Success |
/// TryFallback) -> (Success | Failed). No state survives a request except
/// the shared counters.
pub struct Orchestrator {
    strategies: HashMap<StrategyKind, Arc<dyn ConvertStrategy>>,
    stats: Arc<ConversionStats>,
}

impl Orchestrator {
    pub fn new(config: &Config, stats: Arc<ConversionStats>) -> Self {
        let strategies: Vec<Arc<dyn ConvertStrategy>> = vec![
            Arc::new(RenderEngineStrategy::new(config.browser_path.clone())),
            Arc::new(ExternalApiStrategy::new(
                config.external_api.clone(),
                config.external_api_base.clone(),
                config.temp_dir.clone(),
            )),
            Arc::new(LayoutEngineStrategy::new()),
        ];
        Self::with_strategies(strategies, stats)
    }

    pub fn with_strategies(
        strategies: Vec<Arc<dyn ConvertStrategy>>,
        stats: Arc<ConversionStats>,
    ) -> Self {
        let strategies = strategies.into_iter().map(|s| (s.kind(), s)).collect();
        Self { strategies, stats }
    }

    pub fn stats(&self) -> &ConversionStats {
        &self.stats
    }

    fn default_for(class: DocumentClass) -> StrategyKind {
        match class {
            DocumentClass::Spreadsheet | DocumentClass::WordDoc => StrategyKind::RenderEngine,
            DocumentClass::Image => StrategyKind::LayoutEngine,
        }
    }

    /// Explicit strategy wins; otherwise the per-class default. A strategy
    /// that cannot handle the class at all is rejected up front.
    fn primary_for(class: DocumentClass, options: &ConvertOptions) -> Result<StrategyKind> {
        let primary = options.strategy.unwrap_or_else(|| Self::default_for(class));
        let valid = match primary {
            StrategyKind::ExternalApi => true,
            other => other == Self::default_for(class),
        };
        if !valid {
            return Err(ConvertError::Validation(format!(
                "strategy {primary} cannot convert {class:?} documents"
            )));
        }
        Ok(primary)
    }

    /// The single alternate for a class: the external API, or the class
    /// default when the external API was already primary.
    fn alternate_for(class: DocumentClass, primary: StrategyKind) -> StrategyKind {
        if primary == StrategyKind::ExternalApi {
            Self::default_for(class)
        } else {
            StrategyKind::ExternalApi
        }
    }

    async fn execute(
        &self,
        kind: StrategyKind,
        request: &ConversionRequest,
    ) -> Result<crate::strategies::Conversion> {
        let strategy = self.strategies.get(&kind).ok_or_else(|| {
            ConvertError::Configuration(format!("strategy {kind} is not registered"))
        })?;
        strategy.convert(request).await
    }

    /// Single entry point for document conversion. Every failure is folded
    /// into the returned result; the stats are mutated exactly once.
    pub async fn convert_document(&self, request: ConversionRequest) -> ConversionResult {
        let class = request.class;
        let primary = match request
            .options
            .validate()
            .and_then(|()| Self::primary_for(class, &request.options))
        {
            Ok(primary) => primary,
            Err(e) => {
                let result = ConversionResult {
                    strategy_used: request
                        .options
                        .strategy
                        .unwrap_or_else(|| Self::default_for(class)),
                    outcome: Err(e),
                };
                self.stats.record(&result);
                return result;
            }
        };

        info!("converting {class:?} document via {primary}");
        let mut strategy_used = primary;
        let mut outcome = self.execute(primary, &request).await;

        if let Err(e) = &outcome {
            let alternate = Self::alternate_for(class, primary);
            if request.options.enable_fallback && e.allows_fallback() {
                warn!("{primary} failed ({e}), retrying via {alternate}");
                strategy_used = alternate;
                outcome = self.execute(alternate, &request).await;
            } else {
                warn!("{primary} failed ({e}), no fallback attempted");
            }
        }

        let result = ConversionResult {
            strategy_used,
            outcome,
        };
        self.stats.record(&result);
        result
    }

    /// Dedicated collage entry point. Collages are pure layout math, so they
    /// always run on the layout engine with no fallback.
    pub async fn create_collage(
        &self,
        images: Vec<Bytes>,
        mut options: ConvertOptions,
    ) -> ConversionResult {
        if options.collage.is_none() {
            options.collage = Some(Default::default());
        }
        options.strategy = Some(StrategyKind::LayoutEngine);

        let request = ConversionRequest {
            class: DocumentClass::Image,
            payload: Payload::Images(images),
            options,
        };

        let outcome = match request.options.validate() {
            Ok(()) => self.execute(StrategyKind::LayoutEngine, &request).await,
            Err(e) => Err(e),
        };

        let result = ConversionResult {
            strategy_used: StrategyKind::LayoutEngine,
            outcome,
        };
        self.stats.record(&result);
        result
    }
}
