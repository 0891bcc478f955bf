/*!
 * Shared state of one sync run.
 *
 * The oracle client, rate limiter, cache and policy live here and are
 * handed to every file explicitly; nothing is process-global.
 */

use std::sync::Arc;

use anyhow::Result;

use crate::app_config::Config;
use crate::diff::LineDiffEngine;
use crate::document::{PlaceholderProtector, ReflowEngine, Segmenter};
use crate::language_utils;
use crate::policy::semantic::{SemanticChangeOracle, SemanticJudge};
use crate::policy::{ChangePolicyResolver, PolicyThresholds};
use crate::providers::Provider;
use crate::translation::{
    OrchestratorSettings, PromptBuilder, PromptTemplate, RateLimiter, StyleGuides, TranslationCache,
    TranslationOrchestrator,
};
use crate::validation::AlignmentVerifier;

/// Everything a file sync needs
pub struct SyncContext {
    pub config: Config,
    pub provider: Arc<dyn Provider>,
    pub limiter: Arc<RateLimiter>,
    pub orchestrator: TranslationOrchestrator,
    pub resolver: ChangePolicyResolver,
    pub diff: LineDiffEngine,
    pub segmenter: Segmenter,
    pub protector: PlaceholderProtector,
    pub reflow: ReflowEngine,
    pub verifier: AlignmentVerifier,
}

impl SyncContext {
    /// Build the context; the semantic judge asks the same oracle through the orchestrator
    pub fn new(config: Config, provider: Arc<dyn Provider>, cache: TranslationCache) -> Result<Self> {
        let limiter = Arc::new(RateLimiter::new(requests_per_minute(&config)));
        let orchestrator = build_orchestrator(&config, Arc::clone(&provider), Arc::clone(&limiter), cache)?;
        let judge: Arc<dyn SemanticJudge> = Arc::new(SemanticChangeOracle::new(
            orchestrator.clone(),
            config.sync.semantic_judge_attempts,
        ));
        Ok(Self::assemble(config, provider, limiter, orchestrator, judge))
    }

    /// Build the context around a given judge and limiter
    pub fn with_judge(
        config: Config,
        provider: Arc<dyn Provider>,
        cache: TranslationCache,
        limiter: Arc<RateLimiter>,
        judge: Arc<dyn SemanticJudge>,
    ) -> Result<Self> {
        let orchestrator = build_orchestrator(&config, Arc::clone(&provider), Arc::clone(&limiter), cache)?;
        Ok(Self::assemble(config, provider, limiter, orchestrator, judge))
    }

    fn assemble(
        config: Config,
        provider: Arc<dyn Provider>,
        limiter: Arc<RateLimiter>,
        orchestrator: TranslationOrchestrator,
        judge: Arc<dyn SemanticJudge>,
    ) -> Self {
        let resolver = ChangePolicyResolver::new(PolicyThresholds::from(&config.sync), judge);
        Self {
            config,
            provider,
            limiter,
            orchestrator,
            resolver,
            diff: LineDiffEngine::new(),
            segmenter: Segmenter::new(),
            protector: PlaceholderProtector::new(),
            reflow: ReflowEngine::new(),
            verifier: AlignmentVerifier::new(),
        }
    }

    pub fn cache(&self) -> &TranslationCache {
        self.orchestrator.cache()
    }
}

fn build_orchestrator(
    config: &Config,
    provider: Arc<dyn Provider>,
    limiter: Arc<RateLimiter>,
    cache: TranslationCache,
) -> Result<TranslationOrchestrator> {
    let common = &config.translation.common;
    let prompts = PromptBuilder::new(
        &PromptTemplate::new(&common.system_prompt),
        &language_utils::display_name(&config.source_language),
        &language_utils::display_name(&config.target_language),
        StyleGuides::load(common)?,
    );
    Ok(TranslationOrchestrator::new(
        provider,
        limiter,
        cache,
        Arc::new(prompts),
        OrchestratorSettings::from_config(config),
    ))
}

/// The stricter of the run-wide and provider-specific limits
fn requests_per_minute(config: &Config) -> Option<u32> {
    match (config.sync.requests_per_minute, config.translation.get_rate_limit()) {
        (Some(run), Some(provider)) => Some(run.min(provider)),
        (run, provider) => run.or(provider),
    }
}
