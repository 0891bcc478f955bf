/*!
 * Batch translation orchestration.
 *
 * Units are looked up in the cache first; only misses reach the oracle.
 * Misses are grouped into ordinal-tagged batches that run on a bounded pool
 * of tasks (one semaphore shared by every file of the run). Each call waits
 * for a rate limiter slot and runs under a timeout. Retryable failures back
 * off with jitter; a malformed answer splits the batch in half, down to a
 * single unit and finally to single lines of that unit. Results travel back
 * over a channel and are re-ordered by unit id.
 *
 * Standalone calls (semantic judgments) go through `complete` and share the
 * same worker slots, request budget, limiter and backoff.
 */

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use log::{debug, error, warn};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;

use crate::app_config::Config;
use crate::document::placeholder::find_tokens;
use crate::errors::{ProviderError, SyncError};
use crate::providers::{CompletionRequest, CompletionResponse, ModelTier, Provider};
use crate::translation::batch::{parse_batch_response, BatchItem, BatchRequest};
use crate::translation::cache::{CacheKey, TranslationCache};
use crate::translation::prompts::PromptBuilder;
use crate::translation::rate_limit::RateLimiter;
use crate::translation::retry::{AttemptOutcome, BackoffPolicy};
use crate::validation::ordinals::{ExpectedItem, OrdinalValidator};

/// One piece of text to translate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationUnit {
    /// Ordinal, unique within one `translate` call
    pub id: usize,

    /// Masked text, one line per source line
    pub text: String,

    pub context_before: String,
    pub context_after: String,

    /// Number of source lines the text spans
    pub line_count: usize,

    /// Placeholder markers the translation must carry back
    pub expected_tokens: Vec<String>,

    /// Where the answer is cached; None disables caching for the unit
    pub cache_key: Option<CacheKey>,
}

impl TranslationUnit {
    pub fn new(id: usize, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id,
            line_count: text.split('\n').count(),
            expected_tokens: find_tokens(&text),
            text,
            context_before: String::new(),
            context_after: String::new(),
            cache_key: None,
        }
    }

    pub fn with_context(mut self, before: impl Into<String>, after: impl Into<String>) -> Self {
        self.context_before = before.into();
        self.context_after = after.into();
        self
    }

    pub fn with_cache_key(mut self, key: CacheKey) -> Self {
        self.cache_key = Some(key);
        self
    }

    fn char_count(&self) -> usize {
        self.text.chars().count()
    }

    fn expected(&self) -> ExpectedItem {
        ExpectedItem {
            ordinal: self.id,
            tokens: self.expected_tokens.clone(),
        }
    }

    fn carries_expected_tokens(&self, text: &str) -> bool {
        let mut want = self.expected_tokens.clone();
        let mut got = find_tokens(text);
        want.sort();
        got.sort();
        want == got
    }

    /// Per-line sub-units, keyed by line index; blank lines are left out.
    /// Each one keeps the context of the whole unit.
    fn line_units(&self) -> Vec<TranslationUnit> {
        self.text
            .split('\n')
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                TranslationUnit::new(index, line).with_context(self.context_before.as_str(), self.context_after.as_str())
            })
            .collect()
    }
}

/// Translated text of one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    /// Masked translated text
    pub text: String,
    pub model_used: String,
    pub retry_count: u32,
    pub from_cache: bool,
}

/// Tuning knobs of the orchestrator
#[derive(Debug, Clone, PartialEq)]
pub struct OrchestratorSettings {
    pub batch_size: usize,
    pub max_concurrent_requests: usize,
    pub high_accuracy_char_threshold: usize,
    pub high_accuracy_line_threshold: usize,
    pub request_timeout: Duration,
    /// Oracle calls allowed for the whole run
    pub max_requests: Option<usize>,
    pub backoff: BackoffPolicy,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        let sync = &config.sync;
        Self {
            batch_size: sync.batch_size.max(1),
            max_concurrent_requests: sync.max_concurrent_requests.max(1),
            high_accuracy_char_threshold: sync.high_accuracy_char_threshold,
            high_accuracy_line_threshold: sync.high_accuracy_line_threshold,
            request_timeout: Duration::from_secs(sync.request_timeout_secs.max(1)),
            max_requests: sync.max_oracle_requests,
            backoff: BackoffPolicy::from_config(&config.translation.common),
        }
    }
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

type UnitOutcome = (usize, Result<TranslationResult, SyncError>);

/// Successful batch call: translations by ordinal, model, retries spent
type BatchAnswer = (BTreeMap<usize, String>, String, u32);

/// Cache-then-oracle translator shared by every file of a run
#[derive(Clone)]
pub struct TranslationOrchestrator {
    provider: Arc<dyn Provider>,
    limiter: Arc<RateLimiter>,
    cache: TranslationCache,
    prompts: Arc<PromptBuilder>,
    settings: OrchestratorSettings,
    semaphore: Arc<Semaphore>,
    requests_made: Arc<AtomicUsize>,
    aborted: Arc<AtomicBool>,
    validator: OrdinalValidator,
}

impl TranslationOrchestrator {
    pub fn new(
        provider: Arc<dyn Provider>,
        limiter: Arc<RateLimiter>,
        cache: TranslationCache,
        prompts: Arc<PromptBuilder>,
        settings: OrchestratorSettings,
    ) -> Self {
        let permits = settings.max_concurrent_requests.max(1);
        Self {
            provider,
            limiter,
            cache,
            prompts,
            settings,
            semaphore: Arc::new(Semaphore::new(permits)),
            requests_made: Arc::new(AtomicUsize::new(0)),
            aborted: Arc::new(AtomicBool::new(false)),
            validator: OrdinalValidator::new(),
        }
    }

    /// Oracle calls issued so far
    pub fn request_count(&self) -> usize {
        self.requests_made.load(Ordering::SeqCst)
    }

    /// Whether the request budget ran out
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::SeqCst)
    }

    pub fn cache(&self) -> &TranslationCache {
        &self.cache
    }

    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// Translate every unit of one document.
    ///
    /// The returned map has exactly one entry per unit id.
    pub async fn translate(
        &self,
        path: &str,
        units: Vec<TranslationUnit>,
    ) -> BTreeMap<usize, Result<TranslationResult, SyncError>> {
        let mut results = BTreeMap::new();
        let mut misses = Vec::new();

        for unit in units {
            match self.cached(&unit).await {
                Some(hit) => {
                    results.insert(unit.id, Ok(hit));
                }
                None => misses.push(unit),
            }
        }

        if misses.is_empty() {
            return results;
        }

        let ids: Vec<usize> = misses.iter().map(|u| u.id).collect();
        let batches = chunk(misses, self.settings.batch_size);
        debug!("{}: {} unit(s) to translate in {} batch(es)", path, ids.len(), batches.len());

        let (tx, mut rx) = mpsc::unbounded_channel::<UnitOutcome>();
        let mut workers = JoinSet::new();

        for batch in batches {
            let this = self.clone();
            let tx = tx.clone();
            let path = path.to_string();
            let semaphore = Arc::clone(&self.semaphore);

            workers.spawn(async move {
                let outcomes = match semaphore.acquire_owned().await {
                    Ok(_permit) => this.translate_batch(&path, batch).await,
                    Err(_) => batch
                        .into_iter()
                        .map(|u| (u.id, Err(SyncError::Aborted("worker pool closed".to_string()))))
                        .collect(),
                };
                for outcome in outcomes {
                    // The receiver outlives every worker
                    let _ = tx.send(outcome);
                }
            });
        }
        drop(tx);

        while let Some((id, outcome)) = rx.recv().await {
            results.insert(id, outcome);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!("Translation worker failed: {}", e);
            }
        }

        for id in ids {
            results
                .entry(id)
                .or_insert_with(|| Err(SyncError::Aborted("translation worker did not report".to_string())));
        }

        results
    }

    async fn cached(&self, unit: &TranslationUnit) -> Option<TranslationResult> {
        let key = unit.cache_key.as_ref()?;
        let hit = self.cache.lookup(key).await?;
        if !unit.carries_expected_tokens(&hit.text) {
            debug!("Ignoring cached entry for {} with stale placeholders", key.path);
            return None;
        }
        Some(TranslationResult {
            text: hit.text,
            model_used: hit.model_used,
            retry_count: 0,
            from_cache: true,
        })
    }

    /// Translate one batch, splitting on malformed answers
    fn translate_batch<'a>(&'a self, path: &'a str, mut units: Vec<TranslationUnit>) -> BoxFuture<'a, Vec<UnitOutcome>> {
        async move {
            if units.is_empty() {
                return Vec::new();
            }

            match self.call_with_retry(path, &units).await {
                Ok((translations, model_used, retry_count)) => {
                    let mut outcomes = Vec::with_capacity(units.len());
                    for unit in units {
                        let Some(text) = translations.get(&unit.id).cloned() else {
                            outcomes.push((unit.id, Err(SyncError::OracleFormat(format!("missing ordinal {}", unit.id)))));
                            continue;
                        };
                        if let Some(key) = &unit.cache_key {
                            self.cache.store(key, &text, &model_used).await;
                        }
                        outcomes.push((
                            unit.id,
                            Ok(TranslationResult {
                                text,
                                model_used: model_used.clone(),
                                retry_count,
                                from_cache: false,
                            }),
                        ));
                    }
                    outcomes
                }
                Err(SyncError::OracleFormat(reason)) if units.len() > 1 => {
                    let right = units.split_off(units.len() / 2);
                    warn!(
                        "{}: malformed batch answer ({}); splitting {} unit(s) into {} + {}",
                        path,
                        reason,
                        units.len() + right.len(),
                        units.len(),
                        right.len()
                    );
                    let mut outcomes = self.translate_batch(path, units).await;
                    outcomes.extend(self.translate_batch(path, right).await);
                    outcomes
                }
                Err(SyncError::OracleFormat(reason)) => {
                    let unit = units.remove(0);
                    if unit.line_count > 1 {
                        warn!("{}: unit {} still malformed ({}); falling back to single lines", path, unit.id, reason);
                        vec![(unit.id, self.translate_by_line(path, &unit).await)]
                    } else {
                        vec![(unit.id, Err(SyncError::OracleFormat(reason)))]
                    }
                }
                Err(e) => units.into_iter().map(|u| (u.id, Err(e.clone()))).collect(),
            }
        }
        .boxed()
    }

    /// Last resort: translate each line of a unit on its own
    async fn translate_by_line(&self, path: &str, unit: &TranslationUnit) -> Result<TranslationResult, SyncError> {
        let line_units = unit.line_units();
        let mut lines: Vec<String> = vec![String::new(); unit.line_count];
        let mut model_used = String::new();
        let mut retry_count = 0;

        for (index, outcome) in self.translate_batch(path, line_units).await {
            let result = outcome?;
            if let Some(slot) = lines.get_mut(index) {
                *slot = result.text;
            }
            retry_count += result.retry_count;
            model_used = result.model_used;
        }

        let text = lines.join("\n");
        if !unit.carries_expected_tokens(&text) {
            return Err(SyncError::OracleFormat(format!(
                "line-level translation of unit {} lost placeholders",
                unit.id
            )));
        }
        if let Some(key) = &unit.cache_key {
            self.cache.store(key, &text, &model_used).await;
        }

        Ok(TranslationResult {
            text,
            model_used,
            retry_count,
            from_cache: false,
        })
    }

    fn tier_for(&self, units: &[TranslationUnit]) -> ModelTier {
        let chars: usize = units.iter().map(TranslationUnit::char_count).sum();
        let lines: usize = units.iter().map(|u| u.line_count).sum();
        if chars > self.settings.high_accuracy_char_threshold || lines > self.settings.high_accuracy_line_threshold {
            ModelTier::HighAccuracy
        } else {
            ModelTier::Fast
        }
    }

    /// One batch call with retries on transient failures
    async fn call_with_retry(&self, path: &str, units: &[TranslationUnit]) -> Result<BatchAnswer, SyncError> {
        let request = BatchRequest::new(
            units
                .iter()
                .map(|u| BatchItem {
                    ordinal: u.id,
                    context_before: u.context_before.clone(),
                    text: u.text.clone(),
                    context_after: u.context_after.clone(),
                })
                .collect(),
        );
        let payload = request.to_json().map_err(|e| SyncError::OracleFormat(e.to_string()))?;
        let completion = CompletionRequest::new(
            self.tier_for(units),
            self.prompts.system_prompt(),
            self.prompts.batch_prompt(path, &payload),
        );
        let expected: Vec<ExpectedItem> = units.iter().map(TranslationUnit::expected).collect();

        let ((translations, model_used), retries) =
            self.with_backoff(path, || self.attempt(&completion, &expected)).await?;
        Ok((translations, model_used, retries))
    }

    /// One oracle call outside the batch protocol.
    ///
    /// Takes a worker slot for the whole call and retries transient
    /// failures with backoff. Fails with `Aborted` once the run's request
    /// budget is spent.
    pub async fn complete(&self, label: &str, request: CompletionRequest) -> Result<CompletionResponse, SyncError> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| SyncError::Aborted("worker pool closed".to_string()))?;
        let (response, _) = self.with_backoff(label, || self.send(&request)).await?;
        Ok(response)
    }

    /// Run `attempt` until it succeeds, fails fatally or retries run out
    async fn with_backoff<T, F, Fut>(&self, label: &str, mut attempt: F) -> Result<(T, u32), SyncError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AttemptOutcome<T>>,
    {
        let mut retries = 0;
        loop {
            match attempt().await {
                AttemptOutcome::Success(value) => return Ok((value, retries)),
                AttemptOutcome::Retryable(e) if self.settings.backoff.should_retry(retries) => {
                    retries += 1;
                    let delay = self.settings.backoff.random_delay(retries);
                    warn!(
                        "{}: oracle call failed ({}); retry {}/{} in {} ms",
                        label,
                        e,
                        retries,
                        self.settings.backoff.max_retries,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                AttemptOutcome::Retryable(e) | AttemptOutcome::Fatal(e) => return Err(e),
            }
        }
    }

    /// Claim one request from the run budget
    fn claim_request(&self) -> bool {
        if self.is_aborted() {
            return false;
        }
        let claimed = match self.settings.max_requests {
            Some(max) => self
                .requests_made
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < max).then_some(n + 1))
                .is_ok(),
            None => {
                self.requests_made.fetch_add(1, Ordering::SeqCst);
                true
            }
        };
        if !claimed && !self.aborted.swap(true, Ordering::SeqCst) {
            warn!("Oracle request limit reached; remaining batches are abandoned");
        }
        claimed
    }

    async fn attempt(
        &self,
        request: &CompletionRequest,
        expected: &[ExpectedItem],
    ) -> AttemptOutcome<(BTreeMap<usize, String>, String)> {
        let response = match self.send(request).await {
            AttemptOutcome::Success(response) => response,
            AttemptOutcome::Retryable(e) => return AttemptOutcome::Retryable(e),
            AttemptOutcome::Fatal(e) => return AttemptOutcome::Fatal(e),
        };

        match parse_batch_response(&response.text).and_then(|items| self.validator.validate(expected, items)) {
            Ok(translations) => AttemptOutcome::Success((translations, response.model_used)),
            Err(e) => AttemptOutcome::Fatal(e),
        }
    }

    /// Budget, rate limit and timeout around a single provider call
    async fn send(&self, request: &CompletionRequest) -> AttemptOutcome<CompletionResponse> {
        if !self.claim_request() {
            return AttemptOutcome::Fatal(SyncError::Aborted("oracle request limit reached".to_string()));
        }

        self.limiter.acquire().await;

        let timeout = self.settings.request_timeout;
        match tokio::time::timeout(timeout, self.provider.complete(request.clone())).await {
            Ok(Ok(response)) => AttemptOutcome::Success(response),
            Ok(Err(e)) => AttemptOutcome::from_provider_error(e),
            Err(_) => AttemptOutcome::from_provider_error(ProviderError::Timeout(timeout.as_millis() as u64)),
        }
    }
}

fn chunk(units: Vec<TranslationUnit>, size: usize) -> Vec<Vec<TranslationUnit>> {
    let size = size.max(1);
    let mut batches = Vec::new();
    let mut current = Vec::with_capacity(size);
    for unit in units {
        current.push(unit);
        if current.len() == size {
            batches.push(std::mem::replace(&mut current, Vec::with_capacity(size)));
        }
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
