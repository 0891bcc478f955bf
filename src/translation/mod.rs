/*!
 * Translation of protected text through the oracle.
 *
 * - `orchestrator`: cache-then-oracle batching, concurrency and fallbacks
 * - `batch`: the ordinal-tagged request/response protocol
 * - `cache`: memory + SQLite translation cache
 * - `rate_limit`: shared requests-per-minute limiter
 * - `retry`: attempt classification and backoff schedule
 * - `prompts`: system prompt, style guides and prompt rendering
 */

pub mod batch;
pub mod cache;
pub mod orchestrator;
pub mod prompts;
pub mod rate_limit;
pub mod retry;

// Re-export main types
pub use cache::{CacheKey, TranslationCache};
pub use orchestrator::{OrchestratorSettings, TranslationOrchestrator, TranslationResult, TranslationUnit};
pub use prompts::{PromptBuilder, PromptTemplate, StyleGuides};
pub use rate_limit::RateLimiter;
pub use retry::BackoffPolicy;
