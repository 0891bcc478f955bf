/*!
 * # linesync - line-locked translation sync for documentation
 *
 * Keeps a translated documentation tree aligned line for line with its
 * upstream source. When the source changes, only the lines whose meaning
 * changed are sent to a translation oracle; everything else keeps its
 * existing translation.
 *
 * ## Features
 *
 * - Line diff of the previous and current source with per-operation policy
 * - Cosmetic edits keep existing translations
 * - Markup, links and inline code are masked with placeholder tokens
 * - Translations are reflowed back into the original line count
 * - Batched, rate-limited, retried oracle requests:
 *   - Ollama (local LLM)
 *   - Anthropic API
 * - Durable SQLite translation cache
 * - Structural verification before any file is written
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `diff`: Line diff engine
 * - `policy`: Change policy and the semantic change judge
 * - `document`: Segmentation, line framing, placeholders and reflow
 * - `translation`: Oracle orchestration:
 *   - `translation::orchestrator`: Batching, splitting and concurrency
 *   - `translation::batch`: Ordinal-tagged batch protocol
 *   - `translation::cache`: Translation cache
 *   - `translation::rate_limit` and `translation::retry`: Request pacing
 * - `validation`: Oracle answer checks and document alignment checks
 * - `sync`: Per-file pipeline and reports
 * - `database`: SQLite storage for the cache
 * - `providers`: Client implementations for LLM providers
 * - `file_utils`: File system operations
 * - `app_controller`: Main application controller
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 *
 * ## License
 *
 * This project is licensed under the MIT License
 */

// Global lints configuration
// These lints will be allowed but not auto-fixed
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod app_controller;
pub mod database;
pub mod diff;
pub mod document;
pub mod errors;
pub mod file_utils;
pub mod language_utils;
pub mod policy;
pub mod providers;
pub mod sync;
pub mod translation;
pub mod validation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use app_controller::{Controller, SyncOptions, SyncPaths};
pub use diff::{LineDiffEngine, LineOperation, OpKind};
pub use errors::{AppError, ProviderError, SyncError};
pub use language_utils::{get_language_name, language_codes_match, normalize_to_part2t};
pub use sync::{FileSyncOutcome, FileSyncRequest, RunReport, SyncContext, SyncPipeline};
pub use validation::{AlignmentVerifier, Violation};
