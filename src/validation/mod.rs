/*!
 * Validation of oracle answers and translated documents.
 *
 * - `ordinals`: checks a batch answer against the request (ordinals, placeholders)
 * - `alignment`: structural comparison of a whole source/target document pair
 */

pub mod alignment;
pub mod ordinals;

// Re-export main types
pub use alignment::{AlignmentVerifier, Violation};
pub use ordinals::{ExpectedItem, OrdinalValidator};
