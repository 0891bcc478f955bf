/*!
 * Document structure handling.
 *
 * - `segmenter`: splits a document into structural blocks
 * - `framing`: separates markdown line syntax from translatable prose
 * - `placeholder`: masks spans that must survive translation byte-for-byte
 * - `reflow`: fits translated text back into a fixed line count
 */

pub mod framing;
pub mod placeholder;
pub mod reflow;
pub mod segmenter;

pub use framing::{FramedText, LineFrame};
pub use placeholder::{PlaceholderProtector, Protected, TokenMap};
pub use reflow::{LineShape, ReflowEngine};
pub use segmenter::{Block, BlockKind, Segmenter};
