/*!
 * Reflow of translated text into a fixed number of lines.
 *
 * Translated text rarely keeps the source's line breaks. The engine
 * redistributes it over exactly the required number of lines, breaking only
 * at whitespace or between CJK characters, and steering each break towards
 * the proportional position of the corresponding source line.
 */

use crate::errors::ReflowError;

/// Target shape of a reflowed block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineShape {
    /// Relative width of every line; zero marks a blank position
    widths: Vec<usize>,
}

impl LineShape {
    /// Shape with `count` equally weighted, non-blank lines
    pub fn uniform(count: usize) -> Self {
        Self {
            widths: vec![1; count],
        }
    }

    /// Shape following the source widths; zero widths stay blank
    pub fn from_widths(widths: Vec<usize>) -> Self {
        Self { widths }
    }

    pub fn len(&self) -> usize {
        self.widths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widths.is_empty()
    }

    fn content_slots(&self) -> Vec<usize> {
        self.widths
            .iter()
            .enumerate()
            .filter(|(_, w)| **w > 0)
            .map(|(i, _)| i)
            .collect()
    }
}

/// A piece of text that is never split across lines
#[derive(Debug, Clone, PartialEq, Eq)]
struct Atom {
    text: String,
    space_before: bool,
}

impl Atom {
    fn width(&self) -> usize {
        self.text.chars().count() + usize::from(self.space_before)
    }
}

/// Whether a character belongs to a script written without spaces
pub fn is_cjk(ch: char) -> bool {
    matches!(ch as u32,
        0x3000..=0x303F   // CJK symbols and punctuation
        | 0x3040..=0x30FF // hiragana, katakana
        | 0x3400..=0x4DBF // CJK extension A
        | 0x4E00..=0x9FFF // CJK unified ideographs
        | 0xAC00..=0xD7AF // hangul syllables
        | 0xF900..=0xFAFF // CJK compatibility ideographs
        | 0xFF00..=0xFFEF // halfwidth and fullwidth forms
    )
}

/// Punctuation that must stay on the same line as the preceding text
fn binds_to_previous(ch: char) -> bool {
    matches!(
        ch,
        '、' | '。' | '，' | '．' | '！' | '？' | '：' | '；' | '」' | '』' | '）' | '】' | '〉' | '》' | '…'
            | 'ー' | 'ゃ' | 'ゅ' | 'ょ' | 'っ' | 'ャ' | 'ュ' | 'ョ' | 'ッ'
            | '.' | ',' | ';' | ':' | '!' | '?' | ')' | ']' | '}' | '%'
    )
}

/// Split text into unbreakable atoms
fn atomize(text: &str) -> Vec<Atom> {
    let mut atoms: Vec<Atom> = Vec::new();
    let mut current = String::new();
    let mut current_is_cjk = false;
    let mut current_space = false;
    let mut pending_space = false;

    let flush = |atoms: &mut Vec<Atom>, current: &mut String, space: bool| {
        if !current.is_empty() {
            atoms.push(Atom {
                text: std::mem::take(current),
                space_before: space,
            });
        }
    };

    for ch in text.chars() {
        if ch.is_whitespace() {
            flush(&mut atoms, &mut current, current_space);
            current_is_cjk = false;
            pending_space = true;
            continue;
        }

        if binds_to_previous(ch) && !pending_space {
            if !current.is_empty() {
                current.push(ch);
                continue;
            }
            if let Some(last) = atoms.last_mut() {
                last.text.push(ch);
                continue;
            }
        }

        let cjk = is_cjk(ch);
        if cjk || current_is_cjk {
            flush(&mut atoms, &mut current, current_space);
        }
        if current.is_empty() {
            current_space = pending_space && !atoms.is_empty();
            pending_space = false;
        }
        current.push(ch);
        current_is_cjk = cjk;
    }
    flush(&mut atoms, &mut current, current_space);
    atoms
}

fn join_atoms(atoms: &[Atom]) -> String {
    let mut line = String::new();
    for (i, atom) in atoms.iter().enumerate() {
        if i > 0 && atom.space_before {
            line.push(' ');
        }
        line.push_str(&atom.text);
    }
    line
}

/// Redistributes text over a fixed line count
#[derive(Debug, Default, Clone, Copy)]
pub struct ReflowEngine;

impl ReflowEngine {
    pub fn new() -> Self {
        Self
    }

    /// Reflow `text` into exactly `shape.len()` lines.
    ///
    /// Blank positions of the shape come back as empty strings and every
    /// other position is non-empty. Fails when there is not enough content
    /// to give each non-blank line at least one piece.
    pub fn reflow(&self, text: &str, shape: &LineShape) -> Result<Vec<String>, ReflowError> {
        let slots = shape.content_slots();
        let has_content = !text.trim().is_empty();

        if slots.is_empty() {
            if has_content {
                return Err(ReflowError::ContentWithoutLines);
            }
            return Ok(vec![String::new(); shape.len()]);
        }

        // keep the translator's own line breaks when they already fit
        let given: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if given.len() == slots.len() {
            return Ok(Self::place(shape, &slots, given.into_iter().map(str::to_string).collect()));
        }

        let atoms = atomize(text);
        if atoms.len() < slots.len() {
            return Err(ReflowError::InsufficientContent {
                pieces: atoms.len(),
                required: slots.len(),
            });
        }

        let breaks = Self::choose_breaks(&atoms, &slots.iter().map(|&i| shape.widths[i]).collect::<Vec<_>>());
        let mut lines = Vec::with_capacity(slots.len());
        let mut start = 0;
        for end in breaks.into_iter().chain(std::iter::once(atoms.len())) {
            lines.push(join_atoms(&atoms[start..end]));
            start = end;
        }
        Ok(Self::place(shape, &slots, lines))
    }

    /// Pick `weights.len() - 1` break indices into `atoms`.
    ///
    /// Each break lands as close as possible to the cumulative proportional
    /// target while leaving at least one atom for every remaining line.
    fn choose_breaks(atoms: &[Atom], weights: &[usize]) -> Vec<usize> {
        let lines = weights.len();
        let mut prefix_widths = Vec::with_capacity(atoms.len() + 1);
        prefix_widths.push(0usize);
        for atom in atoms {
            let last = prefix_widths.last().copied().unwrap_or(0);
            prefix_widths.push(last + atom.width());
        }
        let total_width = prefix_widths.last().copied().unwrap_or(0) as f64;
        let total_weight: usize = weights.iter().sum();

        let mut breaks = Vec::with_capacity(lines.saturating_sub(1));
        let mut cumulative_weight = 0usize;
        let mut previous = 0usize;
        for (line, weight) in weights.iter().enumerate().take(lines - 1) {
            cumulative_weight += weight;
            let target = total_width * cumulative_weight as f64 / total_weight.max(1) as f64;
            let lowest = previous + 1;
            let highest = atoms.len() - (lines - line - 1);
            let mut best = lowest;
            let mut best_distance = f64::MAX;
            for candidate in lowest..=highest {
                let distance = (prefix_widths[candidate] as f64 - target).abs();
                if distance < best_distance {
                    best = candidate;
                    best_distance = distance;
                }
            }
            breaks.push(best);
            previous = best;
        }
        breaks
    }

    fn place(shape: &LineShape, slots: &[usize], content: Vec<String>) -> Vec<String> {
        let mut output = vec![String::new(); shape.len()];
        for (slot, line) in slots.iter().zip(content) {
            output[*slot] = line;
        }
        output
    }
}
