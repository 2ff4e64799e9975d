//! Sliding-window chunking for document ingestion.
//!
//! Documents longer than the configured window are split into overlapping
//! character windows that can each be embedded separately. Chunking is
//! deterministic: the same text and config always produce the same windows,
//! which keeps chunk ids stable across rebuilds.

/// Default window size in characters.
pub const DEFAULT_WINDOW: usize = 1000;

/// Default overlap between adjacent windows in characters.
pub const DEFAULT_OVERLAP: usize = 100;

/// Window-boundary search never looks further back than this many chars.
const MAX_BOUNDARY_BACKTRACK: usize = 100;

/// Chunking configuration.
///
/// # Examples
///
/// ```
/// use switchboard::docstore::chunker::ChunkerConfig;
///
/// let config = ChunkerConfig::default();
/// assert_eq!(config.window, 1000);
/// assert_eq!(config.overlap, 100);
///
/// // Degenerate values are clamped rather than rejected
/// let clamped = ChunkerConfig::new(0, 500);
/// assert_eq!(clamped.window, 1);
/// assert_eq!(clamped.overlap, 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkerConfig {
    /// Maximum window size in characters.
    pub window: usize,
    /// Overlap between adjacent windows in characters.
    pub overlap: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            window: DEFAULT_WINDOW,
            overlap: DEFAULT_OVERLAP,
        }
    }
}

impl ChunkerConfig {
    /// Build a config, clamping degenerate values: the window is at least 1
    /// and the overlap strictly smaller than the window.
    #[must_use]
    pub fn new(window: usize, overlap: usize) -> Self {
        let window = window.max(1);
        Self {
            window,
            overlap: overlap.min(window - 1),
        }
    }
}

/// A window of text cut from a larger document.
///
/// Produced by [`chunk_text`]. Each window carries its zero-based index and
/// the byte offset where it starts in the original text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkWindow {
    /// The window's text content.
    pub text: String,
    /// Zero-based window index within the document.
    pub index: usize,
    /// Byte offset where this window starts in the original document.
    pub start_offset: usize,
}

/// Stable chunk identifier: `<source_id>#<index>`.
///
/// Re-chunking an unchanged source reproduces the same ids, so rebuilds are
/// idempotent.
///
/// # Examples
///
/// ```
/// use switchboard::docstore::chunker::chunk_id;
///
/// assert_eq!(chunk_id("gb300-datasheet", 3), "gb300-datasheet#3");
/// ```
#[must_use]
pub fn chunk_id(source_id: &str, index: usize) -> String {
    format!("{source_id}#{index}")
}

/// Split text into overlapping windows.
///
/// Uses character-based splitting. Windows prefer to end at a whitespace
/// boundary, but never back up further than the overlap, so consecutive
/// windows always cover the full text with no gaps. A small tail (under a
/// quarter window) is absorbed into the final window instead of being
/// emitted as a sliver.
///
/// Whitespace-only text produces no windows; text shorter than the window
/// produces exactly one.
///
/// # Examples
///
/// ```
/// use switchboard::docstore::chunker::{chunk_text, ChunkerConfig};
///
/// let chunks = chunk_text("Short note.", ChunkerConfig::default());
/// assert_eq!(chunks.len(), 1);
/// assert_eq!(chunks[0].text, "Short note.");
///
/// let long = "word ".repeat(500);
/// let chunks = chunk_text(&long, ChunkerConfig::new(1000, 100));
/// assert!(chunks.len() >= 2);
/// ```
#[must_use]
pub fn chunk_text(text: &str, config: ChunkerConfig) -> Vec<ChunkWindow> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let char_count = text.chars().count();
    if char_count <= config.window {
        return vec![ChunkWindow {
            text: text.to_string(),
            index: 0,
            start_offset: 0,
        }];
    }

    // Map of char index -> byte index for O(1) boundary lookups
    let char_to_byte: Vec<usize> = text
        .char_indices()
        .map(|(byte_idx, _)| byte_idx)
        .chain(std::iter::once(text.len()))
        .collect();

    let step = config.window.saturating_sub(config.overlap).max(1);
    let max_backtrack = config.overlap.min(MAX_BOUNDARY_BACKTRACK);
    let mut chunks = Vec::new();
    let mut start_char = 0;
    let mut index = 0;

    while start_char < char_count {
        let mut end_char = (start_char + config.window).min(char_count);

        // Absorb a small tail into this window instead of emitting a sliver
        if char_count - end_char < config.window / 4 {
            end_char = char_count;
        }

        let boundary_end = if end_char < char_count {
            find_word_boundary_char(text, &char_to_byte, end_char, max_backtrack)
        } else {
            end_char
        };

        let start_byte = char_to_byte[start_char];
        let end_byte = char_to_byte[boundary_end];

        let window_text = &text[start_byte..end_byte];
        if !window_text.trim().is_empty() {
            chunks.push(ChunkWindow {
                text: window_text.to_string(),
                index,
                start_offset: start_byte,
            });
            index += 1;
        }

        if end_char == char_count {
            break;
        }
        start_char += step;
    }

    chunks
}

/// Find a whitespace boundary at or before `pos_char`, looking back at most
/// `max_backtrack` chars. Backing up no further than the overlap keeps the
/// next window's coverage contiguous.
fn find_word_boundary_char(
    text: &str,
    char_to_byte: &[usize],
    pos_char: usize,
    max_backtrack: usize,
) -> usize {
    if max_backtrack == 0 {
        return pos_char;
    }

    let search_start_char = pos_char.saturating_sub(max_backtrack);
    let start_byte = char_to_byte[search_start_char];
    let end_byte = char_to_byte[pos_char];
    let search_region = &text[start_byte..end_byte];

    if let Some(ws_byte_offset) = search_region.rfind(|c: char| c.is_whitespace()) {
        let ws_byte = start_byte + ws_byte_offset;
        // Break just after the whitespace char
        for (char_idx, &byte_idx) in char_to_byte.iter().enumerate().skip(search_start_char) {
            if byte_idx > ws_byte {
                return char_idx;
            }
        }
    }

    pos_char
}
