//! Overlapping fixed-size text chunker.
//!
//! Splits extracted document text into [`ChunkFragment`]s of at most
//! `max_chars` bytes, with `overlap` bytes carried between consecutive
//! fragments so context survives chunk boundaries. Split points prefer
//! whitespace so words are not cut mid-token; the final fragment may be
//! shorter than `max_chars`.
//!
//! Fragments carry byte offsets into the source text. Pure function, no
//! side effects.

use crate::models::ChunkFragment;

/// Minimum share of `max_chars` a whitespace-aligned split must retain
/// before falling back to a hard split.
const MIN_SPLIT_RATIO: usize = 2;

/// Split `text` into overlapping fragments.
///
/// Requires `max_chars > 0` and `overlap < max_chars` (enforced at config
/// load). Empty or whitespace-only input yields no fragments.
pub fn split_text(text: &str, max_chars: usize, overlap: usize) -> Vec<ChunkFragment> {
    debug_assert!(max_chars > 0);
    debug_assert!(overlap < max_chars);

    let lead = text.len() - text.trim_start().len();
    let body = text.trim();
    if body.is_empty() {
        return Vec::new();
    }

    let mut fragments = Vec::new();
    let mut start = 0usize;

    while start < body.len() {
        let hard_end = floor_char_boundary(body, (start + max_chars).min(body.len()));
        let mut end = hard_end;

        // Prefer a whitespace boundary, but never shrink the window below
        // half of max_chars — pathological inputs would stall otherwise.
        if end < body.len() {
            if let Some(pos) = body[start..end].rfind(char::is_whitespace) {
                if pos >= max_chars / MIN_SPLIT_RATIO {
                    end = start + pos;
                }
            }
        }

        let raw = &body[start..end];
        let frag_lead = raw.len() - raw.trim_start().len();
        let frag = raw.trim();
        if !frag.is_empty() {
            let abs_start = lead + start + frag_lead;
            fragments.push(ChunkFragment {
                text: frag.to_string(),
                start: abs_start,
                end: abs_start + frag.len(),
            });
        }

        if end >= body.len() {
            break;
        }

        // Advance past the window, stepping back by the overlap. Always make
        // forward progress even when overlap eats the whole step.
        let next = end.saturating_sub(overlap).max(start + 1);
        start = ceil_char_boundary(body, next);
    }

    fragments
}

fn floor_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx > 0 && !s.is_char_boundary(idx) {
        idx -= 1;
    }
    idx
}

fn ceil_char_boundary(s: &str, mut idx: usize) -> usize {
    while idx < s.len() && !s.is_char_boundary(idx) {
        idx += 1;
    }
    idx
}
