//! Boundary-aware overlapping text chunker.
//!
//! Windows are measured in characters. A window that does not reach the end
//! of the text is cut after its last `.` or newline when that break lies past
//! the window midpoint; the following window starts `overlap` characters
//! before the cut.

use std::ops::Range;

use crate::error::{Error, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_OVERLAP: usize = 100;

pub fn validate_params(chunk_size: usize, overlap: usize) -> Result<()> {
    if chunk_size == 0 || overlap >= chunk_size {
        return Err(Error::InvalidChunking { chunk_size, overlap });
    }
    Ok(())
}

/// Byte ranges of each chunk of `text`, in source order.
pub fn chunk_spans(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<Range<usize>>> {
    validate_params(chunk_size, overlap)?;

    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let chars: Vec<char> = text.chars().collect();
    let len = chars.len();

    let mut spans = Vec::new();
    let mut start = 0usize;
    while start < len {
        let mut end = (start + chunk_size).min(len);
        if end < len {
            let window = &chars[start..end];
            let last_period = window.iter().rposition(|&c| c == '.');
            let last_newline = window.iter().rposition(|&c| c == '\n');
            if let Some(break_point) = last_period.max(last_newline) {
                if break_point > chunk_size / 2 {
                    end = start + break_point + 1;
                }
            }
        }
        spans.push(bounds[start]..bounds[end]);
        if end >= len {
            break;
        }
        // never move backwards, even when a short cut meets a large overlap
        start = end.saturating_sub(overlap).max(start + 1);
    }
    Ok(spans)
}

pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Result<Vec<String>> {
    Ok(chunk_spans(text, chunk_size, overlap)?
        .into_iter()
        .map(|span| text[span].to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prose(sentences: usize) -> String {
        (0..sentences)
            .map(|i| format!("Sentence number {i} talks about the continuity notes in some detail."))
            .collect::<Vec<_>>()
            .join(if sentences % 2 == 0 { " " } else { "\n" })
    }

    fn reconstruct(text: &str, spans: &[Range<usize>]) -> String {
        let mut out = String::new();
        let mut covered = 0;
        for span in spans {
            assert!(span.start <= covered, "gap before chunk at byte {}", span.start);
            out.push_str(&text[covered..span.end]);
            covered = span.end;
        }
        out
    }

    #[test]
    fn short_text_is_a_single_chunk() {
        let text = "One short note. Another short note.";
        let chunks = chunk_text(text, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP).unwrap();
        assert_eq!(chunks, vec![text.to_string()]);
    }

    #[test]
    fn empty_text_yields_nothing() {
        assert!(chunk_text("", 500, 100).unwrap().is_empty());
    }

    #[test]
    fn chunks_reconstruct_the_source() {
        for text in [prose(40), prose(41), "x".repeat(1_337), format!("{}.{}", "a".repeat(700), "b".repeat(900))] {
            let spans = chunk_spans(&text, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP).unwrap();
            assert_eq!(reconstruct(&text, &spans), text);
        }
    }

    #[test]
    fn consecutive_chunks_overlap_at_most_the_configured_amount() {
        let text = prose(60);
        let spans = chunk_spans(&text, DEFAULT_CHUNK_SIZE, DEFAULT_OVERLAP).unwrap();
        assert!(spans.len() > 2);
        for pair in spans.windows(2) {
            assert!(pair[1].start <= pair[0].end);
            let shared = text[pair[1].start..pair[0].end].chars().count();
            assert!(shared <= DEFAULT_OVERLAP, "overlap {shared} exceeds limit");
            assert!(pair[1].start > pair[0].start);
        }
    }

    #[test]
    fn cuts_after_sentence_terminator_past_midpoint() {
        let text = format!("{}.{}", "a".repeat(300), "b".repeat(400));
        let chunks = chunk_text(&text, 500, 100).unwrap();
        assert_eq!(chunks[0], format!("{}.", "a".repeat(300)));
        // next window starts 100 characters before the cut
        assert!(chunks[1].starts_with(&"a".repeat(99)));
    }

    #[test]
    fn ignores_terminator_before_midpoint() {
        let text = format!("{}.{}", "a".repeat(100), "b".repeat(600));
        let chunks = chunk_text(&text, 500, 100).unwrap();
        assert_eq!(chunks[0].chars().count(), 500);
    }

    #[test]
    fn terminates_within_expected_iterations() {
        for len in [1usize, 399, 400, 500, 501, 901, 4_000, 12_345] {
            let text = "z".repeat(len);
            let spans = chunk_spans(&text, 500, 100).unwrap();
            let bound = len.div_ceil(400);
            assert!(spans.len() <= bound, "len {len}: {} chunks > {bound}", spans.len());
        }
    }

    #[test]
    fn handles_multibyte_characters() {
        let text = "é".repeat(1_200);
        let chunks = chunk_text(&text, 500, 100).unwrap();
        assert_eq!(chunks[0].chars().count(), 500);
        assert_eq!(chunks.concat().chars().count(), 1_200 + 100 * (chunks.len() - 1));
    }

    #[test]
    fn rejects_overlap_not_smaller_than_window() {
        assert!(matches!(
            chunk_text("anything", 100, 100),
            Err(Error::InvalidChunking { chunk_size: 100, overlap: 100 })
        ));
        assert!(chunk_text("anything", 0, 0).is_err());
    }
}
