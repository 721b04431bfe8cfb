//! Line-bounded content chunking.
//!
//! Files are split on `\n` and accumulated into chunks under a character
//! budget, with a configurable line overlap carried between consecutive
//! chunks so context survives the cut.

use crate::config::ChunkingConfig;

/// A contiguous line range of one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkSpan {
    /// Starting line (1-based).
    pub start_line: usize,
    /// Ending line (1-based, inclusive).
    pub end_line: usize,
    /// The source lines `[start_line, end_line]` joined by `\n`.
    pub text: String,
}

/// Content chunker.
pub struct Chunker {
    config: ChunkingConfig,
}

impl Chunker {
    /// Create a new chunker with config.
    #[must_use]
    pub const fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Split `content` into line-bounded spans.
    ///
    /// Each line costs its length plus one (the newline). A chunk is
    /// finalized when the next line would push it past `max_chars`, provided
    /// it already holds at least `min_chars`; the last `overlap_lines` lines
    /// seed the next chunk. Content that never reaches `min_chars` yields no
    /// spans at all.
    #[must_use]
    pub fn split(&self, content: &str) -> Vec<ChunkSpan> {
        let ChunkingConfig {
            max_chars,
            min_chars,
            overlap_lines,
        } = self.config;

        let lines: Vec<&str> = content.split('\n').collect();
        let total_lines = lines.len();

        let mut spans = Vec::new();
        let mut cur: Vec<&str> = Vec::new();
        let mut cur_chars = 0usize;
        let mut start_line = 1usize;

        for (i, line) in lines.iter().enumerate() {
            let cost = line.len() + 1;

            if cur_chars + cost > max_chars && !cur.is_empty() && cur_chars >= min_chars {
                spans.push(ChunkSpan {
                    start_line,
                    end_line: i,
                    text: cur.join("\n"),
                });

                let keep = overlap_lines.min(cur.len());
                cur = cur[cur.len() - keep..].to_vec();
                cur_chars = cur.iter().map(|l| l.len() + 1).sum();
                start_line = if keep == 0 { i + 1 } else { i - (keep - 1) };
            }

            cur.push(line);
            cur_chars += cost;
        }

        if !cur.is_empty() && cur_chars >= min_chars {
            spans.push(ChunkSpan {
                start_line,
                end_line: total_lines,
                text: cur.join("\n"),
            });
        }

        spans
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunker(max_chars: usize, min_chars: usize, overlap_lines: usize) -> Chunker {
        Chunker::new(ChunkingConfig {
            max_chars,
            min_chars,
            overlap_lines,
        })
    }

    fn numbered_lines(n: usize, width: usize) -> String {
        (1..=n)
            .map(|i| format!("{i:0w$}", w = width.saturating_sub(1)))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_empty_content_yields_nothing() {
        assert!(chunker(1000, 200, 5).split("").is_empty());
    }

    #[test]
    fn test_below_min_chars_yields_nothing() {
        let spans = chunker(1000, 200, 5).split("short file\nwith two lines");
        assert!(spans.is_empty());
    }

    #[test]
    fn test_single_chunk_file() {
        let content = numbered_lines(30, 10);
        let spans = chunker(1000, 200, 5).split(&content);

        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].start_line, 1);
        assert_eq!(spans[0].end_line, 30);
        assert_eq!(spans[0].text, content);
    }

    #[test]
    fn test_chunk_text_matches_line_range() {
        let content = numbered_lines(200, 10);
        let lines: Vec<&str> = content.split('\n').collect();
        let spans = chunker(300, 100, 3).split(&content);

        assert!(spans.len() > 1);
        for span in &spans {
            assert!(span.start_line >= 1);
            assert!(span.start_line <= span.end_line);
            assert_eq!(
                span.text,
                lines[span.start_line - 1..span.end_line].join("\n")
            );
        }
    }

    #[test]
    fn test_overlap_between_consecutive_chunks() {
        let overlap = 3;
        let content = numbered_lines(200, 10);
        let spans = chunker(300, 100, overlap).split(&content);

        assert!(spans.len() > 1);
        for pair in spans.windows(2) {
            let prev: Vec<&str> = pair[0].text.split('\n').collect();
            let next: Vec<&str> = pair[1].text.split('\n').collect();
            let keep = overlap.min(prev.len());
            assert_eq!(&prev[prev.len() - keep..], &next[..keep]);
            assert_eq!(pair[1].start_line, pair[0].end_line - keep + 1);
        }
    }

    #[test]
    fn test_chunk_size_bounded_by_one_line_overflow() {
        let content = numbered_lines(500, 10);
        let max_line = content.split('\n').map(str::len).max().unwrap();
        let spans = chunker(300, 100, 2).split(&content);

        for span in &spans {
            assert!(span.text.len() <= 300 + max_line);
        }
    }

    #[test]
    fn test_oversized_single_line_still_emitted() {
        let huge = "x".repeat(5000);
        let content = format!("{huge}\ntail");
        let spans = chunker(1000, 200, 0).split(&content);

        assert!(!spans.is_empty());
        assert_eq!(spans[0].start_line, 1);
        assert_eq!(spans[0].end_line, 1);
        assert_eq!(spans[0].text, huge);
    }

    #[test]
    fn test_zero_overlap_chunks_are_disjoint() {
        let content = numbered_lines(200, 10);
        let spans = chunker(300, 100, 0).split(&content);

        assert!(spans.len() > 1);
        for pair in spans.windows(2) {
            assert_eq!(pair[1].start_line, pair[0].end_line + 1);
        }
    }

    #[test]
    fn test_small_tail_is_dropped() {
        // 65 lines of 9+1 chars: two full 30-line chunks, then a 5-line tail
        // below min_chars that must not be emitted.
        let content = numbered_lines(65, 10);
        let spans = chunker(300, 100, 0).split(&content);

        assert_eq!(spans.len(), 2);
        assert_eq!(spans.last().unwrap().end_line, 60);
        for span in &spans {
            // +1 per line counted during accumulation keeps every emitted
            // span at or above the minimum.
            assert!(span.text.len() + 1 >= 100);
        }
    }
}
