//! Bounded, single-line response body previews.
//!
//! Positions and lengths are counted in characters, not bytes, so a window
//! never splits a UTF-8 sequence.

use serde::{Deserialize, Serialize};

/// Preview length used by `fuzz` when none is configured.
pub const DEFAULT_PREVIEW_LENGTH: usize = 1000;

/// Maximum distance travelled from a cut point looking for `<` or `>`.
pub const HTML_BOUNDARY_SEARCH: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewConfig {
    /// Characters to keep. `0` keeps the whole body.
    pub length: usize,
    /// Characters skipped before the window when no needle applies.
    pub offset: usize,
    /// Center the window on the first occurrence of this string.
    pub find: Option<String>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            length: DEFAULT_PREVIEW_LENGTH,
            offset: 0,
            find: None,
        }
    }
}

impl PreviewConfig {
    /// Keep the whole body.
    pub fn full_body() -> Self {
        Self {
            length: 0,
            ..Self::default()
        }
    }
}

/// Which edge of the window is being cut.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Window start: move back to just after a `>`.
    Start,
    /// Window end: move back onto a `<`, never below the floor.
    End,
}

/// Snap `pos` back to the nearest element boundary within `search_range`.
///
/// Positions are in chars. Only chars `max(floor, pos - search_range) .. pos`
/// are inspected. Returns `pos`, clipped to the body, when no boundary is in
/// range.
pub fn snap_to_html_boundary(
    body: &str,
    pos: usize,
    search_range: usize,
    edge: Edge,
    floor: usize,
) -> usize {
    let pos = pos.min(body.chars().count());
    let lo = floor.max(pos.saturating_sub(search_range));
    if lo >= pos {
        return pos;
    }
    let target = match edge {
        Edge::Start => '>',
        Edge::End => '<',
    };
    let window: Vec<char> = body.chars().skip(lo).take(pos - lo).collect();
    match window.iter().rposition(|&c| c == target) {
        Some(i) => match edge {
            Edge::Start => lo + i + 1,
            Edge::End => lo + i,
        },
        None => pos,
    }
}

/// Render `body` as a bounded single-line preview.
///
/// Precedence: `length == 0` keeps the whole body; a needle that occurs in the
/// body centers the window on it and snaps both edges to element boundaries;
/// otherwise the window is `[offset, offset + length)`. Out-of-range windows
/// are clipped, never an error.
pub fn extract_preview(body: &str, cfg: &PreviewConfig) -> String {
    if cfg.length == 0 {
        return single_line(body.chars());
    }
    let (start, end) = preview_window(body, cfg);
    single_line(body.chars().skip(start).take(end.saturating_sub(start)))
}

fn preview_window(body: &str, cfg: &PreviewConfig) -> (usize, usize) {
    let needle = cfg.find.as_deref().filter(|s| !s.is_empty());
    if let Some((needle_start, needle_len)) = needle.and_then(|s| locate(body, s)) {
        let n = body.chars().count();
        let needle_end = needle_start + needle_len;
        let mid = needle_start + needle_len / 2;
        let start = mid.saturating_sub(cfg.length / 2).min(needle_start);
        let end = (start + cfg.length).min(n).max(needle_end);
        let start = snap_to_html_boundary(body, start, HTML_BOUNDARY_SEARCH, Edge::Start, 0);
        let end = snap_to_html_boundary(
            body,
            end,
            HTML_BOUNDARY_SEARCH,
            Edge::End,
            start.max(needle_end),
        );
        return (start, end);
    }
    // take() clips both ends, so the offset window never counts the body
    (cfg.offset, cfg.offset.saturating_add(cfg.length))
}

/// Character position and character length of the first occurrence of `needle`.
fn locate(body: &str, needle: &str) -> Option<(usize, usize)> {
    let byte_pos = body.find(needle)?;
    Some((body[..byte_pos].chars().count(), needle.chars().count()))
}

fn single_line(chars: impl Iterator<Item = char>) -> String {
    chars
        .filter(|&c| c != '\r')
        .map(|c| if c == '\n' { ' ' } else { c })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HTML: &str = concat!(
        "<html><head><title>Test</title></head>",
        "<body>",
        "<nav>Navigation</nav>",
        "<main>",
        "<div class=\"error\">Query error: SQLSTATE[HY000]</div>",
        "<p>Some other content here</p>",
        "</main>",
        "</body></html>"
    );

    fn cfg(length: usize, offset: usize, find: Option<&str>) -> PreviewConfig {
        PreviewConfig {
            length,
            offset,
            find: find.map(str::to_string),
        }
    }

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn test_snap_start_lands_after_close_bracket() {
        let body = "<div><span>hello</span></div>";
        let pos = snap_to_html_boundary(body, 6, 80, Edge::Start, 0);
        assert_eq!(chars(body)[pos - 1], '>');
        assert_eq!(pos, 5);

        let plain = "a".repeat(200);
        assert_eq!(snap_to_html_boundary(&plain, 100, 80, Edge::Start, 0), 100);
    }

    #[test]
    fn test_snap_end_lands_on_open_bracket() {
        let body = "<div><span>hello</span></div>";
        let pos = snap_to_html_boundary(body, 22, 80, Edge::End, 0);
        assert_eq!(chars(body)[pos], '<');
        assert!(pos < 22);

        // the search range excludes `pos` itself
        assert_eq!(snap_to_html_boundary("hello<div>", 5, 80, Edge::End, 0), 5);
    }

    #[test]
    fn test_snap_is_bounded_by_range_and_floor() {
        let body = format!("<{}", "a".repeat(100));
        assert_eq!(snap_to_html_boundary(&body, 100, 80, Edge::End, 0), 100);
        assert_eq!(snap_to_html_boundary("ab<cdef", 6, 80, Edge::End, 3), 6);
        // positions past the end are clipped to the body
        assert_eq!(snap_to_html_boundary("abc", 10, 80, Edge::End, 0), 3);
        assert_eq!(snap_to_html_boundary("a<c", 500, 80, Edge::End, 0), 1);
    }

    #[test]
    fn test_snap_counts_chars_not_bytes() {
        let body = "ééé>ééé";
        assert_eq!(snap_to_html_boundary(body, 6, 80, Edge::Start, 0), 4);
    }

    #[test]
    fn test_zero_length_returns_full_body() {
        let body = "x".repeat(5000);
        assert_eq!(extract_preview(&body, &PreviewConfig::full_body()), body);
        assert_eq!(extract_preview("", &PreviewConfig::full_body()), "");
        assert_eq!(
            extract_preview("line1\nline2\r\nline3", &PreviewConfig::full_body()),
            "line1 line2 line3"
        );
    }

    #[test]
    fn test_length_bounds_output() {
        let body = "x".repeat(1050);
        assert_eq!(extract_preview(&body, &PreviewConfig::default()).len(), 1000);
        assert_eq!(extract_preview("hello world", &cfg(100, 0, None)), "hello world");
        assert_eq!(extract_preview("hello world", &cfg(5, 0, None)), "hello");
    }

    #[test]
    fn test_offset_window() {
        let body = format!("SKIP{}", "KEEP".repeat(10));
        assert_eq!(extract_preview(&body, &cfg(8, 4, None)), "KEEPKEEP");
        assert_eq!(extract_preview("short", &cfg(100, 1000, None)), "");
        assert_eq!(extract_preview("abcde", &cfg(100, 3, None)), "de");
    }

    #[test]
    fn test_offset_window_deep_in_large_body() {
        let body = format!("{}TAIL", "ü".repeat(100_000));
        assert_eq!(extract_preview(&body, &cfg(4, 100_000, None)), "TAIL");
        assert_eq!(extract_preview(&body, &cfg(3, 99_998, None)), "üüT");
    }

    #[test]
    fn test_needle_window_contains_needle() {
        for length in [10, 30, 40, 60] {
            let out = extract_preview(HTML, &cfg(length, 0, Some("SQLSTATE")));
            assert!(out.contains("SQLSTATE"), "length {}: {:?}", length, out);
        }
        let out = extract_preview(HTML, &cfg(30, 0, Some("SQLSTATE")));
        assert!(out.chars().count() <= 30);

        let at_end = format!("{}NEEDLE", "lots of content ".repeat(5));
        assert!(extract_preview(&at_end, &cfg(20, 0, Some("NEEDLE"))).contains("NEEDLE"));
        let at_start = "ERROR: bad input<br>rest of content";
        assert!(extract_preview(at_start, &cfg(20, 0, Some("ERROR"))).contains("ERROR"));
    }

    #[test]
    fn test_needle_longer_than_window_is_kept_whole() {
        let body = "<p>prefix SQLSTATE[HY000] suffix</p>";
        let out = extract_preview(body, &cfg(4, 0, Some("SQLSTATE[HY000]")));
        assert!(out.contains("SQLSTATE[HY000]"));
    }

    #[test]
    fn test_missing_needle_falls_back_to_offset() {
        let body = "abcdefghij".repeat(20);
        assert_eq!(
            extract_preview(&body, &cfg(10, 5, Some("NOTHERE"))),
            &body[5..15]
        );
    }

    #[test]
    fn test_needle_window_is_single_line() {
        let out = extract_preview("before\nSQLSTATE\r\nafter", &cfg(30, 0, Some("SQLSTATE")));
        assert_eq!(out, "before SQLSTATE after");
    }

    #[test]
    fn test_multibyte_body_is_not_split() {
        let body = "héllo wörld ünïcode";
        assert_eq!(extract_preview(body, &cfg(5, 0, None)), "héllo");
        assert!(extract_preview(body, &cfg(6, 0, Some("wörld"))).contains("wörld"));
    }
}
