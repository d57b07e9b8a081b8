//! Shared string helpers.

/// Longest prefix of `s` that fits in `max_bytes` without splitting a UTF-8
/// character.
pub fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Cap `s` at `max_bytes`, appending a marker with the number of bytes dropped.
///
/// Used for captured process output and log previews so an oversized payload
/// never reaches the model or the transcript whole.
pub fn cap_with_marker(s: &str, max_bytes: usize) -> String {
    let kept = truncate_str(s, max_bytes);
    if kept.len() == s.len() {
        return s.to_string();
    }
    format!("{}\n...[truncated {} bytes]", kept, s.len() - kept.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_keeps_short_input() {
        assert_eq!(truncate_str("12402", 16), "12402");
    }

    #[test]
    fn truncate_backs_off_multibyte_boundary() {
        // '×' is two bytes in UTF-8
        let s = "2×3";
        assert_eq!(truncate_str(s, 2), "2");
        assert_eq!(truncate_str(s, 3), "2×");
    }

    #[test]
    fn cap_reports_dropped_bytes() {
        let out = cap_with_marker("abcdefghij", 4);
        assert_eq!(out, "abcd\n...[truncated 6 bytes]");
    }

    #[test]
    fn cap_is_identity_when_within_limit() {
        assert_eq!(cap_with_marker("ok", 4), "ok");
    }
}
