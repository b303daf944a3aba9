// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Outbound text truncation.
//!
//! Each provider caps message length (WhatsApp 4096 characters, Meta
//! Send API 2000, TikTok 1000). Replies that exceed the cap are cut at a
//! sentence boundary near the limit when one exists, falling back to a
//! word boundary, and tagged with a trailing marker so the recipient can
//! tell the message was shortened.

use std::borrow::Cow;

/// Appended to any truncated message. Counted against the channel limit.
pub const TRUNCATION_MARKER: &str = " [truncated]";

/// Truncate `text` to at most `max_chars` characters (not bytes).
///
/// Returns the input unchanged (borrowed) when it already fits. When it
/// does not, the cut lands after the last sentence-ending punctuation in
/// the final fifth of the window, else at the last whitespace in that
/// window, else hard at the limit. The result always satisfies
/// `result.chars().count() <= max_chars` and ends with
/// [`TRUNCATION_MARKER`].
pub fn truncate_with_marker(text: &str, max_chars: usize) -> Cow<'_, str> {
    if text.chars().count() <= max_chars {
        return Cow::Borrowed(text);
    }

    let marker_len = TRUNCATION_MARKER.chars().count();
    if max_chars <= marker_len {
        // Degenerate limit: no room for the marker, hard cut.
        return Cow::Owned(text.chars().take(max_chars).collect());
    }

    let budget = max_chars - marker_len;
    let cut_byte = byte_index_of_char(text, budget);
    let head = &text[..cut_byte];

    // Only boundaries in the last fifth of the window are acceptable;
    // cutting much earlier throws away content for no reason.
    let floor_byte = byte_index_of_char(text, budget * 4 / 5);

    let boundary = head
        .rfind(['.', '!', '?', '\n'])
        .filter(|&i| i >= floor_byte)
        .map(|i| i + 1)
        .or_else(|| {
            head.rfind(char::is_whitespace)
                .filter(|&i| i >= floor_byte)
        })
        .unwrap_or(cut_byte);

    let mut out = head[..boundary].trim_end().to_string();
    out.push_str(TRUNCATION_MARKER);
    Cow::Owned(out)
}

/// Byte index of the `n`-th character, or the string length if shorter.
fn byte_index_of_char(s: &str, n: usize) -> usize {
    s.char_indices().nth(n).map(|(i, _)| i).unwrap_or(s.len())
}
