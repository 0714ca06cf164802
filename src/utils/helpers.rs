//! General helper utilities.

/// ANSI colour codes.
pub mod colors {
    pub const OKGREEN: &str = "\x1b[92m";
    pub const FAIL: &str = "\x1b[91m";
    pub const ENDC: &str = "\x1b[0m";

    /// Wrap `text` in ANSI colour escape codes (no-op when `add_color` is false).
    pub fn colorize(text: &str, color: &str, add_color: bool) -> String {
        if add_color && !text.is_empty() {
            format!("{color}{text}{ENDC}")
        } else {
            text.to_string()
        }
    }
}

/// Code offset in the fixed-width form used by listings and reports.
pub fn offset_hex(offset: usize) -> String {
    format!("0x{offset:04x}")
}

/// Cut long input down for error messages.
pub fn abbreviate(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
