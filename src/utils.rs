use regex::Regex;
use std::sync::LazyLock;

/// Characters that common filesystems (Windows in particular) reject in file names.
static INVALID_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"[<>:"/\\|?*]"#).expect("static pattern compiles"));

/// Strip every character that is not allowed in a file name, keeping the rest in order.
pub fn replace_invalid_chars(input: &str) -> String {
    INVALID_CHARS.replace_all(input, "").into_owned()
}

/// Keep at most `max_chars` characters (not bytes) of `s`.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
