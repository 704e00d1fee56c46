//! Naming policy for staged payloads.

use std::path::Path;

use percent_encoding::percent_decode_str;
use rand::Rng;

/// Undo the Latin-1 mis-decoding some multipart clients produce for non-ASCII
/// file names, then percent-decode.
///
/// A name whose characters all fit in a byte and whose bytes form valid UTF-8
/// is reinterpreted as that UTF-8 text. Names that do not qualify, or whose
/// percent-decoding is not valid UTF-8, are kept as they are.
pub fn correct_declared_name(raw: &str) -> String {
    let latin1: Option<Vec<u8>> = raw.chars().map(|c| u8::try_from(c).ok()).collect();
    let name = latin1
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .unwrap_or_else(|| raw.to_string());

    match percent_decode_str(&name).decode_utf8() {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => name,
    }
}

/// Replace every character outside `[A-Za-z0-9.-]` with `_`.
pub fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `{millis}-{9 digit random}-{sanitized name}`.
pub fn stored_name(original_name: &str, timestamp_ms: i64, suffix: u32) -> String {
    format!("{timestamp_ms}-{suffix:09}-{}", sanitize(original_name))
}

/// Stored name for `original_name` using the current time and a random suffix.
pub fn generate_stored_name(original_name: &str) -> String {
    let suffix = rand::thread_rng().gen_range(0..1_000_000_000);
    stored_name(original_name, chrono::Utc::now().timestamp_millis(), suffix)
}

/// Extension of `file_name` without the dot, or an empty string.
pub fn file_type(file_name: &str) -> String {
    Path::new(file_name)
        .extension()
        .map(|ext| ext.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latin1_mojibake_is_restored() {
        // "報告.pdf" as UTF-8 bytes read back one byte per char
        let garbled: String = "報告.pdf".bytes().map(char::from).collect();
        assert_eq!(correct_declared_name(&garbled), "報告.pdf");
    }

    #[test]
    fn plain_names_are_untouched() {
        assert_eq!(correct_declared_name("A.png"), "A.png");
        assert_eq!(correct_declared_name("報告.pdf"), "報告.pdf");
        // lone Latin-1 byte is not valid UTF-8 on its own
        assert_eq!(correct_declared_name("caf\u{e9}.txt"), "caf\u{e9}.txt");
    }

    #[test]
    fn percent_sequences_are_decoded_when_valid() {
        assert_eq!(correct_declared_name("my%20file.txt"), "my file.txt");
        assert_eq!(correct_declared_name("100%.txt"), "100%.txt");
        assert_eq!(correct_declared_name("bad%FF.txt"), "bad%FF.txt");
    }

    #[test]
    fn sanitize_replaces_disallowed_chars() {
        assert_eq!(sanitize("my file (1).tar.gz"), "my_file__1_.tar.gz");
        assert_eq!(sanitize("報告.pdf"), "__.pdf");
        assert_eq!(sanitize("ok-Name.09"), "ok-Name.09");
    }

    #[test]
    fn stored_name_layout() {
        assert_eq!(
            stored_name("a b.png", 1_700_000_000_000, 42),
            "1700000000000-000000042-a_b.png"
        );

        let generated = generate_stored_name("x.png");
        let parts: Vec<&str> = generated.splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[1].len(), 9);
        assert_eq!(parts[2], "x.png");
    }

    #[test]
    fn file_type_from_name() {
        assert_eq!(file_type("1-2-A.png"), "png");
        assert_eq!(file_type("1-2-archive.tar.gz"), "gz");
        assert_eq!(file_type("1-2-README"), "");
    }
}
