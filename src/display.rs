// The catalog keeps text untruncated; only what is printed gets capped.

use crate::png::{ChunkType, TextEntry};

pub const DEFAULT_TEXT_LIMIT: usize = 200;

const ELLIPSIS: &str = "...";

/// First `limit` characters of `text`, with `...` appended when cut.
pub fn truncate(text: &str, limit: usize) -> String {
    match text.char_indices().nth(limit) {
        Some((cut, _)) => format!("{}{}", &text[..cut], ELLIPSIS),
        None => text.to_string(),
    }
}

pub fn entry_line(entry: &TextEntry, limit: usize) -> String {
    format!(
        "{}: {}={}",
        entry.source,
        truncate(&entry.keyword, limit),
        truncate(&entry.value, limit)
    )
}

/// Caps the keyword and the value of every entry in a stored blob.
///
/// A line that does not start a new `<chunkType>: <keyword>=` entry belongs
/// to the previous entry's value. Lines before the first entry are capped on
/// their own.
pub fn blob_lines(blob: &str, limit: usize) -> String {
    let mut out = Vec::new();
    let mut current: Option<(&str, &str, String)> = None;
    for line in blob.lines() {
        match split_entry(line) {
            Some((tag, keyword, value)) => {
                out.extend(current.take().map(|e| capped_entry(e, limit)));
                current = Some((tag, keyword, value.to_string()));
            }
            None => match &mut current {
                Some((_, _, value)) => {
                    value.push('\n');
                    value.push_str(line);
                }
                None => out.push(truncate(line, limit)),
            },
        }
    }
    out.extend(current.map(|e| capped_entry(e, limit)));
    out.join("\n")
}

fn split_entry(line: &str) -> Option<(&str, &str, &str)> {
    let (tag, rest) = line.split_once(": ")?;
    if !ChunkType::TEXT_TYPES.iter().any(|t| t.as_str() == tag) {
        return None;
    }
    let (keyword, value) = rest.split_once('=')?;
    Some((tag, keyword, value))
}

fn capped_entry((tag, keyword, value): (&str, &str, String), limit: usize) -> String {
    format!("{tag}: {}={}", truncate(keyword, limit), truncate(&value, limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_untouched() {
        assert_eq!(truncate("cat", 200), "cat");
        assert_eq!(truncate(&"x".repeat(200), 200), "x".repeat(200));
    }

    #[test]
    fn long_text_gets_marker() {
        let cut = truncate(&"x".repeat(201), 200);
        assert_eq!(cut.len(), 203);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn counts_characters_not_bytes() {
        assert_eq!(truncate("猫猫猫", 2), "猫猫...");
    }

    #[test]
    fn entry_caps_keyword_and_value_separately() {
        let entry = TextEntry {
            keyword: "k".repeat(5),
            value: "v".repeat(5),
            source: ChunkType::ITXT,
        };
        assert_eq!(entry_line(&entry, 3), "iTXt: kkk...=vvv...");
    }

    #[test]
    fn blob_value_gets_its_own_allowance() {
        let value = "v".repeat(195);
        let blob = format!("tEXt: parameters={value}");
        assert_eq!(blob_lines(&blob, 200), blob);

        let long = format!("tEXt: parameters={}", "v".repeat(201));
        assert_eq!(
            blob_lines(&long, 200),
            format!("tEXt: parameters={}...", "v".repeat(200))
        );
    }

    #[test]
    fn blob_entries_are_capped_one_by_one() {
        let blob = "tEXt: kkkkk=vvvvv\nzTXt: Comment=ab";
        assert_eq!(blob_lines(blob, 3), "tEXt: kkk...=vvv...\nzTXt: Com...=ab");
    }

    #[test]
    fn multi_line_value_is_capped_as_a_whole() {
        let blob = "tEXt: parameters=cat\ndog\niTXt: Title=x";
        assert_eq!(blob_lines(blob, 200), blob);
        assert_eq!(blob_lines(blob, 5), "tEXt: param...=cat\nd...\niTXt: Title=x");
    }

    #[test]
    fn stray_lines_are_capped_alone() {
        assert_eq!(blob_lines("abcdef\nab", 4), "abcd...\nab");
    }
}
