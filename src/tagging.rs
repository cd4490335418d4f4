//! Hashtag parsing for post captions.
//!
//! A hashtag token is `#` followed by one or more word characters (letters,
//! digits, underscore; Unicode letters count). Captions are split into two
//! parts on save:
//!
//! - `"Sunset #vibes #ocean"` → hashtags `["vibes", "ocean"]`
//! - `"Sunset #vibes #ocean"` → caption `"Sunset"`
//!
//! Only the outer whitespace left behind by removed tokens is trimmed;
//! whitespace between surviving words is kept as typed.

use regex::Regex;
use std::sync::LazyLock;

static HASHTAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#(\w+)").expect("hashtag regex must compile"));

/// A caption split into its display text and its hashtag labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggedCaption {
    /// Caption with every hashtag token removed and outer whitespace trimmed.
    pub caption: String,
    /// Hashtag labels without `#`, in order of appearance. Not de-duplicated.
    pub hashtags: Vec<String>,
}

/// Return the word part of every hashtag in `text`, left to right.
pub fn extract_hashtags(text: &str) -> Vec<String> {
    HASHTAG_RE
        .captures_iter(text)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Remove every hashtag token from `text`, then trim surrounding whitespace.
pub fn strip_hashtags(text: &str) -> String {
    HASHTAG_RE.replace_all(text, "").trim().to_string()
}

/// Split a caption into cleaned text and hashtag labels in one call.
pub fn split_caption(text: &str) -> TaggedCaption {
    TaggedCaption {
        caption: strip_hashtags(text),
        hashtags: extract_hashtags(text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_in_order() {
        assert_eq!(extract_hashtags("Sunset #vibes #ocean"), vec!["vibes", "ocean"]);
    }

    #[test]
    fn extract_keeps_duplicates() {
        assert_eq!(extract_hashtags("#a #b #a"), vec!["a", "b", "a"]);
    }

    #[test]
    fn extract_empty_text() {
        assert!(extract_hashtags("").is_empty());
    }

    #[test]
    fn extract_without_tags() {
        assert!(extract_hashtags("no tags here").is_empty());
    }

    #[test]
    fn bare_hash_is_not_a_tag() {
        assert!(extract_hashtags("# heading and #").is_empty());
        assert_eq!(strip_hashtags("# heading"), "# heading");
    }

    #[test]
    fn adjacent_tags_are_separate_matches() {
        assert_eq!(extract_hashtags("#one#two"), vec!["one", "two"]);
        assert_eq!(strip_hashtags("#one#two"), "");
    }

    #[test]
    fn tag_stops_at_punctuation() {
        assert_eq!(extract_hashtags("great day #beach!"), vec!["beach"]);
        assert_eq!(strip_hashtags("great day #beach!"), "great day !");
    }

    #[test]
    fn digits_and_underscores_are_word_chars() {
        assert_eq!(extract_hashtags("#summer_2024"), vec!["summer_2024"]);
    }

    #[test]
    fn unicode_letters_are_word_chars() {
        assert_eq!(extract_hashtags("#café #東京"), vec!["café", "東京"]);
    }

    #[test]
    fn strip_trims_outer_whitespace() {
        assert_eq!(strip_hashtags("Sunset #vibes #ocean"), "Sunset");
        assert_eq!(strip_hashtags("  #only"), "");
        assert_eq!(strip_hashtags("\n#top\nbody\n"), "body");
    }

    #[test]
    fn strip_keeps_inner_whitespace() {
        assert_eq!(strip_hashtags("a #x  b"), "a   b");
    }

    #[test]
    fn strip_empty_text() {
        assert_eq!(strip_hashtags(""), "");
    }

    #[test]
    fn strip_without_tags_is_identity_up_to_trim() {
        assert_eq!(strip_hashtags("no tags here"), "no tags here");
    }

    #[test]
    fn stripped_text_never_contains_a_token() {
        let samples = [
            "#a#b#c",
            "##double",
            "mid#word text",
            "#x\n#y\t#z",
            "keep # this",
            "emoji 🌅 #sun",
        ];
        for s in samples {
            let stripped = strip_hashtags(s);
            assert!(
                !HASHTAG_RE.is_match(&stripped),
                "{s:?} stripped to {stripped:?}"
            );
        }
    }

    #[test]
    fn extract_count_matches_token_count() {
        let samples = ["", "#a", "#a #b", "x#y#z", "##q", "a # b #c_1"];
        for s in samples {
            assert_eq!(
                extract_hashtags(s).len(),
                HASHTAG_RE.find_iter(s).count(),
                "{s:?}"
            );
        }
    }

    #[test]
    fn split_caption_combines_both() {
        let split = split_caption("  #only");
        assert_eq!(split.caption, "");
        assert_eq!(split.hashtags, vec!["only"]);
    }
}
