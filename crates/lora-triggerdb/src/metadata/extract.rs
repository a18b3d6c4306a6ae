//! Heuristic trigger-word extraction from adapter metadata.
//!
//! Training tools disagree on where (and in what shape) they record the
//! words an adapter was trained on, so extraction runs an ordered list of
//! strategies and takes the first one that matches.

use serde_json::Value as JsonValue;

use super::reader::Metadata;

/// Known metadata keys, highest priority first: tag-frequency table,
/// tag-string list, trained-words list, trigger-words list.
pub const KNOWN_KEYS: [&str; 4] = [
    "ss_tag_frequency",
    "ss_tag_strings",
    "trained_words",
    "trigger_words",
];

/// Dataset folder names that leak into tag tables.
const STOPLIST: [&str; 3] = ["img", "img_dir", "image_dir"];

/// Substrings that mark a key as a trigger list in the fallback scan.
const KEY_HINTS: [&str; 2] = ["trigger", "word"];

/// A strategy either claims the metadata (possibly with no candidates) or
/// passes with `None`.
type Strategy = fn(&Metadata) -> Option<Vec<String>>;

const STRATEGIES: [(&str, Strategy); 2] = [
    ("known key", from_known_keys),
    ("key name scan", from_key_name_scan),
];

/// Raw candidate words, before cleaning. Empty when nothing matches.
pub fn extract_candidates(metadata: &Metadata) -> Vec<String> {
    for (name, strategy) in STRATEGIES {
        if let Some(candidates) = strategy(metadata) {
            tracing::debug!(
                "metadata strategy '{}' matched ({} candidates)",
                name,
                candidates.len()
            );
            return candidates;
        }
    }
    Vec::new()
}

/// Strip a numeric dataset prefix (`12_forest` -> `forest`) and drop
/// folder-name noise. `None` means the word should be discarded.
pub fn clean(word: &str) -> Option<String> {
    let word = word.trim();
    let rest = word.trim_start_matches(|c: char| c.is_ascii_digit());
    let cleaned = match rest.strip_prefix('_') {
        Some(stripped) if rest.len() < word.len() => stripped,
        _ => word,
    };
    if cleaned.is_empty() || STOPLIST.iter().any(|s| cleaned.eq_ignore_ascii_case(s)) {
        return None;
    }
    Some(cleaned.to_string())
}

/// Clean every candidate and keep the first occurrence of each survivor.
pub fn clean_and_dedupe<S: AsRef<str>>(candidates: &[S]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(candidates.len());
    for c in candidates {
        if let Some(word) = clean(c.as_ref())
            && !out.contains(&word)
        {
            out.push(word);
        }
    }
    out
}

/// Extract, clean, dedupe and join into a single `", "` separated string.
pub fn triggers_from_metadata(metadata: &Metadata) -> Option<String> {
    let words = clean_and_dedupe(&extract_candidates(metadata));
    if words.is_empty() {
        None
    } else {
        Some(words.join(", "))
    }
}

fn from_known_keys(metadata: &Metadata) -> Option<Vec<String>> {
    KNOWN_KEYS
        .iter()
        .find_map(|k| metadata.get(*k))
        .map(candidates_from_value)
}

fn from_key_name_scan(metadata: &Metadata) -> Option<Vec<String>> {
    metadata
        .iter()
        .find(|(k, _)| {
            let lower = k.to_lowercase();
            KEY_HINTS.iter().any(|hint| lower.contains(hint))
        })
        .map(|(_, v)| candidates_from_value(v))
}

fn candidates_from_value(value: &JsonValue) -> Vec<String> {
    match value {
        JsonValue::String(s) => match serde_json::from_str::<JsonValue>(s) {
            Ok(parsed @ (JsonValue::Object(_) | JsonValue::Array(_))) => {
                candidates_from_value(&parsed)
            }
            _ => split_commas(s),
        },
        JsonValue::Object(map) => map
            .keys()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(str::to_string)
            .collect(),
        JsonValue::Array(items) => items.iter().filter_map(stringify).collect(),
        JsonValue::Null => Vec::new(),
        other => vec![other.to_string()],
    }
}

fn stringify(item: &JsonValue) -> Option<String> {
    let s = match item {
        JsonValue::Null => return None,
        JsonValue::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if s.is_empty() { None } else { Some(s) }
}

fn split_commas(s: &str) -> Vec<String> {
    s.split(',')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn meta(v: JsonValue) -> Metadata {
        match v {
            JsonValue::Object(m) => m,
            _ => unreachable!(),
        }
    }

    #[test]
    fn clean_strips_prefix_and_stoplist() {
        assert_eq!(clean("3_img"), None);
        assert_eq!(clean("12_forest").as_deref(), Some("forest"));
        assert_eq!(clean("cat").as_deref(), Some("cat"));
        assert_eq!(clean("IMG_DIR"), None);
        assert_eq!(clean("5_Image_Dir"), None);
        assert_eq!(clean("_underscore").as_deref(), Some("_underscore"));
        assert_eq!(clean("1girl").as_deref(), Some("1girl"));
        assert_eq!(clean("7_"), None);
    }

    #[test]
    fn tag_frequency_table_yields_keys_in_order() {
        let m = meta(json!({"ss_tag_frequency": {"sword": 5, "1_armor": 2}}));
        assert_eq!(extract_candidates(&m), vec!["sword", "1_armor"]);
        assert_eq!(clean_and_dedupe(&extract_candidates(&m)), vec!["sword", "armor"]);
    }

    #[test]
    fn embedded_json_strings_are_parsed() {
        let m = meta(json!({
            "ss_tag_frequency": "{\"10_knight\": {\"knight\": 4}, \"img\": {}}"
        }));
        assert_eq!(extract_candidates(&m), vec!["10_knight", "img"]);
        assert_eq!(triggers_from_metadata(&m).as_deref(), Some("knight"));
    }

    #[test]
    fn plain_strings_split_on_commas() {
        let m = meta(json!({"trained_words": " red hat,  blue scarf ,, "}));
        assert_eq!(extract_candidates(&m), vec!["red hat", "blue scarf"]);
    }

    #[test]
    fn sequences_are_stringified() {
        let m = meta(json!({"trigger_words": ["alpha", 7, null, " "]}));
        assert_eq!(extract_candidates(&m), vec!["alpha", "7"]);
    }

    #[test]
    fn priority_order_is_respected() {
        let m = meta(json!({
            "trigger_words": "late",
            "ss_tag_strings": "early"
        }));
        assert_eq!(extract_candidates(&m), vec!["early"]);
    }

    #[test]
    fn first_known_key_wins_even_when_empty() {
        let m = meta(json!({
            "ss_tag_frequency": "{}",
            "activation_words": "ignored"
        }));
        assert!(extract_candidates(&m).is_empty());
    }

    #[test]
    fn falls_back_to_key_name_scan() {
        let m = meta(json!({
            "modelspec.title": "x",
            "civitai_TriggerWords": "wizard, staff",
            "keywords": "later"
        }));
        assert_eq!(extract_candidates(&m), vec!["wizard", "staff"]);
    }

    #[test]
    fn nothing_found_is_empty() {
        let m = meta(json!({"ss_network_dim": "16"}));
        assert!(extract_candidates(&m).is_empty());
        assert_eq!(triggers_from_metadata(&m), None);
    }

    #[test]
    fn dedupe_keeps_first_seen() {
        let words = ["2_cat", "cat", "dog", "1_dog", "img_dir"];
        assert_eq!(clean_and_dedupe(&words), vec!["cat", "dog"]);
    }
}
