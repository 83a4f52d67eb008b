//! Tagged-union `Value` visitor over submitted payloads (spec.md §9: "Cyclic/
//! dynamic payload traversal"). `normalize` walks an arbitrary JSON structure,
//! classifies each string leaf as a media data-URI, heuristic base64, a
//! preserved `http(s)://` URL, or plain data, and replaces media leaves with
//! whatever a caller-supplied uploader returns. The traversal itself never
//! touches an object store — callers inject the upload behavior, which keeps
//! this module synchronous and independently testable.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value as JsonValue;

/// Media-hinting path tokens from `original_source`'s heuristic: a long
/// base64-looking string is only treated as embedded media if its JSON path
/// contains one of these tokens.
const MEDIA_PATH_HINTS: &[&str] = &["image", "img", "mask", "audio", "video", "media", "file"];

/// Minimum length (in characters) for the base64 heuristic to fire at all;
/// short strings are left as plain text even if they happen to be valid
/// base64 alphabet.
const MIN_HEURISTIC_BASE64_LEN: usize = 256;

static BASE64_ALPHABET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9+/]+={0,2}$").expect("static regex is valid"));

/// A classified leaf, ready for a caller to decide what (if anything) to
/// upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaLeaf {
    /// `data:<mime>;base64,<payload>` — mime type and decoded bytes.
    DataUri { mime: String, bytes: Vec<u8> },
    /// A bare string that looks like base64 and sits under a media-hinting
    /// path; decoded bytes only, no declared mime type.
    HeuristicBase64 { bytes: Vec<u8> },
}

/// Classify a single string leaf found at `path` (dot/bracket-joined field
/// names, e.g. `"payload.images[0]"`). Returns `None` for anything that
/// should be left untouched: plain text, or an existing `http(s)://` URL.
pub fn classify_leaf(path: &str, s: &str) -> Option<MediaLeaf> {
    if s.starts_with("http://") || s.starts_with("https://") {
        return None;
    }
    if let Some(rest) = s.strip_prefix("data:") {
        let (header, data) = rest.split_once(',')?;
        let mime = header.split(';').next().unwrap_or("application/octet-stream");
        if !header.contains("base64") {
            return None;
        }
        let bytes = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, data).ok()?;
        return Some(MediaLeaf::DataUri {
            mime: mime.to_string(),
            bytes,
        });
    }
    if s.len() >= MIN_HEURISTIC_BASE64_LEN
        && BASE64_ALPHABET.is_match(s)
        && path_has_media_hint(path)
    {
        if let Ok(bytes) = base64::Engine::decode(&base64::engine::general_purpose::STANDARD, s) {
            return Some(MediaLeaf::HeuristicBase64 { bytes });
        }
    }
    None
}

fn path_has_media_hint(path: &str) -> bool {
    let lower = path.to_ascii_lowercase();
    MEDIA_PATH_HINTS.iter().any(|hint| lower.contains(hint))
}

/// Walk `value` depth-first, invoking `upload` on each string leaf that
/// classifies as media and replacing that leaf with whatever `upload`
/// returns (typically an object-store URL). Non-media leaves, and leaves
/// `upload` declines (returns `None` for), are left as-is. Idempotent:
/// re-running over a structure whose media leaves are already plain
/// `http(s)://` URLs is a no-op because `classify_leaf` short-circuits on
/// those.
pub fn normalize<F>(value: &JsonValue, upload: &mut F) -> JsonValue
where
    F: FnMut(&str, MediaLeaf) -> Option<String>,
{
    walk("payload", value, upload)
}

fn walk<F>(path: &str, value: &JsonValue, upload: &mut F) -> JsonValue
where
    F: FnMut(&str, MediaLeaf) -> Option<String>,
{
    match value {
        JsonValue::String(s) => match classify_leaf(path, s) {
            Some(leaf) => match upload(path, leaf) {
                Some(url) => JsonValue::String(url),
                None => value.clone(),
            },
            None => value.clone(),
        },
        JsonValue::Array(items) => JsonValue::Array(
            items
                .iter()
                .enumerate()
                .map(|(i, item)| walk(&format!("{path}[{i}]"), item, upload))
                .collect(),
        ),
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), walk(&format!("{path}.{k}"), v, upload)))
                .collect(),
        ),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn preserves_existing_http_urls() {
        let input = json!({"images": ["https://cdn.example.com/a.png"]});
        let mut calls = 0;
        let output = normalize(&input, &mut |_path, _leaf| {
            calls += 1;
            Some("should-not-be-called".into())
        });
        assert_eq!(calls, 0);
        assert_eq!(output, input);
    }

    #[test]
    fn rewrites_data_uri_under_media_upload() {
        let input = json!({"images": ["data:image/png;base64,AAAA"]});
        let output = normalize(&input, &mut |path, leaf| {
            assert_eq!(path, "payload.images[0]");
            match leaf {
                MediaLeaf::DataUri { mime, .. } => {
                    assert_eq!(mime, "image/png");
                    Some("https://os.example/tasks/1/inputs/images_0.png".into())
                }
                MediaLeaf::HeuristicBase64 { .. } => panic!("expected data uri"),
            }
        });
        assert_eq!(
            output["images"][0],
            json!("https://os.example/tasks/1/inputs/images_0.png")
        );
    }

    #[test]
    fn heuristic_base64_requires_media_path_hint() {
        let long_base64 = "A".repeat(300);
        let non_media = json!({"notes": long_base64.clone()});
        let mut calls = 0;
        normalize(&non_media, &mut |_p, _l| {
            calls += 1;
            None
        });
        assert_eq!(calls, 0, "non-media-hinted path must not be classified");

        let media = json!({"image_data": long_base64});
        let mut seen = false;
        normalize(&media, &mut |_p, leaf| {
            seen = matches!(leaf, MediaLeaf::HeuristicBase64 { .. });
            None
        });
        assert!(seen, "media-hinted path with long base64 must classify");
    }

    #[test]
    fn short_base64_looking_string_is_left_alone() {
        let input = json!({"image": "AAAA"});
        let mut calls = 0;
        let output = normalize(&input, &mut |_p, _l| {
            calls += 1;
            None
        });
        assert_eq!(calls, 0);
        assert_eq!(output, input);
    }

    #[test]
    fn normalization_is_idempotent_over_already_normalized_payload() {
        let input = json!({"images": ["https://os.example/a.png"], "prompt": "hi"});
        let first = normalize(&input, &mut |_p, _l| Some("unused".into()));
        let second = normalize(&first, &mut |_p, _l| Some("unused".into()));
        assert_eq!(first, second);
        assert_eq!(first, input);
    }

    #[test]
    fn classify_leaf_decodes_data_uri_bytes() {
        // "AAAA" base64-decodes to 3 zero bytes.
        let leaf = classify_leaf("payload.image", "data:image/png;base64,AAAA").unwrap();
        match leaf {
            MediaLeaf::DataUri { mime, bytes } => {
                assert_eq!(mime, "image/png");
                assert_eq!(bytes, vec![0u8, 0, 0]);
            }
            _ => panic!("expected DataUri"),
        }
    }
}
