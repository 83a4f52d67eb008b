//! Wires the payload-normalization visitor
//! (`taskforge_shared::value::classify_leaf`) to the Object Store: every
//! classified media leaf is uploaded and replaced with its `s3://` URL.
//! `taskforge_shared::value::normalize` takes a synchronous upload closure,
//! which doesn't fit an async S3 PUT, so this walks the same shape itself.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value as JsonValue;

use taskforge_shared::clients::os::ObjectStore;
use taskforge_shared::error::TaskforgeError;
use taskforge_shared::value::{classify_leaf, MediaLeaf};

fn safe_path_hint(path: &str) -> String {
    let hint = path.strip_prefix("payload").unwrap_or(path);
    let hint = hint.trim_start_matches('.');
    let cleaned: String = hint
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    let cleaned = cleaned.replace("..", ".");
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_' || c == '[' || c == ']');
    if trimmed.is_empty() {
        "data".to_string()
    } else {
        trimmed.replace(['[', ']'], "_")
    }
}

fn default_mime_for_hint(hint: &str) -> &'static str {
    let lower = hint.to_ascii_lowercase();
    if ["image", "img", "mask"].iter().any(|k| lower.contains(k)) {
        "image/png"
    } else if lower.contains("audio") {
        "audio/mpeg"
    } else if lower.contains("video") {
        "video/mp4"
    } else {
        "application/octet-stream"
    }
}

fn extension_for(mime: &str) -> &'static str {
    mime_guess::get_mime_extensions_str(mime)
        .and_then(|exts| exts.first())
        .copied()
        .unwrap_or("bin")
}

pub async fn normalize_payload(
    os: &ObjectStore,
    task_id: &str,
    value: &JsonValue,
) -> Result<JsonValue, TaskforgeError> {
    walk(os, task_id, "payload".to_string(), value).await
}

fn walk<'a>(
    os: &'a ObjectStore,
    task_id: &'a str,
    path: String,
    value: &'a JsonValue,
) -> Pin<Box<dyn Future<Output = Result<JsonValue, TaskforgeError>> + 'a>> {
    Box::pin(async move {
        match value {
            JsonValue::String(s) => match classify_leaf(&path, s) {
                Some(leaf) => {
                    let (bytes, mime) = match leaf {
                        MediaLeaf::DataUri { mime, bytes } => (bytes, mime),
                        MediaLeaf::HeuristicBase64 { bytes } => {
                            (bytes, default_mime_for_hint(&path).to_string())
                        }
                    };
                    let hint = safe_path_hint(&path);
                    let ext = extension_for(&mime);
                    let key = format!("tasks/{task_id}/inputs/{hint}.{ext}");
                    let url = os.upload_bytes(&key, bytes, &mime).await.map_err(|e| {
                        tracing::error!(error = %e, path, "media upload failed");
                        e
                    })?;
                    Ok(JsonValue::String(url))
                }
                None => Ok(value.clone()),
            },
            JsonValue::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    out.push(walk(os, task_id, format!("{path}[{i}]"), item).await?);
                }
                Ok(JsonValue::Array(out))
            }
            JsonValue::Object(map) => {
                let mut out = serde_json::Map::with_capacity(map.len());
                for (k, v) in map.iter() {
                    let child = walk(os, task_id, format!("{path}.{k}"), v).await?;
                    out.insert(k.clone(), child);
                }
                Ok(JsonValue::Object(out))
            }
            other => Ok(other.clone()),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_path_hint_strips_root_and_separators() {
        assert_eq!(safe_path_hint("payload.images[0]"), "images_0");
        assert_eq!(safe_path_hint("payload"), "data");
    }

    #[test]
    fn default_mime_guesses_from_hint() {
        assert_eq!(default_mime_for_hint("payload.image_data"), "image/png");
        assert_eq!(default_mime_for_hint("payload.audio_clip"), "audio/mpeg");
        assert_eq!(default_mime_for_hint("payload.notes"), "application/octet-stream");
    }
}
