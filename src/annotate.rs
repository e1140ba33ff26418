use crate::textpos::remap_offsets;
use serde::{Deserialize, Serialize};

/// A clickable word range as delivered by the chat stream: UTF-8 byte
/// offsets into the accumulated bot message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAnnotation {
    pub start: u64,
    pub end: u64,
    pub text: String,
}

/// A clickable word range ready for rendering: UTF-16 code-unit indices
/// into the accumulated bot message text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkWord {
    pub start: usize,
    pub end: usize,
    pub text: String,
}

/// Projects byte-offset annotations onto `text`.
///
/// All start/end offsets are flattened into a single remap pass over the
/// string. An annotation resolves only when both endpoints land on a
/// code-point boundary within the current text; anything else (typically a
/// range referring to text that has not streamed in yet) is returned in the
/// second list so the caller can retry it against a longer accumulated
/// text. Both lists preserve input order.
pub fn project(text: &str, annotations: &[RawAnnotation]) -> (Vec<LinkWord>, Vec<RawAnnotation>) {
    if annotations.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let offsets: Vec<u64> = annotations
        .iter()
        .flat_map(|a| [a.start, a.end])
        .collect();
    let map = remap_offsets(text, &offsets);

    let mut resolved = Vec::new();
    let mut deferred = Vec::new();
    for annotation in annotations {
        match (map.get(&annotation.start), map.get(&annotation.end)) {
            (Some(&start), Some(&end)) => resolved.push(LinkWord {
                start,
                end,
                text: annotation.text.clone(),
            }),
            _ => deferred.push(annotation.clone()),
        }
    }

    (resolved, deferred)
}
