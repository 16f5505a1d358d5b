//! Turns raw model text into a validated [`ConceptNode`] tree.
//!
//! The model is asked for JSON but routinely wraps it in markdown fences,
//! invents placeholder image URLs, or gets cut off by the output token limit.
//! [`normalize`] handles each of those and never fails: when nothing usable
//! can be recovered it returns [`ConceptNode::error`].

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::models::ConceptNode;

const FENCE: &str = "```";
const PLACEHOLDER_MEDIA_PATTERN: &str = r#""media"\s*:\s*"[^"]*(?i:example\.com)[^"]*""#;

#[derive(Error, Debug)]
enum MalformedResponse {
    #[error("empty model response")]
    Empty,

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tree is missing a title or type")]
    Invalid,

    #[error("no element boundary to truncate at")]
    Unrecoverable,
}

pub fn normalize(raw: &str, fallback_title: &str) -> ConceptNode {
    let text = strip_code_fences(raw);
    let text = strip_placeholder_media(&text);

    let err = match parse_tree(&text) {
        Ok(tree) => return tree,
        Err(err) => err,
    };

    if matches!(err, MalformedResponse::Empty) {
        tracing::error!("model returned an empty response for {fallback_title:?}");
        return ConceptNode::error(fallback_title);
    }

    tracing::warn!("model output for {fallback_title:?} is malformed ({err}); attempting partial recovery");
    match recover_truncated(&text) {
        Ok(tree) => {
            tracing::info!("recovered partial tree for {fallback_title:?}");
            tree
        }
        Err(recovery_err) => {
            tracing::error!(
                "failed to recover tree for {fallback_title:?}: {recovery_err}; raw content: {}",
                preview(raw)
            );
            ConceptNode::error(fallback_title)
        }
    }
}

/// Drops every fence line when the text opens with a fence, keeping the rest in order.
pub fn strip_code_fences(raw: &str) -> String {
    let trimmed = raw.trim();
    if !trimmed.starts_with(FENCE) {
        return trimmed.to_string();
    }

    trimmed
        .lines()
        .filter(|line| !line.trim_start().starts_with(FENCE))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Replaces `"media": "<url on example.com>"` with `"media": null`.
pub fn strip_placeholder_media(text: &str) -> String {
    match placeholder_media() {
        Some(re) => re.replace_all(text, r#""media": null"#).into_owned(),
        None => text.to_string(),
    }
}

fn placeholder_media() -> Option<&'static Regex> {
    static PLACEHOLDER_MEDIA: OnceLock<Option<Regex>> = OnceLock::new();
    PLACEHOLDER_MEDIA
        .get_or_init(|| match Regex::new(PLACEHOLDER_MEDIA_PATTERN) {
            Ok(re) => Some(re),
            Err(err) => {
                tracing::error!("placeholder media filter disabled: {err}");
                None
            }
        })
        .as_ref()
}

fn parse_tree(text: &str) -> Result<ConceptNode, MalformedResponse> {
    if text.trim().is_empty() {
        return Err(MalformedResponse::Empty);
    }

    let tree: ConceptNode = serde_json::from_str(text)?;
    if !tree.is_valid() {
        return Err(MalformedResponse::Invalid);
    }
    Ok(tree)
}

fn recover_truncated(text: &str) -> Result<ConceptNode, MalformedResponse> {
    let repaired = truncate_and_rebalance(text).ok_or(MalformedResponse::Unrecoverable)?;
    parse_tree(&repaired)
}

/// Repairs output that was cut off mid-structure.
///
/// Cuts at the last comma separating array elements, so an incomplete trailing
/// element is dropped whole; without one, falls back to the last comma between
/// object members. Then appends the closers for whatever was still open at the
/// cut. Text whose top-level value already closed is not truncated, so it is
/// left alone. Delimiters inside string literals are ignored.
pub fn truncate_and_rebalance(text: &str) -> Option<String> {
    let mut open: Vec<char> = Vec::new();
    let mut array_cut: Option<(usize, Vec<char>)> = None;
    let mut object_cut: Option<(usize, Vec<char>)> = None;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, ch) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => open.push('}'),
            '[' => open.push(']'),
            '}' | ']' => {
                if open.pop() != Some(ch) || open.is_empty() {
                    return None;
                }
            }
            ',' => match open.last() {
                Some(']') => array_cut = Some((idx, open.clone())),
                Some(_) => object_cut = Some((idx, open.clone())),
                None => {}
            },
            _ => {}
        }
    }

    let (idx, closers) = array_cut.or(object_cut)?;
    let mut repaired = text[..idx].trim_end().to_string();
    repaired.extend(closers.iter().rev());
    Some(repaired)
}

fn preview(raw: &str) -> String {
    const LIMIT: usize = 400;
    let mut out: String = raw.chars().take(LIMIT).collect();
    if raw.chars().count() > LIMIT {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NodeKind, ERROR_NODE_VALUE};

    const TREE_JSON: &str = r#"{
  "title": "Photosynthesis",
  "type": "category",
  "value": "How plants make food",
  "media": "https://upload.wikimedia.org/leaf.png",
  "preview": ["light", "chlorophyll"],
  "action": "expand",
  "children": [
    {"title": "Chlorophyll", "type": "entity", "value": "Green pigment"},
    {"title": "Calvin cycle", "type": "fact", "children": [
      {"title": "RuBisCO", "type": "entity"}
    ]}
  ]
}"#;

    fn expected_error(title: &str) -> ConceptNode {
        ConceptNode {
            title: title.to_string(),
            kind: NodeKind::Error,
            value: Some(ERROR_NODE_VALUE.to_string()),
            media: None,
            preview: None,
            action: None,
            children: Some(vec![]),
        }
    }

    #[test]
    fn strict_json_is_returned_field_for_field() {
        let tree = normalize(TREE_JSON, "fallback");
        assert_eq!(tree.title, "Photosynthesis");
        assert_eq!(tree.kind, NodeKind::Category);
        assert_eq!(tree.value.as_deref(), Some("How plants make food"));
        assert_eq!(
            tree.media.as_deref(),
            Some("https://upload.wikimedia.org/leaf.png")
        );
        assert_eq!(
            tree.preview,
            Some(vec!["light".to_string(), "chlorophyll".to_string()])
        );
        assert_eq!(tree.action.as_deref(), Some("expand"));
        assert_eq!(tree.children().len(), 2);
        assert_eq!(tree.children()[1].children()[0].title, "RuBisCO");
        assert!(!tree.is_error());
    }

    #[test]
    fn fenced_output_matches_unfenced() {
        let plain = normalize(TREE_JSON, "fallback");
        let tagged = normalize(&format!("```json\n{TREE_JSON}\n```"), "fallback");
        let untagged = normalize(&format!("  ```\n{TREE_JSON}\n```\n"), "fallback");
        assert_eq!(tagged, plain);
        assert_eq!(untagged, plain);
    }

    #[test]
    fn placeholder_media_is_nulled_at_every_level() {
        let raw = r#"{"title":"Cat","type":"entity","value":"see example.com","media":"https://example.com/cat.jpg",
            "children":[{"title":"Kitten","type":"entity","media": "http://img.EXAMPLE.com/a/b/c.png?x=1"},
                        {"title":"Lion","type":"entity","media":"https://upload.wikimedia.org/lion.jpg"}]}"#;
        let tree = normalize(raw, "Cat");
        assert_eq!(tree.media, None);
        assert_eq!(tree.value.as_deref(), Some("see example.com"));
        assert_eq!(tree.children()[0].media, None);
        assert_eq!(
            tree.children()[1].media.as_deref(),
            Some("https://upload.wikimedia.org/lion.jpg")
        );
    }

    #[test]
    fn placeholder_filter_only_touches_media_fields() {
        let raw = r#"{"action":"https://example.com/go","media":"https://example.com/x.png"}"#;
        assert_eq!(
            strip_placeholder_media(raw),
            r#"{"action":"https://example.com/go","media": null}"#
        );
    }

    #[test]
    fn garbage_yields_canonical_error_node() {
        assert_eq!(
            normalize("I'm sorry, I cannot help with that.", "Quasar"),
            expected_error("Quasar")
        );
        assert_eq!(normalize("", "Quasar"), expected_error("Quasar"));
        assert_eq!(normalize("   \n ", "Quasar"), expected_error("Quasar"));
    }

    #[test]
    fn missing_required_fields_yield_error_node() {
        assert_eq!(
            normalize(r#"{"title":"NoType"}"#, "NoType"),
            expected_error("NoType")
        );
        assert_eq!(
            normalize(r#"{"title":"","type":"fact"}"#, "Blank"),
            expected_error("Blank")
        );
    }

    #[test]
    fn unknown_kind_passes_through() {
        let tree = normalize(r#"{"title":"Ada","type":"person"}"#, "Ada");
        assert_eq!(tree.kind, NodeKind::Other("person".to_string()));
    }

    #[test]
    fn truncated_children_array_is_recovered() {
        let raw = "```json\n{\"title\":\"X\",\"type\":\"entity\",\"children\":[{\"title\":\"Y\",\"type\":\"fact\"},{\"title\":\"Z";
        let tree = normalize(raw, "X");
        assert_eq!(tree.title, "X");
        assert_eq!(tree.kind, NodeKind::Entity);
        assert_eq!(tree.children().len(), 1);
        assert_eq!(tree.children()[0].title, "Y");
    }

    #[test]
    fn truncation_mid_child_is_always_a_valid_node() {
        let raw = "```json\n{\"title\":\"X\",\"type\":\"entity\",\"children\":[{\"title\":\"Y\",\"type\":\"fact\"";
        let tree = normalize(raw, "X");
        assert!(tree.is_valid());
        assert_eq!(tree.title, "X");
    }

    #[test]
    fn complete_json_with_trailing_prose_is_not_shortened() {
        let raw = "```json\n{\"title\":\"X\",\"type\":\"entity\",\"children\":[{\"title\":\"A\",\"type\":\"fact\"},{\"title\":\"B\",\"type\":\"fact\",\"value\":\"vb\"}]}\n```\nHope this helps!";
        assert_eq!(normalize(raw, "X"), expected_error("X"));
        assert_eq!(truncate_and_rebalance("{\"a\":[1,2]} and, more"), None);
    }

    #[test]
    fn child_cut_off_in_its_first_fields_is_dropped_whole() {
        let raw = "{\"title\":\"X\",\"type\":\"entity\",\"children\":[{\"title\":\"A\",\"type\":\"fact\"},{\"title\":\"B\",\"ty";
        let tree = normalize(raw, "X");
        assert!(!tree.is_error());
        assert_eq!(tree.title, "X");
        assert_eq!(tree.children().len(), 1);
        assert_eq!(tree.children()[0].title, "A");
    }

    #[test]
    fn root_cut_off_before_children_keeps_complete_members() {
        let raw = r#"{"title":"X","type":"entity","value":"An entity","media":"https://img/x.pn"#;
        let tree = normalize(raw, "X");
        assert_eq!(tree.kind, NodeKind::Entity);
        assert_eq!(tree.value.as_deref(), Some("An entity"));
        assert_eq!(tree.media, None);
    }

    #[test]
    fn placeholder_pattern_compiles() {
        assert!(placeholder_media().is_some());
    }

    #[test]
    fn rebalance_ignores_delimiters_inside_strings() {
        let raw = r#"{"title":"A, [b]","type":"fact","children":[{"title":"C","type":"quote","value":"x\", ]"},{"title":"#;
        let repaired = truncate_and_rebalance(raw).expect("cut point");
        assert_eq!(
            repaired,
            r#"{"title":"A, [b]","type":"fact","children":[{"title":"C","type":"quote","value":"x\", ]"}]}"#
        );
    }

    #[test]
    fn rebalance_rejects_mismatched_nesting() {
        assert_eq!(truncate_and_rebalance(r#"{"a":[1,2}"#), None);
        assert_eq!(truncate_and_rebalance(r#"{"title":"only""#), None);
    }
}
