use futures::future::join_all;

use crate::models::{ConceptNode, FactualSummary};
use crate::wikipedia::FactualLookup;

/// Fills gaps in a freshly normalized tree from factual lookups.
///
/// The root takes `value` and `media` from `root_summary` when it has none.
/// Direct children without `media` get one lookup each, keyed by title, issued
/// concurrently. Grandchildren are left alone. Existing non-empty fields are
/// never overwritten and lookup failures only mean "nothing to add".
pub async fn enrich(
    mut node: ConceptNode,
    root_summary: &FactualSummary,
    lookup: &dyn FactualLookup,
) -> ConceptNode {
    if !node.has_value() {
        if let Some(extract) = non_blank(root_summary.extract.as_deref()) {
            node.value = Some(extract.to_string());
        }
    }

    if !node.has_media() {
        if let Some(thumbnail) = non_blank(root_summary.thumbnail_url.as_deref()) {
            node.media = Some(thumbnail.to_string());
        }
    }

    let Some(children) = node.children.as_mut() else {
        return node;
    };

    let pending: Vec<(usize, String)> = children
        .iter()
        .enumerate()
        .filter(|(_, child)| !child.has_media())
        .map(|(idx, child)| (idx, child.title.clone()))
        .collect();

    if pending.is_empty() {
        return node;
    }

    let lookups = pending.iter().map(|(_, title)| lookup.lookup(title));
    let results = join_all(lookups).await;

    for ((idx, title), result) in pending.into_iter().zip(results) {
        match result {
            Ok(summary) => {
                if let Some(thumbnail) = non_blank(summary.thumbnail_url.as_deref()) {
                    children[idx].media = Some(thumbnail.to_string());
                }
            }
            Err(err) => {
                tracing::warn!("skipping media enrichment for child {title:?}: {err}");
            }
        }
    }

    node
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}
