use serde::{Deserialize, Serialize};

pub const ERROR_NODE_VALUE: &str = "An error occurred while generating the concept tree.";
pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    Entity,
    Fact,
    Category,
    Quote,
    Image,
    /// Sentinel for synthesized failure nodes.
    Error,
    /// Any other label the model invents, passed through unchanged.
    Other(String),
}

impl NodeKind {
    pub fn as_str(&self) -> &str {
        match self {
            NodeKind::Entity => "entity",
            NodeKind::Fact => "fact",
            NodeKind::Category => "category",
            NodeKind::Quote => "quote",
            NodeKind::Image => "image",
            NodeKind::Error => "error",
            NodeKind::Other(value) => value,
        }
    }

    pub fn from_label(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "entity" => NodeKind::Entity,
            "fact" => NodeKind::Fact,
            "category" => NodeKind::Category,
            "quote" => NodeKind::Quote,
            "image" => NodeKind::Image,
            "error" => NodeKind::Error,
            _ => NodeKind::Other(value.trim().to_string()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl From<String> for NodeKind {
    fn from(value: String) -> Self {
        NodeKind::from_label(&value)
    }
}

impl From<NodeKind> for String {
    fn from(value: NodeKind) -> Self {
        value.as_str().to_string()
    }
}

/// One concept and its sub-concepts. The wire name of `kind` is `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptNode {
    pub title: String,
    #[serde(rename = "type", alias = "kind")]
    pub kind: NodeKind,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub media: Option<String>,
    #[serde(default)]
    pub preview: Option<Vec<String>>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub children: Option<Vec<ConceptNode>>,
}

impl ConceptNode {
    pub fn new(title: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            title: title.into(),
            kind,
            value: None,
            media: None,
            preview: None,
            action: None,
            children: None,
        }
    }

    /// The canonical error node returned whenever no valid tree can be produced.
    pub fn error(fallback_title: impl Into<String>) -> Self {
        Self {
            value: Some(ERROR_NODE_VALUE.to_string()),
            children: Some(Vec::new()),
            ..Self::new(fallback_title, NodeKind::Error)
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NodeKind::Error
    }

    /// Checks `title` and `kind` on this node and every descendant.
    pub fn is_valid(&self) -> bool {
        let mut pending = vec![self];
        while let Some(node) = pending.pop() {
            if node.title.trim().is_empty() || node.kind.is_empty() {
                return false;
            }
            if let Some(children) = &node.children {
                pending.extend(children.iter());
            }
        }
        true
    }

    pub fn children(&self) -> &[ConceptNode] {
        self.children.as_deref().unwrap_or(&[])
    }

    pub fn has_value(&self) -> bool {
        is_present(self.value.as_deref())
    }

    pub fn has_media(&self) -> bool {
        is_present(self.media.as_deref())
    }
}

fn is_present(field: Option<&str>) -> bool {
    field.is_some_and(|v| !v.trim().is_empty())
}

/// Short factual summary for a title, as returned by the lookup service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactualSummary {
    pub extract: Option<String>,
    pub thumbnail_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConceptRequest {
    pub keyword: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default, alias = "parentContext")]
    pub parent_context: Option<String>,
}

impl ConceptRequest {
    pub fn new(keyword: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            language: default_language(),
            parent_context: None,
        }
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_parent_context(mut self, parent: impl Into<String>) -> Self {
        self.parent_context = Some(parent.into());
        self
    }
}

/// Query parameters accepted by the path-style concept route.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConceptQuery {
    pub language: Option<String>,
    #[serde(alias = "parentContext")]
    pub parent_context: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

fn default_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}
