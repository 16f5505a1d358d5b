use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::models::DEFAULT_LANGUAGE;

const KEYWORD: &str = "{keyword}";
const PARENT: &str = "{parent}";

const EN_TEMPLATE: &str = r#"Create a brief outline of the key ideas related to the concept "{keyword}".

Organize your answer as a list of subtopics. Each subtopic should include:
- a short title
- a type (one of: entity, fact, category, quote, image)
- a short description
- (optional) an image URL if relevant

Format the result as a single valid JSON object with the fields:
- "title"
- "type"
- "value"
- "media" (optional)
- "children": an array of up to 5 related subtopics with the same fields

Do not include explanations outside of the JSON. Just the JSON object."#;

const EN_CONTEXT: &str =
    r#"Interpret "{keyword}" in the context of "{parent}" and keep every subtopic relevant to that context."#;

const ES_TEMPLATE: &str = r#"Crea un breve esquema de las ideas clave relacionadas con el concepto "{keyword}".

Organiza la respuesta como una lista de subtemas. Cada subtema debe incluir:
- un título corto
- un tipo (uno de: entity, fact, category, quote, image)
- una breve descripción
- (opcional) una URL de imagen si es relevante

Devuelve el resultado como un único objeto JSON válido con los campos:
- "title"
- "type"
- "value"
- "media" (opcional)
- "children": un arreglo con hasta 5 subtemas relacionados con los mismos campos

No incluyas explicaciones fuera del JSON. Solo el objeto JSON."#;

const ES_CONTEXT: &str =
    r#"Interpreta "{keyword}" en el contexto de "{parent}" y mantén todos los subtemas relevantes para ese contexto."#;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PromptTemplate {
    pub template: String,
    #[serde(default)]
    pub context_clause: Option<String>,
}

/// Language code to prompt template. Always holds an `en` entry.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    templates: HashMap<String, PromptTemplate>,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        let mut templates = HashMap::new();
        templates.insert(
            "en".to_string(),
            PromptTemplate {
                template: EN_TEMPLATE.to_string(),
                context_clause: Some(EN_CONTEXT.to_string()),
            },
        );
        templates.insert(
            "es".to_string(),
            PromptTemplate {
                template: ES_TEMPLATE.to_string(),
                context_clause: Some(ES_CONTEXT.to_string()),
            },
        );
        Self { templates }
    }
}

impl PromptTemplates {
    /// Built-in templates, overlaid with entries from `path` when given.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut templates = Self::default();
        if let Some(path) = path {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed reading prompt templates: {}", path.display()))?;
            let overrides: HashMap<String, PromptTemplate> = serde_json::from_str(&raw)
                .with_context(|| format!("invalid prompt templates file: {}", path.display()))?;
            tracing::info!(
                "loaded {} prompt template(s) from {}",
                overrides.len(),
                path.display()
            );
            templates.merge(overrides);
        }
        Ok(templates)
    }

    pub fn merge(&mut self, overrides: HashMap<String, PromptTemplate>) {
        for (language, template) in overrides {
            self.templates.insert(language_key(&language), template);
        }
    }

    pub fn languages(&self) -> Vec<&str> {
        let mut languages: Vec<&str> = self.templates.keys().map(String::as_str).collect();
        languages.sort_unstable();
        languages
    }

    /// Template for `language`, falling back to `en`.
    pub fn get(&self, language: &str) -> Option<&PromptTemplate> {
        self.templates
            .get(&language_key(language))
            .or_else(|| self.templates.get(DEFAULT_LANGUAGE))
    }

    pub fn render(&self, language: &str, keyword: &str, parent_context: Option<&str>) -> String {
        let Some(template) = self.get(language) else {
            return keyword.to_string();
        };

        let mut prompt = template.template.replace(KEYWORD, keyword);
        let parent = parent_context.map(str::trim).filter(|p| !p.is_empty());
        if let (Some(parent), Some(clause)) = (parent, template.context_clause.as_deref()) {
            prompt.push_str("\n\n");
            prompt.push_str(&clause.replace(KEYWORD, keyword).replace(PARENT, parent));
        }
        prompt
    }
}

fn language_key(language: &str) -> String {
    language.trim().to_ascii_lowercase()
}
