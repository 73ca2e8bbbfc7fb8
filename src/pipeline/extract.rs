//! Query → candidate entity mentions.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::generator::{GenerationRequest, Generator, GeneratorError};
use crate::storage::GraphStore;
use super::Pipeline;

/// Turns a free-text query into an ordered list of entity mentions.
///
/// Asks the generator for a JSON array first. Any generator failure or an
/// unusable reply falls back to scanning the store for names contained in
/// the query, and finally to the query itself, so the result is never empty.
pub struct EntityExtractor<'a, S, G> {
    pipeline: &'a Pipeline<S, G>,
}

impl<'a, S: GraphStore, G: Generator> EntityExtractor<'a, S, G> {
    pub(super) fn new(pipeline: &'a Pipeline<S, G>) -> Self {
        Self { pipeline }
    }

    pub async fn extract(&self, query: &str) -> Vec<String> {
        let started = Instant::now();

        match self.ask_generator(query).await {
            Ok(entities) if !entities.is_empty() => {
                info!(
                    stage = "extract",
                    source = "generator",
                    entities = entities.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "entities extracted"
                );
                return entities;
            }
            Ok(_) => debug!(stage = "extract", "generator returned no entities"),
            Err(e) => warn!(stage = "extract", error = %e, "generator extraction failed, scanning store"),
        }

        let mut entities = self.scan_store(query).await;
        let source = if entities.is_empty() {
            entities.push(query.to_string());
            "query"
        } else {
            "store"
        };
        info!(
            stage = "extract",
            source,
            entities = entities.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "entities extracted"
        );
        entities
    }

    async fn ask_generator(&self, query: &str) -> Result<Vec<String>, GeneratorError> {
        let settings = self.pipeline.settings();
        let prompt = format!(
            "Extract the key entity names (for example diseases, symptoms, treatments, \
             drugs or examinations) from the question below.\n\
             Reply with a JSON array of strings only, such as [\"entity 1\", \"entity 2\"].\n\n\
             Question: {query}"
        );
        let request = GenerationRequest::new(
            prompt,
            settings.extraction_max_tokens,
            settings.extraction_temperature,
        );
        let reply = self.pipeline.generator().generate(&request).await?;
        parse_entity_list(&reply)
    }

    /// Stored names that occur in the query, capped.
    async fn scan_store(&self, query: &str) -> Vec<String> {
        let Some(session) = self.pipeline.session("extract").await else {
            return Vec::new();
        };
        let names = match self.pipeline.store().node_names(&session).await {
            Ok(names) => names,
            Err(e) => {
                warn!(stage = "extract", error = %e, "store name scan failed");
                return Vec::new();
            }
        };
        let matcher = self.pipeline.matcher();
        names
            .into_iter()
            .filter(|name| matcher.matches(query, name))
            .take(self.pipeline.settings().fallback_entity_limit)
            .collect()
    }
}

/// Parse a generator reply into entity names.
///
/// Code fences are stripped first. Non-string items, blanks and repeats are
/// dropped; anything other than a JSON array is malformed.
pub fn parse_entity_list(reply: &str) -> Result<Vec<String>, GeneratorError> {
    let body = strip_code_fences(reply);
    let items: Vec<serde_json::Value> = serde_json::from_str(body)
        .map_err(|e| GeneratorError::Malformed(format!("expected a JSON array of names: {e}")))?;

    let mut seen = HashSet::new();
    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            serde_json::Value::String(s) => Some(s.trim().to_string()),
            _ => None,
        })
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect())
}

fn strip_code_fences(reply: &str) -> &str {
    let mut body = reply.trim();
    if let Some(rest) = body.strip_prefix("```") {
        // Drop the info string (`json`) up to the first newline.
        body = match rest.find('\n') {
            Some(pos) => &rest[pos + 1..],
            None => rest.trim_start_matches("json"),
        };
    }
    body.trim().trim_end_matches("```").trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_plain_array() {
        assert_eq!(parse_entity_list(r#"["高血压", "头痛"]"#).unwrap(), vec!["高血压", "头痛"]);
    }

    #[test]
    fn test_parse_fenced_array() {
        let reply = "```json\n[\"diabetes\", \"insulin\"]\n```";
        assert_eq!(parse_entity_list(reply).unwrap(), vec!["diabetes", "insulin"]);
        assert_eq!(parse_entity_list("```[\"a\"]```").unwrap(), vec!["a"]);
    }

    #[test]
    fn test_parse_drops_blanks_and_repeats() {
        let parsed = parse_entity_list(r#"["a", " ", "a", 3, "b "]"#).unwrap();
        assert_eq!(parsed, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_rejects_non_arrays() {
        assert!(parse_entity_list("the entities are a and b").is_err());
        assert!(parse_entity_list(r#"{"entities": ["a"]}"#).is_err());
    }
}
