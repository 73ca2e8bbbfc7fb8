//! Retrieval tuning knobs.

use serde::{Deserialize, Serialize};

use crate::matching::MatcherKind;
use crate::storage::HopBound;
use crate::{Error, Result};

/// Which node names the answer validator looks for in an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityScope {
    /// Every name in the store; names outside the subgraph count as invalid.
    #[default]
    Store,
    /// Only names in the subgraph; nothing can be invalid.
    Subgraph,
}

/// Every tunable of the pipeline. Defaults suit a small clinical graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetrievalSettings {
    pub max_depth: usize,
    pub top_k: usize,
    pub sample_top_k: usize,
    pub num_samples: usize,
    pub concurrent_samples: bool,
    pub max_hops: usize,
    pub reasoning_path_limit: usize,
    pub significant_relations: Vec<String>,
    pub matches_per_entity: usize,
    pub fallback_entity_limit: usize,
    pub max_nodes_per_type: usize,
    pub max_context_paths: usize,
    pub max_allowed_relations: usize,
    pub fallback_nodes: usize,
    pub fallback_paths: usize,
    pub extraction_max_tokens: u32,
    pub extraction_temperature: f32,
    pub answer_max_tokens: u32,
    pub answer_temperature: f32,
    pub entity_scope: EntityScope,
    pub matcher: MatcherKind,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            max_depth: 2,
            top_k: 10,
            sample_top_k: 8,
            num_samples: 3,
            concurrent_samples: true,
            max_hops: 3,
            reasoning_path_limit: 10,
            significant_relations: vec![
                "需要治疗".to_string(),
                "使用药物".to_string(),
                "需要检查".to_string(),
            ],
            matches_per_entity: 5,
            fallback_entity_limit: 10,
            max_nodes_per_type: 8,
            max_context_paths: 10,
            max_allowed_relations: 20,
            fallback_nodes: 5,
            fallback_paths: 3,
            extraction_max_tokens: 200,
            extraction_temperature: 0.0,
            answer_max_tokens: 800,
            answer_temperature: 0.1,
            entity_scope: EntityScope::Store,
            matcher: MatcherKind::Substring,
        }
    }
}

impl RetrievalSettings {
    pub fn validate(&self) -> Result<()> {
        let counts = [
            ("num_samples", self.num_samples),
            ("top_k", self.top_k),
            ("sample_top_k", self.sample_top_k),
            ("matches_per_entity", self.matches_per_entity),
        ];
        for (field, value) in counts {
            if value == 0 {
                return Err(Error::Config(format!("retrieval.{field} must be at least 1")));
            }
        }
        HopBound::new(self.max_depth)
            .map_err(|e| Error::Config(format!("retrieval.max_depth: {e}")))?;
        HopBound::new(self.max_hops)
            .map_err(|e| Error::Config(format!("retrieval.max_hops: {e}")))?;
        for (field, value) in [
            ("extraction_temperature", self.extraction_temperature),
            ("answer_temperature", self.answer_temperature),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("retrieval.{field} must be within [0, 1]")));
            }
        }
        Ok(())
    }

    /// Expansion bound for plain retrieval. Callers validate first; out of
    /// range values are clamped.
    pub fn depth(&self) -> HopBound {
        HopBound::clamped(self.max_depth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RetrievalSettings::default().validate().is_ok());
    }

    #[test]
    fn test_zero_samples_rejected() {
        let settings = RetrievalSettings { num_samples: 0, ..Default::default() };
        assert!(matches!(settings.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_depth_out_of_range_rejected() {
        let settings = RetrievalSettings { max_depth: HopBound::MAX + 1, ..Default::default() };
        assert!(settings.validate().is_err());
        let settings = RetrievalSettings { max_hops: 0, ..Default::default() };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let settings: RetrievalSettings = toml::from_str("num_samples = 5\nmatcher = \"normalized\"").unwrap();
        assert_eq!(settings.num_samples, 5);
        assert_eq!(settings.matcher, MatcherKind::Normalized);
        assert_eq!(settings.top_k, 10);
    }
}
