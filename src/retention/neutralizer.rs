use crate::config::RetentionConfig;
use crate::constants::retention::{DEFAULT_SAFE_METADATA_KEYS, NEUTRALIZED_ENTITY_PREFIX};
use crate::models::{Metadata, ProcessRun};
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NeutralizationOutcome {
    Neutralized,
    AlreadyNeutralized,
}

/// Strips personal data from runs while keeping their statistical shape
///
/// Neutralization is one-way and idempotent. The entity id becomes a stable
/// placeholder derived from the run id, the entity name is cleared, and every
/// metadata value outside the allow-list is replaced by a placeholder of the
/// same type. The metadata key set never changes.
#[derive(Debug, Clone)]
pub struct Neutralizer {
    safe_keys: BTreeSet<String>,
}

impl Default for Neutralizer {
    fn default() -> Self {
        Self::with_safe_keys(DEFAULT_SAFE_METADATA_KEYS.iter().copied())
    }
}

impl Neutralizer {
    pub fn with_safe_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            safe_keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn from_config(config: &RetentionConfig) -> Self {
        Self::with_safe_keys(config.safe_metadata_keys.iter().cloned())
    }

    pub fn is_safe_key(&self, key: &str) -> bool {
        self.safe_keys.contains(key)
    }

    pub fn placeholder_entity_id(run_id: i64) -> String {
        format!("{NEUTRALIZED_ENTITY_PREFIX}{run_id}")
    }

    pub fn neutralize_metadata(&self, meta: &Metadata) -> Metadata {
        meta.iter()
            .map(|(key, value)| {
                let kept = if self.is_safe_key(key) {
                    value.clone()
                } else {
                    value.redacted()
                };
                (key.clone(), kept)
            })
            .collect()
    }

    /// Neutralize the run in place; an already neutralized run is left untouched
    pub fn neutralize(&self, run: &mut ProcessRun, now: DateTime<Utc>) -> NeutralizationOutcome {
        if run.is_neutralized {
            return NeutralizationOutcome::AlreadyNeutralized;
        }

        run.entity_id = Self::placeholder_entity_id(run.id);
        run.entity_name = None;
        run.meta = self.neutralize_metadata(&run.meta);
        run.is_neutralized = true;
        run.updated_at = now;

        debug!(
            run_id = run.id,
            meta_keys = run.meta.len(),
            "Run personal data neutralized"
        );

        NeutralizationOutcome::Neutralized
    }
}
