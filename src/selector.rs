use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

use crate::catalog::{Catalog, CatalogEntry, Category};
use crate::records::ClipKey;

/// Category-weighted selection policy. `study` is the probability that a
/// selection round tries the study pool first; the remainder goes to relax.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeights {
    pub study: f64,
}

impl CategoryWeights {
    pub fn new(study: f64) -> Self {
        Self {
            study: study.clamp(0.0, 1.0),
        }
    }
}

impl Default for CategoryWeights {
    fn default() -> Self {
        Self { study: 0.8 }
    }
}

/// Picks the next clip to show from the catalog under the weighted category
/// policy, skipping memorized ranges.
#[derive(Debug, Clone)]
pub struct ClipSelector {
    weights: CategoryWeights,
}

impl ClipSelector {
    pub fn new(weights: CategoryWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> CategoryWeights {
        self.weights
    }

    pub fn set_weights(&mut self, weights: CategoryWeights) {
        self.weights = weights;
    }

    /// Select one eligible entry, or `None` once every range in the catalog
    /// is memorized. Eligibility: the entry's identity key has no memorized
    /// record (no record at all counts as eligible). Tie-breaks within a
    /// category are uniform-random, never first-match.
    pub fn select_next<'a, R: Rng>(
        &self,
        catalog: &'a Catalog,
        memorized: &HashSet<ClipKey>,
        rng: &mut R,
    ) -> Option<&'a CatalogEntry> {
        let mut study: Vec<&CatalogEntry> = Vec::new();
        let mut relax: Vec<&CatalogEntry> = Vec::new();
        for entry in catalog.entries() {
            if memorized.contains(&entry.key()) {
                continue;
            }
            match entry.category {
                Category::Study => study.push(entry),
                Category::Relax => relax.push(entry),
            }
        }

        let r: f64 = rng.gen();
        let pool = if r < self.weights.study && !study.is_empty() {
            &study
        } else if !relax.is_empty() {
            &relax
        } else if !study.is_empty() {
            &study
        } else {
            debug!("Selection exhausted: every range is memorized");
            return None;
        };

        let chosen = pool[rng.gen_range(0..pool.len())];
        if memorized.contains(&chosen.key()) {
            // Snapshot raced with a memorize action; scan for the first
            // still-eligible entry, study before relax
            return Self::scan_fallback(catalog, memorized);
        }
        Some(chosen)
    }

    fn scan_fallback<'a>(
        catalog: &'a Catalog,
        memorized: &HashSet<ClipKey>,
    ) -> Option<&'a CatalogEntry> {
        for category in [Category::Study, Category::Relax] {
            let found = catalog
                .entries()
                .iter()
                .find(|e| e.category == category && !memorized.contains(&e.key()));
            if found.is_some() {
                return found;
            }
        }
        None
    }
}
