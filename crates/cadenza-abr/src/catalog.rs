use std::collections::HashSet;

use crate::{Variant, VariantId};

/// The currently offered renditions, kept in ascending bandwidth order.
#[derive(Clone, Debug, Default)]
pub struct VariantCatalog {
    variants: Vec<Variant>,
}

impl VariantCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the catalog with the video-bearing entries of `list`.
    ///
    /// Returns `true` if the resulting set differs from the previous one.
    pub fn set_variants(&mut self, list: impl IntoIterator<Item = Variant>) -> bool {
        let mut seen = HashSet::new();
        let mut next: Vec<Variant> = list
            .into_iter()
            .filter(|v| v.has_video && seen.insert(v.id))
            .collect();
        next.sort_by_key(|v| (v.bandwidth_bps, v.height, v.id));

        let changed = next != self.variants;
        self.variants = next;
        changed
    }

    /// Variants in ascending bandwidth order.
    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn iter(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter()
    }

    pub fn get(&self, id: VariantId) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    pub fn contains(&self, id: VariantId) -> bool {
        self.get(id).is_some()
    }

    pub fn lowest(&self) -> Option<&Variant> {
        self.variants.first()
    }

    pub fn highest(&self) -> Option<&Variant> {
        self.variants.last()
    }

    pub fn len(&self) -> usize {
        self.variants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variants.is_empty()
    }

    pub fn clear(&mut self) {
        self.variants.clear();
    }
}
