//! Hide and highlight filters.
//!
//! Both filters match records by layer name and identity value (see
//! [`crate::identity`]). Records of unnamed single-layer sources carry no
//! layer name and never match.

use std::collections::BTreeSet;

use indexmap::IndexMap;
use serde::Deserialize;

/// Regions to drop, per layer.
///
/// Inactive when disabled or when every region set is empty.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HideFilter {
    enabled: bool,
    regions: IndexMap<String, BTreeSet<String>>,
}

impl Default for HideFilter {
    fn default() -> Self {
        Self {
            enabled: true,
            regions: IndexMap::new(),
        }
    }
}

impl HideFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds names to hide for `layer`.
    pub fn with_regions<I, S>(mut self, layer: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.regions
            .entry(layer.into())
            .or_default()
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_active(&self) -> bool {
        self.enabled && self.regions.values().any(|names| !names.is_empty())
    }

    /// Names hidden in `layer`, if the filter is active and mentions it.
    pub fn regions_for(&self, layer: Option<&str>) -> Option<&BTreeSet<String>> {
        if !self.is_active() {
            return None;
        }
        layer
            .and_then(|layer| self.regions.get(layer))
            .filter(|names| !names.is_empty())
    }

    /// Returns `true` if a record of `layer` with identity `value` is hidden.
    pub fn hides(&self, layer: Option<&str>, value: &str) -> bool {
        self.regions_for(layer)
            .is_some_and(|names| names.contains(value))
    }
}

/// Regions of a single layer to mark as highlighted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct HighlightFilter {
    enabled: bool,
    layer: Option<String>,
    names: BTreeSet<String>,
}

impl Default for HighlightFilter {
    fn default() -> Self {
        Self {
            enabled: true,
            layer: None,
            names: BTreeSet::new(),
        }
    }
}

impl HighlightFilter {
    /// A highlight of `names` in `layer`.
    pub fn new<I, S>(layer: impl Into<String>, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: true,
            layer: Some(layer.into()),
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn layer(&self) -> Option<&str> {
        self.layer.as_deref()
    }

    pub fn names(&self) -> &BTreeSet<String> {
        &self.names
    }

    pub fn is_active(&self) -> bool {
        self.enabled && self.layer.is_some() && !self.names.is_empty()
    }

    /// Returns `true` if a record of `layer` with identity `value` is highlighted.
    pub fn marks(&self, layer: Option<&str>, value: &str) -> bool {
        self.is_active()
            && layer.is_some()
            && layer == self.layer.as_deref()
            && self.names.contains(value)
    }
}
