//! The immutable dataset catalog: which sources exist, which metrics they
//! publish, how region names expand to location codes, which event files
//! each source declares, and which reference documents can be quoted.
//!
//! Loaded once at process start and shared read-only for the process
//! lifetime; nothing here mutates after `load`.

mod error;
mod reference;
mod types;

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;

pub use error::{CatalogError, Result};
pub use reference::{score_references, ScoredSnippet};
pub use types::{
    DenominatorDef, EventFamily, EventFileDef, LocationEntry, LocationLevel, ReferenceDoc,
    SourceDef,
};

#[derive(Debug, Default, Deserialize)]
struct RawCatalog {
    #[serde(default)]
    sources: BTreeMap<String, SourceDef>,
    #[serde(default)]
    locations: Vec<LocationEntry>,
    #[serde(default)]
    regions: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    denominators: BTreeMap<String, DenominatorDef>,
    #[serde(default)]
    reference: Vec<ReferenceDoc>,
}

#[derive(Debug)]
pub struct Catalog {
    sources: BTreeMap<String, SourceDef>,
    locations: Vec<LocationEntry>,
    /// Region name (lowercased) -> member location codes.
    regions: BTreeMap<String, Vec<String>>,
    denominators: BTreeMap<String, DenominatorDef>,
    reference: Vec<ReferenceDoc>,
    /// Every code the catalog knows about, for pass-through resolution.
    codes: BTreeSet<String>,
}

impl Catalog {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let raw: RawCatalog = toml::from_str(raw)?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: RawCatalog) -> Result<Self> {
        for entry in &raw.locations {
            if entry.code.trim().is_empty() {
                return Err(CatalogError::EmptyLocationCode {
                    name: entry.name.clone(),
                });
            }
        }
        for (region, codes) in &raw.regions {
            if codes.is_empty() {
                return Err(CatalogError::EmptyRegion {
                    region: region.clone(),
                });
            }
        }
        for (name, def) in &raw.denominators {
            let source = raw.sources.get(&def.source_id).ok_or_else(|| {
                CatalogError::UnknownDenominatorSource {
                    name: name.clone(),
                    source_id: def.source_id.clone(),
                }
            })?;
            if !source.has_metric(&def.metric) {
                return Err(CatalogError::UnknownDenominatorMetric {
                    name: name.clone(),
                    source_id: def.source_id.clone(),
                    metric: def.metric.clone(),
                });
            }
        }

        let mut codes: BTreeSet<String> = raw.locations.iter().map(|l| l.code.clone()).collect();
        for members in raw.regions.values() {
            codes.extend(members.iter().cloned());
        }
        let regions = raw
            .regions
            .into_iter()
            .map(|(name, members)| (name.to_lowercase(), members))
            .collect();

        log::debug!(
            "catalog loaded: {} sources, {} locations, {} codes",
            raw.sources.len(),
            raw.locations.len(),
            codes.len()
        );

        Ok(Self {
            sources: raw.sources,
            locations: raw.locations,
            regions,
            denominators: raw.denominators,
            reference: raw.reference,
            codes,
        })
    }

    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    pub fn source(&self, source_id: &str) -> Option<&SourceDef> {
        self.sources.get(source_id)
    }

    pub fn sources(&self) -> impl Iterator<Item = (&String, &SourceDef)> {
        self.sources.iter()
    }

    pub fn has_metric(&self, source_id: &str, metric: &str) -> bool {
        self.source(source_id)
            .map(|s| s.has_metric(metric))
            .unwrap_or(false)
    }

    pub fn locations(&self) -> &[LocationEntry] {
        &self.locations
    }

    pub fn is_known_code(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    /// Member codes for a known region name, case-insensitive.
    pub fn expand_region(&self, name: &str) -> Option<&[String]> {
        self.regions
            .get(&name.to_lowercase())
            .map(Vec::as_slice)
    }

    pub fn region_names(&self) -> impl Iterator<Item = &String> {
        self.regions.keys()
    }

    /// Resolve a region name or explicit code to location codes. Known
    /// region names expand to their members; a known code passes through
    /// unchanged, so resolving a prior resolution is a no-op.
    pub fn resolve(&self, region_or_code: &str) -> Vec<String> {
        if let Some(codes) = self.expand_region(region_or_code) {
            return codes.to_vec();
        }
        if self.codes.contains(region_or_code) {
            return vec![region_or_code.to_string()];
        }
        Vec::new()
    }

    /// Resolve a mixed list of region names and codes, deduplicated with
    /// first-seen order preserved.
    pub fn resolve_all(&self, inputs: &[String]) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for input in inputs {
            for code in self.resolve(input) {
                if seen.insert(code.clone()) {
                    out.push(code);
                }
            }
        }
        out
    }

    pub fn event_file(&self, source_id: &str, key: &str) -> Option<&EventFileDef> {
        self.source(source_id).and_then(|s| s.events.get(key))
    }

    /// The authoritative source for a logical denominator (population, area).
    pub fn denominator(&self, name: &str) -> Option<&DenominatorDef> {
        self.denominators.get(name)
    }

    pub fn reference_docs(&self) -> &[ReferenceDoc] {
        &self.reference
    }

    pub fn reference_snippets(&self, query: &str, limit: usize) -> Vec<ScoredSnippet<'_>> {
        score_references(&self.reference, query, limit)
    }
}

/// Programmatic catalog construction, used by tests and demo setups.
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    raw: RawCatalog,
}

impl CatalogBuilder {
    #[must_use]
    pub fn source(mut self, id: impl Into<String>, def: SourceDef) -> Self {
        self.raw.sources.insert(id.into(), def);
        self
    }

    #[must_use]
    pub fn location(mut self, entry: LocationEntry) -> Self {
        self.raw.locations.push(entry);
        self
    }

    #[must_use]
    pub fn region(mut self, name: impl Into<String>, codes: Vec<String>) -> Self {
        self.raw.regions.insert(name.into(), codes);
        self
    }

    #[must_use]
    pub fn denominator(
        mut self,
        name: impl Into<String>,
        source_id: impl Into<String>,
        metric: impl Into<String>,
    ) -> Self {
        self.raw.denominators.insert(
            name.into(),
            DenominatorDef {
                source_id: source_id.into(),
                metric: metric.into(),
            },
        );
        self
    }

    #[must_use]
    pub fn reference(mut self, doc: ReferenceDoc) -> Self {
        self.raw.reference.push(doc);
        self
    }

    pub fn build(self) -> Result<Catalog> {
        Catalog::from_raw(self.raw)
    }
}
