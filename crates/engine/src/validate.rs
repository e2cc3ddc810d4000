//! Order validation and derived-field expansion. Failures attach to the
//! individual item; the order as a whole always comes back, and execution
//! simply skips what did not validate.

use std::collections::BTreeMap;

use geolens_catalog::Catalog;
use geolens_protocol::{
    DerivedShorthand, DerivedSpec, ExecutionMode, FilterRange, MetricRef, OrderItem, RawOrder,
    RawOrderItem,
};

/// Event file key assumed when an events-mode item names none.
pub const DEFAULT_EVENT_FILE: &str = "events";

#[derive(Debug, Clone, Default)]
pub struct ValidatedOrder {
    pub items: Vec<OrderItem>,
    pub derived: Vec<DerivedSpec>,
    pub warnings: Vec<String>,
}

impl ValidatedOrder {
    pub fn has_valid_items(&self) -> bool {
        self.items.iter().any(|i| i.valid)
    }

    /// Rebuild a raw order from the validated one. Feeding this back
    /// through `validate_and_expand` yields the same item/spec set.
    pub fn to_raw(&self) -> RawOrder {
        let items = self
            .items
            .iter()
            .map(|item| RawOrderItem {
                source_id: item.source_id.clone(),
                metric: item.metric.clone(),
                region: item.region.clone(),
                location_codes: item.location_codes.clone(),
                time: Some(item.time),
                mode: Some(item.mode),
                event_file: item.event_file.clone(),
                filters: denormalize_filters(&item.filters),
                limit: item.limit,
                derived: None,
                for_derivation: item.for_derivation,
            })
            .collect();
        RawOrder {
            items,
            derived: self.derived.clone(),
        }
    }
}

pub fn validate_and_expand(raw: &RawOrder, catalog: &Catalog) -> ValidatedOrder {
    let mut warnings = Vec::new();

    let mut items: Vec<OrderItem> = raw
        .items
        .iter()
        .map(|item| validate_item(item, catalog, &mut warnings))
        .collect();

    // Shorthand flags expand into a hidden denominator sibling plus a spec.
    let mut specs: Vec<DerivedSpec> = Vec::new();
    for (idx, raw_item) in raw.items.iter().enumerate() {
        let Some(shorthand) = raw_item.derived else {
            continue;
        };
        if !items[idx].valid {
            continue;
        }
        expand_shorthand(raw_item, shorthand, catalog, &mut items, &mut specs, &mut warnings);
    }

    // Explicit specs are validated against the expanded item list.
    for spec in &raw.derived {
        match validate_spec(spec, &items, catalog) {
            Ok(()) => specs.push(spec.clone()),
            Err(reason) => {
                warnings.push(format!("derived spec '{}' dropped: {reason}", spec.label))
            }
        }
    }

    dedupe_items(&mut items);
    dedupe_specs(&mut specs);

    log::debug!(
        "validated order: {}/{} items valid, {} derived specs, {} warnings",
        items.iter().filter(|i| i.valid).count(),
        items.len(),
        specs.len(),
        warnings.len()
    );

    ValidatedOrder {
        items,
        derived: specs,
        warnings,
    }
}

fn validate_item(raw: &RawOrderItem, catalog: &Catalog, warnings: &mut Vec<String>) -> OrderItem {
    let mut item = OrderItem {
        source_id: raw.source_id.clone(),
        metric: raw.metric.clone(),
        region: raw.region.clone(),
        location_codes: raw.location_codes.clone(),
        time: raw.time.unwrap_or_default(),
        mode: raw.mode.unwrap_or_default(),
        event_file: raw.event_file.clone(),
        filters: normalize_filters(&raw.filters, warnings),
        limit: raw.limit,
        for_derivation: raw.for_derivation,
        valid: true,
        error: None,
    };

    if catalog.source(&item.source_id).is_none() {
        return invalidate(item, format!("unknown source '{}'", raw.source_id));
    }
    match item.mode {
        ExecutionMode::Aggregate => {
            if !catalog.has_metric(&item.source_id, &item.metric) {
                return invalidate(
                    item,
                    format!(
                        "unknown metric '{}' on source '{}'",
                        raw.metric, raw.source_id
                    ),
                );
            }
        }
        ExecutionMode::Events => {
            let key = item
                .event_file
                .clone()
                .unwrap_or_else(|| DEFAULT_EVENT_FILE.to_string());
            if catalog.event_file(&item.source_id, &key).is_none() {
                return invalidate(
                    item,
                    format!("unknown event file '{key}' on source '{}'", raw.source_id),
                );
            }
            item.event_file = Some(key);
        }
    }
    if let Some(region) = item.region.clone() {
        if catalog.resolve(&region).is_empty() && item.location_codes.is_empty() {
            return invalidate(item, format!("unknown region '{region}'"));
        }
    }
    item
}

fn invalidate(mut item: OrderItem, reason: String) -> OrderItem {
    item.valid = false;
    item.error = Some(reason);
    item
}

/// Expand an item's region and explicit codes into concrete location codes.
pub(crate) fn resolve_item_codes(catalog: &Catalog, item: &OrderItem) -> Vec<String> {
    let mut inputs = Vec::new();
    if let Some(region) = &item.region {
        inputs.push(region.clone());
    }
    inputs.extend(item.location_codes.iter().cloned());
    catalog.resolve_all(&inputs)
}

fn expand_shorthand(
    raw_item: &RawOrderItem,
    shorthand: DerivedShorthand,
    catalog: &Catalog,
    items: &mut Vec<OrderItem>,
    specs: &mut Vec<DerivedSpec>,
    warnings: &mut Vec<String>,
) {
    let denominator_name = match shorthand {
        DerivedShorthand::PerCapita => "population",
        DerivedShorthand::PerArea => "area",
    };

    // Same-source shorthand resolves against the sibling's own source;
    // otherwise the canonical denominator source makes it cross-source.
    let (numerator, denominator, sibling_source) =
        if catalog.has_metric(&raw_item.source_id, denominator_name) {
            (
                MetricRef::bare(&raw_item.metric),
                MetricRef::bare(denominator_name),
                Some((raw_item.source_id.clone(), denominator_name.to_string())),
            )
        } else if let Some(def) = catalog.denominator(denominator_name) {
            (
                MetricRef::qualified(&raw_item.source_id, &raw_item.metric),
                MetricRef::qualified(&def.source_id, &def.metric),
                Some((def.source_id.clone(), def.metric.clone())),
            )
        } else {
            warnings.push(format!(
                "no canonical source for denominator '{denominator_name}'"
            ));
            (
                MetricRef::bare(&raw_item.metric),
                MetricRef::bare(denominator_name),
                None,
            )
        };

    if let Some((source_id, metric)) = sibling_source {
        let sibling = OrderItem {
            source_id,
            metric,
            region: raw_item.region.clone(),
            location_codes: raw_item.location_codes.clone(),
            time: raw_item.time.unwrap_or_default(),
            mode: ExecutionMode::Aggregate,
            event_file: None,
            filters: BTreeMap::new(),
            limit: None,
            for_derivation: true,
            valid: true,
            error: None,
        };
        if !items
            .iter()
            .any(|i| i.identity_key() == sibling.identity_key())
        {
            items.push(sibling);
        }
    }

    specs.push(DerivedSpec {
        numerator,
        denominator,
        multiplier: None,
        label: shorthand_label(&raw_item.metric, shorthand),
    });
}

fn validate_spec(
    spec: &DerivedSpec,
    items: &[OrderItem],
    catalog: &Catalog,
) -> std::result::Result<(), String> {
    for (role, mref) in [
        ("numerator", &spec.numerator),
        ("denominator", &spec.denominator),
    ] {
        match mref {
            MetricRef::Qualified { source_id, metric } => {
                if !catalog.has_metric(source_id, metric) {
                    return Err(format!("{role} '{source_id}:{metric}' is not in the catalog"));
                }
            }
            MetricRef::Metric(name) => {
                let matching = items
                    .iter()
                    .filter(|i| i.valid && i.metric == *name)
                    .count();
                match matching {
                    1 => {}
                    0 if catalog.denominator(name).is_some() => {}
                    0 => {
                        return Err(format!(
                            "{role} '{name}' resolves to no item and no canonical source"
                        ))
                    }
                    n => return Err(format!("{role} '{name}' is ambiguous across {n} items")),
                }
            }
        }
    }
    Ok(())
}

/// Collapse items with identical (source, metric, target, time). A visible
/// duplicate wins over a derivation-only one.
fn dedupe_items(items: &mut Vec<OrderItem>) {
    let mut seen: BTreeMap<String, usize> = BTreeMap::new();
    let mut out: Vec<OrderItem> = Vec::with_capacity(items.len());
    for item in items.drain(..) {
        let key = item.identity_key();
        match seen.get(&key) {
            Some(&kept) => {
                if !item.for_derivation {
                    out[kept].for_derivation = false;
                }
            }
            None => {
                seen.insert(key, out.len());
                out.push(item);
            }
        }
    }
    *items = out;
}

fn dedupe_specs(specs: &mut Vec<DerivedSpec>) {
    let mut seen = std::collections::BTreeSet::new();
    specs.retain(|spec| seen.insert(spec.canonical_key()));
}

/// `magnitude_min`/`magnitude_max` filter keys become inclusive bounds on
/// the `magnitude` column. Keys without a recognized suffix are dropped
/// with a warning.
fn normalize_filters(
    raw: &BTreeMap<String, f64>,
    warnings: &mut Vec<String>,
) -> BTreeMap<String, FilterRange> {
    let mut out: BTreeMap<String, FilterRange> = BTreeMap::new();
    for (key, value) in raw {
        if let Some(field) = key.strip_suffix("_min") {
            out.entry(field.to_string()).or_default().min = Some(*value);
        } else if let Some(field) = key.strip_suffix("_max") {
            out.entry(field.to_string()).or_default().max = Some(*value);
        } else {
            warnings.push(format!("filter key '{key}' has no _min/_max suffix, ignored"));
        }
    }
    out
}

fn denormalize_filters(filters: &BTreeMap<String, FilterRange>) -> BTreeMap<String, f64> {
    let mut out = BTreeMap::new();
    for (field, range) in filters {
        if let Some(min) = range.min {
            out.insert(format!("{field}_min"), min);
        }
        if let Some(max) = range.max {
            out.insert(format!("{field}_max"), max);
        }
    }
    out
}

fn shorthand_label(metric: &str, shorthand: DerivedShorthand) -> String {
    let base = humanize_metric(metric);
    match shorthand {
        DerivedShorthand::PerCapita => format!("{base} Per Capita"),
        DerivedShorthand::PerArea => format!("{base} Per Area"),
    }
}

/// "gdp" -> "GDP", "burned_area" -> "Burned Area".
fn humanize_metric(metric: &str) -> String {
    metric
        .split('_')
        .map(|word| {
            if word.len() <= 3 {
                word.to_uppercase()
            } else {
                let mut chars = word.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
