//! Aggregate execution: resolve regions, create the box domain, fill from
//! each source table, compute derived fields, join geometry.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use geolens_catalog::Catalog;
use geolens_protocol::{
    DerivedSpec, ExecutionMode, FeatureCollection, MetricRef, OrderItem, TableRow, TimeSpec,
};

use crate::boxes::BoxSet;
use crate::error::Result;
use crate::storage::{Storage, AGGREGATE_FILE_KEY};

#[derive(Debug)]
pub struct AggregateOutcome {
    pub boxes: BoxSet,
    pub geojson: FeatureCollection,
    pub warnings: Vec<String>,
}

pub struct AggregateExecutor<'a> {
    catalog: &'a Catalog,
    storage: &'a dyn Storage,
}

impl<'a> AggregateExecutor<'a> {
    pub fn new(catalog: &'a Catalog, storage: &'a dyn Storage) -> Self {
        Self { catalog, storage }
    }

    pub async fn execute(
        &self,
        items: &[OrderItem],
        derived: &[DerivedSpec],
    ) -> Result<AggregateOutcome> {
        let mut warnings = Vec::new();

        let aggregate_items: Vec<&OrderItem> = items
            .iter()
            .filter(|i| i.valid && i.mode == ExecutionMode::Aggregate)
            .collect();

        // Union of every item's codes fixes the box domain before any fill.
        // Boxes some items do not target legitimately stay sparse.
        let mut per_item_codes = Vec::with_capacity(aggregate_items.len());
        let mut domain = Vec::new();
        for item in &aggregate_items {
            let codes = self.item_codes(item);
            if codes.is_empty() {
                warnings.push(format!(
                    "{}/{}: no location codes resolved",
                    item.source_id, item.metric
                ));
            }
            domain.extend(codes.iter().cloned());
            per_item_codes.push(codes);
        }
        let mut boxes = BoxSet::with_domain(domain);

        // Fill. One table read per source; one fill per distinct
        // (source, metric, time) tuple.
        let mut tables: HashMap<String, Vec<TableRow>> = HashMap::new();
        let mut filled: BTreeSet<String> = BTreeSet::new();
        for (item, codes) in aggregate_items.iter().zip(&per_item_codes) {
            let fill_key = format!("{}|{}|{}", item.source_id, item.metric, item.time.key());
            if !filled.insert(fill_key) {
                continue;
            }
            self.load_table(&mut tables, &item.source_id).await?;
            let rows = table_rows(&tables, &item.source_id);
            let target: BTreeSet<&str> = codes.iter().map(String::as_str).collect();
            let written = fill_metric(&mut boxes, rows, &item.metric, item.time, &target);
            log::debug!(
                "filled {}/{} ({}): {} boxes",
                item.source_id,
                item.metric,
                item.time.key(),
                written
            );
        }

        // Derived fields. A missing or zero denominator skips that box
        // only, with one warning per affected location.
        for spec in derived {
            for code in boxes.codes().to_vec() {
                let numerator = self
                    .resolve_value(&spec.numerator, &boxes, &code, &mut tables)
                    .await?;
                let Some(numerator) = numerator else {
                    continue;
                };
                let denominator = self
                    .resolve_value(&spec.denominator, &boxes, &code, &mut tables)
                    .await?;
                let denominator = match denominator {
                    Some(v) if v != 0.0 => v,
                    _ => {
                        warnings.push(format!(
                            "{code}: {} unavailable",
                            spec.denominator.metric()
                        ));
                        continue;
                    }
                };
                let value = numerator / denominator * spec.multiplier.unwrap_or(1.0);
                boxes.set(&code, computed_label(&spec.label), value);
            }
        }

        // Geometry join is the storage collaborator's job.
        let mut features = self.storage.resolve_geometry(boxes.codes()).await?;
        for feature in &mut features {
            feature.properties.insert(
                "location_code".to_string(),
                serde_json::Value::String(feature.id.clone()),
            );
            if let Some(values) = boxes.values(&feature.id) {
                for (key, value) in values {
                    if let Some(number) = serde_json::Number::from_f64(*value) {
                        feature
                            .properties
                            .insert(key.clone(), serde_json::Value::Number(number));
                    }
                }
            }
        }

        Ok(AggregateOutcome {
            boxes,
            geojson: FeatureCollection::new(features),
            warnings,
        })
    }

    fn item_codes(&self, item: &OrderItem) -> Vec<String> {
        crate::validate::resolve_item_codes(self.catalog, item)
    }

    async fn load_table(
        &self,
        tables: &mut HashMap<String, Vec<TableRow>>,
        source_id: &str,
    ) -> Result<()> {
        if !tables.contains_key(source_id) {
            let rows = self
                .storage
                .read_table(source_id, AGGREGATE_FILE_KEY)
                .await?;
            tables.insert(source_id.to_string(), rows);
        }
        Ok(())
    }

    /// Denominator (and numerator) resolution chain: value already in the
    /// box, then the owning/canonical source's table, then nothing.
    async fn resolve_value(
        &self,
        mref: &MetricRef,
        boxes: &BoxSet,
        code: &str,
        tables: &mut HashMap<String, Vec<TableRow>>,
    ) -> Result<Option<f64>> {
        if let Some(value) = boxes.get(code, mref.metric()) {
            return Ok(Some(value));
        }
        let (source_id, metric) = match mref {
            MetricRef::Qualified { source_id, metric } => (source_id.clone(), metric.clone()),
            MetricRef::Metric(name) => match self.catalog.denominator(name) {
                Some(def) => (def.source_id.clone(), def.metric.clone()),
                None => return Ok(None),
            },
        };
        self.load_table(tables, &source_id).await?;
        Ok(pick_value(
            table_rows(tables, &source_id),
            code,
            &metric,
            TimeSpec::Latest,
        ))
    }
}

fn table_rows<'t>(tables: &'t HashMap<String, Vec<TableRow>>, source_id: &str) -> &'t [TableRow] {
    tables
        .get(source_id)
        .map(Vec::as_slice)
        .unwrap_or_else(|| unreachable!("table for '{source_id}' loaded above"))
}

fn computed_label(label: &str) -> String {
    format!("{label} (computed)")
}

/// Write the item's metric into its targeted boxes. Locations absent from
/// the table stay unset; absence is never synthesized as zero.
fn fill_metric(
    boxes: &mut BoxSet,
    rows: &[TableRow],
    metric: &str,
    time: TimeSpec,
    target: &BTreeSet<&str>,
) -> usize {
    let mut written = 0;
    let mut best: BTreeMap<&str, (i64, f64)> = BTreeMap::new();
    for row in rows {
        if !target.contains(row.location_code.as_str()) {
            continue;
        }
        let Some(value) = row.values.get(metric) else {
            continue;
        };
        // Yearless rows rank below any in-range year.
        let priority = match row.year {
            Some(year) if time.contains_year(year) => i64::from(year),
            Some(_) => continue,
            None => i64::MIN,
        };
        let entry = best.entry(row.location_code.as_str()).or_insert((priority, *value));
        if priority >= entry.0 {
            *entry = (priority, *value);
        }
    }
    for (code, (_, value)) in best {
        if boxes.set(code, metric, value) {
            written += 1;
        }
    }
    written
}

fn pick_value(rows: &[TableRow], code: &str, metric: &str, time: TimeSpec) -> Option<f64> {
    let mut best: Option<(i64, f64)> = None;
    for row in rows.iter().filter(|r| r.location_code == code) {
        let Some(value) = row.values.get(metric) else {
            continue;
        };
        let priority = match row.year {
            Some(year) if time.contains_year(year) => i64::from(year),
            Some(_) => continue,
            None => i64::MIN,
        };
        if best.map_or(true, |(p, _)| priority >= p) {
            best = Some((priority, *value));
        }
    }
    best.map(|(_, value)| value)
}
