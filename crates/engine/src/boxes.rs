use std::collections::BTreeMap;

/// Per-location accumulator of metric values, live for one execution. The
/// domain is fixed at creation; fills never add or remove boxes.
#[derive(Debug, Clone, Default)]
pub struct BoxSet {
    codes: Vec<String>,
    boxes: BTreeMap<String, BTreeMap<String, f64>>,
}

impl BoxSet {
    /// Create one empty box per code. Duplicates collapse, first-seen order
    /// is preserved.
    pub fn with_domain(codes: impl IntoIterator<Item = String>) -> Self {
        let mut set = Self::default();
        for code in codes {
            if !set.boxes.contains_key(&code) {
                set.boxes.insert(code.clone(), BTreeMap::new());
                set.codes.push(code);
            }
        }
        set
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Write a value into an existing box. Writes aimed at codes outside
    /// the domain are dropped.
    pub fn set(&mut self, code: &str, key: impl Into<String>, value: f64) -> bool {
        match self.boxes.get_mut(code) {
            Some(values) => {
                values.insert(key.into(), value);
                true
            }
            None => false,
        }
    }

    pub fn get(&self, code: &str, key: &str) -> Option<f64> {
        self.boxes.get(code).and_then(|v| v.get(key)).copied()
    }

    pub fn values(&self, code: &str) -> Option<&BTreeMap<String, f64>> {
        self.boxes.get(code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_is_fixed_at_creation() {
        let mut set = BoxSet::with_domain(["DE".to_string(), "FR".to_string()]);
        assert_eq!(set.len(), 2);

        assert!(set.set("DE", "gdp", 4.2));
        assert!(!set.set("XX", "gdp", 1.0));
        assert_eq!(set.len(), 2);
        assert_eq!(set.get("DE", "gdp"), Some(4.2));
        assert_eq!(set.get("FR", "gdp"), None);
    }

    #[test]
    fn duplicate_codes_collapse_preserving_order() {
        let set = BoxSet::with_domain(["FR".to_string(), "DE".to_string(), "FR".to_string()]);
        assert_eq!(set.codes(), &["FR".to_string(), "DE".to_string()]);
    }
}
