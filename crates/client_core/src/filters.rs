use std::collections::BTreeMap;

/// Filter values staged by the operator but not yet applied.
///
/// Values are trimmed on the way in and a blank value drops the field, so
/// whatever is committed never sends `field=` with nothing after it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterSet {
    values: BTreeMap<String, String>,
}

impl FilterSet {
    pub fn stage<I, K, V>(&mut self, partial: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (field, value) in partial {
            let field = field.as_ref().trim();
            if field.is_empty() {
                continue;
            }
            let value = value.as_ref().trim();
            if value.is_empty() {
                self.values.remove(field);
            } else {
                self.values.insert(field.to_string(), value.to_string());
            }
        }
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.values.get(field).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.values.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_values_and_drops_blank_ones() {
        let mut filters = FilterSet::default();
        filters.stage([("search", "  oats "), ("category", "grain")]);
        assert_eq!(filters.get("search"), Some("oats"));

        filters.stage([("search", "   ")]);
        assert_eq!(filters.get("search"), None);
        assert_eq!(filters.get("category"), Some("grain"));
    }

    #[test]
    fn ignores_unnamed_fields() {
        let mut filters = FilterSet::default();
        filters.stage([(" ", "x")]);
        assert!(filters.is_empty());
    }
}
