use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub const DEFAULT_PAGE_LIMIT: u32 = 10;
pub const DEFAULT_SORT_FIELD: &str = "createdAt";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn as_str(self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Asc),
            "desc" | "descending" => Ok(SortOrder::Desc),
            other => Err(format!("invalid sort order '{other}', expected asc or desc")),
        }
    }
}

/// Parameters of one list request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    pub page: u32,
    pub limit: u32,
    pub sort_by: String,
    pub sort_order: SortOrder,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, String>,
}

impl Default for Query {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_LIMIT,
            sort_by: DEFAULT_SORT_FIELD.to_string(),
            sort_order: SortOrder::default(),
            filters: BTreeMap::new(),
        }
    }
}

impl Query {
    /// Flattens the query into `GET` parameters, filters last in key order.
    pub fn to_params(&self) -> Vec<(String, String)> {
        let mut params = vec![
            ("page".to_string(), self.page.to_string()),
            ("limit".to_string(), self.limit.to_string()),
            ("sortBy".to_string(), self.sort_by.clone()),
            ("sortOrder".to_string(), self.sort_order.to_string()),
        ];
        params.extend(
            self.filters
                .iter()
                .map(|(field, value)| (field.clone(), value.clone())),
        );
        params
    }
}

/// One page of a collection as reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageResult<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub total_count: u64,
    #[serde(default)]
    pub total_pages: u32,
}

impl<T> Default for PageResult<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            total_pages: 0,
        }
    }
}

impl<T> PageResult<T> {
    pub fn new(items: Vec<T>, total_count: u64, total_pages: u32) -> Self {
        Self {
            items,
            total_count,
            total_pages,
        }
    }

    /// Fills in `total_pages` when the backend only reported a count.
    pub fn normalized(mut self, limit: u32) -> Self {
        if self.total_pages == 0 && self.total_count > 0 && limit > 0 {
            let pages = self.total_count.div_ceil(u64::from(limit));
            self.total_pages = u32::try_from(pages).unwrap_or(u32::MAX);
        }
        self
    }
}

/// `{ "data": ... }` wrapper used by every success response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

pub type ListResponse<T> = Envelope<PageResult<T>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_keep_fixed_keys_then_sorted_filters() {
        let mut query = Query {
            page: 3,
            ..Query::default()
        };
        query.filters.insert("search".into(), "oats".into());
        query.filters.insert("category".into(), "grain".into());

        let params = query.to_params();
        let keys: Vec<&str> = params.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            ["page", "limit", "sortBy", "sortOrder", "category", "search"]
        );
        assert_eq!(params[0].1, "3");
        assert_eq!(params[3].1, "desc");
    }

    #[test]
    fn list_response_decodes_camel_case_envelope() {
        let raw = r#"{"data":{"items":[1,2],"totalCount":12,"totalPages":2}}"#;
        let parsed: ListResponse<i32> = serde_json::from_str(raw).expect("decode");
        assert_eq!(parsed.data, PageResult::new(vec![1, 2], 12, 2));
    }

    #[test]
    fn normalized_derives_pages_from_count() {
        let page = PageResult::new(vec![(); 10], 21, 0).normalized(10);
        assert_eq!(page.total_pages, 3);

        let empty = PageResult::<()>::default().normalized(10);
        assert_eq!(empty.total_pages, 0);
    }
}
