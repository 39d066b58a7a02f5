//! Reading stored groups back, by page and by group name.

use crate::persist::PersistedGroups;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::ops::Bound;

pub type PageId = u64;

pub const DEFAULT_LIMIT: usize = 10;
pub const MAX_LIMIT: usize = 500;

/// Storage of persisted group data, keyed by page.
pub trait GroupSource {
    /// Pages with stored data at or after `from`, in ascending order.
    fn pages_from(&self, from: PageId) -> Vec<PageId>;

    fn groups(&self, page: PageId) -> Option<&Map<String, Value>>;
}

impl GroupSource for BTreeMap<PageId, PersistedGroups> {
    fn pages_from(&self, from: PageId) -> Vec<PageId> {
        self.range((Bound::Included(from), Bound::Unbounded))
            .map(|(id, _)| *id)
            .collect()
    }

    fn groups(&self, page: PageId) -> Option<&Map<String, Value>> {
        self.get(&page).map(|g| &g.data)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MapDataQuery {
    /// Restrict to these pages; `None` visits every stored page.
    pub pages: Option<Vec<PageId>>,
    /// Requested group names; `None` returns every group of a page.
    pub groups: Option<Vec<String>>,
    pub limit: usize,
    pub continue_from: Option<PageId>,
}

impl Default for MapDataQuery {
    fn default() -> Self {
        Self {
            pages: None,
            groups: None,
            limit: DEFAULT_LIMIT,
            continue_from: None,
        }
    }
}

impl MapDataQuery {
    /// Splits a `|`-separated group list. An empty string requests every group.
    pub fn with_group_list(mut self, list: &str) -> Self {
        self.groups = (!list.is_empty()).then(|| list.split('|').map(str::to_string).collect());
        self
    }

    pub fn effective_limit(&self) -> usize {
        self.limit.clamp(1, MAX_LIMIT)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageMapData {
    pub page: PageId,
    /// Group id to feature list, or `null` for requested groups the page does not have.
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MapDataResponse {
    pub pages: Vec<PageMapData>,
    /// First page not returned because of the limit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continue_from: Option<PageId>,
}

pub fn query_map_data(source: &impl GroupSource, query: &MapDataQuery) -> MapDataResponse {
    let start = query.continue_from.unwrap_or(0);
    let mut pages = match &query.pages {
        Some(ids) => {
            let mut ids: Vec<PageId> = ids.iter().copied().filter(|id| *id >= start).collect();
            ids.sort_unstable();
            ids.dedup();
            ids
        }
        None => source.pages_from(start),
    };
    pages.retain(|page| source.groups(*page).is_some());

    let limit = query.effective_limit();
    let mut response = MapDataResponse::default();
    for (count, page) in pages.into_iter().enumerate() {
        if count >= limit {
            response.continue_from = Some(page);
            break;
        }
        let Some(stored) = source.groups(page) else {
            continue;
        };
        let mut data = match &query.groups {
            Some(names) => names
                .iter()
                .map(|name| (name.clone(), stored.get(name).cloned().unwrap_or(Value::Null)))
                .collect(),
            None => stored.clone(),
        };
        for value in data.values_mut() {
            normalize_empty_members(value);
        }
        response.pages.push(PageMapData { page, data });
    }
    tracing::debug!(
        pages = response.pages.len(),
        continue_from = ?response.continue_from,
        "map data query"
    );
    response
}

/// Restores `{}` for `geometry` and `properties` members that storage collapsed into `[]`.
pub fn normalize_empty_members(value: &mut Value) {
    match value {
        Value::Array(items) => items.iter_mut().for_each(normalize_empty_members),
        Value::Object(obj) => {
            for (key, child) in obj.iter_mut() {
                let collapsed = matches!(child, Value::Array(items) if items.is_empty());
                if collapsed && (key == "geometry" || key == "properties") {
                    *child = Value::Object(Map::new());
                } else {
                    normalize_empty_members(child);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn store() -> BTreeMap<PageId, PersistedGroups> {
        let mut store = BTreeMap::new();
        for page in [3, 5, 8, 13] {
            let mut groups = PersistedGroups::default();
            groups.data.insert(
                "shops".into(),
                json!([{ "type": "Feature", "geometry": [], "properties": [], "page": page }]),
            );
            store.insert(page, groups);
        }
        store
    }

    #[test]
    fn missing_groups_are_null() {
        let query = MapDataQuery {
            pages: Some(vec![5]),
            ..Default::default()
        }
        .with_group_list("shops|banks");
        let response = query_map_data(&store(), &query);
        assert_eq!(response.pages.len(), 1);
        let data = Value::Object(response.pages[0].data.clone());
        assert_eq!(data["banks"], Value::Null);
        assert_eq!(data["shops"][0]["geometry"], json!({}));
        assert_eq!(data["shops"][0]["properties"], json!({}));
    }

    #[test]
    fn pagination_sets_a_continue_cursor() {
        let store = store();
        let mut query = MapDataQuery {
            limit: 2,
            ..Default::default()
        };
        let first = query_map_data(&store, &query);
        assert_eq!(first.pages.iter().map(|p| p.page).collect::<Vec<_>>(), [3, 5]);
        assert_eq!(first.continue_from, Some(8));

        query.continue_from = first.continue_from;
        let second = query_map_data(&store, &query);
        assert_eq!(second.pages.iter().map(|p| p.page).collect::<Vec<_>>(), [8, 13]);
        assert_eq!(second.continue_from, None);
    }

    #[test]
    fn unknown_pages_are_skipped_and_limit_is_clamped() {
        let query = MapDataQuery {
            pages: Some(vec![13, 4, 3, 3]),
            limit: 0,
            ..Default::default()
        };
        let response = query_map_data(&store(), &query);
        assert_eq!(response.pages.len(), 1);
        assert_eq!(response.pages[0].page, 3);
        assert_eq!(response.continue_from, Some(13));
        assert_eq!(
            MapDataQuery { limit: 10_000, ..Default::default() }.effective_limit(),
            MAX_LIMIT
        );
    }

    #[test]
    fn empty_group_list_requests_everything() {
        assert_eq!(MapDataQuery::default().with_group_list("").groups, None);
        assert_eq!(
            MapDataQuery::default().with_group_list("a|b").groups,
            Some(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn normalization_only_touches_geometry_and_properties() {
        let mut value = json!({ "properties": [], "coordinates": [], "nested": { "geometry": [] } });
        normalize_empty_members(&mut value);
        assert_eq!(value, json!({ "properties": {}, "coordinates": [], "nested": { "geometry": {} } }));
    }
}
