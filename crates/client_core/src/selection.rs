use std::collections::BTreeSet;

use shared::domain::ResourceId;

/// Rows checked in the visible table, keyed by id rather than position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    ids: BTreeSet<ResourceId>,
}

impl Selection {
    /// Flips `id` and reports whether it is selected afterwards.
    pub fn toggle(&mut self, id: &ResourceId) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.clone());
            true
        }
    }

    pub fn replace<'a>(&mut self, ids: impl IntoIterator<Item = &'a ResourceId>) {
        self.ids = ids.into_iter().cloned().collect();
    }

    /// Returns true if anything was selected.
    pub fn clear(&mut self) -> bool {
        let had_rows = !self.ids.is_empty();
        self.ids.clear();
        had_rows
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.ids.contains(id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> Vec<ResourceId> {
        self.ids.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_round_trips() {
        let mut selection = Selection::default();
        let id = ResourceId::new("u1");
        assert!(selection.toggle(&id));
        assert!(selection.contains(&id));
        assert!(!selection.toggle(&id));
        assert!(selection.is_empty());
    }

    #[test]
    fn clear_reports_whether_anything_changed() {
        let mut selection = Selection::default();
        assert!(!selection.clear());
        selection.replace([&ResourceId::new("a"), &ResourceId::new("b")]);
        assert_eq!(selection.len(), 2);
        assert!(selection.clear());
    }
}
