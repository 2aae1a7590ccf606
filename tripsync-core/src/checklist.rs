//! The packing checklist.
//!
//! Lives entirely in the session; nothing here is persisted. Categories
//! keep their insertion order; items keep theirs within the category.

use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistItem {
    pub id: u64,
    pub text: String,
    pub done: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistCategory {
    pub title: String,
    pub items: Vec<ChecklistItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChecklistProgress {
    pub total: usize,
    pub done: usize,
    /// Rounded percent complete; 0 for an empty checklist.
    pub percent: u8,
}

#[derive(Debug, Clone, Default)]
pub struct Checklist {
    categories: IndexMap<String, ChecklistCategory>,
    next_item: u64,
}

impl Checklist {
    pub fn empty() -> Self {
        Checklist::default()
    }

    /// The starter list every trip begins with.
    pub fn seeded() -> Self {
        let mut list = Checklist::empty();
        for (slug, title, items) in [
            (
                "docs",
                "Documents & papers",
                &[("Passport", true), ("Visa copies", false), ("Hotel confirmations", false)][..],
            ),
            ("clothes", "Clothing", &[("Jacket", false), ("Sleepwear", true)][..]),
            (
                "elec",
                "Electronics",
                &[("Power bank", false), ("Plug adapter", false), ("Camera", true)][..],
            ),
            (
                "todo",
                "Before we go",
                &[("Buy rail pass", false), ("Book pocket wifi", false)][..],
            ),
        ] {
            list.add_category(slug, title);
            for (text, done) in items {
                if let Some(id) = list.add(slug, text) {
                    if *done {
                        list.toggle(slug, id);
                    }
                }
            }
        }
        list
    }

    pub fn add_category(&mut self, slug: impl Into<String>, title: impl Into<String>) {
        self.categories.insert(
            slug.into(),
            ChecklistCategory {
                title: title.into(),
                items: Vec::new(),
            },
        );
    }

    pub fn categories(&self) -> impl Iterator<Item = (&str, &ChecklistCategory)> {
        self.categories.iter().map(|(slug, cat)| (slug.as_str(), cat))
    }

    /// Add an item; `None` for an unknown category or blank text.
    pub fn add(&mut self, category: &str, text: &str) -> Option<u64> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let category = self.categories.get_mut(category)?;
        self.next_item += 1;
        let id = self.next_item;
        category.items.push(ChecklistItem {
            id,
            text: text.to_string(),
            done: false,
        });
        Some(id)
    }

    pub fn toggle(&mut self, category: &str, item: u64) -> bool {
        let Some(category) = self.categories.get_mut(category) else {
            return false;
        };
        match category.items.iter_mut().find(|i| i.id == item) {
            Some(item) => {
                item.done = !item.done;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, category: &str, item: u64) -> bool {
        let Some(category) = self.categories.get_mut(category) else {
            return false;
        };
        let before = category.items.len();
        category.items.retain(|i| i.id != item);
        category.items.len() != before
    }

    pub fn progress(&self) -> ChecklistProgress {
        let total: usize = self.categories.values().map(|c| c.items.len()).sum();
        let done: usize = self
            .categories
            .values()
            .flat_map(|c| &c.items)
            .filter(|i| i.done)
            .count();
        let percent = if total == 0 {
            0
        } else {
            (done as f64 / total as f64 * 100.0).round() as u8
        };
        ChecklistProgress { total, done, percent }
    }

    /// The first `limit` unfinished items across all categories, with the
    /// slug of the category each belongs to. Feeds the sidebar preview.
    pub fn pending(&self, limit: usize) -> Vec<(String, ChecklistItem)> {
        self.categories
            .iter()
            .flat_map(|(slug, cat)| {
                cat.items
                    .iter()
                    .filter(|i| !i.done)
                    .map(move |i| (slug.clone(), i.clone()))
            })
            .take(limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_list_has_the_default_categories() {
        let list = Checklist::seeded();
        let slugs: Vec<&str> = list.categories().map(|(slug, _)| slug).collect();
        assert_eq!(slugs, ["docs", "clothes", "elec", "todo"]);
        assert!(list.progress().total > 0);
    }

    #[test]
    fn progress_counts_done_items() {
        let mut list = Checklist::empty();
        list.add_category("docs", "Documents");
        let a = list.add("docs", "Passport").unwrap();
        list.add("docs", "Visa").unwrap();

        assert_eq!(list.progress(), ChecklistProgress { total: 2, done: 0, percent: 0 });

        list.toggle("docs", a);
        assert_eq!(list.progress(), ChecklistProgress { total: 2, done: 1, percent: 50 });
    }

    #[test]
    fn empty_checklist_is_zero_percent() {
        let list = Checklist::empty();
        assert_eq!(list.progress().percent, 0);
    }

    #[test]
    fn blank_or_misfiled_items_are_refused() {
        let mut list = Checklist::empty();
        list.add_category("docs", "Documents");

        assert_eq!(list.add("docs", "   "), None);
        assert_eq!(list.add("nope", "Passport"), None);
        assert_eq!(list.progress().total, 0);
    }

    #[test]
    fn toggle_and_remove_by_id() {
        let mut list = Checklist::empty();
        list.add_category("todo", "To do");
        let id = list.add("todo", "Rail pass").unwrap();

        assert!(list.toggle("todo", id));
        assert!(!list.toggle("todo", 999));
        assert!(list.remove("todo", id));
        assert!(!list.remove("todo", id));
    }

    #[test]
    fn pending_preview_respects_the_limit() {
        let mut list = Checklist::empty();
        list.add_category("docs", "Documents");
        for text in ["a", "b", "c", "d", "e"] {
            list.add("docs", text);
        }

        let preview = list.pending(4);
        assert_eq!(preview.len(), 4);
        assert!(preview.iter().all(|(slug, item)| slug == "docs" && !item.done));
    }
}
