//! Derived view: the filtered projection of the cache.
//!
//! Search is a local, case-insensitive substring filter over `text`,
//! `meaning` and `example`. The live query itself never changes with the
//! search term.

use std::sync::Arc;

use wordbook_types::Entry;

use crate::sync::EntryList;

/// Whether `entry` matches an already lowercased, non-empty needle.
fn matches(entry: &Entry, needle: &str) -> bool {
    let hit = |field: &str| field.to_lowercase().contains(needle);
    hit(&entry.text) || hit(&entry.meaning) || entry.example.as_deref().is_some_and(hit)
}

/// Filter `entries` by `term`, preserving order.
///
/// An empty term returns `entries` itself. Any other term, whitespace
/// included, is matched as typed; a new list is allocated and the input is
/// never modified.
pub fn project(entries: &EntryList, term: &str) -> EntryList {
    let needle = term.to_lowercase();
    if needle.is_empty() {
        return Arc::clone(entries);
    }
    Arc::new(
        entries
            .iter()
            .filter(|e| matches(e, &needle))
            .cloned()
            .collect(),
    )
}

/// Memoizes [`project`] on the last `(entries, term)` pair.
///
/// Entries are compared by identity: a new snapshot from the sync engine is
/// a new `Arc` and always recomputes.
#[derive(Default)]
pub struct ViewBuilder {
    last: Option<Memo>,
    computations: u64,
}

struct Memo {
    entries: EntryList,
    term: String,
    view: EntryList,
}

impl ViewBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&mut self, entries: &EntryList, term: &str) -> EntryList {
        if let Some(memo) = &self.last
            && Arc::ptr_eq(&memo.entries, entries)
            && memo.term == term
        {
            return Arc::clone(&memo.view);
        }

        let view = project(entries, term);
        self.computations += 1;
        self.last = Some(Memo {
            entries: Arc::clone(entries),
            term: term.to_string(),
            view: Arc::clone(&view),
        });
        view
    }

    /// How many times the projection was actually computed.
    pub fn computations(&self) -> u64 {
        self.computations
    }
}
