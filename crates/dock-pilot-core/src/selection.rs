//! Selection state for the dashboard's list panels
//!
//! The panels are rebuilt from a fresh snapshot on every refresh. Selection
//! follows the selected item by key so a refresh that reorders or removes
//! rows does not move the cursor onto a different container.

/// A list with a bounds-checked cursor
///
/// # Examples
///
/// ```
/// use dock_pilot_core::selection::SelectableList;
///
/// let mut list = SelectableList::new(vec!["a", "b", "c"]);
///
/// assert_eq!(list.selected(), Some(&"a"));
/// list.select_next();
/// assert_eq!(list.selected(), Some(&"b"));
/// list.select_prev();
/// assert_eq!(list.selected(), Some(&"a"));
/// ```
#[derive(Debug, Clone)]
pub struct SelectableList<T> {
    items: Vec<T>,
    selected_index: usize,
}

impl<T> Default for SelectableList<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            selected_index: 0,
        }
    }
}

impl<T> SelectableList<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            selected_index: 0,
        }
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn selected_index(&self) -> usize {
        self.selected_index
    }

    pub fn selected(&self) -> Option<&T> {
        self.items.get(self.selected_index)
    }

    /// Move to the next item, wrapping to the start
    pub fn select_next(&mut self) {
        if !self.items.is_empty() {
            self.selected_index = (self.selected_index + 1) % self.items.len();
        }
    }

    /// Move to the previous item, wrapping to the end
    pub fn select_prev(&mut self) {
        if !self.items.is_empty() {
            self.selected_index = if self.selected_index == 0 {
                self.items.len() - 1
            } else {
                self.selected_index - 1
            };
        }
    }

    /// Select a specific index, clamped to the list bounds
    pub fn select(&mut self, index: usize) {
        self.selected_index = if self.items.is_empty() {
            0
        } else {
            index.min(self.items.len() - 1)
        };
    }

    /// Replace all items, keeping the cursor position clamped to the new length
    pub fn update_items(&mut self, items: Vec<T>) {
        self.items = items;
        self.select(self.selected_index);
    }

    /// Replace all items, keeping the cursor on the item with the same key
    ///
    /// Falls back to the clamped position when the selected item is gone.
    pub fn update_items_by<K, F>(&mut self, items: Vec<T>, key: F)
    where
        K: PartialEq,
        F: Fn(&T) -> K,
    {
        let previous = self.selected().map(&key);
        self.items = items;
        if let Some(previous) = previous
            && let Some(index) = self.items.iter().position(|item| key(item) == previous)
        {
            self.selected_index = index;
            return;
        }
        self.select(self.selected_index);
    }

    /// Select the first item matching a predicate
    ///
    /// Returns true if a matching item was found.
    pub fn select_where<F>(&mut self, predicate: F) -> bool
    where
        F: Fn(&T) -> bool,
    {
        match self.items.iter().position(predicate) {
            Some(index) => {
                self.selected_index = index;
                true
            }
            None => false,
        }
    }
}

impl<T> From<Vec<T>> for SelectableList<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}
