//! In-memory to-do list shown as a summary on the Settings screen.
//!
//! Fixed capacity, no allocation, not persisted across power cycles.

use heapless::{String, Vec};

/// Maximum number of entries.
pub const MAX_TASKS: usize = 30;

/// Maximum title length in bytes; longer titles are truncated.
pub const TITLE_LEN: usize = 31;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Priority {
    Low = 1,
    LowPlus = 2,
    Medium = 3,
    High = 4,
    Critical = 5,
}

impl Priority {
    /// Parse a 1..=5 level; anything else is `None`.
    pub fn from_level(level: u8) -> Option<Self> {
        match level {
            1 => Some(Priority::Low),
            2 => Some(Priority::LowPlus),
            3 => Some(Priority::Medium),
            4 => Some(Priority::High),
            5 => Some(Priority::Critical),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::LowPlus => "Low+",
            Priority::Medium => "Med",
            Priority::High => "High",
            Priority::Critical => "Critical",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Category {
    Work = 0,
    Personal = 1,
    Shopping = 2,
    Other = 3,
}

impl Category {
    pub fn from_index(index: u8) -> Option<Self> {
        match index {
            0 => Some(Category::Work),
            1 => Some(Category::Personal),
            2 => Some(Category::Shopping),
            3 => Some(Category::Other),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Category::Work => "Work",
            Category::Personal => "Personal",
            Category::Shopping => "Shopping",
            Category::Other => "Other",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TodoItem {
    pub id: u16,
    pub title: String<TITLE_LEN>,
    pub priority: Priority,
    pub category: Category,
    pub complete: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SortBy {
    /// Highest priority first.
    Priority,
    /// Open items before completed ones.
    Status,
    /// Work, Personal, Shopping, Other.
    Category,
}

/// Counts rendered on the Settings screen.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TodoSummary {
    pub total: u8,
    pub completed: u8,
    pub percent: u8,
}

#[derive(Clone, Debug)]
pub struct TodoList {
    items: Vec<TodoItem, MAX_TASKS>,
    next_id: u16,
}

fn truncated(title: &str) -> String<TITLE_LEN> {
    let mut out = String::new();
    for ch in title.chars() {
        if out.push(ch).is_err() {
            break;
        }
    }
    out
}

impl TodoList {
    pub const fn new() -> Self {
        Self {
            items: Vec::new(),
            next_id: 1,
        }
    }

    /// Add an entry. Out-of-range priority falls back to Medium and
    /// out-of-range category to Work. Returns the new id, or `None` when
    /// the list is full or the title is empty.
    pub fn add(&mut self, title: &str, priority: u8, category: u8) -> Option<u16> {
        if title.is_empty() || self.items.is_full() {
            return None;
        }

        let id = self.next_id;
        let item = TodoItem {
            id,
            title: truncated(title),
            priority: Priority::from_level(priority).unwrap_or(Priority::Medium),
            category: Category::from_index(category).unwrap_or(Category::Work),
            complete: false,
        };
        self.items.push(item).ok()?;
        self.next_id = self.next_id.wrapping_add(1);
        Some(id)
    }

    pub fn delete(&mut self, id: u16) -> bool {
        match self.position(id) {
            Some(pos) => {
                self.items.remove(pos);
                true
            }
            None => false,
        }
    }

    pub fn toggle_complete(&mut self, id: u16) -> bool {
        match self.get_mut(id) {
            Some(item) => {
                item.complete = !item.complete;
                true
            }
            None => false,
        }
    }

    /// Edit fields in place. Invalid priority / category values leave the
    /// existing value untouched.
    pub fn edit(
        &mut self,
        id: u16,
        title: Option<&str>,
        priority: Option<u8>,
        category: Option<u8>,
    ) -> bool {
        let Some(item) = self.get_mut(id) else {
            return false;
        };
        if let Some(t) = title {
            item.title = truncated(t);
        }
        if let Some(p) = priority.and_then(Priority::from_level) {
            item.priority = p;
        }
        if let Some(c) = category.and_then(Category::from_index) {
            item.category = c;
        }
        true
    }

    pub fn get(&self, id: u16) -> Option<&TodoItem> {
        self.items.iter().find(|i| i.id == id)
    }

    fn get_mut(&mut self, id: u16) -> Option<&mut TodoItem> {
        self.items.iter_mut().find(|i| i.id == id)
    }

    fn position(&self, id: u16) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }

    pub fn get_by_index(&self, index: usize) -> Option<&TodoItem> {
        self.items.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &TodoItem> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn completed_count(&self) -> usize {
        self.items.iter().filter(|i| i.complete).count()
    }

    pub fn completion_percent(&self) -> u8 {
        if self.items.is_empty() {
            return 0;
        }
        (self.completed_count() * 100 / self.items.len()) as u8
    }

    pub fn summary(&self) -> TodoSummary {
        TodoSummary {
            total: self.items.len() as u8,
            completed: self.completed_count() as u8,
            percent: self.completion_percent(),
        }
    }

    /// Stable in-place sort; entries that compare equal keep their order.
    pub fn sort(&mut self, by: SortBy) {
        let before = |a: &TodoItem, b: &TodoItem| -> bool {
            match by {
                SortBy::Priority => a.priority > b.priority,
                SortBy::Status => !a.complete && b.complete,
                SortBy::Category => a.category < b.category,
            }
        };

        // Insertion sort: at most MAX_TASKS entries and must stay stable.
        for i in 1..self.items.len() {
            let mut j = i;
            while j > 0 && before(&self.items[j], &self.items[j - 1]) {
                self.items.swap(j, j - 1);
                j -= 1;
            }
        }
    }

    pub fn reset(&mut self) {
        self.items.clear();
        self.next_id = 1;
    }
}

impl Default for TodoList {
    fn default() -> Self {
        Self::new()
    }
}
