//! In-memory task filtering

use chrono::{DateTime, Utc};

use super::model::{Category, Task, TaskStatus};

/// Criteria for listing and counting tasks
///
/// Every criterion that is set must match. An empty filter matches all tasks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    /// Status must be one of these
    pub status: Option<Vec<TaskStatus>>,
    pub category: Option<Category>,
    /// At least one of these tags must be present
    pub tags: Option<Vec<String>>,
    /// Inclusive lower bound on `created_at`
    pub created_after: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`
    pub created_before: Option<DateTime<Utc>>,
    /// Case-insensitive substring of name, description or any tag
    pub text_search: Option<String>,
}

impl TaskFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(mut self, statuses: impl IntoIterator<Item = TaskStatus>) -> Self {
        self.status = Some(statuses.into_iter().collect());
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_tags<I, T>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn created_after(mut self, instant: DateTime<Utc>) -> Self {
        self.created_after = Some(instant);
        self
    }

    pub fn created_before(mut self, instant: DateTime<Utc>) -> Self {
        self.created_before = Some(instant);
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text_search = Some(text.into());
        self
    }

    pub fn matches(&self, task: &Task) -> bool {
        if let Some(statuses) = &self.status {
            if !statuses.contains(&task.status) {
                return false;
            }
        }

        if let Some(category) = self.category {
            if task.category != category {
                return false;
            }
        }

        if let Some(tags) = self.tags.as_ref().filter(|tags| !tags.is_empty()) {
            if !tags.iter().any(|tag| task.tags.contains(tag)) {
                return false;
            }
        }

        if self.created_after.is_some_and(|after| task.created_at < after) {
            return false;
        }
        if self
            .created_before
            .is_some_and(|before| task.created_at >= before)
        {
            return false;
        }

        if let Some(text) = self.text_search.as_deref().filter(|text| !text.is_empty()) {
            let needle = text.to_lowercase();
            let found = task.name.to_lowercase().contains(&needle)
                || task.description.to_lowercase().contains(&needle)
                || task
                    .tags
                    .iter()
                    .any(|tag| tag.to_lowercase().contains(&needle));
            if !found {
                return false;
            }
        }

        true
    }
}

/// Apply an optional filter to a list of tasks
pub fn apply_filter(tasks: Vec<Task>, filter: Option<&TaskFilter>) -> Vec<Task> {
    match filter {
        Some(filter) => tasks.into_iter().filter(|t| filter.matches(t)).collect(),
        None => tasks,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn task(name: &str, category: Category, status: TaskStatus) -> Task {
        Task::new(name, category).with_status(status)
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = TaskFilter::new();
        assert!(filter.matches(&task("a", Category::Work, TaskStatus::Cancelled)));
    }

    #[test]
    fn test_status_membership() {
        let filter =
            TaskFilter::new().with_status([TaskStatus::NotStarted, TaskStatus::InProgress]);
        assert!(filter.matches(&task("a", Category::Work, TaskStatus::InProgress)));
        assert!(!filter.matches(&task("a", Category::Work, TaskStatus::Completed)));

        // An explicit empty set admits nothing
        let none = TaskFilter::new().with_status(Vec::new());
        assert!(!none.matches(&task("a", Category::Work, TaskStatus::NotStarted)));
    }

    #[test]
    fn test_category_exact() {
        let filter = TaskFilter::new().with_category(Category::Work);
        assert!(filter.matches(&task("a", Category::Work, TaskStatus::NotStarted)));
        assert!(!filter.matches(&task("a", Category::PersonalDev, TaskStatus::NotStarted)));
    }

    #[test]
    fn test_tags_any_of() {
        let a = Task::new("A", Category::Work).with_tags(["urgent", "work"]);
        let b = Task::new("B", Category::Work).with_tags(["later"]);

        let filter = TaskFilter::new().with_tags(["urgent"]);
        assert!(filter.matches(&a));
        assert!(!filter.matches(&b));

        let either = TaskFilter::new().with_tags(["later", "urgent"]);
        assert!(either.matches(&a) && either.matches(&b));

        let empty = TaskFilter::new().with_tags(Vec::<String>::new());
        assert!(empty.matches(&b));
    }

    #[test]
    fn test_created_range_is_inclusive_exclusive() {
        let at = Utc.with_ymd_and_hms(2024, 1, 10, 12, 0, 0).unwrap();
        let t = Task::new("t", Category::Work).with_created_at(at);

        assert!(TaskFilter::new().created_after(at).matches(&t));
        assert!(!TaskFilter::new().created_before(at).matches(&t));
        assert!(TaskFilter::new()
            .created_before(at + Duration::seconds(1))
            .matches(&t));
        assert!(!TaskFilter::new()
            .created_after(at + Duration::seconds(1))
            .matches(&t));
    }

    #[test]
    fn test_text_search_case_insensitive() {
        let t = Task::new("Buy Milk", Category::Household)
            .with_description("From the corner shop")
            .with_tags(["Groceries"]);

        assert!(TaskFilter::new().with_text("milk").matches(&t));
        assert!(TaskFilter::new().with_text("CORNER").matches(&t));
        assert!(TaskFilter::new().with_text("grocer").matches(&t));
        assert!(!TaskFilter::new().with_text("bread").matches(&t));
        assert!(TaskFilter::new().with_text("").matches(&t));
    }

    #[test]
    fn test_criteria_are_anded() {
        let t = Task::new("Report", Category::Work).with_tags(["q3"]);
        let filter = TaskFilter::new()
            .with_category(Category::Work)
            .with_text("report")
            .with_tags(["q4"]);
        assert!(!filter.matches(&t));
    }

    #[test]
    fn test_apply_filter() {
        let tasks = vec![
            task("a", Category::Work, TaskStatus::NotStarted),
            task("b", Category::Learning, TaskStatus::NotStarted),
        ];
        assert_eq!(apply_filter(tasks.clone(), None).len(), 2);
        let filter = TaskFilter::new().with_category(Category::Learning);
        let filtered = apply_filter(tasks, Some(&filter));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "b");
    }
}
