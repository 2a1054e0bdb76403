//! Domain types for the todo store.
//!
//! A store owns an ordered list of todos, the filter that selects which of
//! them are visible, and the settings controlling auto-expiry of completed
//! todos. Mutation goes through [`crate::reducer::TodoReducer`]; everything
//! public here is read-only.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Milliseconds a completed todo lives before the sweep removes it
pub const DEFAULT_COMPLETED_EXPIRY_MILLIS: u64 = 7000;

/// Identifier of a todo
///
/// Ids are assigned by the store starting at 1 and are never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TodoId(u32);

impl TodoId {
    /// Never assigned to a todo; reported when no todo was added
    pub const NONE: Self = Self(0);

    /// Wraps a raw id
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for TodoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single todo
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    /// Unique identifier
    pub id: TodoId,
    /// Title of the todo
    pub title: String,
    /// Whether the todo is completed
    pub completed: bool,
    /// When the todo expires, in milliseconds since the Unix epoch
    ///
    /// Only set on completed todos while auto-expiry is enabled.
    pub expiry_millis: Option<i64>,
}

impl Todo {
    /// Creates a pending todo
    #[must_use]
    pub const fn new(id: TodoId, title: String) -> Self {
        Self {
            id,
            title,
            completed: false,
            expiry_millis: None,
        }
    }

    /// Marks the todo completed or pending
    ///
    /// `expiry_millis` is stored when completing and cleared when restarting.
    fn set_completed(&mut self, completed: bool, expiry_millis: Option<i64>) {
        self.completed = completed;
        self.expiry_millis = if completed { expiry_millis } else { None };
    }

    /// Whether the todo is completed and its expiry has passed
    #[must_use]
    pub fn is_expired(&self, now_millis: i64) -> bool {
        self.completed && self.expiry_millis.is_some_and(|at| at <= now_millis)
    }
}

impl fmt::Display for Todo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let check = if self.completed { '✓' } else { ' ' };
        write!(f, "[{check}] ({}) '{}'", self.id, self.title)
    }
}

/// Which todos are visible
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Filter {
    /// Only completed todos
    Completed,
    /// Only todos not yet completed
    Pending,
    /// Every todo
    #[default]
    All,
}

impl Filter {
    /// Numeric code used at the FFI boundary
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Completed => 0,
            Self::Pending => 1,
            Self::All => 2,
        }
    }

    /// Inverse of [`Filter::code`]
    #[must_use]
    pub const fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Completed),
            1 => Some(Self::Pending),
            2 => Some(Self::All),
            _ => None,
        }
    }

    /// Whether `todo` passes this filter
    #[must_use]
    pub const fn matches(self, todo: &Todo) -> bool {
        match self {
            Self::Completed => todo.completed,
            Self::Pending => !todo.completed,
            Self::All => true,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Completed => "Completed",
            Self::Pending => "Pending",
            Self::All => "All",
        };
        f.write_str(name)
    }
}

/// Store-wide auto-expiry settings
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Whether completed todos are removed once their expiry passes
    pub auto_expire_completed_todos: bool,
    /// How long a completed todo lives when auto-expiry is on
    pub completed_expiry_millis: u64,
}

impl Settings {
    /// Expiry timestamp for a todo completed at `now_millis`, if auto-expiry is on
    #[must_use]
    pub fn expiry_from(&self, now_millis: i64) -> Option<i64> {
        self.auto_expire_completed_todos.then(|| {
            let ttl = i64::try_from(self.completed_expiry_millis).unwrap_or(i64::MAX);
            now_millis.saturating_add(ttl)
        })
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            auto_expire_completed_todos: false,
            completed_expiry_millis: DEFAULT_COMPLETED_EXPIRY_MILLIS,
        }
    }
}

/// What one expiry sweep did
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepOutcome {
    /// Todos removed because their expiry passed
    pub expired: Vec<TodoId>,
    /// Completed todos still counting down
    pub ticking: Vec<TodoId>,
}

/// State of a todo store
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoState {
    todos: Vec<Todo>,
    filter: Filter,
    settings: Settings,
    last_added_id: u32,
    #[serde(skip)]
    sweep_generation: u64,
}

impl TodoState {
    /// Creates an empty state with default filter and settings
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty state with the given settings
    #[must_use]
    pub fn with_settings(settings: Settings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    /// State preloaded with a few demo todos, two of them completed
    #[must_use]
    pub fn with_sample_todos(settings: Settings) -> Self {
        let mut state = Self::with_settings(settings);
        for (title, completed) in [
            ("Learn Flutter", true),
            ("Learn Rust", true),
            ("Learn Rid", false),
            ("Build Awesome Apps", false),
        ] {
            let added = state.add_todo(title.to_string());
            if let (Some(id), true) = (added, completed) {
                state.update_todo(id, |todo| todo.set_completed(true, None));
            }
        }
        state
    }

    /// All todos in insertion order
    #[must_use]
    pub fn todos(&self) -> &[Todo] {
        &self.todos
    }

    /// Todos passing the current filter, in insertion order
    #[must_use]
    pub fn filtered_todos(&self) -> Vec<&Todo> {
        self.todos_matching(self.filter)
    }

    /// Todos passing `filter`, in insertion order
    #[must_use]
    pub fn todos_matching(&self, filter: Filter) -> Vec<&Todo> {
        self.todos.iter().filter(|todo| filter.matches(todo)).collect()
    }

    /// Looks a todo up by id
    #[must_use]
    pub fn todo_by_id(&self, id: TodoId) -> Option<&Todo> {
        self.todos.iter().find(|todo| todo.id == id)
    }

    /// The most recently assigned id, `None` before the first add
    #[must_use]
    pub const fn last_added_id(&self) -> Option<TodoId> {
        match self.last_added_id {
            0 => None,
            id => Some(TodoId(id)),
        }
    }

    /// The current filter
    #[must_use]
    pub const fn filter(&self) -> Filter {
        self.filter
    }

    /// The current settings
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Generation of the running expiry sweep
    ///
    /// Bumped every time auto-expiry is switched on, so ticks scheduled by an
    /// earlier sweep can be told apart from the current one.
    #[must_use]
    pub const fn sweep_generation(&self) -> u64 {
        self.sweep_generation
    }

    /// Number of todos
    #[must_use]
    pub fn count(&self) -> usize {
        self.todos.len()
    }

    /// Number of completed todos
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.todos.iter().filter(|todo| todo.completed).count()
    }

    /// Appends a todo under the next id; `None` once ids are exhausted
    pub(crate) fn add_todo(&mut self, title: String) -> Option<TodoId> {
        let Some(next) = self.last_added_id.checked_add(1) else {
            tracing::warn!(last_added_id = self.last_added_id, "No todo ids left");
            return None;
        };
        self.last_added_id = next;
        let id = TodoId(next);
        self.todos.push(Todo::new(id, title));
        Some(id)
    }

    pub(crate) fn remove_todo(&mut self, id: TodoId) -> bool {
        let Some(idx) = self.todos.iter().position(|todo| todo.id == id) else {
            return false;
        };
        self.todos.remove(idx);
        true
    }

    pub(crate) fn remove_completed(&mut self) -> usize {
        let before = self.todos.len();
        self.todos.retain(|todo| !todo.completed);
        before - self.todos.len()
    }

    /// Applies `update` to the todo with `id`, returning false if absent
    pub(crate) fn update_todo<F: FnOnce(&mut Todo)>(&mut self, id: TodoId, update: F) -> bool {
        match self.todos.iter_mut().find(|todo| todo.id == id) {
            Some(todo) => {
                update(todo);
                true
            },
            None => false,
        }
    }

    pub(crate) fn complete(&mut self, id: TodoId, now_millis: i64) -> bool {
        let expiry = self.settings.expiry_from(now_millis);
        self.update_todo(id, |todo| todo.set_completed(true, expiry))
    }

    pub(crate) fn restart(&mut self, id: TodoId) -> bool {
        self.update_todo(id, |todo| todo.set_completed(false, None))
    }

    pub(crate) fn toggle(&mut self, id: TodoId, now_millis: i64) -> bool {
        let expiry = self.settings.expiry_from(now_millis);
        self.update_todo(id, |todo| todo.set_completed(!todo.completed, expiry))
    }

    pub(crate) fn complete_all(&mut self, now_millis: i64) {
        let expiry = self.settings.expiry_from(now_millis);
        for todo in &mut self.todos {
            todo.set_completed(true, expiry);
        }
    }

    pub(crate) fn restart_all(&mut self) {
        for todo in &mut self.todos {
            todo.set_completed(false, None);
        }
    }

    pub(crate) const fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    /// Switches auto-expiry, returning true when it went from off to on
    ///
    /// Switching on bumps the sweep generation and starts the countdown for
    /// completed todos that have none yet. Timestamps already set are left
    /// alone in both directions.
    pub(crate) fn set_auto_expire(&mut self, enabled: bool, now_millis: i64) -> bool {
        let was_enabled = self.settings.auto_expire_completed_todos;
        self.settings.auto_expire_completed_todos = enabled;
        if !enabled || was_enabled {
            return false;
        }

        self.sweep_generation += 1;
        let expiry = self.settings.expiry_from(now_millis);
        for todo in self.todos.iter_mut().filter(|t| t.completed && t.expiry_millis.is_none()) {
            todo.expiry_millis = expiry;
        }
        true
    }

    /// Removes completed todos whose expiry has passed
    pub(crate) fn sweep_expired(&mut self, now_millis: i64) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        self.todos.retain(|todo| {
            if todo.is_expired(now_millis) {
                outcome.expired.push(todo.id);
                false
            } else {
                if todo.completed && todo.expiry_millis.is_some() {
                    outcome.ticking.push(todo.id);
                }
                true
            }
        });
        outcome
    }
}

impl fmt::Display for TodoState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "filter: {}", self.filter)?;
        for todo in self.filtered_todos() {
            writeln!(f, "  {todo}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state_with(titles: &[&str]) -> TodoState {
        let mut state = TodoState::new();
        for title in titles {
            state.add_todo((*title).to_string());
        }
        state
    }

    #[test]
    fn ids_start_at_one_and_increase() {
        let mut state = TodoState::new();
        assert_eq!(state.last_added_id(), None);

        let a = state.add_todo("a".to_string());
        let b = state.add_todo("b".to_string());
        assert_eq!(a, Some(TodoId::new(1)));
        assert_eq!(b, Some(TodoId::new(2)));
        assert_eq!(state.last_added_id(), b);
    }

    #[test]
    fn removed_ids_are_not_reused() {
        let mut state = state_with(&["a", "b"]);
        assert!(state.remove_todo(TodoId::new(2)));
        let c = state.add_todo("c".to_string());
        assert_eq!(c, Some(TodoId::new(3)));
    }

    #[test]
    fn remove_unknown_id_is_noop() {
        let mut state = state_with(&["a"]);
        assert!(!state.remove_todo(TodoId::new(9)));
        assert_eq!(state.count(), 1);
    }

    #[test]
    fn todo_display() {
        let mut todo = Todo::new(TodoId::new(3), "buy milk".to_string());
        assert_eq!(todo.to_string(), "[ ] (3) 'buy milk'");
        todo.completed = true;
        assert_eq!(todo.to_string(), "[✓] (3) 'buy milk'");
    }

    #[test]
    fn filter_codes_round_trip() {
        for filter in [Filter::Completed, Filter::Pending, Filter::All] {
            assert_eq!(Filter::from_code(u32::from(filter.code())), Some(filter));
        }
        assert_eq!(Filter::from_code(3), None);
        assert_eq!(Filter::default(), Filter::All);
        assert_eq!(Filter::Pending.to_string(), "Pending");
    }

    #[test]
    fn filtered_todos_follow_filter() {
        let mut state = state_with(&["a", "b", "c"]);
        state.complete(TodoId::new(2), 0);

        state.set_filter(Filter::Completed);
        let ids: Vec<_> = state.filtered_todos().iter().map(|t| t.id.get()).collect();
        assert_eq!(ids, vec![2]);

        state.set_filter(Filter::Pending);
        let ids: Vec<_> = state.filtered_todos().iter().map(|t| t.id.get()).collect();
        assert_eq!(ids, vec![1, 3]);

        state.set_filter(Filter::All);
        assert_eq!(state.filtered_todos().len(), 3);
    }

    #[test]
    fn complete_sets_expiry_only_when_enabled() {
        let mut state = state_with(&["a", "b"]);
        state.complete(TodoId::new(1), 1_000);
        assert_eq!(state.todo_by_id(TodoId::new(1)).and_then(|t| t.expiry_millis), None);

        state.set_auto_expire(true, 1_000);
        state.complete(TodoId::new(2), 2_000);
        assert_eq!(
            state.todo_by_id(TodoId::new(2)).and_then(|t| t.expiry_millis),
            Some(2_000 + 7_000)
        );
    }

    #[test]
    fn restart_clears_expiry() {
        let mut state = state_with(&["a"]);
        state.set_auto_expire(true, 0);
        state.complete(TodoId::new(1), 0);
        state.restart(TodoId::new(1));

        let todo = &state.todos()[0];
        assert!(!todo.completed);
        assert_eq!(todo.expiry_millis, None);
    }

    #[test]
    fn enabling_auto_expire_stamps_completed_todos_without_expiry() {
        let mut state = TodoState::with_sample_todos(Settings::default());
        assert!(state.set_auto_expire(true, 500));
        assert_eq!(state.sweep_generation(), 1);

        for todo in state.todos() {
            if todo.completed {
                assert_eq!(todo.expiry_millis, Some(7_500));
            } else {
                assert_eq!(todo.expiry_millis, None);
            }
        }

        // Already on: no new generation, no restamp
        assert!(!state.set_auto_expire(true, 9_000));
        assert_eq!(state.sweep_generation(), 1);
        assert_eq!(state.todos()[0].expiry_millis, Some(7_500));
    }

    #[test]
    fn disabling_auto_expire_keeps_timestamps() {
        let mut state = state_with(&["a"]);
        state.set_auto_expire(true, 0);
        state.complete(TodoId::new(1), 0);
        assert!(!state.set_auto_expire(false, 10));
        assert_eq!(state.todos()[0].expiry_millis, Some(7_000));
    }

    #[test]
    fn sweep_removes_only_expired() {
        let mut state = state_with(&["a", "b", "c"]);
        state.set_auto_expire(true, 0);
        state.complete(TodoId::new(1), 0);
        state.complete(TodoId::new(3), 5_000);

        let outcome = state.sweep_expired(7_000);
        assert_eq!(outcome.expired, vec![TodoId::new(1)]);
        assert_eq!(outcome.ticking, vec![TodoId::new(3)]);
        let ids: Vec<_> = state.todos().iter().map(|t| t.id.get()).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[test]
    fn sample_todos() {
        let state = TodoState::with_sample_todos(Settings::default());
        assert_eq!(state.count(), 4);
        assert_eq!(state.completed_count(), 2);
        assert_eq!(state.last_added_id(), Some(TodoId::new(4)));
        assert_eq!(state.todos()[2].title, "Learn Rid");
    }

    #[test]
    fn settings_expiry_saturates() {
        let settings = Settings {
            auto_expire_completed_todos: true,
            completed_expiry_millis: u64::MAX,
        };
        assert_eq!(settings.expiry_from(1), Some(i64::MAX));
        assert_eq!(Settings::default().expiry_from(1), None);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn json_snapshot_skips_sweep_generation() {
        let mut state = state_with(&["a"]);
        state.set_auto_expire(true, 0);
        assert_eq!(state.sweep_generation(), 1);

        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["filter"], "All");
        assert_eq!(json["todos"][0]["id"], 1);
        assert!(json.get("sweep_generation").is_none());

        let restored: TodoState = serde_json::from_value(json).unwrap();
        assert_eq!(restored.todos(), state.todos());
        assert_eq!(restored.sweep_generation(), 0);
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn exhausted_ids_leave_state_unchanged() {
        let json = serde_json::json!({
            "todos": [{"id": u32::MAX, "title": "last", "completed": false, "expiry_millis": null}],
            "filter": "All",
            "settings": {"auto_expire_completed_todos": false, "completed_expiry_millis": 7000},
            "last_added_id": u32::MAX,
        });
        let mut state: TodoState = serde_json::from_value(json).unwrap();
        let before = state.clone();

        assert_eq!(state.add_todo("one more".to_string()), None);
        assert_eq!(state, before);
        assert_eq!(state.last_added_id(), Some(TodoId::new(u32::MAX)));
    }
}
