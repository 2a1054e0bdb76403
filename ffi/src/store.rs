//! Store lifecycle, locking and read accessors.

use crate::to_c_string;
use std::ffi::c_char;
use std::ptr;
use todo_store::{Filter, Settings, Todo, TodoConfig, TodoId, TodoState, TodoStore};
use todo_store_runtime::StoreGuard;
use tokio::runtime::Runtime;

/// Returned by [`todo_store_filter`] when the store is not locked
pub const FILTER_UNAVAILABLE: u8 = u8::MAX;

/// A store owned by the foreign caller
///
/// Carries its own runtime so the expiry sweep keeps running between calls.
pub struct StoreHandle {
    store: TodoStore,
    guard: Option<StoreGuard<TodoState>>,
    runtime: Runtime,
}

impl StoreHandle {
    fn new(config: TodoConfig) -> Option<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("todo-store")
            .enable_all()
            .build()
            .map_err(|error| tracing::error!(%error, "Failed to build runtime"))
            .ok()?;

        let store = runtime
            .block_on(TodoStore::create(config))
            .map_err(|error| tracing::error!(%error, "Failed to create store"))
            .ok()?;

        Some(Self {
            store,
            guard: None,
            runtime,
        })
    }

    pub(crate) const fn store(&self) -> &TodoStore {
        &self.store
    }

    pub(crate) const fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub(crate) const fn is_locked(&self) -> bool {
        self.guard.is_some()
    }

    /// State behind the held lock, logging misuse when not locked
    fn locked_state(&self, operation: &str) -> Option<&TodoState> {
        let state = self.guard.as_deref();
        if state.is_none() {
            tracing::error!(operation, "Store must be locked first");
        }
        state
    }
}

impl Drop for StoreHandle {
    fn drop(&mut self) {
        self.guard = None;
        if let Err(error) = self.runtime.block_on(self.store.shutdown()) {
            tracing::warn!(%error, "Store shut down with effects still running");
        }
    }
}

/// Owned snapshot of the filtered todos
pub struct TodoList {
    items: Vec<Todo>,
}

/// Shared-reference view of a handle pointer
///
/// # Safety
///
/// `handle` must be null or a live pointer from [`todo_store_create`].
pub(crate) unsafe fn handle_ref<'a>(handle: *const StoreHandle) -> Option<&'a StoreHandle> {
    // SAFETY: null or live per the caller contract
    let handle = unsafe { handle.as_ref() };
    if handle.is_none() {
        tracing::error!("Null store handle");
    }
    handle
}

// ========== Lifecycle ==========

/// Creates a store configured from the environment
///
/// Returns null if the runtime or store cannot be created.
#[unsafe(no_mangle)]
pub extern "C" fn todo_store_create() -> *mut StoreHandle {
    StoreHandle::new(TodoConfig::from_env())
        .map_or(ptr::null_mut(), |handle| Box::into_raw(Box::new(handle)))
}

/// Releases the store and everything it owns
///
/// # Safety
///
/// `handle` must be null or a pointer from [`todo_store_create`] that has
/// not been freed. Borrowed pointers into the store are invalid afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_store_free(handle: *mut StoreHandle) {
    if handle.is_null() {
        return;
    }
    // SAFETY: allocated by `Box::into_raw` in `todo_store_create`
    drop(unsafe { Box::from_raw(handle) });
}

/// Takes the store lock, waiting for any running command or sweep
///
/// Returns false if the handle is null or already locked.
///
/// # Safety
///
/// `handle` must be null or a live pointer from [`todo_store_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_store_lock(handle: *mut StoreHandle) -> bool {
    // SAFETY: null or live per the caller contract
    let Some(handle) = (unsafe { handle.as_mut() }) else {
        tracing::error!("Null store handle");
        return false;
    };
    if handle.is_locked() {
        tracing::error!("Store is already locked");
        return false;
    }
    let guard = handle.runtime.block_on(handle.store.lock());
    handle.guard = Some(guard);
    true
}

/// Releases the store lock
///
/// Returns false if the handle is null or not locked.
///
/// # Safety
///
/// `handle` must be null or a live pointer from [`todo_store_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_store_unlock(handle: *mut StoreHandle) -> bool {
    // SAFETY: null or live per the caller contract
    let Some(handle) = (unsafe { handle.as_mut() }) else {
        tracing::error!("Null store handle");
        return false;
    };
    if handle.guard.take().is_none() {
        tracing::error!("Unlock without a matching lock");
        return false;
    }
    true
}

// ========== Store accessors (locked) ==========

/// Number of todos, 0 when not locked
///
/// # Safety
///
/// `handle` must be null or a live pointer from [`todo_store_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_store_todos_len(handle: *const StoreHandle) -> usize {
    unsafe { handle_ref(handle) }
        .and_then(|h| h.locked_state("todos_len"))
        .map_or(0, |state| state.todos().len())
}

/// Todo at `idx` in insertion order, null when out of range or not locked
///
/// # Safety
///
/// `handle` must be null or a live pointer from [`todo_store_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_store_todos_get(handle: *const StoreHandle, idx: usize) -> *const Todo {
    unsafe { handle_ref(handle) }
        .and_then(|h| h.locked_state("todos_get"))
        .and_then(|state| state.todos().get(idx))
        .map_or(ptr::null(), ptr::from_ref)
}

/// Todo with `id`, null when absent or not locked
///
/// # Safety
///
/// `handle` must be null or a live pointer from [`todo_store_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_store_todo_by_id(handle: *const StoreHandle, id: u32) -> *const Todo {
    unsafe { handle_ref(handle) }
        .and_then(|h| h.locked_state("todo_by_id"))
        .and_then(|state| state.todo_by_id(TodoId::new(id)))
        .map_or(ptr::null(), ptr::from_ref)
}

/// Most recently assigned id, 0 when none yet or not locked
///
/// # Safety
///
/// `handle` must be null or a live pointer from [`todo_store_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_store_last_added_id(handle: *const StoreHandle) -> u32 {
    unsafe { handle_ref(handle) }
        .and_then(|h| h.locked_state("last_added_id"))
        .and_then(TodoState::last_added_id)
        .map_or(0, TodoId::get)
}

/// Current filter code, [`FILTER_UNAVAILABLE`] when not locked
///
/// # Safety
///
/// `handle` must be null or a live pointer from [`todo_store_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_store_filter(handle: *const StoreHandle) -> u8 {
    unsafe { handle_ref(handle) }
        .and_then(|h| h.locked_state("filter"))
        .map_or(FILTER_UNAVAILABLE, |state| state.filter().code())
}

/// Current settings, null when not locked
///
/// # Safety
///
/// `handle` must be null or a live pointer from [`todo_store_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_store_settings(handle: *const StoreHandle) -> *const Settings {
    unsafe { handle_ref(handle) }
        .and_then(|h| h.locked_state("settings"))
        .map_or(ptr::null(), |state| ptr::from_ref(state.settings()))
}

/// Copies the todos passing the current filter, null when not locked
///
/// # Safety
///
/// `handle` must be null or a live pointer from [`todo_store_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_store_filtered_todos(handle: *const StoreHandle) -> *mut TodoList {
    unsafe { handle_ref(handle) }
        .and_then(|h| h.locked_state("filtered_todos"))
        .map_or(ptr::null_mut(), |state| {
            let items = state.filtered_todos().into_iter().cloned().collect();
            Box::into_raw(Box::new(TodoList { items }))
        })
}

/// Store debug string, null when not locked
///
/// # Safety
///
/// `handle` must be null or a live pointer from [`todo_store_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_store_debug(handle: *const StoreHandle, pretty: bool) -> *mut c_char {
    unsafe { handle_ref(handle) }
        .and_then(|h| h.locked_state("debug"))
        .map_or(ptr::null_mut(), |state| to_c_string(&debug_string(state, pretty)))
}

/// Store state as JSON, null when not locked
///
/// # Safety
///
/// `handle` must be null or a live pointer from [`todo_store_create`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_store_snapshot_json(handle: *const StoreHandle) -> *mut c_char {
    let Some(state) = unsafe { handle_ref(handle) }.and_then(|h| h.locked_state("snapshot_json"))
    else {
        return ptr::null_mut();
    };
    match serde_json::to_string(state) {
        Ok(json) => to_c_string(&json),
        Err(error) => {
            tracing::error!(%error, "Failed to serialize store");
            ptr::null_mut()
        },
    }
}

// ========== Todo lists ==========

/// Number of todos in the list
///
/// # Safety
///
/// `list` must be null or a live pointer from [`todo_store_filtered_todos`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_list_len(list: *const TodoList) -> usize {
    // SAFETY: null or live per the caller contract
    unsafe { list.as_ref() }.map_or(0, |list| list.items.len())
}

/// Todo at `idx`, null when out of range; valid until the list is freed
///
/// # Safety
///
/// `list` must be null or a live pointer from [`todo_store_filtered_todos`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_list_get(list: *const TodoList, idx: usize) -> *const Todo {
    // SAFETY: null or live per the caller contract
    unsafe { list.as_ref() }
        .and_then(|list| list.items.get(idx))
        .map_or(ptr::null(), ptr::from_ref)
}

/// Releases a list
///
/// # Safety
///
/// `list` must be null or a pointer from [`todo_store_filtered_todos`] that
/// has not been freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_list_free(list: *mut TodoList) {
    if list.is_null() {
        return;
    }
    // SAFETY: allocated by `Box::into_raw` in `todo_store_filtered_todos`
    drop(unsafe { Box::from_raw(list) });
}

// ========== Field accessors ==========

/// Borrows a todo pointer, logging null
///
/// # Safety
///
/// `todo` must be null or valid for reads.
unsafe fn todo_ref<'a>(todo: *const Todo) -> Option<&'a Todo> {
    // SAFETY: null or valid per the caller contract
    let todo = unsafe { todo.as_ref() };
    if todo.is_none() {
        tracing::error!("Null todo pointer");
    }
    todo
}

/// Id of the todo, 0 for null
///
/// # Safety
///
/// `todo` must be null or a pointer obtained from this library that is
/// still valid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_id(todo: *const Todo) -> u32 {
    unsafe { todo_ref(todo) }.map_or(0, |todo| todo.id.get())
}

/// Title of the todo as an owned string, null for null
///
/// # Safety
///
/// `todo` must be null or a pointer obtained from this library that is
/// still valid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_title(todo: *const Todo) -> *mut c_char {
    unsafe { todo_ref(todo) }.map_or(ptr::null_mut(), |todo| to_c_string(&todo.title))
}

/// Title length in bytes
///
/// # Safety
///
/// `todo` must be null or a pointer obtained from this library that is
/// still valid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_title_len(todo: *const Todo) -> usize {
    unsafe { todo_ref(todo) }.map_or(0, |todo| todo.title.len())
}

/// Whether the todo is completed
///
/// # Safety
///
/// `todo` must be null or a pointer obtained from this library that is
/// still valid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_completed(todo: *const Todo) -> bool {
    unsafe { todo_ref(todo) }.is_some_and(|todo| todo.completed)
}

/// Whether the todo has an expiry timestamp
///
/// # Safety
///
/// `todo` must be null or a pointer obtained from this library that is
/// still valid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_has_expiry(todo: *const Todo) -> bool {
    unsafe { todo_ref(todo) }.is_some_and(|todo| todo.expiry_millis.is_some())
}

/// Expiry in milliseconds since the Unix epoch, 0 when unset
///
/// # Safety
///
/// `todo` must be null or a pointer obtained from this library that is
/// still valid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_expiry_millis(todo: *const Todo) -> i64 {
    unsafe { todo_ref(todo) }
        .and_then(|todo| todo.expiry_millis)
        .unwrap_or(0)
}

/// Todo debug string
///
/// # Safety
///
/// `todo` must be null or a pointer obtained from this library that is
/// still valid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_debug(todo: *const Todo, pretty: bool) -> *mut c_char {
    unsafe { todo_ref(todo) }.map_or(ptr::null_mut(), |todo| to_c_string(&debug_string(todo, pretty)))
}

/// Whether completed todos auto-expire
///
/// # Safety
///
/// `settings` must be null or a pointer from [`todo_store_settings`] that
/// is still valid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn settings_auto_expire_completed_todos(settings: *const Settings) -> bool {
    // SAFETY: null or valid per the caller contract
    unsafe { settings.as_ref() }.is_some_and(|s| s.auto_expire_completed_todos)
}

/// Lifetime of a completed todo in milliseconds
///
/// # Safety
///
/// `settings` must be null or a pointer from [`todo_store_settings`] that
/// is still valid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn settings_completed_expiry_millis(settings: *const Settings) -> u64 {
    // SAFETY: null or valid per the caller contract
    unsafe { settings.as_ref() }.map_or(0, |s| s.completed_expiry_millis)
}

/// Settings debug string
///
/// # Safety
///
/// `settings` must be null or a pointer from [`todo_store_settings`] that
/// is still valid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn settings_debug(settings: *const Settings, pretty: bool) -> *mut c_char {
    // SAFETY: null or valid per the caller contract
    unsafe { settings.as_ref() }
        .map_or(ptr::null_mut(), |s| to_c_string(&debug_string(s, pretty)))
}

/// Debug string for a filter code, null for an unknown code
#[unsafe(no_mangle)]
pub extern "C" fn filter_debug(code: u8, pretty: bool) -> *mut c_char {
    Filter::from_code(u32::from(code))
        .map_or(ptr::null_mut(), |filter| to_c_string(&debug_string(&filter, pretty)))
}

fn debug_string<T: std::fmt::Debug>(value: &T, pretty: bool) -> String {
    if pretty {
        format!("{value:#?}")
    } else {
        format!("{value:?}")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::ffi::CStr;

    fn take_string(raw: *mut c_char) -> String {
        assert!(!raw.is_null());
        let s = unsafe { CStr::from_ptr(raw) }.to_str().unwrap().to_owned();
        unsafe { crate::todo_string_free(raw) };
        s
    }

    #[test]
    fn create_lock_unlock_free() {
        let handle = todo_store_create();
        assert!(!handle.is_null());

        unsafe {
            assert!(todo_store_lock(handle));
            assert!(!todo_store_lock(handle), "second lock is rejected");
            assert_eq!(todo_store_todos_len(handle), 0);
            assert_eq!(todo_store_last_added_id(handle), 0);
            assert_eq!(todo_store_filter(handle), Filter::All.code());
            assert!(todo_store_todos_get(handle, 0).is_null());

            let settings = todo_store_settings(handle);
            assert!(!settings_auto_expire_completed_todos(settings));
            assert_eq!(settings_completed_expiry_millis(settings), 7000);

            assert!(todo_store_unlock(handle));
            assert!(!todo_store_unlock(handle), "unlock without lock is rejected");
            todo_store_free(handle);
        }
    }

    #[test]
    fn reads_require_lock() {
        let handle = todo_store_create();
        unsafe {
            assert_eq!(todo_store_filter(handle), FILTER_UNAVAILABLE);
            assert!(todo_store_settings(handle).is_null());
            assert!(todo_store_filtered_todos(handle).is_null());
            assert!(todo_store_snapshot_json(handle).is_null());
            todo_store_free(handle);
        }
    }

    #[test]
    fn null_handles_are_rejected() {
        unsafe {
            assert!(!todo_store_lock(ptr::null_mut()));
            assert_eq!(todo_store_todos_len(ptr::null()), 0);
            assert_eq!(todo_id(ptr::null()), 0);
            assert!(todo_title(ptr::null()).is_null());
            assert_eq!(todo_list_len(ptr::null()), 0);
            todo_store_free(ptr::null_mut());
            todo_list_free(ptr::null_mut());
        }
    }

    #[test]
    fn filter_debug_strings() {
        assert_eq!(take_string(filter_debug(1, false)), "Pending");
        assert!(filter_debug(9, false).is_null());
    }

    #[test]
    fn store_debug_and_json() {
        let handle = todo_store_create();
        unsafe {
            assert!(todo_store_lock(handle));
            let debug = take_string(todo_store_debug(handle, true));
            assert!(debug.contains("TodoState"));
            let json = take_string(todo_store_snapshot_json(handle));
            let value: serde_json::Value = serde_json::from_str(&json).unwrap();
            assert_eq!(value["filter"], "All");
            assert_eq!(value["last_added_id"], 0);
            assert!(todo_store_unlock(handle));
            todo_store_free(handle);
        }
    }
}
