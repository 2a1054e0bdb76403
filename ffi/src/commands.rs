//! Command dispatch and reply polling.
//!
//! Commands return once the state transition is done and the reply is
//! queued; read it with [`todo_reply_poll`], [`todo_reply_take`] or
//! [`todo_reply_wait`].

use crate::store::{handle_ref, StoreHandle};
use crate::{read_str, to_c_string};
use std::ffi::c_char;
use std::ptr;
use std::time::Duration;
use todo_store::{Filter, Msg, MsgArgs, Reply, TodoId};

/// Sends `msg` through the handle's runtime
///
/// # Safety
///
/// `handle` must be null or a live pointer from `todo_store_create`.
unsafe fn dispatch(handle: *const StoreHandle, req_id: u64, msg: Msg) -> bool {
    let Some(handle) = (unsafe { handle_ref(handle) }) else {
        return false;
    };
    if handle.is_locked() {
        tracing::error!(req_id, "Cannot dispatch while the store is locked");
        return false;
    }
    match handle.runtime().block_on(handle.store().dispatch(req_id, msg)) {
        Ok(_) => true,
        Err(error) => {
            tracing::error!(req_id, %error, "Dispatch failed");
            false
        },
    }
}

// ========== Commands ==========

/// Appends a todo titled `title`
///
/// Returns false for a null or non-UTF-8 title.
///
/// # Safety
///
/// `handle` must be null or a live pointer from `todo_store_create`.
/// `title` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_msg_add_todo(
    handle: *const StoreHandle,
    req_id: u64,
    title: *const c_char,
) -> bool {
    match unsafe { read_str(title) } {
        Ok(Some(title)) => unsafe { dispatch(handle, req_id, Msg::AddTodo(title)) },
        Ok(None) => {
            tracing::error!(req_id, "AddTodo without a title");
            false
        },
        Err(error) => {
            tracing::error!(req_id, %error, "Invalid AddTodo title");
            false
        },
    }
}

/// Removes the todo with `id`
///
/// # Safety
///
/// `handle` must be null or a live pointer from `todo_store_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_msg_remove_todo(handle: *const StoreHandle, req_id: u64, id: u32) -> bool {
    unsafe { dispatch(handle, req_id, Msg::RemoveTodo(TodoId::new(id))) }
}

/// Removes every completed todo
///
/// # Safety
///
/// `handle` must be null or a live pointer from `todo_store_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_msg_remove_completed(handle: *const StoreHandle, req_id: u64) -> bool {
    unsafe { dispatch(handle, req_id, Msg::RemoveCompleted) }
}

/// Marks the todo with `id` completed
///
/// # Safety
///
/// `handle` must be null or a live pointer from `todo_store_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_msg_complete_todo(handle: *const StoreHandle, req_id: u64, id: u32) -> bool {
    unsafe { dispatch(handle, req_id, Msg::CompleteTodo(TodoId::new(id))) }
}

/// Marks the todo with `id` pending
///
/// # Safety
///
/// `handle` must be null or a live pointer from `todo_store_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_msg_restart_todo(handle: *const StoreHandle, req_id: u64, id: u32) -> bool {
    unsafe { dispatch(handle, req_id, Msg::RestartTodo(TodoId::new(id))) }
}

/// Flips the todo with `id`
///
/// # Safety
///
/// `handle` must be null or a live pointer from `todo_store_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_msg_toggle_todo(handle: *const StoreHandle, req_id: u64, id: u32) -> bool {
    unsafe { dispatch(handle, req_id, Msg::ToggleTodo(TodoId::new(id))) }
}

/// Marks every todo completed
///
/// # Safety
///
/// `handle` must be null or a live pointer from `todo_store_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_msg_complete_all(handle: *const StoreHandle, req_id: u64) -> bool {
    unsafe { dispatch(handle, req_id, Msg::CompleteAll) }
}

/// Marks every todo pending
///
/// # Safety
///
/// `handle` must be null or a live pointer from `todo_store_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_msg_restart_all(handle: *const StoreHandle, req_id: u64) -> bool {
    unsafe { dispatch(handle, req_id, Msg::RestartAll) }
}

/// Sets the display filter; `code` is 0 completed, 1 pending, 2 all
///
/// Returns false for an unknown code.
///
/// # Safety
///
/// `handle` must be null or a live pointer from `todo_store_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_msg_set_filter(handle: *const StoreHandle, req_id: u64, code: u8) -> bool {
    if let Some(filter) = Filter::from_code(u32::from(code)) {
        unsafe { dispatch(handle, req_id, Msg::SetFilter(filter)) }
    } else {
        tracing::error!(req_id, code, "Invalid filter");
        false
    }
}

/// Turns auto-expiry of completed todos on or off
///
/// # Safety
///
/// `handle` must be null or a live pointer from `todo_store_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_msg_set_auto_expire_completed_todos(
    handle: *const StoreHandle,
    req_id: u64,
    enabled: bool,
) -> bool {
    unsafe { dispatch(handle, req_id, Msg::SetAutoExpireCompletedTodos(enabled)) }
}

/// Dispatches a message by numeric tag
///
/// `number` carries the id or filter code, `text` the title and `flag` the
/// boolean argument. Unused arguments are ignored. Returns false if the
/// message cannot be decoded.
///
/// # Safety
///
/// `handle` must be null or a live pointer from `todo_store_create`.
/// `text` must be null or a NUL-terminated string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_msg_dispatch(
    handle: *const StoreHandle,
    tag: u8,
    req_id: u64,
    number: u32,
    text: *const c_char,
    flag: bool,
) -> bool {
    let decoded = unsafe { read_str(text) }
        .and_then(|text| Msg::decode(tag, MsgArgs { number, text, flag }));
    match decoded {
        Ok(msg) => unsafe { dispatch(handle, req_id, msg) },
        Err(error) => {
            tracing::error!(tag, req_id, %error, "Could not decode message");
            false
        },
    }
}

// ========== Replies ==========

/// Next queued reply in arrival order, null when none
///
/// # Safety
///
/// `handle` must be null or a live pointer from `todo_store_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_reply_poll(handle: *const StoreHandle) -> *mut Reply {
    unsafe { handle_ref(handle) }
        .and_then(|h| h.store().replies().poll())
        .map_or(ptr::null_mut(), into_raw)
}

/// Removes the oldest reply for `req_id`, null when none
///
/// # Safety
///
/// `handle` must be null or a live pointer from `todo_store_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_reply_take(handle: *const StoreHandle, req_id: u64) -> *mut Reply {
    unsafe { handle_ref(handle) }
        .and_then(|h| h.store().replies().take(req_id))
        .map_or(ptr::null_mut(), into_raw)
}

/// Like [`todo_reply_take`], waiting up to `timeout_ms` for the reply
///
/// # Safety
///
/// `handle` must be null or a live pointer from `todo_store_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_reply_wait(
    handle: *const StoreHandle,
    req_id: u64,
    timeout_ms: u64,
) -> *mut Reply {
    const POLL_INTERVAL: Duration = Duration::from_millis(1);

    let Some(handle) = (unsafe { handle_ref(handle) }) else {
        return ptr::null_mut();
    };
    let replies = handle.store().replies();
    let waited = handle.runtime().block_on(tokio::time::timeout(
        Duration::from_millis(timeout_ms),
        async {
            loop {
                if let Some(reply) = replies.take(req_id) {
                    return reply;
                }
                tokio::time::sleep(POLL_INTERVAL).await;
            }
        },
    ));
    waited.map_or(ptr::null_mut(), into_raw)
}

/// Discards queued replies for `req_id`, returning how many
///
/// # Safety
///
/// `handle` must be null or a live pointer from `todo_store_create`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_reply_handled(handle: *const StoreHandle, req_id: u64) -> usize {
    unsafe { handle_ref(handle) }.map_or(0, |h| h.store().replies().handled(req_id))
}

/// Reply kind: 0..=9 follow the message tags, 10 expired, 11 tick
///
/// Returns `u8::MAX` for null.
///
/// # Safety
///
/// `reply` must be null or a live pointer from a `todo_reply_` function.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_reply_kind(reply: *const Reply) -> u8 {
    // SAFETY: null or live per the caller contract
    unsafe { reply.as_ref() }.map_or(u8::MAX, Reply::kind)
}

/// Request id the reply answers, 0 for store events
///
/// # Safety
///
/// `reply` must be null or a live pointer from a `todo_reply_` function.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_reply_req_id(reply: *const Reply) -> u64 {
    // SAFETY: null or live per the caller contract
    unsafe { reply.as_ref() }.map_or(0, Reply::req_id)
}

/// Reply payload as an owned string, null when it has none
///
/// # Safety
///
/// `reply` must be null or a live pointer from a `todo_reply_` function.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_reply_data(reply: *const Reply) -> *mut c_char {
    // SAFETY: null or live per the caller contract
    unsafe { reply.as_ref() }
        .and_then(Reply::data)
        .map_or(ptr::null_mut(), |data| to_c_string(&data))
}

/// Releases a reply
///
/// # Safety
///
/// `reply` must be null or a pointer from a `todo_reply_` function that has
/// not been freed.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn todo_reply_free(reply: *mut Reply) {
    if reply.is_null() {
        return;
    }
    // SAFETY: allocated by `Box::into_raw` in `into_raw`
    drop(unsafe { Box::from_raw(reply) });
}

fn into_raw(reply: Reply) -> *mut Reply {
    Box::into_raw(Box::new(reply))
}
