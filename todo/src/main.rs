//! Command-line demo for the todo store.
//!
//! Walks through the commands on a store seeded with demo todos, then turns
//! auto-expiry on and watches completed todos disappear.

use anyhow::Context;
use std::time::Duration;
use todo_store::{Filter, Msg, Reply, TodoConfig, TodoId, TodoStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Short lifetime so the demo finishes quickly unless overridden
    let config = TodoConfig::from_env().with_completed_expiry_millis(
        std::env::var("TODO_COMPLETED_EXPIRY_MILLIS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(300),
    );
    todo_store::init_tracing(&format!("todo_store={}", config.log_level));

    println!("=== Todo Store ===\n");

    let store = TodoStore::create_with_samples(config)
        .await
        .context("failed to create store")?;
    print_todos(&store, "Sample todos").await;

    println!("\nAdding 'Buy milk'...");
    let reply = store.request(Msg::AddTodo("Buy milk".to_string())).await?;
    let Some(Reply::AddedTodo { id, .. }) = reply else {
        anyhow::bail!("expected AddedTodo reply, got {reply:?}");
    };

    println!("Completing ({id}) and toggling (3)...");
    store.request(Msg::CompleteTodo(id)).await?;
    store.request(Msg::ToggleTodo(TodoId::new(3))).await?;

    store.request(Msg::SetFilter(Filter::Pending)).await?;
    print_todos(&store, "Pending").await;
    store.request(Msg::SetFilter(Filter::Completed)).await?;
    print_todos(&store, "Completed").await;
    store.request(Msg::SetFilter(Filter::All)).await?;

    println!("\nEnabling auto-expiry...");
    store
        .request(Msg::SetAutoExpireCompletedTodos(true))
        .await?;

    let expiry = Duration::from_millis(store.config().completed_expiry_millis);
    tokio::time::sleep(expiry + store.config().expiry_tick() * 5).await;

    let expired: Vec<_> = store
        .replies()
        .drain()
        .into_iter()
        .filter_map(|reply| match reply {
            Reply::CompletedTodoExpired(id) => Some(id),
            _ => None,
        })
        .collect();
    println!("Expired: {expired:?}");
    print_todos(&store, "Remaining").await;

    store.shutdown().await?;
    println!("\n=== Demo Complete ===");
    Ok(())
}

async fn print_todos(store: &TodoStore, heading: &str) {
    let guard = store.lock().await;
    println!("\n{heading} ({}/{} completed):", guard.completed_count(), guard.count());
    for todo in guard.filtered_todos() {
        println!("  {todo}");
    }
}
