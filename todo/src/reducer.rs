//! Reducer logic for the todo store.
//!
//! Commands mutate [`TodoState`] and answer with a [`Reply`] posted through
//! the environment's [`ReplySink`]. Turning auto-expiry on starts a sweep
//! that reschedules itself with `Effect::Delay` until auto-expiry is turned
//! off again.

use crate::msg::Msg;
use crate::reply::{Reply, ReplySink};
use crate::types::{TodoId, TodoState};
use std::sync::Arc;
use std::time::Duration;
use todo_store_core::{effect::Effect, environment::Clock, reducer::Reducer, smallvec, SmallVec};
use todo_store_macros::Action;

/// Interval between expiry sweeps
pub const DEFAULT_EXPIRY_TICK: Duration = Duration::from_millis(10);

/// Actions processed by [`TodoReducer`]
#[derive(Action, Clone, Debug, PartialEq, Eq)]
pub enum TodoAction {
    /// Command: apply a message on behalf of a caller
    #[command]
    Command {
        /// Caller-chosen id echoed in the reply
        req_id: u64,
        /// The message to apply
        msg: Msg,
    },

    /// Event: time to remove expired todos
    #[event]
    SweepExpired {
        /// Sweep generation that scheduled this tick
        generation: u64,
    },
}

impl TodoAction {
    /// Shorthand for [`TodoAction::Command`]
    #[must_use]
    pub const fn command(req_id: u64, msg: Msg) -> Self {
        Self::Command { req_id, msg }
    }
}

/// Environment dependencies for the todo reducer
#[derive(Clone)]
pub struct TodoEnvironment {
    /// Clock for expiry timestamps
    pub clock: Arc<dyn Clock>,
    /// Where replies are posted
    pub replies: Arc<dyn ReplySink>,
    /// Interval between expiry sweeps
    pub expiry_tick: Duration,
}

impl TodoEnvironment {
    /// Creates a new `TodoEnvironment` sweeping every [`DEFAULT_EXPIRY_TICK`]
    #[must_use]
    pub fn new(clock: Arc<dyn Clock>, replies: Arc<dyn ReplySink>) -> Self {
        Self {
            clock,
            replies,
            expiry_tick: DEFAULT_EXPIRY_TICK,
        }
    }

    /// Overrides the sweep interval
    #[must_use]
    pub const fn with_expiry_tick(mut self, expiry_tick: Duration) -> Self {
        self.expiry_tick = expiry_tick;
        self
    }
}

impl std::fmt::Debug for TodoEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TodoEnvironment")
            .field("expiry_tick", &self.expiry_tick)
            .finish_non_exhaustive()
    }
}

/// Reducer for the todo store
#[derive(Clone, Debug)]
pub struct TodoReducer;

impl TodoReducer {
    /// Creates a new `TodoReducer`
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Posts `replies` in order while the store lock is still held
    fn post(env: &TodoEnvironment, replies: impl IntoIterator<Item = Reply>) {
        for reply in replies {
            env.replies.post(reply);
        }
    }

    fn schedule_sweep(env: &TodoEnvironment, generation: u64) -> Effect<TodoAction> {
        Effect::delay(env.expiry_tick, TodoAction::SweepExpired { generation })
    }

    fn warn_unknown(found: bool, id: TodoId) {
        if !found {
            tracing::warn!(%id, "Could not find todo");
        }
    }

    /// Applies `msg`, returning its reply and whether a sweep must start
    fn apply(state: &mut TodoState, req_id: u64, msg: Msg, now_millis: i64) -> (Reply, bool) {
        let mut start_sweep = false;
        let reply = match msg {
            Msg::AddTodo(title) => {
                let id = state.add_todo(title).unwrap_or(TodoId::NONE);
                tracing::debug!(%id, "Added todo");
                Reply::AddedTodo { req_id, id }
            },
            Msg::RemoveTodo(id) => {
                Self::warn_unknown(state.remove_todo(id), id);
                Reply::RemovedTodo { req_id, id }
            },
            Msg::RemoveCompleted => {
                let removed = state.remove_completed();
                tracing::debug!(removed, "Removed completed todos");
                Reply::RemovedCompleted { req_id }
            },
            Msg::CompleteTodo(id) => {
                Self::warn_unknown(state.complete(id, now_millis), id);
                Reply::CompletedTodo { req_id, id }
            },
            Msg::RestartTodo(id) => {
                Self::warn_unknown(state.restart(id), id);
                Reply::RestartedTodo { req_id, id }
            },
            Msg::ToggleTodo(id) => {
                Self::warn_unknown(state.toggle(id, now_millis), id);
                Reply::ToggledTodo { req_id, id }
            },
            Msg::CompleteAll => {
                state.complete_all(now_millis);
                Reply::CompletedAll { req_id }
            },
            Msg::RestartAll => {
                state.restart_all();
                Reply::RestartedAll { req_id }
            },
            Msg::SetFilter(filter) => {
                state.set_filter(filter);
                Reply::SetFilter { req_id }
            },
            Msg::SetAutoExpireCompletedTodos(enabled) => {
                start_sweep = state.set_auto_expire(enabled, now_millis);
                tracing::info!(enabled, "Auto-expiry of completed todos switched");
                Reply::SetAutoExpireCompletedTodos { req_id }
            },
        };
        (reply, start_sweep)
    }
}

impl Default for TodoReducer {
    fn default() -> Self {
        Self::new()
    }
}

impl Reducer for TodoReducer {
    type State = TodoState;
    type Action = TodoAction;
    type Environment = TodoEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ========== Commands ==========
            TodoAction::Command { req_id, msg } => {
                let (reply, start_sweep) = Self::apply(state, req_id, msg, env.clock.now_millis());
                Self::post(env, [reply]);

                if start_sweep {
                    smallvec![Self::schedule_sweep(env, state.sweep_generation())]
                } else {
                    SmallVec::new()
                }
            },

            // ========== Events ==========
            TodoAction::SweepExpired { generation } => {
                if !state.settings().auto_expire_completed_todos
                    || generation != state.sweep_generation()
                {
                    tracing::trace!(generation, "Expiry sweep stopped");
                    return SmallVec::new();
                }

                let outcome = state.sweep_expired(env.clock.now_millis());
                if !outcome.expired.is_empty() {
                    tracing::debug!(expired = ?outcome.expired, "Removed expired todos");
                    metrics::counter!("todo.expired.total").increment(outcome.expired.len() as u64);
                }

                Self::post(
                    env,
                    outcome
                        .expired
                        .into_iter()
                        .map(Reply::CompletedTodoExpired)
                        .chain(outcome.ticking.into_iter().map(Reply::Tick)),
                );
                smallvec![Self::schedule_sweep(env, generation)]
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reply::ReplyQueue;
    use crate::types::{Filter, Settings};
    use todo_store_testing::{assertions, mocks::ManualClock, ReducerTest};

    fn create_test_env(clock: &ManualClock) -> TodoEnvironment {
        env_with_queue(clock).0
    }

    fn env_with_queue(clock: &ManualClock) -> (TodoEnvironment, ReplyQueue) {
        let queue = ReplyQueue::new();
        let env = TodoEnvironment::new(Arc::new(clock.clone()), Arc::new(queue.clone()));
        (env, queue)
    }

    fn add(req_id: u64, title: &str) -> TodoAction {
        TodoAction::command(req_id, Msg::AddTodo(title.to_string()))
    }

    #[test]
    fn test_add_todo_appends_with_next_id() {
        let clock = ManualClock::at_millis(0);
        let (env, queue) = env_with_queue(&clock);

        ReducerTest::new(TodoReducer::new())
            .with_env(env)
            .given_state(TodoState::new())
            .given_actions([add(1, "a")])
            .when_action(add(2, "buy milk"))
            .then_state(|state| {
                assert_eq!(state.count(), 2);
                let todo = &state.todos()[1];
                assert_eq!(todo.id, TodoId::new(2));
                assert_eq!(todo.title, "buy milk");
                assert!(!todo.completed);
                assert_eq!(todo.expiry_millis, None);
                assert_eq!(state.last_added_id(), Some(TodoId::new(2)));
            })
            .then_effects(assertions::assert_no_effects)
            .run();

        assert_eq!(
            queue.take(2),
            Some(Reply::AddedTodo {
                req_id: 2,
                id: TodoId::new(2)
            })
        );
    }

    #[test]
    fn test_remove_unknown_todo_is_noop() {
        let clock = ManualClock::at_millis(0);
        let (env, queue) = env_with_queue(&clock);

        ReducerTest::new(TodoReducer::new())
            .with_env(env)
            .given_state(TodoState::new())
            .given_actions([add(1, "a")])
            .when_action(TodoAction::command(2, Msg::RemoveTodo(TodoId::new(42))))
            .then_state(|state| assert_eq!(state.count(), 1))
            .then_effects(assertions::assert_no_effects)
            .run();

        assert_eq!(
            queue.take(2),
            Some(Reply::RemovedTodo {
                req_id: 2,
                id: TodoId::new(42)
            })
        );
    }

    #[test]
    fn test_complete_without_auto_expire_leaves_expiry_unset() {
        let clock = ManualClock::at_millis(1_000);

        ReducerTest::new(TodoReducer::new())
            .with_env(create_test_env(&clock))
            .given_state(TodoState::new())
            .given_actions([
                add(1, "a"),
                TodoAction::command(2, Msg::SetAutoExpireCompletedTodos(false)),
            ])
            .when_action(TodoAction::command(3, Msg::CompleteTodo(TodoId::new(1))))
            .then_state(|state| {
                let todo = &state.todos()[0];
                assert!(todo.completed);
                assert_eq!(todo.expiry_millis, None);
            })
            .run();
    }

    #[test]
    fn test_complete_with_auto_expire_sets_expiry() {
        let clock = ManualClock::at_millis(1_000);

        ReducerTest::new(TodoReducer::new())
            .with_env(create_test_env(&clock))
            .given_state(TodoState::with_settings(Settings {
                auto_expire_completed_todos: false,
                completed_expiry_millis: 500,
            }))
            .given_actions([
                add(1, "a"),
                TodoAction::command(2, Msg::SetAutoExpireCompletedTodos(true)),
            ])
            .when_action(TodoAction::command(3, Msg::CompleteTodo(TodoId::new(1))))
            .then_state(|state| {
                assert_eq!(state.todos()[0].expiry_millis, Some(1_500));
            })
            .then_effects(assertions::assert_no_delay_effect)
            .run();
    }

    #[test]
    fn test_toggle_twice_restores_completed() {
        let clock = ManualClock::at_millis(0);

        ReducerTest::new(TodoReducer::new())
            .with_env(create_test_env(&clock))
            .given_state(TodoState::new())
            .given_actions([add(1, "a"), TodoAction::command(2, Msg::ToggleTodo(TodoId::new(1)))])
            .when_action(TodoAction::command(3, Msg::ToggleTodo(TodoId::new(1))))
            .then_state(|state| {
                assert!(!state.todos()[0].completed);
                assert_eq!(state.todos()[0].expiry_millis, None);
            })
            .run();
    }

    #[test]
    fn test_complete_all_and_remove_completed() {
        let clock = ManualClock::at_millis(0);

        ReducerTest::new(TodoReducer::new())
            .with_env(create_test_env(&clock))
            .given_state(TodoState::new())
            .given_actions([
                add(1, "a"),
                add(2, "b"),
                TodoAction::command(3, Msg::CompleteAll),
                add(4, "c"),
            ])
            .when_action(TodoAction::command(5, Msg::RemoveCompleted))
            .then_state(|state| {
                assert_eq!(state.count(), 1);
                assert_eq!(state.todos()[0].title, "c");
            })
            .run();
    }

    #[test]
    fn test_restart_all() {
        let clock = ManualClock::at_millis(0);

        ReducerTest::new(TodoReducer::new())
            .with_env(create_test_env(&clock))
            .given_state(TodoState::with_sample_todos(Settings::default()))
            .when_action(TodoAction::command(1, Msg::RestartAll))
            .then_state(|state| assert_eq!(state.completed_count(), 0))
            .run();
    }

    #[test]
    fn test_set_filter() {
        let clock = ManualClock::at_millis(0);

        ReducerTest::new(TodoReducer::new())
            .with_env(create_test_env(&clock))
            .given_state(TodoState::new())
            .when_action(TodoAction::command(1, Msg::SetFilter(Filter::Completed)))
            .then_state(|state| assert_eq!(state.filter(), Filter::Completed))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_enabling_auto_expire_schedules_sweep() {
        let clock = ManualClock::at_millis(0);
        let env = create_test_env(&clock).with_expiry_tick(Duration::from_millis(25));

        ReducerTest::new(TodoReducer::new())
            .with_env(env)
            .given_state(TodoState::new())
            .when_action(TodoAction::command(1, Msg::SetAutoExpireCompletedTodos(true)))
            .then_state(|state| {
                assert!(state.settings().auto_expire_completed_todos);
                assert_eq!(state.sweep_generation(), 1);
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                let delayed = assertions::delayed_actions(effects);
                assert_eq!(
                    delayed,
                    vec![(
                        Duration::from_millis(25),
                        &TodoAction::SweepExpired { generation: 1 }
                    )]
                );
            })
            .run();
    }

    #[test]
    fn test_enabling_twice_does_not_start_second_sweep() {
        let clock = ManualClock::at_millis(0);

        ReducerTest::new(TodoReducer::new())
            .with_env(create_test_env(&clock))
            .given_state(TodoState::new())
            .given_actions([TodoAction::command(1, Msg::SetAutoExpireCompletedTodos(true))])
            .when_action(TodoAction::command(2, Msg::SetAutoExpireCompletedTodos(true)))
            .then_state(|state| assert_eq!(state.sweep_generation(), 1))
            .then_effects(assertions::assert_no_delay_effect)
            .run();
    }

    #[test]
    fn test_sweep_removes_expired_and_reschedules() {
        let clock = ManualClock::at_millis(7_000);
        let (env, queue) = env_with_queue(&clock);

        let mut state = TodoState::new();
        let expiring = state.add_todo("a".to_string()).unwrap_or(TodoId::NONE);
        state.add_todo("b".to_string());
        state.set_auto_expire(true, 0);
        state.complete(expiring, 0);

        ReducerTest::new(TodoReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(TodoAction::SweepExpired { generation: 1 })
            .then_state(|state| {
                assert_eq!(state.count(), 1);
                assert_eq!(state.todos()[0].id, TodoId::new(2));
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_delay_effect(effects);
            })
            .run();

        assert_eq!(queue.drain(), vec![Reply::CompletedTodoExpired(TodoId::new(1))]);
    }

    #[test]
    fn test_sweep_keeps_counting_down() {
        let clock = ManualClock::at_millis(6_999);
        let (env, queue) = env_with_queue(&clock);

        let mut state = TodoState::new();
        let id = state.add_todo("a".to_string()).unwrap_or(TodoId::NONE);
        state.set_auto_expire(true, 0);
        state.complete(id, 0);

        ReducerTest::new(TodoReducer::new())
            .with_env(env)
            .given_state(state)
            .when_action(TodoAction::SweepExpired { generation: 1 })
            .then_state(|state| assert_eq!(state.count(), 1))
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_delay_effect(effects);
            })
            .run();

        assert_eq!(queue.drain(), vec![Reply::Tick(id)]);
    }

    #[test]
    fn test_sweep_with_stale_generation_stops() {
        let clock = ManualClock::at_millis(0);

        ReducerTest::new(TodoReducer::new())
            .with_env(create_test_env(&clock))
            .given_state(TodoState::new())
            .given_actions([
                TodoAction::command(1, Msg::SetAutoExpireCompletedTodos(true)),
                TodoAction::command(2, Msg::SetAutoExpireCompletedTodos(false)),
                TodoAction::command(3, Msg::SetAutoExpireCompletedTodos(true)),
            ])
            .when_action(TodoAction::SweepExpired { generation: 1 })
            .then_state(|state| assert_eq!(state.sweep_generation(), 2))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_sweep_after_disable_stops() {
        let clock = ManualClock::at_millis(0);

        ReducerTest::new(TodoReducer::new())
            .with_env(create_test_env(&clock))
            .given_state(TodoState::new())
            .given_actions([
                TodoAction::command(1, Msg::SetAutoExpireCompletedTodos(true)),
                TodoAction::command(2, Msg::SetAutoExpireCompletedTodos(false)),
            ])
            .when_action(TodoAction::SweepExpired { generation: 1 })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn test_action_kinds() {
        assert!(add(1, "a").is_command());
        assert!(TodoAction::SweepExpired { generation: 1 }.is_event());
        assert_eq!(add(1, "a").name(), "Command");
    }

    #[test]
    fn test_replies_posted_in_command_order() {
        let clock = ManualClock::at_millis(0);
        let (env, queue) = env_with_queue(&clock);
        let reducer = TodoReducer::new();
        let mut state = TodoState::new();

        for req_id in 1..=5 {
            let effects = reducer.reduce(&mut state, add(req_id, "a"), &env);
            assert!(effects.is_empty());
            assert_eq!(queue.len(), usize::try_from(req_id).unwrap_or(usize::MAX));
        }

        let req_ids: Vec<u64> = queue.drain().iter().map(Reply::req_id).collect();
        assert_eq!(req_ids, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_add_todo_with_exhausted_ids_is_noop() {
        let clock = ManualClock::at_millis(0);
        let (env, queue) = env_with_queue(&clock);
        let exhausted: TodoState = serde_json::from_value(serde_json::json!({
            "todos": [],
            "filter": "All",
            "settings": {"auto_expire_completed_todos": false, "completed_expiry_millis": 7000},
            "last_added_id": u32::MAX,
        }))
        .unwrap_or_default();
        assert_eq!(exhausted.last_added_id(), Some(TodoId::new(u32::MAX)));

        ReducerTest::new(TodoReducer::new())
            .with_env(env)
            .given_state(exhausted)
            .when_action(add(1, "overflow"))
            .then_state(|state| {
                assert_eq!(state.count(), 0);
                assert_eq!(state.last_added_id(), Some(TodoId::new(u32::MAX)));
            })
            .run();

        assert_eq!(
            queue.take(1),
            Some(Reply::AddedTodo {
                req_id: 1,
                id: TodoId::NONE
            })
        );
    }
}
