//! Command messages accepted by the store.

use crate::types::{Filter, TodoId};
use serde::{Deserialize, Serialize};

/// A command applied to the store
///
/// Each variant is one state transition. Variants targeting a single todo
/// are no-ops when the id is unknown.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Msg {
    /// Append a new pending todo with the next id
    AddTodo(String),
    /// Remove the todo with this id
    RemoveTodo(TodoId),
    /// Remove every completed todo
    RemoveCompleted,
    /// Mark the todo completed
    CompleteTodo(TodoId),
    /// Mark the todo pending again
    RestartTodo(TodoId),
    /// Flip the todo's completed flag
    ToggleTodo(TodoId),
    /// Mark every todo completed
    CompleteAll,
    /// Mark every todo pending
    RestartAll,
    /// Replace the current filter
    SetFilter(Filter),
    /// Switch auto-expiry of completed todos
    SetAutoExpireCompletedTodos(bool),
}

/// Positional arguments that arrive alongside a numeric tag
///
/// `number` carries a todo id or a filter code depending on the tag.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MsgArgs {
    /// Todo id or filter code
    pub number: u32,
    /// Title for `AddTodo`
    pub text: Option<String>,
    /// Flag for `SetAutoExpireCompletedTodos`
    pub flag: bool,
}

/// Failure to turn a tag and its arguments into a [`Msg`]
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    /// No message has this tag
    #[error("Unknown message tag: {0}")]
    UnknownTag(u8),

    /// `AddTodo` arrived without a title
    #[error("AddTodo requires a title")]
    MissingTitle,

    /// The filter code does not name a filter
    #[error("Invalid filter code: {0}")]
    InvalidFilter(u32),

    /// A string argument was not valid UTF-8
    #[error("Invalid UTF-8 in argument: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

impl Msg {
    /// Numeric tag, following declaration order
    #[must_use]
    pub const fn tag(&self) -> u8 {
        match self {
            Self::AddTodo(_) => 0,
            Self::RemoveTodo(_) => 1,
            Self::RemoveCompleted => 2,
            Self::CompleteTodo(_) => 3,
            Self::RestartTodo(_) => 4,
            Self::ToggleTodo(_) => 5,
            Self::CompleteAll => 6,
            Self::RestartAll => 7,
            Self::SetFilter(_) => 8,
            Self::SetAutoExpireCompletedTodos(_) => 9,
        }
    }

    /// Builds a message from its tag and positional arguments
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError`] for an unknown tag, a missing title or an
    /// invalid filter code.
    pub fn decode(tag: u8, args: MsgArgs) -> Result<Self, DecodeError> {
        let id = TodoId::new(args.number);
        let msg = match tag {
            0 => Self::AddTodo(args.text.ok_or(DecodeError::MissingTitle)?),
            1 => Self::RemoveTodo(id),
            2 => Self::RemoveCompleted,
            3 => Self::CompleteTodo(id),
            4 => Self::RestartTodo(id),
            5 => Self::ToggleTodo(id),
            6 => Self::CompleteAll,
            7 => Self::RestartAll,
            8 => Self::SetFilter(
                Filter::from_code(args.number).ok_or(DecodeError::InvalidFilter(args.number))?,
            ),
            9 => Self::SetAutoExpireCompletedTodos(args.flag),
            other => return Err(DecodeError::UnknownTag(other)),
        };
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(number: u32) -> MsgArgs {
        MsgArgs {
            number,
            ..MsgArgs::default()
        }
    }

    #[test]
    fn decode_add_todo() {
        let msg = Msg::decode(
            0,
            MsgArgs {
                text: Some("buy milk".to_string()),
                ..MsgArgs::default()
            },
        );
        assert_eq!(msg, Ok(Msg::AddTodo("buy milk".to_string())));
    }

    #[test]
    fn decode_add_todo_without_title_fails() {
        assert_eq!(Msg::decode(0, MsgArgs::default()), Err(DecodeError::MissingTitle));
    }

    #[test]
    fn decode_id_messages() {
        assert_eq!(Msg::decode(1, args(4)), Ok(Msg::RemoveTodo(TodoId::new(4))));
        assert_eq!(Msg::decode(3, args(4)), Ok(Msg::CompleteTodo(TodoId::new(4))));
        assert_eq!(Msg::decode(4, args(4)), Ok(Msg::RestartTodo(TodoId::new(4))));
        assert_eq!(Msg::decode(5, args(4)), Ok(Msg::ToggleTodo(TodoId::new(4))));
    }

    #[test]
    fn decode_filter() {
        assert_eq!(Msg::decode(8, args(1)), Ok(Msg::SetFilter(Filter::Pending)));
        assert_eq!(Msg::decode(8, args(7)), Err(DecodeError::InvalidFilter(7)));
    }

    #[test]
    fn decode_auto_expire_flag() {
        let on = MsgArgs {
            flag: true,
            ..MsgArgs::default()
        };
        assert_eq!(Msg::decode(9, on), Ok(Msg::SetAutoExpireCompletedTodos(true)));
    }

    #[test]
    fn unknown_tag() {
        assert_eq!(Msg::decode(10, MsgArgs::default()), Err(DecodeError::UnknownTag(10)));
    }

    #[test]
    fn tag_matches_decode() {
        let msgs = [
            Msg::AddTodo("x".to_string()),
            Msg::RemoveTodo(TodoId::new(1)),
            Msg::RemoveCompleted,
            Msg::CompleteTodo(TodoId::new(1)),
            Msg::RestartTodo(TodoId::new(1)),
            Msg::ToggleTodo(TodoId::new(1)),
            Msg::CompleteAll,
            Msg::RestartAll,
            Msg::SetFilter(Filter::Completed),
            Msg::SetAutoExpireCompletedTodos(false),
        ];
        for msg in msgs {
            let decoded = Msg::decode(
                msg.tag(),
                MsgArgs {
                    number: 1,
                    text: Some("x".to_string()),
                    flag: false,
                },
            );
            match (&msg, decoded) {
                (Msg::SetFilter(_), Ok(Msg::SetFilter(filter))) => {
                    assert_eq!(filter, Filter::Pending);
                },
                (_, decoded) => assert_eq!(decoded, Ok(msg.clone())),
            }
        }
    }
}
