//! Exit-code boundary (§6: "0 success; 1 user error; 2 internal error").

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    User,
    Internal,
}

impl ExitKind {
    #[must_use]
    pub fn code(self) -> i32 {
        match self {
            ExitKind::User => 1,
            ExitKind::Internal => 2,
        }
    }
}

#[derive(Debug)]
pub struct CommandError {
    pub kind: ExitKind,
    pub source: anyhow::Error,
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)
    }
}

impl std::error::Error for CommandError {}

impl CommandError {
    pub fn user(e: impl Into<anyhow::Error>) -> Self {
        CommandError { kind: ExitKind::User, source: e.into() }
    }

    pub fn internal(e: impl Into<anyhow::Error>) -> Self {
        CommandError { kind: ExitKind::Internal, source: e.into() }
    }
}

pub type Result<T> = std::result::Result<T, CommandError>;
