use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExprError {
    #[error("unexpected end of expression")]
    UnexpectedEnd,
    #[error("unexpected token {0:?}")]
    UnexpectedToken(String),
    #[error("unknown function {0:?}")]
    UnknownFunc(String),
    #[error("unknown property {0:?}")]
    UnknownProperty(String),
    #[error("bad regex {0:?}: {1}")]
    BadRegex(String, regex::Error),
    #[error("bad argument to {0:?}: {1:?}")]
    BadArg(String, String),
}

pub type Result<T> = std::result::Result<T, ExprError>;
