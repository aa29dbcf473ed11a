use std::fmt;

use thiserror::Error;

use crate::types::ChannelKind;

/// Which side of a bracket pair is missing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Bracket {
    MissingOpen,
    MissingClose,
}

impl fmt::Display for Bracket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bracket::MissingOpen => f.write_str("missing opening bracket"),
            Bracket::MissingClose => f.write_str("missing closing bracket"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SyntaxError {
    #[error("invalid symbol '{symbol}' at position {position}")]
    InvalidSymbol { symbol: char, position: usize },
    #[error("{0}")]
    UnmatchedBracket(Bracket),
    #[error("brackets nested deeper than {limit} levels at position {position}")]
    NestingTooDeep { limit: usize, position: usize },
}

#[derive(Debug, Error)]
pub enum ScopeError {
    #[error("at least two samples per acquisition are required")]
    InsufficientSamples,
    #[error("invalid filter: {0}")]
    InvalidFilterSpec(String),
    #[error("{0}")]
    Syntax(#[from] SyntaxError),
    #[error("{0}")]
    MalformedExpression(String),
    #[error("cannot use values of {0} with no data")]
    MissingChannelData(ChannelKind),
    #[error("{table} division index {index} is out of range")]
    InvalidDivision { table: &'static str, index: usize },
    #[error("specified filter file is incorrectly formatted (line {line}: {reason})")]
    FilterFormat { line: usize, reason: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("{0}")]
    Rejected(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to render plot: {0}")]
    Plot(String),
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for ScopeError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        ScopeError::Plot(format!("{value:?}"))
    }
}

impl From<image::ImageError> for ScopeError {
    fn from(value: image::ImageError) -> Self {
        ScopeError::Plot(value.to_string())
    }
}

pub type ScopeResult<T> = Result<T, ScopeError>;
