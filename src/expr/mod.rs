//! Math channel equations over channels A, B and F.
pub mod lexer;
pub mod parser;
pub mod solve;

pub use lexer::{validate, Expression, Token};
pub use parser::Operands;
pub use solve::{approx_voltage, solve_over_domain};
