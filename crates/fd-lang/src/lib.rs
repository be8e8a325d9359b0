pub mod ast;
mod compile;
mod error;
pub mod parse_utils;
mod parser;
pub mod temporal;

pub use compile::compile;
pub use error::CompileError;
pub use parser::parse_expr;
