//! Rule compiling and evaluation module
//!
//! This module turns expressions like "age > 30 AND department == 'Sales'"
//! into an AST, evaluates it against key-value data, folds several rules into
//! one, and converts trees to and from their persisted record form.

mod ast;
pub mod cache;
mod combinator;
mod evaluator;
pub mod normalizer;
pub mod parser;
pub mod record;

#[cfg(test)]
mod property_tests;

pub use ast::*;
pub use cache::*;
pub use combinator::*;
pub use evaluator::*;
pub use normalizer::normalize;
pub use parser::{compile, compile_with};
pub use record::*;
