//! Parser for template source

pub mod ast;
mod document;
mod grammar;
pub mod lexer;

pub use ast::*;
pub use document::{parse, Parser, TagCall};
pub use grammar::{
    parse_condition_args, parse_else_args, parse_expression, parse_for_args,
    parse_priority_args, ForArgs,
};
