//! Static-analysis front end for PHP sources: tokens, an arena AST with
//! parent links, a shared symbol registry and inheritance resolution.

pub mod ast;
pub mod builder;
pub mod cache;
pub mod config;
pub mod error;
pub mod lexer;
pub mod line_index;
pub mod parser;
pub mod resolve;
pub mod span;

use std::sync::Arc;

pub use ast::{Ast, Node, NodeFlags, NodeId, NodeKind};
pub use builder::{Builder, EntityId, EntityKind, SourceFile};
pub use config::Config;
pub use error::{AstError, BuilderError, ConfigError, ParseError, ResolveError};
pub use resolve::{MemberOrigin, ResolvedConstant, ResolvedMethod};
pub use span::Span;

/// Parses a single source string into a fresh registry.
pub fn parse(source: &str) -> Result<(Builder, Arc<Ast>), ParseError> {
    let builder = Builder::new();
    let ast = builder.parse_source(&SourceFile::new("<input>", source))?;
    Ok((builder, ast))
}
