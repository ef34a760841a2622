//! `stencil_core` is the engine behind the [stencil](https://github.com/stencil-site/stencil)
//! static site builder. Templates are plain text documents with inline
//! statements delimited by `$<` and `>$`. A document can inherit from a
//! single parent and fill the parent's slots with named sections.
//!
//! ## Processing Pipeline
//!
//! ```text
//! Manifest entry (input > mode > output)
//!   → Scanner   (finds `$<...>$` statements, splits them into command + args)
//!   → Segmenter (consumes `inherit` / `fill`, cuts the document into sections)
//!   → Resolver  (replaces `slot` statements with text bound in the scope)
//!   → Walker    (merges the sections into the scope, moves on to the parent)
//!   → the root template's resolved body is written to the output path
//! ```
//!
//! ## Template Syntax
//!
//! ```text
//! $<inherit layout.html>$      declare the parent template
//! $<fill title>$Home           open the section `title` (`def` is a synonym)
//! <h1>$<slot title>$</h1>      substitute a bound section or global variable
//! ```
//!
//! ## Modules
//!
//! - [`config`]: `stencil.toml` loading and global variables.
//! - [`manifest`]: the `input > mode > output` manifest.
//! - [`site`]: the concurrent build driver.
//!
//! ## Quick Start
//!
//! ```rust
//! use stencil_core::{ChainWalker, MemorySource, Scope};
//! use std::path::Path;
//!
//! let source = MemorySource::new()
//! 	.with("layout.html", "<h1>$<slot title>$</h1>")
//! 	.with("index.html", "$<inherit layout.html>$$<fill title>$Home");
//! let walker = ChainWalker::new(source, "");
//! let rendered = walker.build(Path::new("index.html"), &Scope::new()).unwrap();
//! assert_eq!(rendered.text, "<h1>Home</h1>");
//! ```

pub use engine::*;
pub use error::*;
pub use lexer::Statement;
pub use lexer::StatementScanner;
pub use lexer::scan;
pub use parser::*;
pub use scope::*;
pub use source::*;

pub mod config;
mod engine;
#[allow(unused_assignments)]
mod error;
pub(crate) mod lexer;
pub mod manifest;
mod parser;
mod scope;
pub mod site;
mod source;

pub use config::StencilConfig;

#[cfg(test)]
mod __fixtures;
