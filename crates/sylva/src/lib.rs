//! # Sylva
//!
//! An incremental GLR parser runtime.
//!
//! Sylva is the execution half of a parsing toolkit: it takes a grammar
//! that has already been compiled into tables (a [`Language`]) plus an
//! [`Input`], and produces a concrete [`SyntaxTree`]. Three capabilities
//! define it:
//!
//! - **Generalized LR over a graph-structured stack**: ambiguous grammar
//!   alternatives are explored as concurrent stack versions that share
//!   history, merge when they converge, and are condensed so the fan-out
//!   stays bounded.
//! - **Incremental reparsing**: given a previous tree whose edits were
//!   applied with [`SyntaxTree::edit`], unchanged subtrees are reused by
//!   identity, without re-lexing or re-parsing them.
//! - **Error recovery with cost accounting**: on lexical or syntactic
//!   failure the parser inserts missing tokens, skips input, and unwinds
//!   to earlier states, ranking every candidate by a weighted error-cost
//!   model and always returning a tree.
//!
//! The parse-table compiler, tree serialization, and editor plumbing are
//! deliberately out of scope; they interact with this crate only through
//! the [`language`] contract and the tree API.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use sylva::{Parser, StringInput};
//! use std::rc::Rc;
//!
//! let language = Rc::new(my_compiled_language());
//! let mut parser = Parser::new();
//! parser.set_language(&language)?;
//!
//! let mut input = StringInput::new("fn main() {}");
//! let tree = parser.parse(&mut input, None, false).unwrap();
//!
//! // After an edit, reuse everything the edit did not touch:
//! let mut edited = tree.clone();
//! edited.edit(&my_input_edit);
//! let mut input = StringInput::new("fn main() { x }");
//! let new_tree = parser.parse(&mut input, Some(&edited), false).unwrap();
//! ```
//!
//! ## Modules
//!
//! - [`language`]: the compiled-grammar contract (symbols, actions,
//!   tables, lex modes, external scanners, error costs)
//! - [`tree`]: shared immutable syntax trees, the tree pool, and edits
//! - [`lexer`]: the position-tracked lexing driver
//! - [`input`]: the character-input contract
//! - [`event`]: the optional parse-event sink
//! - [`parser`]: the GLR driver, recovery, and condensation

pub mod event;
pub mod input;
pub mod language;
pub mod length;
pub mod lexer;
pub mod parser;
pub mod tree;

mod reusable;
mod stack;

pub use event::{NullEventHandler, ParseEvent, ParseEventHandler};
pub use input::{Input, StringInput};
pub use language::{
    ErrorCosts, ExternalScanner, ExternalScannerDef, Language, LanguageError, LexFn, LexMode,
    ParseAction, StateId, Symbol, SymbolMetadata, TableEntry, ERROR_STATE, LANGUAGE_VERSION,
    STATE_NONE, SYM_END, SYM_ERROR, SYM_ERROR_REPEAT,
};
pub use length::{Length, Point};
pub use lexer::Lexer;
pub use parser::{Parser, MAX_VERSION_COUNT};
pub use tree::{InputEdit, SyntaxTree, Tree, TreePool};
