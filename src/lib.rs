//! `emberscript` is an embeddable interpreter for a statically-typed,
//! C-like scripting language with classes, handles, arrays, and enums
//! (`spec.md` §1).
//!
//! A host loads source text into an [`Engine`], registers native
//! functions/objects/classes, and calls script functions, exchanging
//! [`HostValue`]s across the boundary:
//!
//! ```
//! use emberscript::{Engine, HostValue};
//!
//! let mut engine = Engine::new();
//! engine.load("int add(int a, int b) { return a + b; }").unwrap();
//! let result = engine.call("add", vec![HostValue::Int(2), HostValue::Int(3)]).unwrap();
//! assert!(matches!(result, HostValue::Int(5)));
//! ```

mod ast;
mod engine;
mod environment;
mod error;
mod evaluator;
mod heap;
mod interop;
mod io;
mod lexer;
mod parser;
mod token;
mod value;

pub use engine::{ClassFactory, Engine};
pub use error::{EngineError, LexError, LexErrorKind, ParseError, ParseErrorKind, RuntimeError, RuntimeErrorKind};
pub use interop::{HostFn, HostValue, NativeMember, NativeObject};
pub use io::{CollectStringPrint, NoPrint, PrintWriter, StdPrint};
