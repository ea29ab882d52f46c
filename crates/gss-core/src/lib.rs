pub mod ast;
pub mod bidi;
pub mod compiler;
pub mod conditionals;
pub mod config;
pub mod duplicates;
pub mod emitter;
pub mod error;
pub mod functions;
pub mod loader;
pub mod parser;
pub mod renaming;
pub mod resolver;
pub mod resources;
pub mod sprite;
pub mod visitor;

pub use compiler::{CompiledStylesheet, Compiler, Prepared};
pub use config::CompileConfig;
pub use emitter::PrintedStylesheet;
pub use error::{CompileError, ErrorManager, GssError, Result, Span};
pub use loader::{load_sources, LoadedSource};
