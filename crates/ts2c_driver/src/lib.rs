//! ts2c driver: parse TypeScript with oxc, lower it to the translator's IR
//! with resolved types, and render the C translation unit.

pub mod pipeline;

pub use pipeline::{compile_file, compile_source, output_path, CompileError, CompileOptions};
