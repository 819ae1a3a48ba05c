pub mod parse;
pub mod semantic;

// Re-export the oxc pieces the driver lowers from.
pub use oxc_allocator::Allocator;
pub use oxc_ast;
pub use oxc_semantic;
pub use oxc_span;
