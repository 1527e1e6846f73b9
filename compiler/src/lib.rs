// rfa — Resource-argument rearrangement for dataflow function libraries
//
// Library root. Rewrites functional control-flow and call nodes so that
// resource-typed inputs come last and resource-typed outputs disappear,
// recursively through every function the graph reaches.

pub mod attr;
pub mod dot;
pub mod error;
pub mod function;
pub mod graph;
pub mod library;
pub mod pass;
pub mod plan;
pub mod program;
pub mod renumber;
pub mod rewire;
pub mod rewrite;
pub mod types;
pub mod walker;

pub use error::{ErrorKind, RearrangeError, Result};
pub use pass::{PassOptions, PassReport, RearrangePass};
