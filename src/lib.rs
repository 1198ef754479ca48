//! # plato-interface - Interface Graph Compiler
//!
//! **plato-interface** compiles the declarative description of an optimization problem into
//! the interface graph an orchestration runtime executes: which executables take part
//! (performers), which named data slots they exchange (shared data), and which ordered
//! stages of operations the optimizer calls each iteration.
//!
//! ## Core Workflow
//!
//! The compiler is format-agnostic. It operates on a canonical model of the problem,
//! [`ProblemMetadata`](metadata::ProblemMetadata). The primary workflow is:
//!
//! 1.  **Load Your Problem**: Parse your input format into your own Rust structs, or use the bundled JSON [`MetadataDocument`](metadata::MetadataDocument).
//! 2.  **Convert to the Canonical Model**: Implement [`IntoMetadata`](metadata::IntoMetadata) for your structs.
//! 3.  **Compile**: Use `Compiler::builder` to create a compiler for the metadata. Compilation validates the problem, synthesizes every channel, then builds the stages and the optimizer block against them.
//! 4.  **Emit**: Write the resulting [`InterfaceGraph`](graph::InterfaceGraph) as interface XML, or save it as a binary artifact.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use plato_interface::prelude::*;
//!
//! fn main() -> Result<()> {
//!     // 1. Load the problem description.
//!     let document = MetadataDocument::from_file("problem.json")?;
//!
//!     // 2. Convert it into the canonical model.
//!     let metadata = document.into_metadata()?;
//!
//!     // 3. Compile it.
//!     let graph = Compiler::builder(metadata).build().compile()?;
//!     println!(
//!         "{} performers, {} shared data, {} stages",
//!         graph.performers.len(),
//!         graph.channel_names().len(),
//!         graph.stages.len()
//!     );
//!
//!     // 4. Emit the interface document.
//!     std::fs::write("interface.xml", graph.to_xml()?)?;
//!     Ok(())
//! }
//! ```

pub mod compiler;
pub mod error;
pub mod graph;
pub mod metadata;
pub mod prelude;
