//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits from the plato-interface
//! crate. Import it to get the compiler, the metadata model and the graph types without
//! naming each one.
//!
//! # Example
//!
//! ```rust,no_run
//! use plato_interface::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let metadata = MetadataDocument::from_file("path/to/problem.json")?.into_metadata()?;
//!
//! let graph = Compiler::builder(metadata).build().compile()?;
//! std::fs::write("interface.xml", graph.to_xml()?)?;
//! # Ok(())
//! # }
//! ```

// Compilation
pub use crate::compiler::{Compiler, CompilerBuilder, ServiceConvention};

// Metadata model
pub use crate::metadata::{
    Algorithm, Constraint, ConstraintTarget, Criterion, CriterionKind, Discretization,
    FieldLayout, FilterType, IntoMetadata, MetadataDocument, Objective, OptimizationParameters,
    OptimizationType, OutputSettings, ProblemMetadata, ProjectionType, QuantityOfInterest,
    Relation, RobustSettings, Scenario, Service, ServiceCode, ServiceOutput, ShapeSettings,
};

// Compiled graph
pub use crate::graph::{
    Argument, Channel, Fanout, InterfaceGraph, Layout, Operation, OperationNode, OptionNode,
    Performer, Stage,
};

// Error types
pub use crate::error::{CompileError, ErrorKind, MetadataError, SerializeError};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
