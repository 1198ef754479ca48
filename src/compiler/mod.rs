use crate::error::CompileError;
use crate::graph::InterfaceGraph;
use crate::metadata::{ProblemMetadata, ServiceCode, validate};
use ahash::AHashMap;

#[cfg(feature = "debug-tools")]
use std::fs;

mod aggregation;
mod builder;
mod channels;
pub mod conventions;
mod filter;
pub mod identifier;
pub mod names;
mod options;
mod performers;
mod pipeline;
mod stages;
mod synthesis;
mod verify;

use builder::GraphBuilder;
use conventions::*;

pub use conventions::{CriterionOps, CriterionRole, ServiceConvention, default_convention};
pub use identifier::{compound_is_ambiguous, compound_scenario, resolve};
pub use verify::verify;

pub struct Compiler {
    metadata: ProblemMetadata,
    conventions: AHashMap<ServiceCode, Box<dyn ServiceConvention>>,
    verify: bool,
}

pub struct CompilerBuilder {
    metadata: ProblemMetadata,
    conventions: AHashMap<ServiceCode, Box<dyn ServiceConvention>>,
    verify: bool,
}

impl CompilerBuilder {
    pub fn new(metadata: ProblemMetadata) -> Self {
        let mut conventions: AHashMap<ServiceCode, Box<dyn ServiceConvention>> = AHashMap::new();
        register_default_conventions(&mut conventions);
        Self {
            metadata,
            conventions,
            verify: true,
        }
    }

    /// Replaces the operation naming used for one service code.
    pub fn with_convention(mut self, convention: Box<dyn ServiceConvention>) -> Self {
        self.conventions.insert(convention.code(), convention);
        self
    }

    /// Evaluates criteria on `code` services with the naming of `template`.
    ///
    /// Codes without a convention of their own (`xtk`, `plato_esp`) cannot serve as a
    /// template; such a mapping is ignored with a warning.
    pub fn with_code_mapping(mut self, code: ServiceCode, template: ServiceCode) -> Self {
        match default_convention(template) {
            Some(convention) => {
                self.conventions.insert(code, convention);
            }
            None => tracing::warn!(
                code = code.as_str(),
                template = template.as_str(),
                "Ignoring code mapping: the template code has no operation naming"
            ),
        }
        self
    }

    /// Toggles the structural check run on the finished graph. On by default.
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    pub fn build(self) -> Compiler {
        Compiler {
            metadata: self.metadata,
            conventions: self.conventions,
            verify: self.verify,
        }
    }
}

impl Compiler {
    pub fn builder(metadata: ProblemMetadata) -> CompilerBuilder {
        CompilerBuilder::new(metadata)
    }

    pub fn metadata(&self) -> &ProblemMetadata {
        &self.metadata
    }

    /// Compiles the problem into an interface graph.
    ///
    /// The metadata is validated first; any failure leaves no partial graph behind.
    pub fn compile(&self) -> Result<InterfaceGraph, CompileError> {
        let objective = &self.metadata.objective;
        tracing::info!(
            criteria = objective.criteria_ids.len(),
            constraints = self.metadata.constraints.len(),
            services = self.metadata.services.len(),
            "Compiling interface graph"
        );

        validate(&self.metadata)?;

        if objective.multi_load_case && compound_is_ambiguous(&objective.scenario_ids) {
            tracing::warn!(
                compound = compound_scenario(&objective.scenario_ids).as_str(),
                "Multi-load-case scenario ids are concatenated without a separator; \
                 different scenario lists may produce the same channel names"
            );
        }

        let graph = GraphBuilder::new(&self.metadata, &self.conventions)?.build()?;

        if self.verify {
            verify(&graph)?;
        }

        #[cfg(feature = "debug-tools")]
        self.write_debug_dump(&graph);

        tracing::info!(
            performers = graph.performers.len(),
            channels = graph.channel_names().len(),
            stages = graph.stages.len(),
            "Compilation successful"
        );
        Ok(graph)
    }

    #[cfg(feature = "debug-tools")]
    fn write_debug_dump(&self, graph: &InterfaceGraph) {
        match graph.to_xml() {
            Ok(xml) => self.write_debug_file("tmp/interface.xml", &xml),
            Err(e) => tracing::warn!("Could not render debug XML: {}", e),
        }
        self.write_debug_file("tmp/interface_graph.txt", &format!("{:#?}", graph));
    }

    #[cfg(feature = "debug-tools")]
    fn write_debug_file(&self, path: &str, content: &str) {
        let result = std::path::Path::new(path)
            .parent()
            .map_or(Ok(()), fs::create_dir_all)
            .and_then(|_| fs::write(path, content));
        if let Err(e) = result {
            tracing::warn!("Failed to write debug file '{}': {}", path, e);
        }
    }
}
