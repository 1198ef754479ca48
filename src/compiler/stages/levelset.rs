use crate::compiler::builder::{GraphBuilder, parallel};
use crate::compiler::names::*;
use crate::compiler::performers::PerformerEntry;
use crate::error::CompileError;
use crate::graph::{Operation, Stage};

impl GraphBuilder<'_> {
    fn kernel(&self) -> Result<&PerformerEntry, CompileError> {
        self.performers
            .geometry_kernel()
            .ok_or_else(|| CompileError::UnknownPerformer(STAGE_UPDATE_PROBLEM.to_string()))
    }

    /// The geometry kernel builds the initial level set, which the main engine copies into
    /// `Control`.
    pub(super) fn levelset_initial_guess_stage(&self) -> Result<Stage, CompileError> {
        let kernel = self.kernel()?;
        let mut stage = Stage::new(STAGE_INITIAL_GUESS);
        stage.operations.push(
            Operation::new("Update Problem", &kernel.name)
                .output(INITIAL_CONTROL, INITIAL_CONTROL)
                .into(),
        );
        stage.operations.push(
            Operation::new("Copy Field", self.main())
                .input("InputField", INITIAL_CONTROL)
                .output("OutputField", CONTROL)
                .into(),
        );
        stage.outputs.push(CONTROL.to_string());
        Ok(stage)
    }

    /// Remeshes from the current design, then has every solver reload the mesh.
    pub(super) fn levelset_update_stage(&self) -> Result<Stage, CompileError> {
        let kernel = self.kernel()?;
        let mut stage = Stage::new(STAGE_UPDATE_PROBLEM);
        stage.inputs.push(CONTROL.to_string());
        stage.operations.extend(self.filter.control_ops());
        stage.operations.push(
            Operation::new("Update Problem", &kernel.name)
                .input("Topology", TOPOLOGY)
                .into(),
        );
        stage
            .operations
            .extend(self.flagged_operations("Update Problem", |s| s.update_problem)?);
        let reloads = self
            .performers
            .physics()
            .map(|p| Operation::new("Reload Mesh", &p.name).into())
            .collect();
        stage.operations.extend(parallel(reloads));
        Ok(stage)
    }
}
