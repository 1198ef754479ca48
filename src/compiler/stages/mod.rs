//! Phase two: builds the ordered stage list against the completed channel table.

mod levelset;
mod robust;
mod shape;
mod topology;

use super::builder::{GraphBuilder, parallel};
use super::names::*;
use super::pipeline::Pipeline;
use crate::error::CompileError;
use crate::graph::{Operation, OperationNode, Stage};
use crate::metadata::Service;

impl GraphBuilder<'_> {
    pub(in crate::compiler) fn build_stages(&mut self) -> Result<(), CompileError> {
        let mut stages = Vec::new();

        // --- 1. Initialization ---
        if self.pipeline.is_topology() {
            stages.push(self.design_volume_stage());
        }
        stages.push(match self.pipeline {
            Pipeline::Density | Pipeline::RobustDensity => self.initial_guess_stage(),
            Pipeline::Levelset => self.levelset_initial_guess_stage()?,
            Pipeline::Shape => self.initialize_parameters_stage(),
        });
        stages.extend(self.bound_stages());

        // --- 2. Problem maintenance ---
        stages.extend(self.cache_state_stage()?);
        stages.extend(self.update_problem_stage()?);

        // --- 3. Objective ---
        match self.pipeline {
            Pipeline::Density | Pipeline::Levelset => {
                stages.push(self.objective_value_stage()?);
                stages.push(self.objective_gradient_stage()?);
            }
            Pipeline::Shape => {
                stages.push(self.shape_objective_value_stage()?);
                stages.push(self.shape_objective_gradient_stage()?);
            }
            Pipeline::RobustDensity => {
                stages.push(self.robust_objective_value_stage()?);
                stages.push(self.robust_objective_gradient_stage()?);
            }
        }

        // --- 4. Constraints ---
        for constraint in &self.constraints {
            match self.pipeline {
                Pipeline::Shape => stages.extend(self.shape_constraint_stages(constraint)?),
                _ => stages.extend(self.constraint_stages(constraint)),
            }
        }

        // --- 5. Output ---
        stages.extend(match self.pipeline {
            Pipeline::RobustDensity => self.robust_output_stage()?,
            _ => self.output_stage()?,
        });

        for stage in stages {
            self.push_stage(stage);
        }
        Ok(())
    }

    fn design_volume_stage(&self) -> Stage {
        let mut stage = Stage::new(STAGE_DESIGN_VOLUME);
        stage.operations.push(
            Operation::new("Design Volume", self.main())
                .output("Design Volume", DESIGN_VOLUME)
                .into(),
        );
        stage.outputs.push(DESIGN_VOLUME.to_string());
        stage
    }

    /// Bound vectors are computed by the geometry kernel when there is one, otherwise by the
    /// main engine from the scalar bound values.
    fn bound_stages(&self) -> Vec<Stage> {
        let kernel = self.performers.geometry_kernel();
        [
            (STAGE_LOWER_BOUNDS, "Compute Lower Bounds", LOWER_BOUND_VALUE, LOWER_BOUND_VECTOR),
            (STAGE_UPPER_BOUNDS, "Compute Upper Bounds", UPPER_BOUND_VALUE, UPPER_BOUND_VECTOR),
        ]
        .into_iter()
        .map(|(name, operation, value, vector)| {
            let mut stage = Stage::new(name);
            let op = match kernel {
                Some(kernel) => Operation::new(operation, &kernel.name).output(vector, vector),
                None => {
                    stage.inputs.push(value.to_string());
                    Operation::new(operation, self.main())
                        .input(value, value)
                        .output(vector, vector)
                }
            };
            stage.operations.push(op.into());
            stage.outputs.push(vector.to_string());
            stage
        })
        .collect()
    }

    /// One operation per flagged service, batched.
    fn flagged_operations(
        &self,
        operation: &str,
        flagged: impl Fn(&Service) -> bool,
    ) -> Result<Vec<OperationNode>, CompileError> {
        let nodes = self
            .metadata
            .services
            .iter()
            .filter(|s| flagged(s))
            .map(|s| {
                let performer = self.performers.for_service(&s.id)?;
                Ok(Operation::new(operation, &performer.name).into())
            })
            .collect::<Result<Vec<_>, CompileError>>()?;
        Ok(parallel(nodes))
    }

    fn cache_state_stage(&self) -> Result<Option<Stage>, CompileError> {
        if !self.metadata.caches_state() {
            return Ok(None);
        }
        let mut stage = Stage::new(STAGE_CACHE_STATE);
        stage.operations = self.flagged_operations("Cache State", |s| s.cache_state)?;
        Ok(Some(stage))
    }

    fn update_problem_stage(&self) -> Result<Option<Stage>, CompileError> {
        if self.pipeline == Pipeline::Levelset {
            return self.levelset_update_stage().map(Some);
        }
        if !self.metadata.updates_problem() {
            return Ok(None);
        }
        let mut stage = Stage::new(STAGE_UPDATE_PROBLEM);
        stage.operations = self.flagged_operations("Update Problem", |s| s.update_problem)?;
        Ok(Some(stage))
    }

    /// Writes every deterministic quantity of interest, then hands the optimizer's view of
    /// the design to the main engine's output operation.
    fn output_stage(&self) -> Result<Option<Stage>, CompileError> {
        let output = &self.metadata.output;
        if !output.enabled {
            return Ok(None);
        }

        let mut main_output = Operation::new("PlatoMainOutput", self.main());
        if self.pipeline.is_topology() {
            main_output = main_output
                .input("topology", TOPOLOGY)
                .input("control", CONTROL);
        }
        main_output = self.gradient_outputs(main_output);

        let mut writes = Vec::new();
        for service in output.services.iter().filter(|s| !s.deterministic.is_empty()) {
            let performer = self.performers.for_service(&service.service_id)?;
            let mut write = Operation::new("Write Output", &performer.name);
            for qoi in &service.deterministic {
                for (channel, argument) in self.qoi_channels(&service.service_id, qoi)? {
                    write = write.output(argument, &channel);
                    main_output = main_output.input(&channel, &channel);
                }
            }
            writes.push(write.into());
        }

        let mut stage = Stage::new(STAGE_OUTPUT);
        stage.operations = parallel(writes);
        stage.operations.push(main_output.into());
        Ok(Some(stage))
    }

    fn gradient_outputs(&self, op: Operation) -> Operation {
        self.constraints.iter().fold(
            op.input("objective gradient", OBJECTIVE_GRADIENT),
            |op, c| op.input(format!("constraint gradient {}", c.id), constraint_gradient(&c.id)),
        )
    }
}
