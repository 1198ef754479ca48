use crate::compiler::builder::{ConstraintPlan, CriterionPlan, GraphBuilder, parallel};
use crate::compiler::names::*;
use crate::error::CompileError;
use crate::graph::{Argument, Fanout, Operation, OperationNode, Stage};

impl GraphBuilder<'_> {
    pub(super) fn initialize_parameters_stage(&self) -> Stage {
        let mut stage = Stage::new(STAGE_INITIALIZE_PARAMETERS);
        stage.operations.push(
            Operation::new("Initialize Geometry", self.main())
                .output("Parameters", DESIGN_PARAMETERS)
                .into(),
        );
        stage.outputs.push(DESIGN_PARAMETERS.to_string());

        if self.normalizes() {
            stage.operations.extend(self.geometry_update_operations());
            let evaluations = self
                .objective
                .iter()
                .map(|plan| plan.value_operation(false, &plan.initial_value_channel()).into())
                .collect();
            stage.operations.extend(parallel(evaluations));
            stage
                .outputs
                .extend(self.objective.iter().map(|plan| plan.initial_value_channel()));
        }
        stage
    }

    /// Regenerates the geometry from `Design Parameters` and reinitializes every solver on it.
    fn geometry_update_operations(&self) -> Vec<OperationNode> {
        let settings = self.metadata.optimization_parameters.shape.as_ref();
        let mut nodes: Vec<OperationNode> = vec![
            Operation::new("Update Geometry on Change", self.main())
                .input("Parameters", DESIGN_PARAMETERS)
                .into(),
        ];
        if settings.is_some_and(|s| s.join_mesh) {
            nodes.push(Operation::new("Join Mesh on Change", self.main()).into());
        }
        if settings.is_some_and(|s| s.convert_to_tet10) {
            nodes.push(Operation::new("Convert to Tet10 on Change", self.main()).into());
        }
        let reinitializations = self
            .performers
            .physics()
            .map(|p| {
                Operation::new("Reinitialize on Change", &p.name)
                    .input("Parameters", DESIGN_PARAMETERS)
                    .into()
            })
            .collect();
        nodes.extend(parallel(reinitializations));
        nodes
    }

    /// One sensitivity evaluation per design parameter on the parametric geometry kernel.
    fn parameter_sensitivity_loop(&self) -> Result<OperationNode, CompileError> {
        let geometry = self
            .performers
            .parametric_geometry()
            .ok_or_else(|| CompileError::UnknownPerformer(PARAMETERS.to_string()))?;
        let op = Operation::new("Compute Parameter Sensitivity on Change", &geometry.name)
            .parameter("Parameter Index", format!("{{{}-1}}", PARAMETER_INDEX))
            .input("Parameters", DESIGN_PARAMETERS)
            .output("Parameter Sensitivity", parameter_sensitivity());
        Ok(OperationNode::for_each_in(
            PARAMETER_INDEX,
            PARAMETERS,
            vec![op.into()],
        ))
    }

    /// Chains the per-parameter sensitivities into the criterion gradient.
    fn sensitivity_operation(&self, plan: &CriterionPlan) -> Operation {
        let sensitivity = parameter_sensitivity();
        Operation::new(&plan.ops.sensitivity_operation, &plan.performer)
            .input_fanout(Fanout::for_each_in(
                PARAMETER_INDEX,
                PARAMETERS,
                vec![Fanout::Item(Argument::new(&sensitivity, &sensitivity))],
            ))
            .output("Criterion Sensitivity", plan.gradient_channel())
    }

    /// Solver gradients run alongside the parameter sensitivity loop, then each criterion
    /// gradient is assembled from both.
    fn shape_gradient_operations(
        &self,
        plans: &[&CriterionPlan],
    ) -> Result<Vec<OperationNode>, CompileError> {
        let mut evaluations: Vec<OperationNode> = plans
            .iter()
            .map(|plan| plan.gradient_operation(false, false).into())
            .collect();
        evaluations.push(self.parameter_sensitivity_loop()?);

        let mut nodes = self.geometry_update_operations();
        nodes.extend(parallel(evaluations));
        let sensitivities = plans
            .iter()
            .map(|plan| self.sensitivity_operation(plan).into())
            .collect();
        nodes.extend(parallel(sensitivities));
        Ok(nodes)
    }

    pub(super) fn shape_objective_value_stage(&self) -> Result<Stage, CompileError> {
        let mut stage = Stage::new(STAGE_OBJECTIVE_VALUE);
        stage.inputs.push(DESIGN_PARAMETERS.to_string());
        stage.operations.extend(self.geometry_update_operations());
        let evaluations = self
            .objective
            .iter()
            .map(|plan| plan.value_operation(false, &plan.value_channel()).into())
            .collect();
        stage.operations.extend(parallel(evaluations));
        stage.operations.push(self.objective_value_reduction()?);
        stage.outputs.push(OBJECTIVE_VALUE.to_string());
        Ok(stage)
    }

    pub(super) fn shape_objective_gradient_stage(&self) -> Result<Stage, CompileError> {
        let mut stage = Stage::new(STAGE_OBJECTIVE_GRADIENT);
        stage.inputs.push(DESIGN_PARAMETERS.to_string());
        let plans: Vec<&CriterionPlan> = self.objective.iter().collect();
        stage
            .operations
            .extend(self.shape_gradient_operations(&plans)?);

        if self.aggregates() {
            stage
                .operations
                .push(self.aggregate_gradients("Value", OBJECTIVE_GRADIENT)?);
        } else {
            let plan = plans.first().ok_or(CompileError::EmptyObjective)?;
            stage
                .operations
                .push(self.copy_value(&plan.gradient_channel(), OBJECTIVE_GRADIENT));
        }
        stage.outputs.push(OBJECTIVE_GRADIENT.to_string());
        Ok(stage)
    }

    pub(super) fn shape_constraint_stages(
        &self,
        constraint: &ConstraintPlan,
    ) -> Result<Vec<Stage>, CompileError> {
        let plan = &constraint.plan;
        let id = constraint.id.as_str();

        let mut value = Stage::new(constraint_value_stage(id));
        value.inputs.push(DESIGN_PARAMETERS.to_string());
        value.operations.extend(self.geometry_update_operations());
        value
            .operations
            .push(plan.value_operation(false, &plan.value_channel()).into());
        value
            .operations
            .push(self.copy_value(&plan.value_channel(), &constraint_value(id)));
        value.outputs.push(constraint_value(id));

        let mut gradient = Stage::new(constraint_gradient_stage(id));
        gradient.inputs.push(DESIGN_PARAMETERS.to_string());
        gradient
            .operations
            .extend(self.shape_gradient_operations(&[plan])?);
        gradient
            .operations
            .push(self.copy_value(&plan.gradient_channel(), &constraint_gradient(id)));
        gradient.outputs.push(constraint_gradient(id));

        Ok(vec![value, gradient])
    }
}
