use crate::compiler::builder::{ConstraintPlan, CriterionPlan, GraphBuilder, parallel};
use crate::compiler::names::*;
use crate::compiler::pipeline::Pipeline;
use crate::error::CompileError;
use crate::graph::{Operation, OperationNode, Stage};

impl GraphBuilder<'_> {
    /// Initializes `Control`. With normalization the unaggregated criterion values of the
    /// initial design are captured here, once.
    pub(super) fn initial_guess_stage(&self) -> Stage {
        let mut stage = Stage::new(STAGE_INITIAL_GUESS);
        stage.operations.push(
            Operation::new("Initialize Field", self.main())
                .output("Initialized Field", CONTROL)
                .into(),
        );
        stage.outputs.push(CONTROL.to_string());

        if self.normalizes() {
            stage.operations.extend(self.filter.control_ops());
            let evaluations = self
                .objective
                .iter()
                .map(|plan| plan.value_operation(true, &plan.initial_value_channel()).into())
                .collect();
            stage.operations.extend(parallel(evaluations));
            stage
                .outputs
                .extend(self.objective.iter().map(|plan| plan.initial_value_channel()));
        }
        stage
    }

    pub(super) fn objective_value_stage(&self) -> Result<Stage, CompileError> {
        let mut stage = Stage::new(STAGE_OBJECTIVE_VALUE);
        stage.inputs.push(CONTROL.to_string());
        stage.operations.extend(self.filter.control_ops());
        let evaluations = self
            .objective
            .iter()
            .map(|plan| plan.value_operation(true, &plan.value_channel()).into())
            .collect();
        stage.operations.extend(parallel(evaluations));
        stage.operations.push(self.objective_value_reduction()?);
        stage.outputs.push(OBJECTIVE_VALUE.to_string());
        Ok(stage)
    }

    /// Aggregates the objective terms, or copies the only criterion value so that
    /// `Objective Value` keeps the main engine as its single writer.
    pub(super) fn objective_value_reduction(&self) -> Result<OperationNode, CompileError> {
        if self.aggregates() {
            return self.aggregate_values();
        }
        let plan = self.objective.first().ok_or(CompileError::EmptyObjective)?;
        Ok(self.copy_value(&plan.value_channel(), OBJECTIVE_VALUE))
    }

    pub(super) fn objective_gradient_stage(&self) -> Result<Stage, CompileError> {
        let mut stage = Stage::new(STAGE_OBJECTIVE_GRADIENT);
        stage.inputs.push(CONTROL.to_string());
        stage.operations.extend(self.filter.control_ops());

        let plans: Vec<&CriterionPlan> = self.objective.iter().collect();
        stage
            .operations
            .extend(self.gradient_evaluations(&plans, "Objective"));

        let source = if self.aggregates() {
            stage
                .operations
                .push(self.aggregate_gradients("Field", AGGREGATE_GRADIENT)?);
            AGGREGATE_GRADIENT.to_string()
        } else {
            plans
                .first()
                .map(|plan| plan.gradient_channel())
                .ok_or(CompileError::EmptyObjective)?
        };
        stage.operations.extend(self.filter.gradient_ops(
            &source,
            PROJECTED_OBJECTIVE_GRADIENT,
            OBJECTIVE_GRADIENT,
        ));
        stage.outputs.push(OBJECTIVE_GRADIENT.to_string());
        Ok(stage)
    }

    /// Gradient evaluations of the given criteria, batched.
    ///
    /// In levelset runs the solver leaves physics gradients on disk; the geometry kernel
    /// loads each one and maps it onto the level set field.
    pub(super) fn gradient_evaluations(
        &self,
        plans: &[&CriterionPlan],
        label: &str,
    ) -> Vec<OperationNode> {
        let kernel = match self.pipeline {
            Pipeline::Levelset => self.performers.geometry_kernel(),
            _ => None,
        };
        let evaluations = plans
            .iter()
            .map(|plan| {
                let transferred = kernel.is_some() && !plan.on_main();
                plan.gradient_operation(true, !transferred).into()
            })
            .collect();
        let mut nodes = parallel(evaluations);

        if let Some(kernel) = kernel {
            let argument = format!("{} GradientX", label);
            for plan in plans.iter().filter(|plan| !plan.on_main()) {
                let transferred = plan.transferred_gradient_channel();
                nodes.push(
                    Operation::new(format!("Load {} GradientX From HDF5", label), &kernel.name)
                        .output(&argument, &transferred)
                        .into(),
                );
                nodes.push(
                    Operation::new(format!("Compute {} Gradient XTK", label), &kernel.name)
                        .input(&argument, &transferred)
                        .output(format!("{} Gradient", label), plan.gradient_channel())
                        .into(),
                );
            }
        }
        nodes
    }

    pub(super) fn constraint_stages(&self, constraint: &ConstraintPlan) -> Vec<Stage> {
        let plan = &constraint.plan;
        let id = constraint.id.as_str();

        let mut value = Stage::new(constraint_value_stage(id));
        value.inputs.push(CONTROL.to_string());
        value.operations.extend(self.filter.control_ops());
        value
            .operations
            .push(plan.value_operation(true, &plan.value_channel()).into());
        value
            .operations
            .push(self.copy_value(&plan.value_channel(), &constraint_value(id)));
        value.outputs.push(constraint_value(id));

        let mut gradient = Stage::new(constraint_gradient_stage(id));
        gradient.inputs.push(CONTROL.to_string());
        gradient.operations.extend(self.filter.control_ops());
        gradient
            .operations
            .extend(self.gradient_evaluations(&[plan], "Constraint"));
        gradient.operations.extend(self.filter.gradient_ops(
            &plan.gradient_channel(),
            &projected_constraint_gradient(id),
            &constraint_gradient(id),
        ));
        gradient.outputs.push(constraint_gradient(id));

        vec![value, gradient]
    }
}
