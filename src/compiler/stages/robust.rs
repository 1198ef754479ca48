use crate::compiler::builder::{CriterionPlan, GraphBuilder, parallel};
use crate::compiler::names::*;
use crate::error::CompileError;
use crate::graph::{Argument, Fanout, Operation, OperationNode, Stage};

/// Reads every ensemble sample of a channel.
fn sample_inputs(base: &str) -> Fanout<Argument> {
    let channel = sample_channel(base);
    Fanout::for_each_in(
        PERFORMER_INDEX,
        PERFORMERS,
        vec![Fanout::for_each_in(
            PERFORMER_SAMPLE_INDEX,
            PERFORMER_SAMPLES,
            vec![Fanout::Item(Argument::new(&channel, &channel))],
        )],
    )
}

impl GraphBuilder<'_> {
    fn robust_plan(&self) -> Result<&CriterionPlan, CompileError> {
        self.objective.first().ok_or(CompileError::EmptyObjective)
    }

    fn std_dev_multiplier(&self) -> &str {
        self.metadata
            .optimization_parameters
            .robust
            .as_ref()
            .map(|r| r.std_dev_multiplier.as_str())
            .unwrap_or("1")
    }

    /// Runs `op` once per sample on every ensemble performer. With `tagged`, each random
    /// variable tag is bound to the sample's realization.
    fn sampled(&self, mut op: Operation, tagged: bool) -> OperationNode {
        if tagged {
            let tags = self
                .metadata
                .optimization_parameters
                .robust
                .iter()
                .flat_map(|r| r.random_tags.iter());
            for tag in tags {
                op = op.parameter(tag, format!("{{{}[{}]}}", tag, SAMPLE_INDEX));
            }
        }
        OperationNode::for_each_in(
            PERFORMER_SAMPLE_INDEX,
            PERFORMER_SAMPLES,
            vec![OperationNode::Batch(vec![OperationNode::for_each_in(
                PERFORMER_INDEX,
                PERFORMERS,
                vec![op.into()],
            )])],
        )
    }

    pub(super) fn robust_objective_value_stage(&self) -> Result<Stage, CompileError> {
        let plan = self.robust_plan()?;
        let mut stage = Stage::new(STAGE_OBJECTIVE_VALUE);
        stage.inputs.push(CONTROL.to_string());
        stage.operations.extend(self.filter.control_ops());
        stage.operations.push(self.sampled(
            plan.value_operation(true, &sample_channel(OBJECTIVE_VALUE)),
            true,
        ));
        stage.operations.push(
            Operation::new("Compute Non-Deterministic Objective Value", self.main())
                .input_fanout(sample_inputs(OBJECTIVE_VALUE))
                .output(
                    format!("Objective Mean Plus {} StdDev", self.std_dev_multiplier()),
                    OBJECTIVE_VALUE,
                )
                .into(),
        );
        stage.outputs.push(OBJECTIVE_VALUE.to_string());
        Ok(stage)
    }

    pub(super) fn robust_objective_gradient_stage(&self) -> Result<Stage, CompileError> {
        let plan = self.robust_plan()?;
        let mut stage = Stage::new(STAGE_OBJECTIVE_GRADIENT);
        stage.inputs.push(CONTROL.to_string());
        stage.operations.extend(self.filter.control_ops());
        let evaluation = Operation::new(&plan.ops.gradient_operation, &plan.performer)
            .input("Topology", TOPOLOGY)
            .output(&plan.ops.value_argument, sample_channel(OBJECTIVE_VALUE))
            .output(&plan.ops.gradient_argument, sample_channel(OBJECTIVE_GRADIENT));
        stage.operations.push(self.sampled(evaluation, true));
        stage.operations.push(
            Operation::new("Compute Non-Deterministic Objective Gradient", self.main())
                .input_fanout(sample_inputs(OBJECTIVE_VALUE))
                .input_fanout(sample_inputs(OBJECTIVE_GRADIENT))
                .output(
                    format!(
                        "Objective Mean Plus {} StdDev Gradient",
                        self.std_dev_multiplier()
                    ),
                    ROBUST_OBJECTIVE_GRADIENT,
                )
                .into(),
        );
        stage.operations.extend(self.filter.gradient_ops(
            ROBUST_OBJECTIVE_GRADIENT,
            PROJECTED_OBJECTIVE_GRADIENT,
            OBJECTIVE_GRADIENT,
        ));
        stage.outputs.push(OBJECTIVE_GRADIENT.to_string());
        Ok(stage)
    }

    /// Writes every random quantity of interest per sample, reduces the samples to mean and
    /// standard deviation, then runs the main engine's output.
    pub(super) fn robust_output_stage(&self) -> Result<Option<Stage>, CompileError> {
        let output = &self.metadata.output;
        if !output.enabled {
            return Ok(None);
        }

        let mut writes = Vec::new();
        for service in output.services.iter().filter(|s| !s.random.is_empty()) {
            let performer = self.performers.for_service(&service.service_id)?;
            let write = service
                .random
                .iter()
                .fold(Operation::new("Write Output", &performer.name), |op, qoi| {
                    op.output(&qoi.name, sample_channel(&qoi.name))
                });
            writes.push(self.sampled(write, false));
        }

        let mut statistics = Vec::new();
        let mut main_output = self.gradient_outputs(
            Operation::new("PlatoMainOutput", self.main())
                .input("topology", TOPOLOGY)
                .input("control", CONTROL),
        );
        for (_, qoi) in output.random() {
            let mean = format!("{} mean", qoi.name);
            let deviation = format!("{} standard deviation", qoi.name);
            statistics.push(
                Operation::new(format!("compute {} statistics", qoi.name), self.main())
                    .input_fanout(sample_inputs(&qoi.name))
                    .output(&mean, &mean)
                    .output(&deviation, &deviation)
                    .into(),
            );
            main_output = main_output.input(&mean, &mean).input(&deviation, &deviation);
        }

        let mut stage = Stage::new(STAGE_OUTPUT);
        stage.operations.extend(writes);
        stage.operations.extend(parallel(statistics));
        stage.operations.push(main_output.into());
        Ok(Some(stage))
    }
}
