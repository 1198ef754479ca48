use super::builder::GraphBuilder;
use super::names::OBJECTIVE_VALUE;
use crate::error::CompileError;
use crate::graph::{Operation, OperationNode};

impl GraphBuilder<'_> {
    /// Sums the objective criterion values into `Objective Value`.
    pub(super) fn aggregate_values(&self) -> Result<OperationNode, CompileError> {
        let inputs: Vec<String> = self.objective.iter().map(|p| p.value_channel()).collect();
        self.aggregate_data("Value", &inputs, OBJECTIVE_VALUE)
    }

    /// Sums the objective criterion gradients into `target`. Field gradients use the `Field`
    /// argument family, global (shape) gradients the `Value` family.
    pub(super) fn aggregate_gradients(
        &self,
        argument: &str,
        target: &str,
    ) -> Result<OperationNode, CompileError> {
        let inputs: Vec<String> = self
            .objective
            .iter()
            .map(|p| p.gradient_channel())
            .collect();
        self.aggregate_data(argument, &inputs, target)
    }

    /// One `Aggregate Data` operation on the main engine. With normalization every input is
    /// paired with a `Normal i` input bound to its initial criterion value.
    fn aggregate_data(
        &self,
        argument: &str,
        inputs: &[String],
        target: &str,
    ) -> Result<OperationNode, CompileError> {
        let weights = self.metadata.objective.weights.len();
        if inputs.len() != weights {
            return Err(CompileError::AggregationMismatch {
                target: target.to_string(),
                inputs: inputs.len(),
                weights,
            });
        }

        let normals: Vec<Option<String>> = if self.normalizes() {
            self.objective
                .iter()
                .map(|p| Some(p.initial_value_channel()))
                .collect()
        } else {
            vec![None; inputs.len()]
        };

        let mut op = Operation::new("Aggregate Data", self.main());
        for (i, (input, normal)) in inputs.iter().zip(normals).enumerate() {
            op = op.input(format!("{} {}", argument, i + 1), input);
            if let Some(normal) = normal {
                op = op.input(format!("Normal {}", i + 1), normal);
            }
        }
        Ok(op.output(argument, target).into())
    }
}
