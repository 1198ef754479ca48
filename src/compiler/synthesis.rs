//! Phase one: declares every channel the stages will read or write.

use super::builder::{CriterionPlan, GraphBuilder, qoi_layout};
use super::filter::FilterState;
use super::names::*;
use super::pipeline::Pipeline;
use crate::error::CompileError;
use crate::graph::{Fanout, Layout};

fn users<S: AsRef<str>>(names: &[S]) -> Vec<Fanout<String>> {
    names
        .iter()
        .map(|n| Fanout::Item(n.as_ref().to_string()))
        .collect()
}

const SAMPLE_SCOPE: [(&str, &str); 2] = [
    (PERFORMER_INDEX, PERFORMERS),
    (PERFORMER_SAMPLE_INDEX, PERFORMER_SAMPLES),
];

impl GraphBuilder<'_> {
    pub(super) fn synthesize_channels(&mut self) -> Result<(), CompileError> {
        match self.pipeline {
            Pipeline::Density | Pipeline::Levelset | Pipeline::RobustDensity => {
                self.synthesize_topology()?
            }
            Pipeline::Shape => self.synthesize_shape()?,
        }
        tracing::debug!(channels = self.channels.len(), "Synthesized channels");
        Ok(())
    }

    fn synthesize_topology(&mut self) -> Result<(), CompileError> {
        let main = self.main().to_string();
        let kernel = self.performers.geometry_kernel().map(|e| e.name.clone());
        let control_reader = self.filter.control_reader().to_string();
        let gradient_owner = self.filter.gradient_owner().to_string();
        let projected = self.filter.state == FilterState::HelmholtzProjected;

        self.channels.declare(
            CONTROL,
            Layout::NodalField,
            &main,
            users(&[&main, &control_reader]),
        )?;
        if let Some(kernel) = &kernel {
            self.channels
                .declare(INITIAL_CONTROL, Layout::NodalField, kernel, users(&[&main]))?;
        }
        self.declare_bounds(Layout::NodalField, kernel.as_deref().unwrap_or(&main))?;
        self.channels
            .declare(DESIGN_VOLUME, Layout::Global(1), &main, users(&[&main]))?;

        if self.pipeline.is_robust() {
            self.declare_objective_samples()?;
        } else {
            let feeds_filter = !self.aggregates();
            for plan in self.objective.clone() {
                self.declare_criterion(&plan, Layout::NodalField, feeds_filter)?;
            }
        }

        self.channels
            .declare(OBJECTIVE_VALUE, Layout::Global(1), &main, users(&[&main]))?;
        if self.pipeline.is_robust() {
            self.channels.declare(
                ROBUST_OBJECTIVE_GRADIENT,
                Layout::NodalField,
                &main,
                users(&[&main]),
            )?;
        }
        if self.aggregates() {
            let reader = self.filter.gradient_reader().to_string();
            self.channels.declare(
                AGGREGATE_GRADIENT,
                Layout::NodalField,
                &main,
                users(&[&main, &reader]),
            )?;
        }
        if projected {
            self.declare_projected(PROJECTED_OBJECTIVE_GRADIENT)?;
        }
        self.channels.declare(
            OBJECTIVE_GRADIENT,
            Layout::NodalField,
            &gradient_owner,
            users(&[&gradient_owner, &main]),
        )?;

        self.declare_outputs()?;
        self.declare_topology()?;
        if projected {
            let helmholtz = self.filter.control_reader().to_string();
            self.channels.declare(
                FILTERED_CONTROL,
                Layout::NodalField,
                &helmholtz,
                users(&[&helmholtz, &main]),
            )?;
        }

        for constraint in self.constraints.clone() {
            self.declare_criterion(&constraint.plan, Layout::NodalField, true)?;
            self.channels.declare(
                &constraint_value(&constraint.id),
                Layout::Global(1),
                &main,
                users(&[&main]),
            )?;
            if projected {
                self.declare_projected(&projected_constraint_gradient(&constraint.id))?;
            }
            self.channels.declare(
                &constraint_gradient(&constraint.id),
                Layout::NodalField,
                &gradient_owner,
                users(&[&gradient_owner, &main]),
            )?;
        }

        self.declare_initial_values()
    }

    fn synthesize_shape(&mut self) -> Result<(), CompileError> {
        let main = self.main().to_string();
        let n = self
            .metadata
            .optimization_parameters
            .shape
            .as_ref()
            .map(|s| s.num_parameters)
            .ok_or_else(|| CompileError::MissingSetting("shape".to_string()))?;
        let geometry = self
            .performers
            .parametric_geometry()
            .cloned()
            .ok_or_else(|| CompileError::UnknownPerformer(PARAMETERS.to_string()))?;

        let mut parameter_users = vec![self.main_user()];
        parameter_users.extend(self.performers.physics().map(|e| e.user()));
        parameter_users.push(geometry.user());
        self.channels
            .declare(DESIGN_PARAMETERS, Layout::Global(n), &main, parameter_users)?;
        self.declare_bounds(Layout::Global(n), &main)?;

        for plan in self.objective.clone() {
            self.declare_criterion(&plan, Layout::Global(n), false)?;
        }
        self.channels
            .declare(OBJECTIVE_VALUE, Layout::Global(1), &main, users(&[&main]))?;
        self.channels
            .declare(OBJECTIVE_GRADIENT, Layout::Global(n), &main, users(&[&main]))?;

        let mut sensitivity_users = vec![self.main_user()];
        sensitivity_users.extend(self.performers.physics().map(|e| e.user()));
        self.channels.declare_scoped(
            &[(PARAMETER_INDEX, PARAMETERS)],
            &parameter_sensitivity(),
            Layout::NodalField,
            &geometry.name,
            sensitivity_users,
        )?;

        self.declare_outputs()?;

        for constraint in self.constraints.clone() {
            self.declare_criterion(&constraint.plan, Layout::Global(n), false)?;
            self.channels.declare(
                &constraint_value(&constraint.id),
                Layout::Global(1),
                &main,
                users(&[&main]),
            )?;
            self.channels.declare(
                &constraint_gradient(&constraint.id),
                Layout::Global(n),
                &main,
                users(&[&main]),
            )?;
        }

        self.declare_initial_values()
    }

    fn declare_bounds(&mut self, vector_layout: Layout, vector_owner: &str) -> Result<(), CompileError> {
        let main = self.main().to_string();
        for (value, vector) in [
            (LOWER_BOUND_VALUE, LOWER_BOUND_VECTOR),
            (UPPER_BOUND_VALUE, UPPER_BOUND_VECTOR),
        ] {
            self.channels
                .declare(value, Layout::Global(1), &main, users(&[&main]))?;
            self.channels.declare(
                vector,
                vector_layout,
                vector_owner,
                users(&[main.as_str(), vector_owner]),
            )?;
        }
        Ok(())
    }

    /// Value and gradient channels of one criterion evaluation.
    ///
    /// In levelset runs the geometry kernel writes physics gradients after transferring them
    /// from the solver.
    fn declare_criterion(
        &mut self,
        plan: &CriterionPlan,
        gradient_layout: Layout,
        feeds_filter: bool,
    ) -> Result<(), CompileError> {
        let main = self.main().to_string();
        self.channels.declare(
            &plan.value_channel(),
            Layout::Global(1),
            &plan.performer,
            users(&[&main]),
        )?;

        let kernel = match self.performers.geometry_kernel() {
            Some(kernel) if !plan.on_main() => Some(kernel.name.clone()),
            _ => None,
        };
        let gradient_owner = kernel.clone().unwrap_or_else(|| plan.performer.clone());
        let mut gradient_users = users(&[&main]);
        if feeds_filter {
            gradient_users.extend(users(&[self.filter.gradient_reader()]));
        }
        self.channels.declare(
            &plan.gradient_channel(),
            gradient_layout,
            &gradient_owner,
            gradient_users,
        )?;

        if let Some(kernel) = kernel {
            self.channels.declare(
                &plan.transferred_gradient_channel(),
                gradient_layout,
                &kernel,
                users(&[&main, &kernel]),
            )?;
        }
        Ok(())
    }

    fn declare_projected(&mut self, name: &str) -> Result<(), CompileError> {
        let main = self.main().to_string();
        let helmholtz = self.filter.gradient_owner().to_string();
        self.channels
            .declare(name, Layout::NodalField, &main, users(&[&main, &helmholtz]))
    }

    /// `Topology` is read by the filter step's consumers: every solver, the geometry kernel
    /// and the helmholtz filter.
    fn declare_topology(&mut self) -> Result<(), CompileError> {
        let owner = self.filter.topology_owner().to_string();
        let mut topology_users = vec![self.main_user()];
        topology_users.extend(self.performers.physics().map(|e| e.user()));
        if let Some(helmholtz) = self.performers.helmholtz() {
            topology_users.push(helmholtz.user());
        }
        if let Some(kernel) = self.performers.geometry_kernel() {
            topology_users.push(kernel.user());
        }
        self.channels
            .declare(TOPOLOGY, Layout::NodalField, &owner, topology_users)
    }

    fn declare_objective_samples(&mut self) -> Result<(), CompileError> {
        let main = self.main().to_string();
        let performer = self
            .objective
            .first()
            .map(|p| p.performer.clone())
            .ok_or(CompileError::EmptyObjective)?;
        self.channels.declare_scoped(
            &SAMPLE_SCOPE,
            &sample_channel(OBJECTIVE_VALUE),
            Layout::Global(1),
            &performer,
            users(&[&main]),
        )?;
        self.channels.declare_scoped(
            &SAMPLE_SCOPE,
            &sample_channel(OBJECTIVE_GRADIENT),
            Layout::NodalField,
            &performer,
            users(&[&main]),
        )
    }

    /// Quantity-of-interest channels, plus sample and statistics channels in robust runs.
    fn declare_outputs(&mut self) -> Result<(), CompileError> {
        let metadata = self.metadata;
        let output = &metadata.output;
        if !output.enabled {
            return Ok(());
        }
        let main = self.main().to_string();
        for (service_id, qoi) in output.deterministic() {
            let owner = self.performers.for_service(service_id)?.name.clone();
            for (channel, _) in self.qoi_channels(service_id, qoi)? {
                self.channels
                    .declare(&channel, qoi_layout(qoi), &owner, users(&[&main]))?;
            }
        }
        if self.pipeline.is_robust() {
            for (service_id, qoi) in output.random() {
                let owner = self.performers.for_service(service_id)?.name.clone();
                self.channels.declare_scoped(
                    &SAMPLE_SCOPE,
                    &sample_channel(&qoi.name),
                    qoi_layout(qoi),
                    &owner,
                    users(&[&main]),
                )?;
                for statistic in ["mean", "standard deviation"] {
                    self.channels.declare(
                        &format!("{} {}", qoi.name, statistic),
                        qoi_layout(qoi),
                        &main,
                        users(&[&main]),
                    )?;
                }
            }
        }
        Ok(())
    }

    fn declare_initial_values(&mut self) -> Result<(), CompileError> {
        if !self.normalizes() {
            return Ok(());
        }
        let main = self.main().to_string();
        for plan in self.objective.clone() {
            self.channels.declare(
                &plan.initial_value_channel(),
                Layout::Global(1),
                &plan.performer,
                users(&[&main]),
            )?;
        }
        Ok(())
    }
}
