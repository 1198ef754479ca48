//! Filter and projection sub-graphs.
//!
//! Every evaluation stage first turns `Control` into `Topology`, and every gradient stage
//! pulls a raw gradient back through the adjoint of the same chain. Which performer owns each
//! step depends on the filter type, the projection type and whether the filter runs inside
//! the main engine.

use super::names::{CONTROL, FILTERED_CONTROL, TOPOLOGY};
use crate::graph::{Operation, OperationNode};
use crate::metadata::{FilterType, OptimizationParameters, ProjectionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterState {
    /// Kernel filtering outside the engine: the field is copied through unchanged.
    Unfiltered,
    KernelFiltered,
    HelmholtzFiltered,
    HelmholtzProjected,
}

impl FilterState {
    pub fn select(params: &OptimizationParameters) -> Self {
        if params.filter_in_engine {
            return FilterState::KernelFiltered;
        }
        match (params.filter_type, params.projection_type) {
            (FilterType::Helmholtz, ProjectionType::None) => FilterState::HelmholtzFiltered,
            (FilterType::Helmholtz, _) => FilterState::HelmholtzProjected,
            (FilterType::Kernel, _) => FilterState::Unfiltered,
        }
    }

    /// True when a dedicated filter performer takes part.
    pub fn uses_helmholtz(&self) -> bool {
        matches!(
            self,
            FilterState::HelmholtzFiltered | FilterState::HelmholtzProjected
        )
    }
}

/// The filter sub-graph bound to concrete performer names.
#[derive(Debug, Clone)]
pub struct FilterChain {
    pub state: FilterState,
    main: String,
    helmholtz: Option<String>,
}

impl FilterChain {
    pub fn new(state: FilterState, main: &str, helmholtz: Option<&str>) -> Self {
        Self {
            state,
            main: main.to_string(),
            helmholtz: helmholtz.map(str::to_string),
        }
    }

    fn helmholtz(&self) -> &str {
        self.helmholtz.as_deref().unwrap_or(&self.main)
    }

    /// Writer of `Topology`.
    pub fn topology_owner(&self) -> &str {
        match self.state {
            FilterState::HelmholtzFiltered => self.helmholtz(),
            _ => &self.main,
        }
    }

    /// Writer of filtered gradients (`Objective Gradient`, `Constraint Gradient <id>`).
    pub fn gradient_owner(&self) -> &str {
        match self.state {
            FilterState::HelmholtzFiltered | FilterState::HelmholtzProjected => self.helmholtz(),
            _ => &self.main,
        }
    }

    /// Performer that reads `Control` to produce `Topology`.
    pub fn control_reader(&self) -> &str {
        match self.state {
            FilterState::HelmholtzFiltered | FilterState::HelmholtzProjected => self.helmholtz(),
            _ => &self.main,
        }
    }

    /// Performer that reads the raw gradient entering the chain.
    pub fn gradient_reader(&self) -> &str {
        match self.state {
            FilterState::HelmholtzFiltered => self.helmholtz(),
            _ => &self.main,
        }
    }

    /// Maps `Control` to `Topology`.
    pub fn control_ops(&self) -> Vec<OperationNode> {
        match self.state {
            FilterState::KernelFiltered => vec![
                Operation::new("Filter Control", &self.main)
                    .input("Field", CONTROL)
                    .output("Filtered Field", TOPOLOGY)
                    .into(),
            ],
            FilterState::HelmholtzFiltered => vec![
                Operation::new("Filter Control", self.helmholtz())
                    .input("Topology", CONTROL)
                    .output("Topology", TOPOLOGY)
                    .into(),
            ],
            FilterState::HelmholtzProjected => vec![
                Operation::new("Filter Control", self.helmholtz())
                    .input("Topology", CONTROL)
                    .output("Topology", FILTERED_CONTROL)
                    .into(),
                Operation::new("Project Control", &self.main)
                    .input("Field", FILTERED_CONTROL)
                    .output("Filtered Field", TOPOLOGY)
                    .into(),
            ],
            FilterState::Unfiltered => vec![
                Operation::new("Copy Field", &self.main)
                    .input("InputField", CONTROL)
                    .output("OutputField", TOPOLOGY)
                    .into(),
            ],
        }
    }

    /// Pulls `raw` back through the chain into `target`.
    ///
    /// `projected` names the intermediate channel used between the projection and filter
    /// adjoints; it is only read in the projected state.
    pub fn gradient_ops(&self, raw: &str, projected: &str, target: &str) -> Vec<OperationNode> {
        match self.state {
            FilterState::KernelFiltered => vec![
                Operation::new("Filter Gradient", &self.main)
                    .input("Field", CONTROL)
                    .input("Gradient", raw)
                    .output("Filtered Gradient", target)
                    .into(),
            ],
            FilterState::HelmholtzFiltered => vec![
                Operation::new("Filter Gradient", self.helmholtz())
                    .input("Topology", raw)
                    .output("Topology", target)
                    .into(),
            ],
            FilterState::HelmholtzProjected => vec![
                Operation::new("Project Gradient", &self.main)
                    .input("Field", FILTERED_CONTROL)
                    .input("Gradient", raw)
                    .output("Filtered Gradient", projected)
                    .into(),
                Operation::new("Filter Gradient", self.helmholtz())
                    .input("Topology", projected)
                    .output("Topology", target)
                    .into(),
            ],
            FilterState::Unfiltered => vec![
                Operation::new("Copy Field", &self.main)
                    .input("InputField", raw)
                    .output("OutputField", target)
                    .into(),
            ],
        }
    }
}
