use super::codes::{
    Algorithm, CriterionKind, Discretization, FieldLayout, FilterType, OptimizationType,
    ProjectionType, Relation, ServiceCode,
};
use ahash::AHashMap;

/// The complete, validated-on-compile description of an optimization problem.
/// This is the target structure for any custom input format conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct ProblemMetadata {
    pub verbose: bool,
    pub services: Vec<Service>,
    pub scenarios: Vec<Scenario>,
    pub criteria: Vec<Criterion>,
    pub objective: Objective,
    pub constraints: Vec<Constraint>,
    pub output: OutputSettings,
    pub optimization_parameters: OptimizationParameters,
}

/// A configured executable taking part in the run.
#[derive(Debug, Clone, PartialEq)]
pub struct Service {
    pub id: String,
    pub code: ServiceCode,
    pub number_processors: usize,
    pub cache_state: bool,
    pub update_problem: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    pub id: String,
    pub physics: String,
    pub parameters: AHashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Criterion {
    pub id: String,
    pub kind: CriterionKind,
    pub parameters: AHashMap<String, String>,
}

/// Index-aligned sub-criteria of the objective. Entry `i` of every array describes one
/// sub-criterion, except for multi-load-case objectives, whose scenarios are evaluated
/// jointly and may outnumber the other arrays.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Objective {
    pub criteria_ids: Vec<String>,
    pub service_ids: Vec<String>,
    pub scenario_ids: Vec<String>,
    pub weights: Vec<f64>,
    pub multi_load_case: bool,
    pub shape_service_ids: Vec<String>,
}

impl Objective {
    /// Number of terms the aggregation step sums over.
    pub fn term_count(&self) -> usize {
        if self.multi_load_case {
            1
        } else {
            self.criteria_ids.len()
        }
    }

    /// True when the objective needs an aggregation sub-graph.
    pub fn is_multi_criterion(&self) -> bool {
        self.term_count() > 1
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ConstraintTarget {
    Absolute(f64),
    Relative(f64),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    pub id: String,
    pub criterion_id: String,
    pub service_id: String,
    pub scenario_id: Option<String>,
    pub relation: Relation,
    pub target: Option<ConstraintTarget>,
    pub divisor: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputSettings {
    pub enabled: bool,
    pub services: Vec<ServiceOutput>,
}

impl OutputSettings {
    pub fn deterministic(&self) -> impl Iterator<Item = (&str, &QuantityOfInterest)> {
        self.services
            .iter()
            .flat_map(|s| s.deterministic.iter().map(move |q| (s.service_id.as_str(), q)))
    }

    pub fn random(&self) -> impl Iterator<Item = (&str, &QuantityOfInterest)> {
        self.services
            .iter()
            .flat_map(|s| s.random.iter().map(move |q| (s.service_id.as_str(), q)))
    }
}

/// Quantities of interest one service writes when output is enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceOutput {
    pub service_id: String,
    pub deterministic: Vec<QuantityOfInterest>,
    pub random: Vec<QuantityOfInterest>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct QuantityOfInterest {
    pub name: String,
    pub layout: FieldLayout,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptimizationParameters {
    pub optimization_type: OptimizationType,
    pub discretization: Discretization,
    pub filter_type: FilterType,
    pub projection_type: ProjectionType,
    pub filter_in_engine: bool,
    pub normalize_in_aggregator: bool,
    pub algorithm: Algorithm,
    pub max_iterations: Option<String>,
    /// Optimizer tuning keywords (e.g. `mma_move_limit`) and their raw values.
    pub tuning: AHashMap<String, String>,
    pub robust: Option<RobustSettings>,
    pub shape: Option<ShapeSettings>,
}

impl Default for OptimizationParameters {
    fn default() -> Self {
        Self {
            optimization_type: OptimizationType::Topology,
            discretization: Discretization::Density,
            filter_type: FilterType::Kernel,
            projection_type: ProjectionType::None,
            filter_in_engine: true,
            normalize_in_aggregator: false,
            algorithm: Algorithm::Oc,
            max_iterations: None,
            tuning: AHashMap::new(),
            robust: None,
            shape: None,
        }
    }
}

/// Ensemble settings for robust (nondeterministic) optimization.
#[derive(Debug, Clone, PartialEq)]
pub struct RobustSettings {
    /// `k` in the `mean + k * stddev` reduction.
    pub std_dev_multiplier: String,
    pub performers: usize,
    pub samples_per_performer: usize,
    pub random_tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ShapeSettings {
    pub num_parameters: usize,
    /// Number of `despmtr` entries found in the csm file, when one was read.
    pub csm_parameter_count: Option<usize>,
    pub join_mesh: bool,
    pub convert_to_tet10: bool,
}

impl ProblemMetadata {
    pub fn service(&self, id: &str) -> Option<&Service> {
        self.services.iter().find(|s| s.id == id)
    }

    pub fn criterion(&self, id: &str) -> Option<&Criterion> {
        self.criteria.iter().find(|c| c.id == id)
    }

    pub fn scenario(&self, id: &str) -> Option<&Scenario> {
        self.scenarios.iter().find(|s| s.id == id)
    }

    pub fn is_robust(&self) -> bool {
        self.optimization_parameters.robust.is_some()
    }

    /// True when any service asks for a state cache between iterations.
    pub fn caches_state(&self) -> bool {
        self.services.iter().any(|s| s.cache_state)
    }

    /// True when any service asks for a problem update between iterations.
    pub fn updates_problem(&self) -> bool {
        self.services.iter().any(|s| s.update_problem)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn objective(criteria: &[&str], multi_load_case: bool) -> Objective {
        Objective {
            criteria_ids: criteria.iter().map(|c| c.to_string()).collect(),
            multi_load_case,
            ..Default::default()
        }
    }

    #[test]
    fn test_weighted_sum_counts_every_criterion() {
        let objective = objective(&["1", "3"], false);
        assert_eq!(objective.term_count(), 2);
        assert!(objective.is_multi_criterion());
    }

    #[test]
    fn test_multi_load_case_is_one_term() {
        let objective = objective(&["1"], true);
        assert_eq!(objective.term_count(), 1);
        assert!(!objective.is_multi_criterion());
    }
}
