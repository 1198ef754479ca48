use crate::metadata::{Constraint, Objective};
use itertools::Itertools;

/// One `(criterion, service, scenario)` instantiation of a criterion.
///
/// Never stored on its own; always regenerated from an objective or constraint entry and
/// turned into a channel name through [`ConcretizedCriterion::key`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConcretizedCriterion {
    pub criterion: String,
    pub service: String,
    pub scenario: String,
}

impl ConcretizedCriterion {
    pub fn new(criterion: &str, service: &str, scenario: &str) -> Self {
        Self {
            criterion: criterion.to_string(),
            service: service.to_string(),
            scenario: scenario.to_string(),
        }
    }

    /// The criterion a constraint evaluates. A constraint without a scenario resolves with an
    /// empty scenario segment.
    pub fn from_constraint(constraint: &Constraint) -> Self {
        Self::new(
            &constraint.criterion_id,
            &constraint.service_id,
            constraint.scenario_id.as_deref().unwrap_or(""),
        )
    }

    pub fn key(&self) -> String {
        resolve(&self.criterion, &self.service, &self.scenario)
    }

    pub fn value_channel(&self) -> String {
        format!("Criterion Value - {}", self.key())
    }

    pub fn gradient_channel(&self) -> String {
        format!("Criterion Gradient - {}", self.key())
    }

    /// Written once by the initial guess stage when aggregation normalizes.
    pub fn initial_value_channel(&self) -> String {
        format!("Initial Criterion Value - {}", self.key())
    }

    /// Intermediate gradient read back from the geometry kernel in levelset runs.
    pub fn transferred_gradient_channel(&self) -> String {
        format!("Criterion GradientX - {}", self.key())
    }
}

/// Canonical key of a concretized criterion.
pub fn resolve(criterion_id: &str, service_id: &str, scenario_id: &str) -> String {
    format!(
        "criterion_{}_service_{}_scenario_{}",
        criterion_id, service_id, scenario_id
    )
}

/// Compound scenario id of a multi-load-case objective: the ids concatenated in declaration
/// order with no separator.
pub fn compound_scenario(scenario_ids: &[String]) -> String {
    scenario_ids.iter().join("")
}

/// Whether another scenario list could concatenate to the same compound id.
pub fn compound_is_ambiguous(scenario_ids: &[String]) -> bool {
    scenario_ids.len() > 1 && scenario_ids.iter().any(|id| id.chars().count() > 1)
}

/// A single summand of the objective.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectiveTerm {
    pub index: usize,
    pub criterion: ConcretizedCriterion,
    pub weight: f64,
}

/// Expands an objective into the terms the stage builder iterates.
///
/// Multi-load-case objectives yield one term on the compound scenario; everything else yields
/// one term per index of the aligned arrays.
pub fn objective_terms(objective: &Objective) -> Vec<ObjectiveTerm> {
    if objective.multi_load_case {
        let (Some(criterion), Some(service)) = (
            objective.criteria_ids.first(),
            objective.service_ids.first(),
        ) else {
            return Vec::new();
        };
        let scenario = compound_scenario(&objective.scenario_ids);
        return vec![ObjectiveTerm {
            index: 0,
            criterion: ConcretizedCriterion::new(criterion, service, &scenario),
            weight: objective.weights.first().copied().unwrap_or(1.0),
        }];
    }

    objective
        .criteria_ids
        .iter()
        .zip(&objective.service_ids)
        .zip(&objective.scenario_ids)
        .zip(&objective.weights)
        .enumerate()
        .map(|(index, (((criterion, service), scenario), weight))| ObjectiveTerm {
            index,
            criterion: ConcretizedCriterion::new(criterion, service, scenario),
            weight: *weight,
        })
        .collect()
}
