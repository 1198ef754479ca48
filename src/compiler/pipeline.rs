use super::filter::FilterState;
use crate::error::CompileError;
use crate::metadata::{Algorithm, Discretization, OptimizationType, ProblemMetadata, ServiceCode};

/// The stage templates a problem is compiled with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Density,
    Levelset,
    Shape,
    RobustDensity,
}

fn unsupported(message: impl Into<String>) -> CompileError {
    CompileError::UnsupportedCombination(message.into())
}

impl Pipeline {
    /// Picks the pipeline for a validated problem, rejecting tuples that have no template.
    pub fn select(metadata: &ProblemMetadata, filter: FilterState) -> Result<Self, CompileError> {
        let params = &metadata.optimization_parameters;
        let objective = &metadata.objective;

        if objective.multi_load_case && objective.criteria_ids.len() > 1 {
            return Err(unsupported(
                "multi-load-case objectives cannot be combined with multiple criteria",
            ));
        }
        if params.algorithm.requires_constraints() && metadata.constraints.is_empty() {
            return Err(unsupported(format!(
                "algorithm '{}' requires at least one constraint",
                params.algorithm
            )));
        }

        check_outputs(metadata)?;

        match (
            params.optimization_type,
            params.discretization,
            metadata.is_robust(),
        ) {
            (OptimizationType::Topology, Discretization::Density, false) => Ok(Pipeline::Density),
            (OptimizationType::Topology, Discretization::Density, true) => {
                check_robust(metadata, filter)?;
                Ok(Pipeline::RobustDensity)
            }
            (OptimizationType::Topology, Discretization::Levelset, false) => {
                if filter.uses_helmholtz() {
                    return Err(unsupported("levelset discretization with a helmholtz filter"));
                }
                if params.normalize_in_aggregator {
                    return Err(unsupported("levelset discretization with normalized aggregation"));
                }
                Ok(Pipeline::Levelset)
            }
            (OptimizationType::Topology, Discretization::Levelset, true) => {
                Err(unsupported("robust optimization with levelset discretization"))
            }
            (OptimizationType::Shape, _, true) => {
                Err(unsupported("robust optimization of shape problems"))
            }
            (OptimizationType::Shape, _, false) => {
                if params.algorithm == Algorithm::Oc {
                    return Err(unsupported("shape optimization with the OC algorithm"));
                }
                check_shape(metadata)?;
                if filter.uses_helmholtz() {
                    tracing::warn!("Shape problems are not filtered; ignoring the helmholtz filter");
                }
                Ok(Pipeline::Shape)
            }
        }
    }

    pub fn is_topology(&self) -> bool {
        !matches!(self, Pipeline::Shape)
    }

    pub fn is_robust(&self) -> bool {
        matches!(self, Pipeline::RobustDensity)
    }
}

fn service_code(metadata: &ProblemMetadata, id: &str) -> Option<ServiceCode> {
    metadata.service(id).map(|s| s.code)
}

/// Quantities of interest are written by physics performers or the main engine. Auxiliary
/// performers run inside loops that an output stage never opens.
fn check_outputs(metadata: &ProblemMetadata) -> Result<(), CompileError> {
    for output in &metadata.output.services {
        let writable = service_code(metadata, &output.service_id)
            .is_some_and(|code| code.is_physics() || code == ServiceCode::PlatoMain);
        if !writable {
            return Err(unsupported(format!(
                "output service '{}' is not a physics service or the main engine",
                output.service_id
            )));
        }
    }
    Ok(())
}

/// Shape sensitivities chain through physics services only.
fn check_shape(metadata: &ProblemMetadata) -> Result<(), CompileError> {
    for id in &metadata.objective.shape_service_ids {
        if service_code(metadata, id) != Some(ServiceCode::PlatoEsp) {
            return Err(unsupported(format!(
                "shape service '{}' is not a plato_esp service",
                id
            )));
        }
    }

    let hosts = metadata
        .objective
        .service_ids
        .iter()
        .chain(metadata.constraints.iter().map(|c| &c.service_id));
    for id in hosts {
        if !service_code(metadata, id).is_some_and(|code| code.is_physics()) {
            return Err(unsupported(format!(
                "shape criteria must be evaluated by a physics service, not '{}'",
                id
            )));
        }
    }
    Ok(())
}

/// The ensemble templates cover a single plato_analyze criterion with main-engine
/// constraints and kernel filtering.
fn check_robust(metadata: &ProblemMetadata, filter: FilterState) -> Result<(), CompileError> {
    let physics: Vec<_> = metadata
        .services
        .iter()
        .filter(|s| s.code.is_physics())
        .collect();
    if physics.len() != 1 || physics[0].code != ServiceCode::PlatoAnalyze {
        return Err(unsupported(
            "robust optimization requires exactly one plato_analyze service",
        ));
    }
    if physics.iter().any(|s| s.cache_state || s.update_problem) {
        return Err(unsupported(
            "robust optimization with cache-state or update-problem services",
        ));
    }
    let objective = &metadata.objective;
    if objective.multi_load_case || objective.criteria_ids.len() != 1 {
        return Err(unsupported(
            "robust optimization requires a single-criterion objective",
        ));
    }
    if objective.service_ids.first().and_then(|id| service_code(metadata, id))
        != Some(ServiceCode::PlatoAnalyze)
    {
        return Err(unsupported(
            "robust objectives must be evaluated by the plato_analyze service",
        ));
    }
    if filter.uses_helmholtz() {
        return Err(unsupported("robust optimization with a helmholtz filter"));
    }
    if metadata.optimization_parameters.normalize_in_aggregator {
        return Err(unsupported("robust optimization with normalized aggregation"));
    }
    if metadata
        .constraints
        .iter()
        .any(|c| service_code(metadata, &c.service_id) != Some(ServiceCode::PlatoMain))
    {
        return Err(unsupported(
            "robust constraints must be evaluated by the main engine",
        ));
    }
    if metadata.output.enabled && metadata.output.deterministic().next().is_some() {
        return Err(unsupported(
            "robust optimization only writes random quantities of interest",
        ));
    }
    if let Some((id, qoi)) = metadata
        .output
        .random()
        .find(|(id, _)| service_code(metadata, id) != Some(ServiceCode::PlatoAnalyze))
    {
        return Err(unsupported(format!(
            "random quantity of interest '{}' must be sampled by the plato_analyze service, not '{}'",
            qoi.name, id
        )));
    }
    Ok(())
}
