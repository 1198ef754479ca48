use super::codes::{OptimizationType, ServiceCode};
use super::definition::ProblemMetadata;
use crate::error::CompileError;

/// Counts the design parameters (`despmtr` statements) declared in an ESP csm file.
///
/// Comment lines (starting with `#`) are skipped.
pub fn count_csm_design_parameters(source: &str) -> usize {
    source
        .lines()
        .map(str::trim_start)
        .filter(|line| !line.starts_with('#'))
        .filter(|line| {
            line.split_whitespace()
                .any(|token| token.eq_ignore_ascii_case("despmtr"))
        })
        .count()
}

/// Checks every cross-reference and array shape the compiler relies on.
///
/// Runs before any graph construction; the first violation aborts.
pub fn validate(metadata: &ProblemMetadata) -> Result<(), CompileError> {
    if !metadata.services.iter().any(|s| s.code.is_physics()) {
        return Err(CompileError::EmptyServices);
    }

    validate_objective(metadata)?;

    for constraint in &metadata.constraints {
        let context = format!("Constraint '{}'", constraint.id);
        require_criterion(metadata, &context, &constraint.criterion_id)?;
        require_service(metadata, &context, &constraint.service_id)?;
        if let Some(scenario) = &constraint.scenario_id {
            require_scenario(metadata, &context, scenario)?;
        }
    }

    for output in &metadata.output.services {
        require_service(metadata, "Output", &output.service_id)?;
    }

    let params = &metadata.optimization_parameters;
    if params.optimization_type == OptimizationType::Shape {
        let shape = params
            .shape
            .as_ref()
            .ok_or_else(|| CompileError::MissingSetting("shape settings".to_string()))?;
        if shape.num_parameters == 0 {
            return Err(CompileError::MissingSetting(
                "number of shape design parameters".to_string(),
            ));
        }
        if let Some(found) = shape.csm_parameter_count {
            if found != shape.num_parameters {
                return Err(CompileError::CsmParameterMismatch {
                    declared: shape.num_parameters,
                    found,
                });
            }
        }
    }

    if let Some(robust) = &params.robust {
        if robust.performers == 0 {
            return Err(CompileError::InvalidRobustSettings(
                "at least one performer is required".to_string(),
            ));
        }
        if robust.samples_per_performer == 0 {
            return Err(CompileError::InvalidRobustSettings(
                "at least one sample per performer is required".to_string(),
            ));
        }
    } else if metadata.output.random().next().is_some() {
        return Err(CompileError::InvalidRobustSettings(
            "random quantities of interest need robust optimization settings".to_string(),
        ));
    }

    Ok(())
}

fn validate_objective(metadata: &ProblemMetadata) -> Result<(), CompileError> {
    let objective = &metadata.objective;
    if objective.criteria_ids.is_empty() {
        return Err(CompileError::EmptyObjective);
    }

    let mismatch = || CompileError::ObjectiveLengthMismatch {
        criteria: objective.criteria_ids.len(),
        services: objective.service_ids.len(),
        scenarios: objective.scenario_ids.len(),
        weights: objective.weights.len(),
    };
    let n = objective.criteria_ids.len();
    if objective.service_ids.len() != n || objective.weights.len() != n {
        return Err(mismatch());
    }
    if objective.multi_load_case {
        if objective.scenario_ids.is_empty() {
            return Err(mismatch());
        }
    } else if objective.scenario_ids.len() != n {
        return Err(mismatch());
    }

    for id in &objective.criteria_ids {
        require_criterion(metadata, "Objective", id)?;
    }
    for id in &objective.service_ids {
        require_service(metadata, "Objective", id)?;
    }
    for id in &objective.scenario_ids {
        require_scenario(metadata, "Objective", id)?;
    }
    for id in &objective.shape_service_ids {
        require_service(metadata, "Objective", id)?;
    }
    Ok(())
}

fn require_criterion(
    metadata: &ProblemMetadata,
    context: &str,
    id: &str,
) -> Result<(), CompileError> {
    metadata
        .criterion(id)
        .map(|_| ())
        .ok_or_else(|| unknown(context, "criterion", id))
}

fn require_service(metadata: &ProblemMetadata, context: &str, id: &str) -> Result<(), CompileError> {
    match metadata.service(id) {
        Some(service) if service.code != ServiceCode::Xtk => Ok(()),
        _ => Err(unknown(context, "service", id)),
    }
}

fn require_scenario(
    metadata: &ProblemMetadata,
    context: &str,
    id: &str,
) -> Result<(), CompileError> {
    metadata
        .scenario(id)
        .map(|_| ())
        .ok_or_else(|| unknown(context, "scenario", id))
}

fn unknown(context: &str, entity: &'static str, id: &str) -> CompileError {
    CompileError::UnknownReference {
        context: context.to_string(),
        entity,
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_despmtr_lines() {
        let csm = "# design parameters\n\
                   despmtr   Px   0.5  lbound 0.1 ubound 1.0 initial 0.5\n\
                   DESPMTR   Py   0.5  lbound 0.1 ubound 1.0 initial 0.5\n\
                   # despmtr Pz commented out\n\
                   box 0 0 0 Px Py 1\n";
        assert_eq!(count_csm_design_parameters(csm), 2);
    }

    #[test]
    fn test_empty_csm_has_no_parameters() {
        assert_eq!(count_csm_design_parameters(""), 0);
    }
}
