//! The `Optimizer` block: algorithm options, stage wiring, and constraint targets.

use super::names::*;
use super::pipeline::Pipeline;
use crate::error::CompileError;
use crate::graph::OptionNode;
use crate::metadata::{
    Algorithm, Constraint, ConstraintTarget, CriterionKind, OptimizationParameters,
    ProblemMetadata, Relation,
};
use std::collections::BTreeMap;

/// Written for every option the problem does not set.
const IGNORE: &str = "IGNORE";

/// Key used for `max_iterations` in the option tables below.
const MAX_ITERATIONS: &str = "max_iterations";

const OC_OPTIONS: &[(&str, &str)] = &[
    ("OCControlStagnationTolerance", "oc_control_stagnation_tolerance"),
    ("OCObjectiveStagnationTolerance", "oc_objective_stagnation_tolerance"),
    ("OCGradientTolerance", "oc_gradient_tolerance"),
    ("ProblemUpdateFrequency", "problem_update_frequency"),
];

const MMA_OPTIONS: &[(&str, &str)] = &[
    ("MaxNumOuterIterations", MAX_ITERATIONS),
    ("MoveLimit", "mma_move_limit"),
    ("AsymptoteExpansion", "mma_asymptote_expansion"),
    ("AsymptoteContraction", "mma_asymptote_contraction"),
    ("MaxNumSubProblemIter", "mma_max_sub_problem_iterations"),
    ("ControlStagnationTolerance", "mma_control_stagnation_tolerance"),
    ("ObjectiveStagnationTolerance", "mma_objective_stagnation_tolerance"),
    ("OutputSubProblemDiagnostics", "mma_output_subproblem_diagnostics"),
    ("SubProblemInitialPenalty", "mma_sub_problem_initial_penalty"),
    ("SubProblemPenaltyMultiplier", "mma_sub_problem_penalty_multiplier"),
    ("SubProblemFeasibilityTolerance", "mma_sub_problem_feasibility_tolerance"),
    ("UpdateFrequency", "problem_update_frequency"),
    ("UseIpoptForMMASubproblem", "mma_use_ipopt_sub_problem_solver"),
];

const KS_OPTIONS: &[(&str, &str)] = &[
    ("MaxNumOuterIterations", MAX_ITERATIONS),
    ("KSTrustRegionExpansionFactor", "ks_trust_region_expansion_factor"),
    ("KSTrustRegionContractionFactor", "ks_trust_region_contraction_factor"),
    ("KSMaxTrustRegionIterations", "ks_max_trust_region_iterations"),
    ("KSInitialRadiusScale", "ks_initial_radius_scale"),
    ("KSMaxRadiusScale", "ks_max_radius_scale"),
    ("HessianType", "hessian_type"),
    ("MinTrustRegionRadius", "ks_min_trust_region_radius"),
    ("LimitedMemoryStorage", "limited_memory_storage"),
    ("KSOuterGradientTolerance", "ks_outer_gradient_tolerance"),
    ("KSOuterStationarityTolerance", "ks_outer_stationarity_tolerance"),
    ("KSOuterStagnationTolerance", "ks_outer_stagnation_tolerance"),
    ("KSOuterControlStagnationTolerance", "ks_outer_control_stagnation_tolerance"),
    ("KSOuterActualReductionTolerance", "ks_outer_actual_reduction_tolerance"),
    ("ProblemUpdateFrequency", "problem_update_frequency"),
    ("DisablePostSmoothing", "ks_disable_post_smoothing"),
    ("KSTrustRegionRatioLow", "ks_trust_region_ratio_low"),
    ("KSTrustRegionRatioMid", "ks_trust_region_ratio_mid"),
    ("KSTrustRegionRatioUpper", "ks_trust_region_ratio_high"),
];

const AUGMENTED_LAGRANGIAN_OPTIONS: &[(&str, &str)] = &[
    ("AugLagPenaltyParam", "al_penalty_parameter"),
    ("AugLagPenaltyParamScaleFactor", "al_penalty_scale_factor"),
];

const ROL_OPTIONS: &[(&str, &str)] = &[("ProblemUpdateFrequency", "problem_update_frequency")];

const DERIVATIVE_CHECKER_OPTIONS: &[(&str, &str)] = &[
    (
        "DerivativeCheckerInitialSuperscript",
        "derivative_checker_initial_superscript",
    ),
    (
        "DerivativeCheckerFinalSuperscript",
        "derivative_checker_final_superscript",
    ),
];

fn tuned<'a>(params: &'a OptimizationParameters, keyword: &str) -> Option<&'a str> {
    if keyword == MAX_ITERATIONS {
        return params.max_iterations.as_deref();
    }
    params.tuning.get(keyword).map(String::as_str)
}

fn option_values(params: &OptimizationParameters, table: &[(&str, &str)]) -> Vec<OptionNode> {
    table
        .iter()
        .map(|(key, keyword)| OptionNode::value(*key, tuned(params, keyword).unwrap_or(IGNORE)))
        .collect()
}

/// `Package` plus the algorithm's option table.
fn algorithm_options(params: &OptimizationParameters) -> Vec<OptionNode> {
    let algorithm = params.algorithm;
    let mut nodes = vec![OptionNode::value("Package", algorithm.package())];

    let mut options = match algorithm {
        Algorithm::Oc => option_values(params, OC_OPTIONS),
        Algorithm::Mma => option_values(params, MMA_OPTIONS),
        Algorithm::Ksbc => option_values(params, KS_OPTIONS),
        Algorithm::Ksal => {
            let mut values = option_values(params, KS_OPTIONS);
            values.extend(option_values(params, AUGMENTED_LAGRANGIAN_OPTIONS));
            values
        }
        Algorithm::RolKsbc | Algorithm::RolKsal => option_values(params, ROL_OPTIONS),
        Algorithm::DerivativeChecker => {
            nodes.push(OptionNode::value(
                "CheckGradient",
                tuned(params, "check_gradient").unwrap_or("true"),
            ));
            nodes.push(OptionNode::value(
                "CheckHessian",
                tuned(params, "check_hessian").unwrap_or("false"),
            ));
            nodes.push(OptionNode::value("UseUserInitialGuess", "True"));
            option_values(params, DERIVATIVE_CHECKER_OPTIONS)
        }
    };
    if algorithm != Algorithm::DerivativeChecker {
        if let Some(reset) = tuned(params, "reset_algorithm_on_update") {
            options.push(OptionNode::value("ResetAlgorithmOnUpdate", reset));
        }
    }
    nodes.push(OptionNode::block("Options", options));

    // MMA carries its iteration limit as MaxNumOuterIterations.
    if !matches!(algorithm, Algorithm::Mma | Algorithm::DerivativeChecker) {
        nodes.push(OptionNode::block(
            "Convergence",
            vec![OptionNode::value(
                "MaxIterations",
                tuned(params, MAX_ITERATIONS).unwrap_or(IGNORE),
            )],
        ));
    }
    nodes
}

fn optimization_variables(pipeline: Pipeline) -> OptionNode {
    let mut children = Vec::new();
    if pipeline.is_topology() {
        children.push(OptionNode::value("ValueName", CONTROL));
        children.push(OptionNode::value("InitializationStage", STAGE_INITIAL_GUESS));
        children.push(OptionNode::value("FilteredName", TOPOLOGY));
    } else {
        children.push(OptionNode::value("ValueName", DESIGN_PARAMETERS));
        children.push(OptionNode::value(
            "InitializationStage",
            STAGE_INITIALIZE_PARAMETERS,
        ));
    }
    children.extend([
        OptionNode::value("LowerBoundValueName", LOWER_BOUND_VALUE),
        OptionNode::value("LowerBoundVectorName", LOWER_BOUND_VECTOR),
        OptionNode::value("UpperBoundValueName", UPPER_BOUND_VALUE),
        OptionNode::value("UpperBoundVectorName", UPPER_BOUND_VECTOR),
        OptionNode::value("SetLowerBoundsStage", STAGE_LOWER_BOUNDS),
        OptionNode::value("SetUpperBoundsStage", STAGE_UPPER_BOUNDS),
    ]);
    OptionNode::block("OptimizationVariables", children)
}

fn sorted_block(key: &str, entries: BTreeMap<&str, String>) -> OptionNode {
    OptionNode::block(
        key,
        entries
            .into_iter()
            .map(|(k, v)| OptionNode::value(k, v))
            .collect(),
    )
}

fn objective_block() -> OptionNode {
    let entries = BTreeMap::from([
        ("ValueName", OBJECTIVE_VALUE.to_string()),
        ("ValueStageName", STAGE_OBJECTIVE_VALUE.to_string()),
        ("GradientName", OBJECTIVE_GRADIENT.to_string()),
        ("GradientStageName", STAGE_OBJECTIVE_GRADIENT.to_string()),
    ]);
    sorted_block("Objective", entries)
}

fn invalid_target(constraint: &Constraint, message: &str) -> CompileError {
    CompileError::InvalidConstraintTarget {
        constraint: constraint.id.clone(),
        message: message.to_string(),
    }
}

/// Target and reference entries of one constraint.
///
/// Volume constraints in topology problems are measured against the `Design Volume`
/// channel and may use a relative target; every other constraint needs an absolute one.
fn constraint_block(
    metadata: &ProblemMetadata,
    pipeline: Pipeline,
    constraint: &Constraint,
) -> Result<OptionNode, CompileError> {
    let kind = metadata
        .criterion(&constraint.criterion_id)
        .map(|c| c.kind)
        .ok_or_else(|| CompileError::UnknownReference {
            context: format!("Constraint '{}'", constraint.id),
            entity: "criterion",
            id: constraint.criterion_id.clone(),
        })?;
    let sign = match constraint.relation {
        Relation::LessThan => 1.0,
        Relation::GreaterThan => -1.0,
    };

    let mut entries = BTreeMap::from([
        ("ValueName", constraint_value(&constraint.id)),
        ("ValueStageName", constraint_value_stage(&constraint.id)),
        ("GradientName", constraint_gradient(&constraint.id)),
        ("GradientStageName", constraint_gradient_stage(&constraint.id)),
    ]);

    match (kind, constraint.target) {
        (_, None) => return Err(invalid_target(constraint, "no target value was given")),
        (CriterionKind::Volume, Some(ConstraintTarget::Absolute(target))) => {
            if target == 0.0 {
                return Err(invalid_target(constraint, "the absolute target is zero"));
            }
            entries.insert("AbsoluteTargetValue", (sign * target).to_string());
            entries.insert("ReferenceValue", (target * constraint.divisor).to_string());
        }
        (CriterionKind::Volume, Some(ConstraintTarget::Relative(target))) => {
            if target == 0.0 {
                return Err(invalid_target(constraint, "the relative target is zero"));
            }
            if !pipeline.is_topology() {
                return Err(invalid_target(
                    constraint,
                    "relative volume targets need the design volume of a topology problem",
                ));
            }
            entries.insert("NormalizedTargetValue", target.to_string());
        }
        (_, Some(ConstraintTarget::Relative(_))) => {
            return Err(invalid_target(
                constraint,
                "only volume constraints accept a relative target",
            ));
        }
        (_, Some(ConstraintTarget::Absolute(target))) => {
            let reference = if target.abs() < 1e-16 { 1.0 } else { target };
            entries.insert("AbsoluteTargetValue", (sign * target).to_string());
            entries.insert("ReferenceValue", (reference * constraint.divisor).to_string());
        }
    }

    if kind == CriterionKind::Volume && pipeline.is_topology() {
        entries.insert("ReferenceValueName", DESIGN_VOLUME.to_string());
    }
    Ok(sorted_block("Constraint", entries))
}

/// Builds the complete `Optimizer` block.
pub fn optimizer_block(
    metadata: &ProblemMetadata,
    pipeline: Pipeline,
) -> Result<OptionNode, CompileError> {
    let params = &metadata.optimization_parameters;
    let mut children = algorithm_options(params);

    if metadata.updates_problem() || pipeline == Pipeline::Levelset {
        children.push(OptionNode::block(
            "UpdateProblemStage",
            vec![OptionNode::value("Name", STAGE_UPDATE_PROBLEM)],
        ));
    }
    if metadata.caches_state() {
        children.push(OptionNode::block(
            "CacheStage",
            vec![OptionNode::value("Name", STAGE_CACHE_STATE)],
        ));
    }
    if metadata.output.enabled {
        children.push(OptionNode::block(
            "Output",
            vec![OptionNode::value("OutputStage", STAGE_OUTPUT)],
        ));
    }

    children.push(optimization_variables(pipeline));
    children.push(objective_block());
    for constraint in &metadata.constraints {
        children.push(constraint_block(metadata, pipeline, constraint)?);
    }
    if pipeline.is_topology() {
        children.push(OptionNode::block(
            "BoundConstraint",
            vec![
                OptionNode::value("Upper", "1.0"),
                OptionNode::value("Lower", "0.0"),
            ],
        ));
    }

    Ok(OptionNode::block("Optimizer", children))
}
