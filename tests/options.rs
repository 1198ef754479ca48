//! Tests for the optimizer option block.
mod common;
use common::*;
use plato_interface::prelude::*;

fn text<'a>(node: &'a OptionNode, path: &[&str]) -> Option<&'a str> {
    let mut current = node;
    for key in path {
        current = current.child(key)?;
    }
    current.text()
}

#[test]
fn test_default_oc_block() {
    let graph = compile(create_density_metadata());
    let optimizer = &graph.optimizer;
    assert_eq!(optimizer.key(), "Optimizer");
    assert_eq!(text(optimizer, &["Package"]), Some("OC"));
    assert_eq!(
        text(optimizer, &["Options", "OCGradientTolerance"]),
        Some("IGNORE")
    );
    assert_eq!(
        text(optimizer, &["Convergence", "MaxIterations"]),
        Some("IGNORE")
    );
    assert_eq!(
        text(optimizer, &["Output", "OutputStage"]),
        Some("Output To File")
    );
    assert_eq!(text(optimizer, &["BoundConstraint", "Upper"]), Some("1.0"));
    assert_eq!(text(optimizer, &["BoundConstraint", "Lower"]), Some("0.0"));
    assert!(optimizer.child("CacheStage").is_none());
    assert!(optimizer.child("UpdateProblemStage").is_none());
}

#[test]
fn test_topology_variables_and_objective() {
    let graph = compile(create_density_metadata());
    let optimizer = &graph.optimizer;
    assert_eq!(
        text(optimizer, &["OptimizationVariables", "ValueName"]),
        Some("Control")
    );
    assert_eq!(
        text(optimizer, &["OptimizationVariables", "FilteredName"]),
        Some("Topology")
    );
    assert_eq!(
        text(optimizer, &["OptimizationVariables", "SetLowerBoundsStage"]),
        Some("Set Lower Bounds")
    );
    assert_eq!(
        text(optimizer, &["Objective", "ValueStageName"]),
        Some("Compute Objective Value")
    );
    assert_eq!(
        text(optimizer, &["Objective", "GradientName"]),
        Some("Objective Gradient")
    );
}

#[test]
fn test_relative_volume_constraint() {
    let graph = compile(create_density_metadata());
    let constraints: Vec<_> = graph.optimizer.children_named("Constraint").collect();
    assert_eq!(constraints.len(), 1);
    let constraint = constraints[0];
    assert_eq!(text(constraint, &["NormalizedTargetValue"]), Some("0.3"));
    assert_eq!(
        text(constraint, &["ReferenceValueName"]),
        Some("Design Volume")
    );
    assert_eq!(
        text(constraint, &["ValueName"]),
        Some("Constraint Value 1")
    );
    assert_eq!(
        text(constraint, &["GradientStageName"]),
        Some("Compute Constraint Gradient 1")
    );
    assert!(constraint.child("AbsoluteTargetValue").is_none());
}

#[test]
fn test_absolute_constraint_targets() {
    let mut metadata = create_density_metadata();
    metadata
        .criteria
        .push(create_criterion("3", CriterionKind::StressPNorm));
    metadata.constraints = vec![
        Constraint {
            id: "1".to_string(),
            criterion_id: "3".to_string(),
            service_id: "1".to_string(),
            scenario_id: Some("1".to_string()),
            relation: Relation::GreaterThan,
            target: Some(ConstraintTarget::Absolute(2.0)),
            divisor: 1.0,
        },
        Constraint {
            id: "2".to_string(),
            criterion_id: "3".to_string(),
            service_id: "1".to_string(),
            scenario_id: Some("1".to_string()),
            relation: Relation::LessThan,
            target: Some(ConstraintTarget::Absolute(0.0)),
            divisor: 4.0,
        },
    ];
    let graph = compile(metadata);
    let constraints: Vec<_> = graph.optimizer.children_named("Constraint").collect();
    assert_eq!(constraints.len(), 2);

    assert_eq!(text(constraints[0], &["AbsoluteTargetValue"]), Some("-2"));
    assert_eq!(text(constraints[0], &["ReferenceValue"]), Some("2"));
    assert!(constraints[0].child("ReferenceValueName").is_none());

    // A zero target falls back to a unit reference scaled by the divisor.
    assert_eq!(text(constraints[1], &["AbsoluteTargetValue"]), Some("0"));
    assert_eq!(text(constraints[1], &["ReferenceValue"]), Some("4"));
}

#[test]
fn test_constraint_keys_are_sorted() {
    let graph = compile(create_density_metadata());
    let constraint = graph.optimizer.child("Constraint").unwrap();
    let keys: Vec<_> = match constraint {
        OptionNode::Block { children, .. } => children.iter().map(|c| c.key()).collect(),
        OptionNode::Value { .. } => panic!("Expected a block"),
    };
    let mut sorted = keys.clone();
    sorted.sort();
    assert_eq!(keys, sorted);
}

#[test]
fn test_mma_tuning_values() {
    let mut metadata = create_density_metadata();
    let params = &mut metadata.optimization_parameters;
    params.algorithm = Algorithm::Mma;
    params.max_iterations = Some("75".to_string());
    params
        .tuning
        .insert("mma_move_limit".to_string(), "0.2".to_string());
    params
        .tuning
        .insert("reset_algorithm_on_update".to_string(), "true".to_string());
    let graph = compile(metadata);

    let optimizer = &graph.optimizer;
    assert_eq!(text(optimizer, &["Package"]), Some("MMA"));
    assert_eq!(
        text(optimizer, &["Options", "MaxNumOuterIterations"]),
        Some("75")
    );
    assert_eq!(text(optimizer, &["Options", "MoveLimit"]), Some("0.2"));
    assert_eq!(
        text(optimizer, &["Options", "AsymptoteExpansion"]),
        Some("IGNORE")
    );
    assert_eq!(
        text(optimizer, &["Options", "ResetAlgorithmOnUpdate"]),
        Some("true")
    );
    assert!(optimizer.child("Convergence").is_none());
}

#[test]
fn test_cache_stage_is_named() {
    let mut metadata = create_density_metadata();
    metadata.services[0].cache_state = true;
    let graph = compile(metadata);
    assert_eq!(
        text(&graph.optimizer, &["CacheStage", "Name"]),
        Some("Cache State")
    );
}

#[test]
fn test_zero_volume_target_is_rejected() {
    let mut metadata = create_density_metadata();
    metadata.constraints = vec![create_volume_constraint(
        "1",
        ConstraintTarget::Relative(0.0),
    )];
    let result = Compiler::builder(metadata).build().compile();
    match result.err().unwrap() {
        CompileError::InvalidConstraintTarget { constraint, .. } => assert_eq!(constraint, "1"),
        _ => panic!("Expected InvalidConstraintTarget error"),
    }
}

#[test]
fn test_missing_target_is_rejected() {
    let mut metadata = create_density_metadata();
    metadata.constraints[0].target = None;
    let error = Compiler::builder(metadata).build().compile().err().unwrap();
    assert_eq!(error.kind(), ErrorKind::Configuration);
}
