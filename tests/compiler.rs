//! Tests for density topology compilation: performers, channels, stages and filters.
mod common;
use common::*;
use plato_interface::prelude::*;

const COMPLIANCE_VALUE: &str = "Criterion Value - criterion_1_service_1_scenario_1";
const COMPLIANCE_GRADIENT: &str = "Criterion Gradient - criterion_1_service_1_scenario_1";

#[test]
fn test_compiler_builds_density_problem() {
    let graph = compile(create_density_metadata());
    assert_consistent(&graph);

    let performers: Vec<_> = graph
        .performers
        .iter()
        .map(|p| (p.name.as_str(), p.id))
        .collect();
    assert_eq!(performers, vec![("platomain_2", 0), ("plato_analyze_1", 1)]);

    assert_eq!(
        stage_names(&graph),
        vec![
            "Design Volume",
            "Initial Guess",
            "Set Lower Bounds",
            "Set Upper Bounds",
            "Compute Objective Value",
            "Compute Objective Gradient",
            "Compute Constraint Value 1",
            "Compute Constraint Gradient 1",
            "Output To File",
        ]
    );
}

#[test]
fn test_single_criterion_is_copied_not_aggregated() {
    let graph = compile(create_density_metadata());

    assert_eq!(graph.count_operations("Compute Objective Value"), 1);
    assert_eq!(graph.count_operations("Aggregate Data"), 0);
    assert!(graph.channel(COMPLIANCE_VALUE).is_some());
    assert!(graph.channel("Aggregate Gradient").is_none());

    let objective_value = graph.channel("Objective Value").unwrap();
    assert_eq!(objective_value.owner, "platomain_2");
    assert_eq!(objective_value.layout, Layout::Global(1));

    let stage = graph.stage("Compute Objective Value").unwrap();
    let last = *stage.operations().last().unwrap();
    assert_eq!(last.name, "Copy Value");
    assert_eq!(last.input_channels(), vec![COMPLIANCE_VALUE]);
    assert_eq!(last.output_channels(), vec!["Objective Value"]);
}

#[test]
fn test_two_criteria_are_batched_and_aggregated() {
    let graph = compile(create_two_criterion_metadata());
    assert_consistent(&graph);

    let stage = graph.stage("Compute Objective Value").unwrap();
    match &stage.operations[1] {
        OperationNode::Batch(nodes) => assert_eq!(nodes.len(), 2),
        other => panic!("Expected a batch of evaluations, got {:?}", other),
    }

    let aggregate = stage
        .operations()
        .into_iter()
        .find(|op| op.name == "Aggregate Data")
        .expect("Expected an Aggregate Data operation");
    assert_eq!(aggregate.performer, "platomain_2");
    let arguments: Vec<_> = aggregate
        .inputs
        .iter()
        .flat_map(|f| f.items())
        .map(|a| a.argument.as_str())
        .collect();
    assert_eq!(arguments, vec!["Value 1", "Value 2"]);
    assert_eq!(aggregate.output_channels(), vec!["Objective Value"]);

    let gradient_stage = graph.stage("Compute Objective Gradient").unwrap();
    let gradient_aggregate = gradient_stage
        .operations()
        .into_iter()
        .find(|op| op.name == "Aggregate Data")
        .unwrap();
    assert_eq!(gradient_aggregate.output_channels(), vec!["Aggregate Gradient"]);
    assert_eq!(graph.count_operations("Aggregate Data"), 2);
}

#[test]
fn test_multi_load_case_uses_compound_scenario() {
    let graph = compile(create_mlc_metadata());
    assert_consistent(&graph);

    assert!(
        graph
            .channel("Criterion Value - criterion_1_service_1_scenario_1415")
            .is_some()
    );
    assert_eq!(graph.count_operations("Aggregate Data"), 0);
    assert!(graph.channel("dispx_plato_analyze_1_scenario_14").is_some());
    assert!(graph.channel("dispx_plato_analyze_1_scenario_15").is_some());

    let write = graph
        .operations()
        .into_iter()
        .find(|op| op.name == "Write Output")
        .unwrap();
    let arguments: Vec<_> = write
        .outputs
        .iter()
        .flat_map(|f| f.items())
        .map(|a| a.argument.as_str())
        .collect();
    assert_eq!(arguments, vec!["dispx0", "dispx1"]);
}

#[test]
fn test_kernel_filter_runs_in_main_engine() {
    let graph = compile(create_density_metadata());

    let filters: Vec<_> = graph
        .operations()
        .into_iter()
        .filter(|op| op.name == "Filter Control")
        .collect();
    assert!(!filters.is_empty());
    assert!(filters.iter().all(|op| op.performer == "platomain_2"));
    assert_eq!(graph.channel("Topology").unwrap().owner, "platomain_2");

    let gradient = graph
        .stage("Compute Objective Gradient")
        .unwrap()
        .operations()
        .into_iter()
        .find(|op| op.name == "Filter Gradient")
        .unwrap();
    assert_eq!(gradient.input_channels(), vec!["Control", COMPLIANCE_GRADIENT]);
    assert_eq!(gradient.output_channels(), vec!["Objective Gradient"]);
}

#[test]
fn test_helmholtz_filter_has_its_own_performer() {
    let graph = compile(create_helmholtz_metadata(ProjectionType::None));
    assert_consistent(&graph);

    let helmholtz = graph.performer("plato_analyze_helmholtz").unwrap();
    assert_eq!(helmholtz.code, "plato_analyze");
    assert_eq!(helmholtz.id, 2);

    let filters: Vec<_> = graph
        .operations()
        .into_iter()
        .filter(|op| op.name == "Filter Control")
        .collect();
    assert!(!filters.is_empty());
    assert!(filters.iter().all(|op| op.performer == "plato_analyze_helmholtz"));
    assert_eq!(graph.count_operations("Project Control"), 0);

    assert_eq!(graph.channel("Topology").unwrap().owner, "plato_analyze_helmholtz");
    assert_eq!(
        graph.channel("Objective Gradient").unwrap().owner,
        "plato_analyze_helmholtz"
    );
    assert!(
        graph
            .channel(COMPLIANCE_GRADIENT)
            .unwrap()
            .user_names()
            .contains(&"plato_analyze_helmholtz")
    );
}

#[test]
fn test_helmholtz_projection_chain() {
    let graph = compile(create_helmholtz_metadata(ProjectionType::Heaviside));
    assert_consistent(&graph);

    assert!(graph.channel("Filtered Control").is_some());
    assert!(graph.channel("Projected Objective Gradient").is_some());
    assert!(graph.channel("Projected Constraint Gradient 1").is_some());
    assert_eq!(graph.channel("Topology").unwrap().owner, "platomain_2");

    let names: Vec<_> = graph
        .stage("Compute Objective Gradient")
        .unwrap()
        .operations()
        .into_iter()
        .map(|op| op.name.as_str())
        .collect();
    assert_eq!(
        names,
        vec![
            "Filter Control",
            "Project Control",
            "Compute Objective Gradient",
            "Project Gradient",
            "Filter Gradient",
        ]
    );
}

#[test]
fn test_unfiltered_design_is_copied_through() {
    let mut metadata = create_density_metadata();
    metadata.optimization_parameters.filter_in_engine = false;
    let graph = compile(metadata);
    assert_consistent(&graph);

    assert_eq!(graph.count_operations("Filter Control"), 0);
    assert_eq!(graph.count_operations("Filter Gradient"), 0);
    let copy = graph
        .stage("Compute Objective Value")
        .unwrap()
        .operations()[0];
    assert_eq!(copy.name, "Copy Field");
    assert_eq!(copy.output_channels(), vec!["Topology"]);
}

#[test]
fn test_normalization_captures_initial_values() {
    let mut metadata = create_two_criterion_metadata();
    metadata.optimization_parameters.normalize_in_aggregator = true;
    let graph = compile(metadata);
    assert_consistent(&graph);

    let initial = graph.stage("Initial Guess").unwrap();
    assert!(
        initial
            .outputs
            .contains(&"Initial Criterion Value - criterion_1_service_1_scenario_1".to_string())
    );
    assert!(
        initial
            .outputs
            .contains(&"Initial Criterion Value - criterion_3_service_1_scenario_1".to_string())
    );

    let aggregate = graph
        .stage("Compute Objective Value")
        .unwrap()
        .operations()
        .into_iter()
        .find(|op| op.name == "Aggregate Data")
        .unwrap();
    let arguments: Vec<_> = aggregate
        .inputs
        .iter()
        .flat_map(|f| f.items())
        .map(|a| a.argument.as_str())
        .collect();
    assert_eq!(arguments, vec!["Value 1", "Normal 1", "Value 2", "Normal 2"]);
}

#[test]
fn test_single_normalized_criterion_is_aggregated() {
    let mut metadata = create_density_metadata();
    metadata.optimization_parameters.normalize_in_aggregator = true;
    let graph = compile(metadata);
    assert_eq!(graph.count_operations("Aggregate Data"), 2);
    assert!(graph.channel("Aggregate Gradient").is_some());
}

#[test]
fn test_cache_and_update_stages_follow_service_flags() {
    let mut metadata = create_density_metadata();
    metadata.services[0].cache_state = true;
    metadata.services[0].update_problem = true;
    let graph = compile(metadata);

    let cache = graph.stage("Cache State").unwrap();
    let ops = cache.operations();
    assert_eq!(ops.len(), 1);
    assert_eq!(ops[0].performer, "plato_analyze_1");
    assert!(graph.stage("Update Problem").is_some());

    let names = stage_names(&graph);
    let cache_at = names.iter().position(|n| *n == "Cache State").unwrap();
    let value_at = names.iter().position(|n| *n == "Compute Objective Value").unwrap();
    assert!(cache_at < value_at);
}

#[test]
fn test_physics_performers_are_numbered_per_code() {
    let mut metadata = create_density_metadata();
    metadata
        .services
        .push(create_service("5", ServiceCode::PlatoAnalyze));
    metadata
        .services
        .push(create_service("6", ServiceCode::SierraSd));
    let graph = compile(metadata);

    let names: Vec<_> = graph.performers.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["platomain_2", "plato_analyze_1", "plato_analyze_2", "sierra_sd_1"]
    );
    let topology = graph.channel("Topology").unwrap();
    assert_eq!(
        topology.user_names(),
        vec!["platomain_2", "plato_analyze_1", "plato_analyze_2", "sierra_sd_1"]
    );
}

#[test]
fn test_output_stage_reads_gradients_and_quantities() {
    let graph = compile(create_density_metadata());
    let stage = graph.stage("Output To File").unwrap();
    let ops = stage.operations();
    assert_eq!(ops[0].name, "Write Output");
    assert_eq!(ops[0].output_channels(), vec!["dispx_plato_analyze_1"]);

    let main_output = ops.last().unwrap();
    assert_eq!(main_output.name, "PlatoMainOutput");
    let inputs = main_output.input_channels();
    assert!(inputs.contains(&"Topology"));
    assert!(inputs.contains(&"Objective Gradient"));
    assert!(inputs.contains(&"Constraint Gradient 1"));
    assert!(inputs.contains(&"dispx_plato_analyze_1"));
}

#[test]
fn test_disabled_output_has_no_stage() {
    let mut metadata = create_density_metadata();
    metadata.output.enabled = false;
    let graph = compile(metadata);
    assert!(graph.stage("Output To File").is_none());
    assert!(graph.channel("dispx_plato_analyze_1").is_none());
    assert!(graph.optimizer.child("Output").is_none());
}

#[test]
fn test_compilation_is_deterministic() {
    let first = compile(create_two_criterion_metadata()).to_xml().unwrap();
    let second = compile(create_two_criterion_metadata()).to_xml().unwrap();
    assert_eq!(first, second);

    let compiler = Compiler::builder(create_helmholtz_metadata(ProjectionType::Tanh)).build();
    let a = compiler.compile().unwrap();
    let b = compiler.compile().unwrap();
    assert_eq!(a, b);
}

struct RenamedAnalyze;

impl ServiceConvention for RenamedAnalyze {
    fn code(&self) -> ServiceCode {
        ServiceCode::PlatoAnalyze
    }

    fn criterion_ops(
        &self,
        role: plato_interface::compiler::CriterionRole<'_>,
    ) -> plato_interface::compiler::CriterionOps {
        let mut ops = plato_interface::compiler::default_convention(ServiceCode::PlatoAnalyze)
            .unwrap()
            .criterion_ops(role);
        ops.value_operation = "Evaluate Compliance".to_string();
        ops
    }
}

#[test]
fn test_compiler_with_custom_convention() {
    let graph = Compiler::builder(create_density_metadata())
        .with_convention(Box::new(RenamedAnalyze))
        .build()
        .compile()
        .unwrap();
    assert_eq!(graph.count_operations("Evaluate Compliance"), 1);
    assert_eq!(graph.count_operations("Compute Objective Value"), 0);
}

#[test]
fn test_compiler_with_code_mapping() {
    let mut metadata = create_density_metadata();
    metadata.services[0].code = ServiceCode::SierraSd;
    let graph = Compiler::builder(metadata)
        .with_code_mapping(ServiceCode::SierraSd, ServiceCode::SierraTf)
        .build()
        .compile()
        .unwrap();
    assert_eq!(graph.performers[1].name, "sierra_sd_1");
    assert_eq!(graph.count_operations("Compute Criterion"), 1);
}

#[test]
fn test_code_mapping_to_auxiliary_code_is_ignored() {
    let mut metadata = create_density_metadata();
    metadata.services[0].code = ServiceCode::SierraSd;
    let graph = Compiler::builder(metadata)
        .with_code_mapping(ServiceCode::SierraSd, ServiceCode::Xtk)
        .build()
        .compile()
        .unwrap();
    assert_eq!(graph.count_operations("Compute Criterion"), 0);
    let value = graph
        .operations()
        .into_iter()
        .find(|op| op.name == "Compute Objective Value" && op.performer == "sierra_sd_1")
        .unwrap();
    let arguments: Vec<_> = value
        .outputs
        .iter()
        .flat_map(|f| f.items())
        .map(|a| a.argument.as_str())
        .collect();
    assert_eq!(arguments, vec!["Internal Energy"]);

    let gradient = graph
        .operations()
        .into_iter()
        .find(|op| op.name == "Compute Objective Gradient" && op.performer == "sierra_sd_1")
        .unwrap();
    assert!(gradient
        .outputs
        .iter()
        .flat_map(|f| f.items())
        .any(|a| a.argument == "Objective Gradient"));
}
