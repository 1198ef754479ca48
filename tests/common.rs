//! Common test utilities for building problem metadata.
use plato_interface::prelude::*;

#[allow(dead_code)]
pub fn create_service(id: &str, code: ServiceCode) -> Service {
    Service {
        id: id.to_string(),
        code,
        number_processors: 1,
        cache_state: false,
        update_problem: false,
    }
}

#[allow(dead_code)]
pub fn create_criterion(id: &str, kind: CriterionKind) -> Criterion {
    Criterion {
        id: id.to_string(),
        kind,
        parameters: Default::default(),
    }
}

#[allow(dead_code)]
pub fn create_scenario(id: &str) -> Scenario {
    Scenario {
        id: id.to_string(),
        physics: "steady_state_mechanics".to_string(),
        parameters: Default::default(),
    }
}

/// A volume constraint evaluated by the main engine (service `2`, criterion `2`).
#[allow(dead_code)]
pub fn create_volume_constraint(id: &str, target: ConstraintTarget) -> Constraint {
    Constraint {
        id: id.to_string(),
        criterion_id: "2".to_string(),
        service_id: "2".to_string(),
        scenario_id: None,
        relation: Relation::LessThan,
        target: Some(target),
        divisor: 1.0,
    }
}

/// Creates a minimal density topology problem.
///
/// Services: `1` plato_analyze, `2` platomain. Objective: compliance (criterion `1`) on
/// service `1`, scenario `1`. One volume constraint `1` with a relative target of 0.3.
/// Output writes the nodal `dispx` field of service `1`.
#[allow(dead_code)]
pub fn create_density_metadata() -> ProblemMetadata {
    ProblemMetadata {
        verbose: false,
        services: vec![
            create_service("1", ServiceCode::PlatoAnalyze),
            create_service("2", ServiceCode::PlatoMain),
        ],
        scenarios: vec![create_scenario("1")],
        criteria: vec![
            create_criterion("1", CriterionKind::MechanicalCompliance),
            create_criterion("2", CriterionKind::Volume),
        ],
        objective: Objective {
            criteria_ids: vec!["1".to_string()],
            service_ids: vec!["1".to_string()],
            scenario_ids: vec!["1".to_string()],
            weights: vec![1.0],
            multi_load_case: false,
            shape_service_ids: vec![],
        },
        constraints: vec![create_volume_constraint("1", ConstraintTarget::Relative(0.3))],
        output: OutputSettings {
            enabled: true,
            services: vec![ServiceOutput {
                service_id: "1".to_string(),
                deterministic: vec![QuantityOfInterest {
                    name: "dispx".to_string(),
                    layout: FieldLayout::Nodal,
                }],
                random: vec![],
            }],
        },
        optimization_parameters: OptimizationParameters::default(),
    }
}

/// Density problem whose objective sums two compliance criteria (`1` and `3`).
#[allow(dead_code)]
pub fn create_two_criterion_metadata() -> ProblemMetadata {
    let mut metadata = create_density_metadata();
    metadata
        .criteria
        .push(create_criterion("3", CriterionKind::MechanicalCompliance));
    metadata.objective = Objective {
        criteria_ids: vec!["1".to_string(), "3".to_string()],
        service_ids: vec!["1".to_string(), "1".to_string()],
        scenario_ids: vec!["1".to_string(), "1".to_string()],
        weights: vec![1.0, 0.5],
        multi_load_case: false,
        shape_service_ids: vec![],
    };
    metadata
}

/// Density problem with a multi-load-case objective over scenarios `14` and `15`.
#[allow(dead_code)]
pub fn create_mlc_metadata() -> ProblemMetadata {
    let mut metadata = create_density_metadata();
    metadata.scenarios = vec![create_scenario("14"), create_scenario("15")];
    metadata.objective.scenario_ids = vec!["14".to_string(), "15".to_string()];
    metadata.objective.multi_load_case = true;
    metadata
}

/// Density problem filtered by a dedicated helmholtz performer.
#[allow(dead_code)]
pub fn create_helmholtz_metadata(projection: ProjectionType) -> ProblemMetadata {
    let mut metadata = create_density_metadata();
    let params = &mut metadata.optimization_parameters;
    params.filter_type = FilterType::Helmholtz;
    params.filter_in_engine = false;
    params.projection_type = projection;
    metadata
}

#[allow(dead_code)]
pub fn create_levelset_metadata() -> ProblemMetadata {
    let mut metadata = create_density_metadata();
    metadata.optimization_parameters.discretization = Discretization::Levelset;
    metadata
}

/// Shape problem with three CAD parameters. The volume constraint is evaluated by the
/// physics service with an absolute target.
#[allow(dead_code)]
pub fn create_shape_metadata() -> ProblemMetadata {
    let mut metadata = create_density_metadata();
    metadata
        .services
        .push(create_service("3", ServiceCode::PlatoEsp));
    metadata.constraints = vec![Constraint {
        id: "1".to_string(),
        criterion_id: "2".to_string(),
        service_id: "1".to_string(),
        scenario_id: Some("1".to_string()),
        relation: Relation::LessThan,
        target: Some(ConstraintTarget::Absolute(0.5)),
        divisor: 1.0,
    }];
    let params = &mut metadata.optimization_parameters;
    params.optimization_type = OptimizationType::Shape;
    params.algorithm = Algorithm::Mma;
    params.shape = Some(ShapeSettings {
        num_parameters: 3,
        csm_parameter_count: None,
        join_mesh: false,
        convert_to_tet10: false,
    });
    metadata
}

/// Robust density problem: 2 performers with 3 samples each, one random tag `E` and a
/// random element QoI `vonmises`.
#[allow(dead_code)]
pub fn create_robust_metadata() -> ProblemMetadata {
    let mut metadata = create_density_metadata();
    metadata.output.services = vec![ServiceOutput {
        service_id: "1".to_string(),
        deterministic: vec![],
        random: vec![QuantityOfInterest {
            name: "vonmises".to_string(),
            layout: FieldLayout::Element,
        }],
    }];
    metadata.optimization_parameters.robust = Some(RobustSettings {
        std_dev_multiplier: "2".to_string(),
        performers: 2,
        samples_per_performer: 3,
        random_tags: vec!["E".to_string()],
    });
    metadata
}

#[allow(dead_code)]
pub fn compile(metadata: ProblemMetadata) -> InterfaceGraph {
    Compiler::builder(metadata)
        .build()
        .compile()
        .expect("Failed to compile")
}

/// Checks the ownership and declaration rules on a compiled graph without relying on the
/// compiler's own verification pass.
#[allow(dead_code)]
pub fn assert_consistent(graph: &InterfaceGraph) {
    let names = graph.channel_names();
    let mut sorted = names.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(sorted.len(), names.len(), "Channel declared twice");

    for channel in graph.channels.iter().flat_map(|c| c.items()) {
        assert!(
            graph.performer(&channel.owner).is_some(),
            "Channel '{}' owned by undeclared performer '{}'",
            channel.name,
            channel.owner
        );
        assert!(
            channel.user_names().contains(&graph.performers[0].name.as_str()),
            "Main engine is not a user of '{}'",
            channel.name
        );
    }

    for stage in &graph.stages {
        for op in stage.operations() {
            for input in op.input_channels() {
                assert!(
                    graph.channel(input).is_some(),
                    "'{}' in '{}' reads undeclared '{}'",
                    op.name,
                    stage.name,
                    input
                );
            }
            for output in op.output_channels() {
                let channel = graph.channel(output).unwrap_or_else(|| {
                    panic!("'{}' in '{}' writes undeclared '{}'", op.name, stage.name, output)
                });
                assert_eq!(
                    channel.owner, op.performer,
                    "'{}' in '{}' writes '{}' without owning it",
                    op.name, stage.name, output
                );
            }
        }
    }
}

/// Names of the stages, in document order.
#[allow(dead_code)]
pub fn stage_names(graph: &InterfaceGraph) -> Vec<&str> {
    graph.stages.iter().map(|s| s.name.as_str()).collect()
}
