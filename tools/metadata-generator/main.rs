use clap::Parser;
use plato_interface::metadata::document::*;
use rand::Rng;
use rand::rngs::ThreadRng;
use std::fs;

/// A CLI tool to generate problem metadata for the interface compiler
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// The path to write the generated JSON file to
    #[arg(short, long, default_value = "generated_problem.json")]
    output: String,

    /// Number of weighted objective criteria
    #[arg(long, default_value_t = 1)]
    criteria: usize,

    /// Number of volume constraints
    #[arg(long, default_value_t = 1)]
    constraints: usize,

    /// Use the Helmholtz filter instead of the kernel filter
    #[arg(long)]
    helmholtz: bool,

    /// Generate a multi-load-case objective over this many scenarios
    #[arg(long)]
    mlc: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut rng = rand::rng();

    if cli.criteria == 0 {
        eprintln!("Error: --criteria must be at least 1");
        std::process::exit(1);
    }
    if cli.mlc.is_some() && cli.criteria > 1 {
        eprintln!("Error: --mlc cannot be combined with more than one criterion");
        std::process::exit(1);
    }

    println!(
        "Generating problem metadata ({} criteria, {} constraints)...",
        cli.criteria, cli.constraints
    );

    let scenario_count = cli.mlc.unwrap_or(1).max(1);
    let document = MetadataDocument {
        verbose: false,
        services: generate_services(&mut rng),
        scenarios: (1..=scenario_count)
            .map(|i| ScenarioEntry {
                id: i.to_string(),
                physics: "steady_state_mechanics".to_string(),
                ..Default::default()
            })
            .collect(),
        criteria: generate_criteria(cli.criteria),
        objective: generate_objective(&mut rng, cli.criteria, cli.mlc),
        constraints: generate_constraints(&mut rng, cli.constraints),
        output: OutputEntry {
            enabled: true,
            services: vec![ServiceOutputEntry {
                service: "1".to_string(),
                deterministic: vec![QoiEntry {
                    name: "dispx".to_string(),
                    layout: Some("nodal field".to_string()),
                }],
                random: Vec::new(),
            }],
        },
        optimization_parameters: ParametersEntry {
            filter_type: Some(if cli.helmholtz { "helmholtz" } else { "kernel" }.to_string()),
            algorithm: Some("mma".to_string()),
            max_iterations: Some(rng.random_range(20..200).to_string()),
            ..Default::default()
        },
    };

    let json_output = serde_json::to_string_pretty(&document)?;
    fs::write(&cli.output, json_output)?;

    println!(
        "Successfully generated and saved problem metadata to '{}'",
        cli.output
    );

    Ok(())
}

fn generate_services(rng: &mut ThreadRng) -> Vec<ServiceEntry> {
    vec![
        ServiceEntry {
            id: "1".to_string(),
            code: "plato_analyze".to_string(),
            number_processors: rng.random_range(1..=8),
            cache_state: false,
            update_problem: false,
        },
        ServiceEntry {
            id: "2".to_string(),
            code: "platomain".to_string(),
            number_processors: 1,
            ..Default::default()
        },
    ]
}

/// Criterion `0` is the volume criterion used by constraints; the rest are compliances.
fn generate_criteria(count: usize) -> Vec<CriterionEntry> {
    let mut criteria = vec![CriterionEntry {
        id: "0".to_string(),
        kind: "volume".to_string(),
        ..Default::default()
    }];
    criteria.extend((1..=count).map(|i| CriterionEntry {
        id: i.to_string(),
        kind: "mechanical_compliance".to_string(),
        ..Default::default()
    }));
    criteria
}

fn generate_objective(rng: &mut ThreadRng, count: usize, mlc: Option<usize>) -> ObjectiveEntry {
    let scenarios = match mlc {
        Some(n) => (1..=n.max(1)).map(|i| i.to_string()).collect(),
        None => vec!["1".to_string(); count],
    };
    ObjectiveEntry {
        criteria: (1..=count).map(|i| i.to_string()).collect(),
        services: vec!["1".to_string(); count],
        scenarios,
        weights: (0..count)
            .map(|_| format!("{:.2}", rng.random_range(0.1..1.0)))
            .collect(),
        multi_load_case: mlc.is_some(),
        shape_services: Vec::new(),
    }
}

fn generate_constraints(rng: &mut ThreadRng, count: usize) -> Vec<ConstraintEntry> {
    (1..=count)
        .map(|i| ConstraintEntry {
            id: i.to_string(),
            criterion: "0".to_string(),
            service: "2".to_string(),
            scenario: None,
            relation: Some("less_than".to_string()),
            absolute_target: None,
            relative_target: Some(format!("{:.2}", rng.random_range(0.2..0.6))),
            divisor: None,
        })
        .collect()
}
