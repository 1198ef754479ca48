use clap::Parser;
use plato_interface::metadata::count_csm_design_parameters;
use plato_interface::prelude::*;
use std::fs;
use std::time::Instant;
use tracing_subscriber::EnvFilter;

/// Compiles optimization problem metadata into an interface XML document
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the problem metadata JSON file
    metadata_path: String,

    /// Path to write the interface XML to
    #[arg(short, long, default_value = "interface.xml")]
    output: String,

    /// ESP csm file whose design parameters are checked against the metadata
    #[arg(long)]
    csm: Option<String>,

    /// Also save the compiled graph as a binary artifact
    #[arg(long)]
    artifact: Option<String>,

    /// Skip the structural check of the finished graph
    #[arg(long)]
    no_verify: bool,

    /// Print a summary of the compiled graph
    #[arg(short, long)]
    summary: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let total_start = Instant::now();

    // --- 1. Metadata Loading ---
    let document = MetadataDocument::from_file(&cli.metadata_path).unwrap_or_else(|e| {
        exit_with_error(&format!(
            "Failed to load metadata from '{}': {}",
            cli.metadata_path, e
        ))
    });
    let mut metadata = document
        .into_metadata()
        .unwrap_or_else(|e| exit_with_error(&format!("Invalid metadata: {}", e)));

    if let Some(csm_path) = &cli.csm {
        let source = fs::read_to_string(csm_path).unwrap_or_else(|e| {
            exit_with_error(&format!("Failed to read csm file '{}': {}", csm_path, e))
        });
        let found = count_csm_design_parameters(&source);
        match metadata.optimization_parameters.shape.as_mut() {
            Some(shape) => shape.csm_parameter_count = Some(found),
            None => tracing::warn!("Ignoring csm file for a problem without shape settings"),
        }
    }

    // --- 2. Compilation ---
    let compile_start = Instant::now();
    let graph = Compiler::builder(metadata)
        .with_verification(!cli.no_verify)
        .build()
        .compile()
        .unwrap_or_else(|e| exit_with_error(&format!("Compilation failed: {}", e)));
    let compile_duration = compile_start.elapsed();

    // --- 3. Emission ---
    let xml = graph
        .to_xml()
        .unwrap_or_else(|e| exit_with_error(&format!("Failed to render XML: {}", e)));
    fs::write(&cli.output, xml).unwrap_or_else(|e| {
        exit_with_error(&format!("Failed to write '{}': {}", cli.output, e))
    });
    println!("Wrote interface document to '{}'", cli.output);

    if let Some(artifact_path) = &cli.artifact {
        graph
            .save(artifact_path)
            .unwrap_or_else(|e| exit_with_error(&format!("Failed to save artifact: {}", e)));
        println!("Saved compiled graph to '{}'", artifact_path);
    }

    // --- 4. Summary ---
    if cli.summary {
        println!("\n--- Graph Summary ---");
        println!("Performers:   {}", graph.performers.len());
        for performer in &graph.performers {
            println!("  {:<28} {}", performer.name, performer.code);
        }
        println!("Shared Data:  {}", graph.channel_names().len());
        println!("Stages:       {}", graph.stages.len());
        for stage in &graph.stages {
            println!("  {:<40} {} operations", stage.name, stage.operations().len());
        }
        println!("\n--- Performance Summary ---");
        println!("Compilation:          {:?}", compile_duration);
        println!("Total Execution:      {:?}", total_start.elapsed());
    }
}

fn exit_with_error(message: &str) -> ! {
    eprintln!("\nError: {}", message);
    std::process::exit(1);
}
