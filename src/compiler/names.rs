//! Shared-data, stage and operation names that several builders must agree on.

pub const CONTROL: &str = "Control";
pub const TOPOLOGY: &str = "Topology";
pub const FILTERED_CONTROL: &str = "Filtered Control";
pub const INITIAL_CONTROL: &str = "Initial Control";
pub const DESIGN_PARAMETERS: &str = "Design Parameters";
pub const DESIGN_VOLUME: &str = "Design Volume";
pub const LOWER_BOUND_VALUE: &str = "Lower Bound Value";
pub const LOWER_BOUND_VECTOR: &str = "Lower Bound Vector";
pub const UPPER_BOUND_VALUE: &str = "Upper Bound Value";
pub const UPPER_BOUND_VECTOR: &str = "Upper Bound Vector";
pub const OBJECTIVE_VALUE: &str = "Objective Value";
pub const OBJECTIVE_GRADIENT: &str = "Objective Gradient";
pub const AGGREGATE_GRADIENT: &str = "Aggregate Gradient";
pub const PROJECTED_OBJECTIVE_GRADIENT: &str = "Projected Objective Gradient";
pub const ROBUST_OBJECTIVE_GRADIENT: &str = "Robust Objective Gradient";

pub const STAGE_DESIGN_VOLUME: &str = "Design Volume";
pub const STAGE_INITIAL_GUESS: &str = "Initial Guess";
pub const STAGE_INITIALIZE_PARAMETERS: &str = "Initialize Design Parameters";
pub const STAGE_LOWER_BOUNDS: &str = "Set Lower Bounds";
pub const STAGE_UPPER_BOUNDS: &str = "Set Upper Bounds";
pub const STAGE_CACHE_STATE: &str = "Cache State";
pub const STAGE_UPDATE_PROBLEM: &str = "Update Problem";
pub const STAGE_OBJECTIVE_VALUE: &str = "Compute Objective Value";
pub const STAGE_OBJECTIVE_GRADIENT: &str = "Compute Objective Gradient";
pub const STAGE_OUTPUT: &str = "Output To File";

/// Loop variables and ranges understood by the runtime's `defines.xml`.
pub const PERFORMER_INDEX: &str = "PerformerIndex";
pub const PERFORMERS: &str = "Performers";
pub const PERFORMER_SAMPLE_INDEX: &str = "PerformerSampleIndex";
pub const PERFORMER_SAMPLES: &str = "PerformerSamples";
pub const PARAMETER_INDEX: &str = "I";
pub const PARAMETERS: &str = "Parameters";

/// Flat sample index over the `Performers x PerformerSamples` ensemble.
pub const SAMPLE_INDEX: &str = "{PerformerIndex*NumSamplesPerPerformer+PerformerSampleIndex}";

pub fn constraint_value(id: &str) -> String {
    format!("Constraint Value {}", id)
}

pub fn constraint_gradient(id: &str) -> String {
    format!("Constraint Gradient {}", id)
}

pub fn projected_constraint_gradient(id: &str) -> String {
    format!("Projected Constraint Gradient {}", id)
}

pub fn constraint_value_stage(id: &str) -> String {
    format!("Compute Constraint Value {}", id)
}

pub fn constraint_gradient_stage(id: &str) -> String {
    format!("Compute Constraint Gradient {}", id)
}

pub fn parameter_sensitivity() -> String {
    format!("Parameter Sensitivity {{{}}}", PARAMETER_INDEX)
}

pub fn sample_channel(base: &str) -> String {
    format!("{} {}", base, SAMPLE_INDEX)
}
