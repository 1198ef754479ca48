use super::codes::{FieldLayout, Relation};
use super::conversion::IntoMetadata;
use super::definition::*;
use crate::error::MetadataError;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::str::FromStr;

/// Root of the JSON problem-metadata format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MetadataDocument {
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub services: Vec<ServiceEntry>,
    #[serde(default)]
    pub scenarios: Vec<ScenarioEntry>,
    #[serde(default)]
    pub criteria: Vec<CriterionEntry>,
    pub objective: ObjectiveEntry,
    #[serde(default)]
    pub constraints: Vec<ConstraintEntry>,
    #[serde(default)]
    pub output: OutputEntry,
    #[serde(default, alias = "optimizationParameters")]
    pub optimization_parameters: ParametersEntry,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceEntry {
    pub id: String,
    pub code: String,
    #[serde(default = "one", alias = "numberProcessors")]
    pub number_processors: usize,
    #[serde(default, alias = "cacheState")]
    pub cache_state: bool,
    #[serde(default, alias = "updateProblem")]
    pub update_problem: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScenarioEntry {
    pub id: String,
    #[serde(default)]
    pub physics: String,
    #[serde(default)]
    pub parameters: AHashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CriterionEntry {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub parameters: AHashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ObjectiveEntry {
    #[serde(default)]
    pub criteria: Vec<String>,
    #[serde(default)]
    pub services: Vec<String>,
    #[serde(default)]
    pub scenarios: Vec<String>,
    #[serde(default)]
    pub weights: Vec<String>,
    #[serde(default, alias = "multiLoadCase")]
    pub multi_load_case: bool,
    #[serde(default, alias = "shapeServices")]
    pub shape_services: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConstraintEntry {
    pub id: String,
    pub criterion: String,
    pub service: String,
    #[serde(default)]
    pub scenario: Option<String>,
    #[serde(default, rename = "type")]
    pub relation: Option<String>,
    #[serde(default, alias = "absoluteTarget")]
    pub absolute_target: Option<String>,
    #[serde(default, alias = "relativeTarget")]
    pub relative_target: Option<String>,
    #[serde(default)]
    pub divisor: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputEntry {
    #[serde(default = "yes")]
    pub enabled: bool,
    #[serde(default)]
    pub services: Vec<ServiceOutputEntry>,
}

impl Default for OutputEntry {
    fn default() -> Self {
        Self {
            enabled: true,
            services: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ServiceOutputEntry {
    pub service: String,
    #[serde(default)]
    pub deterministic: Vec<QoiEntry>,
    #[serde(default)]
    pub random: Vec<QoiEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QoiEntry {
    pub name: String,
    #[serde(default)]
    pub layout: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ParametersEntry {
    #[serde(default, alias = "optimizationType")]
    pub optimization_type: Option<String>,
    #[serde(default)]
    pub discretization: Option<String>,
    #[serde(default, alias = "filterType")]
    pub filter_type: Option<String>,
    #[serde(default, alias = "projectionType")]
    pub projection_type: Option<String>,
    #[serde(default, alias = "filterInEngine")]
    pub filter_in_engine: Option<bool>,
    #[serde(default, alias = "normalizeInAggregator")]
    pub normalize_in_aggregator: bool,
    #[serde(default, alias = "optimizationAlgorithm")]
    pub algorithm: Option<String>,
    #[serde(default, alias = "maxIterations")]
    pub max_iterations: Option<String>,
    #[serde(default)]
    pub tuning: AHashMap<String, String>,
    #[serde(default)]
    pub robust: Option<RobustEntry>,
    #[serde(default)]
    pub shape: Option<ShapeEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RobustEntry {
    #[serde(default = "default_multiplier", alias = "stdDevMultiplier")]
    pub std_dev_multiplier: String,
    #[serde(default = "one")]
    pub performers: usize,
    #[serde(default = "one", alias = "samplesPerPerformer")]
    pub samples_per_performer: usize,
    #[serde(default, alias = "randomTags")]
    pub random_tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ShapeEntry {
    #[serde(alias = "numParameters")]
    pub num_parameters: usize,
    #[serde(default, alias = "csmParameterCount")]
    pub csm_parameter_count: Option<usize>,
    #[serde(default, alias = "joinMesh")]
    pub join_mesh: bool,
    #[serde(default, alias = "convertToTet10")]
    pub convert_to_tet10: bool,
}

fn one() -> usize {
    1
}

fn yes() -> bool {
    true
}

fn default_multiplier() -> String {
    "1".to_string()
}

fn parse_number(field: &str, value: &str) -> Result<f64, MetadataError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| MetadataError::InvalidNumber {
            field: field.to_string(),
            value: value.to_string(),
        })
}

fn parse_keyword<T: FromStr<Err = MetadataError>>(
    value: Option<&str>,
    default: T,
) -> Result<T, MetadataError> {
    match value {
        Some(v) => v.parse(),
        None => Ok(default),
    }
}

impl MetadataDocument {
    pub fn from_json(json: &str) -> Result<Self, MetadataError> {
        serde_json::from_str(json).map_err(|e| MetadataError::JsonParseError(e.to_string()))
    }

    /// Load a metadata document from a JSON file.
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        Ok(Self::from_json(&content)?)
    }
}

impl IntoMetadata for MetadataDocument {
    fn into_metadata(self) -> Result<ProblemMetadata, MetadataError> {
        let services = self
            .services
            .into_iter()
            .map(|s| {
                Ok(Service {
                    id: s.id,
                    code: s.code.parse()?,
                    number_processors: s.number_processors,
                    cache_state: s.cache_state,
                    update_problem: s.update_problem,
                })
            })
            .collect::<Result<Vec<_>, MetadataError>>()?;

        let scenarios = self
            .scenarios
            .into_iter()
            .map(|s| Scenario {
                id: s.id,
                physics: s.physics,
                parameters: s.parameters,
            })
            .collect();

        let criteria = self
            .criteria
            .into_iter()
            .map(|c| {
                Ok(Criterion {
                    id: c.id,
                    kind: c.kind.parse()?,
                    parameters: c.parameters,
                })
            })
            .collect::<Result<Vec<_>, MetadataError>>()?;

        let weights = self
            .objective
            .weights
            .iter()
            .map(|w| parse_number("objective.weights", w))
            .collect::<Result<Vec<_>, _>>()?;
        let objective = Objective {
            criteria_ids: self.objective.criteria,
            service_ids: self.objective.services,
            scenario_ids: self.objective.scenarios,
            weights,
            multi_load_case: self.objective.multi_load_case,
            shape_service_ids: self.objective.shape_services,
        };

        let constraints = self
            .constraints
            .into_iter()
            .map(convert_constraint)
            .collect::<Result<Vec<_>, _>>()?;

        let output = OutputSettings {
            enabled: self.output.enabled,
            services: self
                .output
                .services
                .into_iter()
                .map(|s| {
                    Ok(ServiceOutput {
                        service_id: s.service,
                        deterministic: convert_qois(s.deterministic)?,
                        random: convert_qois(s.random)?,
                    })
                })
                .collect::<Result<Vec<_>, MetadataError>>()?,
        };

        let p = self.optimization_parameters;
        let defaults = OptimizationParameters::default();
        let optimization_parameters = OptimizationParameters {
            optimization_type: parse_keyword(
                p.optimization_type.as_deref(),
                defaults.optimization_type,
            )?,
            discretization: parse_keyword(p.discretization.as_deref(), defaults.discretization)?,
            filter_type: parse_keyword(p.filter_type.as_deref(), defaults.filter_type)?,
            projection_type: parse_keyword(p.projection_type.as_deref(), defaults.projection_type)?,
            filter_in_engine: p.filter_in_engine.unwrap_or(defaults.filter_in_engine),
            normalize_in_aggregator: p.normalize_in_aggregator,
            algorithm: parse_keyword(p.algorithm.as_deref(), defaults.algorithm)?,
            max_iterations: p.max_iterations,
            tuning: p.tuning,
            robust: p.robust.map(|r| RobustSettings {
                std_dev_multiplier: r.std_dev_multiplier,
                performers: r.performers,
                samples_per_performer: r.samples_per_performer,
                random_tags: r.random_tags,
            }),
            shape: p.shape.map(|s| ShapeSettings {
                num_parameters: s.num_parameters,
                csm_parameter_count: s.csm_parameter_count,
                join_mesh: s.join_mesh,
                convert_to_tet10: s.convert_to_tet10,
            }),
        };

        Ok(ProblemMetadata {
            verbose: self.verbose,
            services,
            scenarios,
            criteria,
            objective,
            constraints,
            output,
            optimization_parameters,
        })
    }
}

fn convert_constraint(entry: ConstraintEntry) -> Result<Constraint, MetadataError> {
    let relation = parse_keyword(entry.relation.as_deref(), Relation::LessThan)?;
    let field = format!("constraints[{}]", entry.id);
    let target = match (&entry.absolute_target, &entry.relative_target) {
        (Some(abs), _) if !abs.trim().is_empty() => {
            Some(ConstraintTarget::Absolute(parse_number(&field, abs)?))
        }
        (_, Some(rel)) if !rel.trim().is_empty() => {
            Some(ConstraintTarget::Relative(parse_number(&field, rel)?))
        }
        _ => None,
    };
    let divisor = match &entry.divisor {
        Some(d) => parse_number(&field, d)?,
        None => 1.0,
    };
    Ok(Constraint {
        id: entry.id,
        criterion_id: entry.criterion,
        service_id: entry.service,
        scenario_id: entry.scenario.filter(|s| !s.is_empty()),
        relation,
        target,
        divisor,
    })
}

fn convert_qois(entries: Vec<QoiEntry>) -> Result<Vec<QuantityOfInterest>, MetadataError> {
    entries
        .into_iter()
        .map(|q| {
            Ok(QuantityOfInterest {
                name: q.name,
                layout: parse_keyword(q.layout.as_deref(), FieldLayout::default())?,
            })
        })
        .collect()
}

impl ProblemMetadata {
    /// Parses the JSON metadata format and converts it into the canonical model.
    pub fn from_json(json: &str) -> Result<Self, MetadataError> {
        MetadataDocument::from_json(json)?.into_metadata()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::codes::{Algorithm, FilterType, ServiceCode};

    const MINIMAL: &str = r#"{
        "services": [{ "id": "1", "code": "plato_analyze", "cacheState": true }],
        "scenarios": [{ "id": "1", "physics": "steady_state_mechanics" }],
        "criteria": [{ "id": "1", "type": "mechanical_compliance" }],
        "objective": { "criteria": ["1"], "services": ["1"], "scenarios": ["1"], "weights": ["1"] },
        "constraints": [{ "id": "1", "criterion": "1", "service": "1", "relative_target": "0.4" }],
        "optimizationParameters": { "filterType": "helmholtz", "filterInEngine": false, "algorithm": "MMA" }
    }"#;

    #[test]
    fn test_minimal_document_converts() {
        let metadata = ProblemMetadata::from_json(MINIMAL).unwrap();
        assert_eq!(metadata.services[0].code, ServiceCode::PlatoAnalyze);
        assert!(metadata.services[0].cache_state);
        assert_eq!(metadata.services[0].number_processors, 1);
        assert_eq!(metadata.objective.weights, vec![1.0]);
        assert_eq!(
            metadata.constraints[0].target,
            Some(ConstraintTarget::Relative(0.4))
        );
        assert_eq!(
            metadata.optimization_parameters.filter_type,
            FilterType::Helmholtz
        );
        assert!(!metadata.optimization_parameters.filter_in_engine);
        assert_eq!(metadata.optimization_parameters.algorithm, Algorithm::Mma);
        assert!(metadata.output.enabled);
    }

    #[test]
    fn test_bad_weight_is_rejected() {
        let json = MINIMAL.replace(r#""weights": ["1"]"#, r#""weights": ["heavy"]"#);
        match ProblemMetadata::from_json(&json) {
            Err(MetadataError::InvalidNumber { field, value }) => {
                assert_eq!(field, "objective.weights");
                assert_eq!(value, "heavy");
            }
            other => panic!("Expected InvalidNumber, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_service_code_is_rejected() {
        let json = MINIMAL.replace("plato_analyze", "abaqus");
        assert!(matches!(
            ProblemMetadata::from_json(&json),
            Err(MetadataError::UnknownKeyword { field: "service code", .. })
        ));
    }
}
