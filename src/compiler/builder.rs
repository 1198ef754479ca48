use super::channels::ChannelMap;
use super::conventions::{CriterionOps, CriterionRole, ServiceConvention};
use super::filter::{FilterChain, FilterState};
use super::identifier::{ConcretizedCriterion, objective_terms};
use super::names;
use super::options;
use super::performers::PerformerRegistry;
use super::pipeline::Pipeline;
use crate::error::CompileError;
use crate::graph::{Fanout, InterfaceGraph, Layout, Operation, OperationNode, Stage};
use crate::metadata::{FieldLayout, ProblemMetadata, QuantityOfInterest, ServiceCode};
use ahash::AHashMap;

/// One criterion evaluation bound to its performer and operation names.
#[derive(Debug, Clone)]
pub(super) struct CriterionPlan {
    pub(super) criterion: ConcretizedCriterion,
    pub(super) service_code: ServiceCode,
    pub(super) performer: String,
    pub(super) ops: CriterionOps,
}

impl CriterionPlan {
    pub(super) fn on_main(&self) -> bool {
        self.service_code == ServiceCode::PlatoMain
    }

    pub(super) fn value_channel(&self) -> String {
        self.criterion.value_channel()
    }

    pub(super) fn gradient_channel(&self) -> String {
        self.criterion.gradient_channel()
    }

    pub(super) fn initial_value_channel(&self) -> String {
        self.criterion.initial_value_channel()
    }

    pub(super) fn transferred_gradient_channel(&self) -> String {
        self.criterion.transferred_gradient_channel()
    }

    /// Evaluates the criterion value into `target`.
    pub(super) fn value_operation(&self, reads_topology: bool, target: &str) -> Operation {
        let op = Operation::new(&self.ops.value_operation, &self.performer);
        let op = if reads_topology {
            op.input("Topology", names::TOPOLOGY)
        } else {
            op
        };
        op.output(&self.ops.value_argument, target)
    }

    /// Evaluates the criterion gradient, optionally leaving the result in the service.
    pub(super) fn gradient_operation(&self, reads_topology: bool, writes_gradient: bool) -> Operation {
        let mut op = Operation::new(&self.ops.gradient_operation, &self.performer);
        if reads_topology {
            op = op.input("Topology", names::TOPOLOGY);
        }
        if self.ops.gradient_writes_value {
            op = op.output(&self.ops.value_argument, self.value_channel());
        }
        if writes_gradient {
            op = op.output(&self.ops.gradient_argument, self.gradient_channel());
        }
        op
    }
}

#[derive(Debug, Clone)]
pub(super) struct ConstraintPlan {
    pub(super) id: String,
    pub(super) plan: CriterionPlan,
}

/// Wraps sibling evaluations in a concurrent batch when there is more than one.
pub(super) fn parallel(nodes: Vec<OperationNode>) -> Vec<OperationNode> {
    if nodes.len() > 1 {
        vec![OperationNode::Batch(nodes)]
    } else {
        nodes
    }
}

pub(super) fn qoi_layout(qoi: &QuantityOfInterest) -> Layout {
    match qoi.layout {
        FieldLayout::Nodal => Layout::NodalField,
        FieldLayout::Element => Layout::ElementField,
    }
}

/// Holds the in-progress graph while channels and stages are built against it.
pub(super) struct GraphBuilder<'a> {
    pub(super) metadata: &'a ProblemMetadata,
    pub(super) pipeline: Pipeline,
    pub(super) filter: FilterChain,
    pub(super) performers: PerformerRegistry,
    pub(super) objective: Vec<CriterionPlan>,
    pub(super) constraints: Vec<ConstraintPlan>,
    pub(super) channels: ChannelMap,
    pub(super) stages: Vec<Stage>,
}

impl<'a> GraphBuilder<'a> {
    pub(super) fn new(
        metadata: &'a ProblemMetadata,
        conventions: &AHashMap<ServiceCode, Box<dyn ServiceConvention>>,
    ) -> Result<Self, CompileError> {
        let state = FilterState::select(&metadata.optimization_parameters);
        let pipeline = Pipeline::select(metadata, state)?;
        let performers = PerformerRegistry::from_metadata(metadata, pipeline, state)?;
        let filter = FilterChain::new(
            state,
            &performers.main().name,
            performers.helmholtz().map(|e| e.name.as_str()),
        );
        tracing::debug!(?pipeline, filter = ?state, "Selected compilation templates");

        let objective = objective_terms(&metadata.objective)
            .into_iter()
            .map(|term| {
                plan_criterion(
                    metadata,
                    conventions,
                    &performers,
                    term.criterion,
                    CriterionRole::Objective,
                )
            })
            .collect::<Result<Vec<_>, _>>()?;

        let constraints = metadata
            .constraints
            .iter()
            .map(|c| {
                Ok(ConstraintPlan {
                    id: c.id.clone(),
                    plan: plan_criterion(
                        metadata,
                        conventions,
                        &performers,
                        ConcretizedCriterion::from_constraint(c),
                        CriterionRole::Constraint(&c.id),
                    )?,
                })
            })
            .collect::<Result<Vec<_>, CompileError>>()?;

        Ok(Self {
            metadata,
            pipeline,
            filter,
            performers,
            objective,
            constraints,
            channels: ChannelMap::new(),
            stages: Vec::new(),
        })
    }

    /// Runs both phases and assembles the document.
    pub(super) fn build(mut self) -> Result<InterfaceGraph, CompileError> {
        self.synthesize_channels()?;
        self.build_stages()?;
        let optimizer = options::optimizer_block(self.metadata, self.pipeline)?;

        Ok(InterfaceGraph {
            include_defines: self.pipeline.is_robust(),
            verbose: self.metadata.verbose,
            performers: self.performers.to_performers(),
            channels: self.channels.into_fanouts(),
            stages: self.stages,
            optimizer,
        })
    }

    pub(super) fn main(&self) -> &str {
        &self.performers.main().name
    }

    pub(super) fn main_user(&self) -> Fanout<String> {
        self.performers.main().user()
    }

    pub(super) fn normalizes(&self) -> bool {
        self.metadata.optimization_parameters.normalize_in_aggregator
    }

    /// Objective terms are summed by an aggregation operation rather than copied.
    pub(super) fn aggregates(&self) -> bool {
        self.metadata.objective.is_multi_criterion() || self.normalizes()
    }

    pub(super) fn push_stage(&mut self, stage: Stage) {
        tracing::debug!(
            stage = stage.name.as_str(),
            operations = stage.operations().len(),
            "Built stage"
        );
        self.stages.push(stage);
    }

    /// QoI channels a service writes, paired with the argument name they are written under.
    ///
    /// The service evaluating a multi-load-case objective writes one channel per scenario.
    pub(super) fn qoi_channels(
        &self,
        service_id: &str,
        qoi: &QuantityOfInterest,
    ) -> Result<Vec<(String, String)>, CompileError> {
        let performer = &self.performers.for_service(service_id)?.name;
        let objective = &self.metadata.objective;
        let per_scenario = objective.multi_load_case
            && objective.service_ids.first().map(String::as_str) == Some(service_id);
        if per_scenario {
            return Ok(objective
                .scenario_ids
                .iter()
                .enumerate()
                .map(|(i, scenario)| {
                    (
                        format!("{}_{}_scenario_{}", qoi.name, performer, scenario),
                        format!("{}{}", qoi.name, i),
                    )
                })
                .collect());
        }
        Ok(vec![(
            format!("{}_{}", qoi.name, performer),
            qoi.name.clone(),
        )])
    }

    /// Copies a global value on the main engine.
    pub(super) fn copy_value(&self, input: &str, output: &str) -> OperationNode {
        Operation::new("Copy Value", self.main())
            .input("InputValue", input)
            .output("OutputValue", output)
            .into()
    }
}

fn plan_criterion(
    metadata: &ProblemMetadata,
    conventions: &AHashMap<ServiceCode, Box<dyn ServiceConvention>>,
    performers: &PerformerRegistry,
    criterion: ConcretizedCriterion,
    role: CriterionRole<'_>,
) -> Result<CriterionPlan, CompileError> {
    let service = metadata
        .service(&criterion.service)
        .ok_or_else(|| CompileError::UnknownReference {
            context: format!("Criterion '{}'", criterion.criterion),
            entity: "service",
            id: criterion.service.clone(),
        })?;
    let convention = conventions.get(&service.code).ok_or_else(|| {
        CompileError::UnsupportedCombination(format!(
            "service code '{}' cannot evaluate criteria",
            service.code
        ))
    })?;
    let performer = performers.for_service(&service.id)?.name.clone();
    Ok(CriterionPlan {
        criterion,
        service_code: service.code,
        performer,
        ops: convention.criterion_ops(role),
    })
}
