use super::filter::FilterState;
use super::names::{PARAMETER_INDEX, PARAMETERS, PERFORMER_INDEX, PERFORMERS};
use super::pipeline::Pipeline;
use crate::error::CompileError;
use crate::graph::{Fanout, Performer};
use crate::metadata::{ProblemMetadata, ServiceCode};
use ahash::AHashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PerformerRole {
    Main,
    Physics,
    HelmholtzFilter,
    GeometryKernel,
    ParametricGeometry,
}

/// One row of the performer table.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformerEntry {
    /// The name operations and channels refer to. Ensemble and parametric performers carry
    /// their loop variable as a `{...}` template.
    pub name: String,
    pub code: String,
    pub id: u32,
    pub role: PerformerRole,
    pub service_id: Option<String>,
    pub fanout: Option<(String, String)>,
}

impl PerformerEntry {
    fn new(name: String, code: &str, id: u32, role: PerformerRole, service_id: Option<&str>) -> Self {
        Self {
            name,
            code: code.to_string(),
            id,
            role,
            service_id: service_id.map(str::to_string),
            fanout: None,
        }
    }

    fn fanned_over(mut self, var: &str, range: &str) -> Self {
        self.fanout = Some((var.to_string(), range.to_string()));
        self
    }

    /// How the performer is listed among a channel's users.
    pub fn user(&self) -> Fanout<String> {
        match &self.fanout {
            Some((var, range)) => {
                Fanout::for_each_in(var, range, vec![Fanout::Item(self.name.clone())])
            }
            None => Fanout::Item(self.name.clone()),
        }
    }

    pub fn to_performer(&self) -> Performer {
        Performer {
            name: self.name.clone(),
            code: self.code.clone(),
            id: self.id,
            fanout: self.fanout.clone(),
        }
    }
}

/// Stable names and ids for every process taking part in the run.
#[derive(Debug, Clone)]
pub struct PerformerRegistry {
    main: PerformerEntry,
    entries: Vec<PerformerEntry>,
}

impl PerformerRegistry {
    /// Builds the table: main engine first with id 0, physics services in declaration order,
    /// then the auxiliaries the pipeline needs.
    pub fn from_metadata(
        metadata: &ProblemMetadata,
        pipeline: Pipeline,
        filter: FilterState,
    ) -> Result<Self, CompileError> {
        let main_service = metadata
            .services
            .iter()
            .find(|s| s.code == ServiceCode::PlatoMain);
        let main_name = match main_service {
            Some(service) => format!("platomain_{}", service.id),
            None => "platomain".to_string(),
        };
        let main = PerformerEntry::new(
            main_name,
            ServiceCode::PlatoMain.as_str(),
            0,
            PerformerRole::Main,
            main_service.map(|s| s.id.as_str()),
        );

        let mut entries = Vec::new();
        let mut next_id = 1;
        let mut per_code: AHashMap<ServiceCode, usize> = AHashMap::new();
        for service in metadata.services.iter().filter(|s| s.code.is_physics()) {
            let code = service.code.as_str();
            let entry = if pipeline.is_robust() {
                PerformerEntry::new(
                    format!("{}_{{{}}}", code, PERFORMER_INDEX),
                    code,
                    next_id,
                    PerformerRole::Physics,
                    Some(&service.id),
                )
                .fanned_over(PERFORMER_INDEX, PERFORMERS)
            } else {
                let n = per_code.entry(service.code).or_insert(0);
                *n += 1;
                PerformerEntry::new(
                    format!("{}_{}", code, n),
                    code,
                    next_id,
                    PerformerRole::Physics,
                    Some(&service.id),
                )
            };
            entries.push(entry);
            next_id += 1;
        }
        if entries.is_empty() {
            return Err(CompileError::EmptyServices);
        }

        let find_service = |code: ServiceCode| {
            metadata
                .services
                .iter()
                .find(|s| s.code == code)
                .map(|s| s.id.as_str())
        };

        if pipeline.is_topology() && filter.uses_helmholtz() {
            entries.push(PerformerEntry::new(
                "plato_analyze_helmholtz".to_string(),
                ServiceCode::PlatoAnalyze.as_str(),
                next_id,
                PerformerRole::HelmholtzFilter,
                None,
            ));
            next_id += 1;
        }
        if pipeline == Pipeline::Levelset {
            entries.push(PerformerEntry::new(
                format!("{}_1", ServiceCode::Xtk.as_str()),
                ServiceCode::Xtk.as_str(),
                next_id,
                PerformerRole::GeometryKernel,
                find_service(ServiceCode::Xtk),
            ));
            next_id += 1;
        }
        if pipeline == Pipeline::Shape {
            let code = ServiceCode::PlatoEsp.as_str();
            entries.push(
                PerformerEntry::new(
                    format!("{}_{{{}}}", code, PARAMETER_INDEX),
                    code,
                    next_id,
                    PerformerRole::ParametricGeometry,
                    metadata
                        .objective
                        .shape_service_ids
                        .first()
                        .map(String::as_str)
                        .or_else(|| find_service(ServiceCode::PlatoEsp)),
                )
                .fanned_over(PARAMETER_INDEX, PARAMETERS),
            );
        }

        Ok(Self { main, entries })
    }

    pub fn main(&self) -> &PerformerEntry {
        &self.main
    }

    pub fn physics(&self) -> impl Iterator<Item = &PerformerEntry> {
        self.with_role(PerformerRole::Physics)
    }

    pub fn helmholtz(&self) -> Option<&PerformerEntry> {
        self.with_role(PerformerRole::HelmholtzFilter).next()
    }

    pub fn geometry_kernel(&self) -> Option<&PerformerEntry> {
        self.with_role(PerformerRole::GeometryKernel).next()
    }

    pub fn parametric_geometry(&self) -> Option<&PerformerEntry> {
        self.with_role(PerformerRole::ParametricGeometry).next()
    }

    fn with_role(&self, role: PerformerRole) -> impl Iterator<Item = &PerformerEntry> {
        self.entries.iter().filter(move |e| e.role == role)
    }

    /// Every entry, main engine first.
    pub fn iter(&self) -> impl Iterator<Item = &PerformerEntry> {
        std::iter::once(&self.main).chain(self.entries.iter())
    }

    /// The performer that runs a service's operations.
    pub fn for_service(&self, service_id: &str) -> Result<&PerformerEntry, CompileError> {
        self.iter()
            .find(|e| e.service_id.as_deref() == Some(service_id))
            .ok_or_else(|| CompileError::UnknownPerformer(service_id.to_string()))
    }

    pub fn to_performers(&self) -> Vec<Performer> {
        self.iter().map(PerformerEntry::to_performer).collect()
    }
}
