use crate::metadata::ServiceCode;
use ahash::AHashMap;

/// Which side of the problem a criterion evaluation feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CriterionRole<'a> {
    Objective,
    /// Carries the constraint id used to name per-constraint operations.
    Constraint(&'a str),
}

/// Operation and argument names a service exposes for one criterion role.
///
/// These must match what the service's own operations file declares; a mismatch is not
/// detectable here and only fails at runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CriterionOps {
    pub value_operation: String,
    pub value_argument: String,
    pub gradient_operation: String,
    pub gradient_argument: String,
    /// Chain-rule operation for shape problems (`Criterion Sensitivity` output).
    pub sensitivity_operation: String,
    /// The gradient operation also writes the criterion value.
    pub gradient_writes_value: bool,
}

/// Defines the contract for naming a service's criterion operations.
pub trait ServiceConvention: Send + Sync {
    fn code(&self) -> ServiceCode;
    fn criterion_ops(&self, role: CriterionRole<'_>) -> CriterionOps;
}

/// Name templates; `{id}` is replaced with the constraint id.
struct OpTemplate {
    value_operation: &'static str,
    value_argument: &'static str,
    gradient_operation: &'static str,
    gradient_argument: &'static str,
    sensitivity_operation: &'static str,
    gradient_writes_value: bool,
}

impl OpTemplate {
    fn render(&self, role: CriterionRole<'_>) -> CriterionOps {
        let id = match role {
            CriterionRole::Objective => "",
            CriterionRole::Constraint(id) => id,
        };
        let fill = |template: &str| template.replace("{id}", id);
        CriterionOps {
            value_operation: fill(self.value_operation),
            value_argument: fill(self.value_argument),
            gradient_operation: fill(self.gradient_operation),
            gradient_argument: fill(self.gradient_argument),
            sensitivity_operation: fill(self.sensitivity_operation),
            gradient_writes_value: self.gradient_writes_value,
        }
    }
}

/// Defines every built-in convention, its registration and its lookup by code.
macro_rules! define_service_conventions {
    ( $(
        $struct_name:ident, $code:path,
        objective: ($ov:literal, $ova:literal, $og:literal, $oga:literal, $os:literal, $ow:literal),
        constraint: ($cv:literal, $cva:literal, $cg:literal, $cga:literal, $cs:literal, $cw:literal)
    );+ $(;)? ) => {
        $(
            pub struct $struct_name;
            impl ServiceConvention for $struct_name {
                fn code(&self) -> ServiceCode { $code }
                fn criterion_ops(&self, role: CriterionRole<'_>) -> CriterionOps {
                    let template = match role {
                        CriterionRole::Objective => OpTemplate {
                            value_operation: $ov,
                            value_argument: $ova,
                            gradient_operation: $og,
                            gradient_argument: $oga,
                            sensitivity_operation: $os,
                            gradient_writes_value: $ow,
                        },
                        CriterionRole::Constraint(_) => OpTemplate {
                            value_operation: $cv,
                            value_argument: $cva,
                            gradient_operation: $cg,
                            gradient_argument: $cga,
                            sensitivity_operation: $cs,
                            gradient_writes_value: $cw,
                        },
                    };
                    template.render(role)
                }
            }
        )+

        pub(super) fn register_default_conventions(
            registry: &mut AHashMap<ServiceCode, Box<dyn ServiceConvention>>,
        ) {
            $( registry.insert($code, Box::new($struct_name)); )+
        }

        /// The built-in convention for a code, if the code can evaluate criteria at all.
        pub fn default_convention(code: ServiceCode) -> Option<Box<dyn ServiceConvention>> {
            match code {
                $( $code => Some(Box::new($struct_name)), )+
                _ => None,
            }
        }
    };
}

define_service_conventions! {
    PlatoAnalyzeConvention, ServiceCode::PlatoAnalyze,
        objective: ("Compute Objective Value", "Objective Value",
                    "Compute Objective Gradient", "Objective Gradient",
                    "Compute Objective Sensitivity", false),
        constraint: ("Compute Constraint Value {id}", "Constraint Value",
                     "Compute Constraint Gradient {id}", "Constraint Gradient",
                     "Compute Constraint Sensitivity {id}", false);
    SierraSdConvention, ServiceCode::SierraSd,
        objective: ("Compute Objective Value", "Internal Energy",
                    "Compute Objective Gradient", "Objective Gradient",
                    "Compute Objective Sensitivity", false),
        constraint: ("Compute Constraint Value {id}", "Constraint Value",
                     "Compute Constraint Gradient {id}", "Constraint Gradient",
                     "Compute Constraint Sensitivity {id}", false);
    SierraTfConvention, ServiceCode::SierraTf,
        objective: ("Compute Criterion", "Criterion",
                    "Compute Criterion Gradient", "Criterion Gradient",
                    "Compute Criterion Gradient wrt CAD Parameters", false),
        constraint: ("Compute Criterion", "Criterion",
                     "Compute Criterion Gradient", "Criterion Gradient",
                     "Compute Criterion Gradient wrt CAD Parameters", false);
    PlatoMainConvention, ServiceCode::PlatoMain,
        objective: ("Compute Objective Value", "Volume",
                    "Compute Objective Gradient", "Volume Gradient",
                    "Compute Objective Sensitivity", true),
        constraint: ("Compute Constraint Value {id}", "Volume",
                     "Compute Constraint Gradient {id}", "Volume Gradient",
                     "Compute Constraint Sensitivity {id}", true);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sierra_sd_objective_naming() {
        let ops = SierraSdConvention.criterion_ops(CriterionRole::Objective);
        assert_eq!(ops.value_argument, "Internal Energy");
        assert_eq!(ops.value_operation, "Compute Objective Value");
        assert_eq!(ops.gradient_argument, "Objective Gradient");
        assert_eq!(ops.gradient_operation, "Compute Objective Gradient");
    }

    #[test]
    fn test_constraint_id_is_rendered() {
        let ops = PlatoAnalyzeConvention.criterion_ops(CriterionRole::Constraint("7"));
        assert_eq!(ops.value_operation, "Compute Constraint Value 7");
        assert_eq!(ops.gradient_operation, "Compute Constraint Gradient 7");
        assert_eq!(ops.sensitivity_operation, "Compute Constraint Sensitivity 7");
    }

    #[test]
    fn test_auxiliary_codes_have_no_convention() {
        assert!(default_convention(ServiceCode::Xtk).is_none());
        assert!(default_convention(ServiceCode::PlatoEsp).is_none());
        assert!(default_convention(ServiceCode::SierraTf).is_some());
    }

    #[test]
    fn test_registry_holds_every_criterion_host() {
        let mut registry = AHashMap::new();
        register_default_conventions(&mut registry);
        assert_eq!(registry.len(), 4);
        assert_eq!(
            registry[&ServiceCode::PlatoMain].code(),
            ServiceCode::PlatoMain
        );
    }
}
