use crate::error::MetadataError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Master macro for the closed keyword enums of the metadata model.
///
/// Each variant is bound to its canonical keyword plus any accepted aliases. Parsing is
/// case-insensitive and ignores surrounding whitespace.
macro_rules! define_keyword_enums {
    ( $( $(#[$meta:meta])* $name:ident ($field:expr) { $( $variant:ident => $keyword:literal $(, $alias:literal)* );+ $(;)? } )+ ) => {
        $(
            $(#[$meta])*
            #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
            pub enum $name {
                $( $variant, )+
            }

            impl $name {
                /// The canonical keyword for this value.
                pub fn as_str(&self) -> &'static str {
                    match self {
                        $( $name::$variant => $keyword, )+
                    }
                }
            }

            impl FromStr for $name {
                type Err = MetadataError;

                fn from_str(s: &str) -> Result<Self, Self::Err> {
                    let normalized = s.trim().to_lowercase();
                    match normalized.as_str() {
                        $( $keyword $( | $alias )* => Ok($name::$variant), )+
                        _ => Err(MetadataError::UnknownKeyword {
                            field: $field,
                            value: s.to_string(),
                        }),
                    }
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.as_str())
                }
            }
        )+
    };
}

define_keyword_enums! {
    /// The executable behind a service.
    ServiceCode ("service code") {
        PlatoMain => "platomain";
        PlatoAnalyze => "plato_analyze", "analyze";
        SierraSd => "sierra_sd";
        SierraTf => "sierra_tf";
        PlatoEsp => "plato_esp", "esp";
        Xtk => "xtk";
    }

    OptimizationType ("optimization type") {
        Topology => "topology";
        Shape => "shape";
    }

    Discretization ("discretization") {
        Density => "density";
        Levelset => "levelset";
    }

    FilterType ("filter type") {
        Kernel => "kernel";
        Helmholtz => "helmholtz";
    }

    ProjectionType ("projection type") {
        None => "none", "";
        Heaviside => "heaviside";
        Tanh => "tanh";
    }

    /// Optimizer algorithm keyword as written in the metadata.
    Algorithm ("optimization algorithm") {
        Oc => "oc";
        Mma => "mma";
        Ksbc => "ksbc";
        Ksal => "ksal";
        RolKsbc => "rol ksbc", "rol_ksbc";
        RolKsal => "rol ksal", "rol_ksal";
        DerivativeChecker => "derivativechecker", "derivative_checker";
    }

    CriterionKind ("criterion type") {
        MechanicalCompliance => "mechanical_compliance", "compliance";
        Volume => "volume";
        Mass => "mass";
        StressPNorm => "stress_p-norm", "stress_pnorm";
        StressConstrainedMass => "stress_constrained_mass_minimization";
        ThermalCompliance => "thermal_compliance";
        ModalMatching => "modal_matching";
        ModalProjectionError => "modal_projection_error";
        Displacement => "displacement";
        Composite => "composite";
    }

    Relation ("constraint relation") {
        LessThan => "less_than", "<", "less than";
        GreaterThan => "greater_than", ">", "greater than";
    }

    /// Mesh layout of a quantity of interest.
    FieldLayout ("field layout") {
        Nodal => "nodal field", "nodal", "nodal_field";
        Element => "element field", "element", "element_field";
    }
}

impl ServiceCode {
    /// Physics codes get a numbered performer of their own.
    pub fn is_physics(&self) -> bool {
        matches!(
            self,
            ServiceCode::PlatoAnalyze | ServiceCode::SierraSd | ServiceCode::SierraTf
        )
    }
}

impl Algorithm {
    /// The `Package` name the optimizer expects.
    pub fn package(&self) -> &'static str {
        match self {
            Algorithm::Oc => "OC",
            Algorithm::Mma => "MMA",
            Algorithm::Ksbc => "KSBC",
            Algorithm::Ksal => "KSAL",
            Algorithm::RolKsbc => "ROL KSBC",
            Algorithm::RolKsal => "ROL KSAL",
            Algorithm::DerivativeChecker => "DerivativeChecker",
        }
    }

    /// Whether the algorithm needs at least one constraint to be meaningful.
    pub fn requires_constraints(&self) -> bool {
        matches!(self, Algorithm::Ksal | Algorithm::RolKsal)
    }
}

impl Default for ProjectionType {
    fn default() -> Self {
        ProjectionType::None
    }
}

impl Default for FieldLayout {
    fn default() -> Self {
        FieldLayout::Nodal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keywords_parse_case_insensitively() {
        assert_eq!("Helmholtz".parse::<FilterType>().unwrap(), FilterType::Helmholtz);
        assert_eq!(" ROL KSAL ".parse::<Algorithm>().unwrap(), Algorithm::RolKsal);
        assert_eq!("".parse::<ProjectionType>().unwrap(), ProjectionType::None);
    }

    #[test]
    fn test_unknown_keyword_names_the_field() {
        match "spline".parse::<Discretization>() {
            Err(MetadataError::UnknownKeyword { field, value }) => {
                assert_eq!(field, "discretization");
                assert_eq!(value, "spline");
            }
            other => panic!("Expected UnknownKeyword, got {:?}", other),
        }
    }

    #[test]
    fn test_algorithm_packages() {
        assert_eq!(Algorithm::RolKsbc.package(), "ROL KSBC");
        assert_eq!(Algorithm::DerivativeChecker.package(), "DerivativeChecker");
        assert_eq!(Algorithm::Mma.as_str(), "mma");
    }
}
