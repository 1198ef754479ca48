use super::definition::ProblemMetadata;
use crate::error::MetadataError;

/// A trait for custom input models that can be converted into a [`ProblemMetadata`].
///
/// This is the extension point that keeps the compiler independent of any one input format.
/// The crate ships one implementation, [`MetadataDocument`](super::MetadataDocument), for the
/// JSON format read by `interface-cli`; other front ends (an input deck parser, a GUI model)
/// implement this trait on their own structs.
///
/// # Example
///
/// ```rust,no_run
/// use plato_interface::prelude::*;
/// use plato_interface::error::MetadataError;
///
/// // 1. Your own description of a problem.
/// struct MinimalDeck {
///     solver_ranks: usize,
/// }
///
/// // 2. Translate it into the canonical model.
/// impl IntoMetadata for MinimalDeck {
///     fn into_metadata(self) -> std::result::Result<ProblemMetadata, MetadataError> {
///         if self.solver_ranks == 0 {
///             return Err(MetadataError::ValidationError("solver needs a rank".to_string()));
///         }
///         Ok(ProblemMetadata {
///             verbose: false,
///             services: vec![Service {
///                 id: "1".to_string(),
///                 code: ServiceCode::PlatoAnalyze,
///                 number_processors: self.solver_ranks,
///                 cache_state: false,
///                 update_problem: false,
///             }],
///             // ... scenarios, criteria, objective and the rest ...
/// #           scenarios: vec![],
/// #           criteria: vec![],
/// #           objective: Objective::default(),
/// #           constraints: vec![],
/// #           output: OutputSettings::default(),
/// #           optimization_parameters: OptimizationParameters::default(),
///         })
///     }
/// }
/// ```
pub trait IntoMetadata {
    /// Consumes the object and converts it into compiler-ready problem metadata.
    fn into_metadata(self) -> Result<ProblemMetadata, MetadataError>;
}

impl IntoMetadata for ProblemMetadata {
    fn into_metadata(self) -> Result<ProblemMetadata, MetadataError> {
        Ok(self)
    }
}
