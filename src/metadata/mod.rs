pub mod codes;
pub mod conversion;
pub mod definition;
pub mod document;
pub mod validation;

pub use codes::*;
pub use conversion::*;
pub use definition::*;
pub use document::MetadataDocument;
pub use validation::{count_csm_design_parameters, validate};
