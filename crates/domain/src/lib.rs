pub mod errors;
pub mod normalizer;
pub mod outcome;
pub mod record;
pub mod router;
pub mod transform;

pub use errors::*;
pub use normalizer::*;
pub use outcome::*;
pub use record::*;
pub use router::*;
pub use transform::{Action, Provenance, TransformRegistry, TransformedPayload};
