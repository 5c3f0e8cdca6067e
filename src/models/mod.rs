pub mod definition;
pub mod policy;
pub mod registry;
pub mod schema;
pub mod validation;

pub use definition::{ModelDefinition, PopulationRange, VariableSpec};
pub use policy::{ClampBounds, CompanionPolicy, RegistryPolicy};
pub use registry::{Evaluation, Registry};
pub use schema::{ModelConfig, ModelFile, ModelRole, PopulationBounds, VariableConfig, VariableKind};
pub use validation::build_models;
