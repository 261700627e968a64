pub mod module;
pub mod registry;

pub use module::{ModuleAnnotation, ModuleDeclaration, ModuleOrigin, StabilityTier};
pub use registry::{ModuleRegistry, PrefixIndex, RegistryError};
