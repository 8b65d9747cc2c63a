pub mod registry;

pub use registry::{ModelEntry, ModelRegistry};
