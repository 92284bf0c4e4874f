pub mod capability_index;
pub mod manifest_cache;
pub mod service_registry;

pub use capability_index::{CapabilityIndex, ScoredService};
pub use manifest_cache::{ManifestCache, SetOptions};
pub use service_registry::{QueryFilter, QueryMatch, QueryResult, ServiceRegistry};
