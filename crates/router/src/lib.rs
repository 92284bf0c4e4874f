pub mod keyword_extractor;
pub mod retrieval_router;

pub use keyword_extractor::{extract, ExtractedMessage, Intent};
pub use retrieval_router::{retrieve_candidates, route, RouteRequest, RouteResult, RouterConfig, RouterWeights};
