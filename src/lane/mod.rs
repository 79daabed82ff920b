pub mod composite;
pub mod measure;
pub mod perspective;
pub mod search;
pub mod steps;
pub mod threshold;

pub use composite::Compositor;
pub use measure::measure;
pub use perspective::PerspectiveWarp;
pub use search::{SearchOutcome, SearchParams, find_lanes};
pub use threshold::lane_mask;
