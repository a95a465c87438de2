mod classify;
mod cost;
mod error;
mod metrics;
mod order;
mod pipeline;
mod predicate;
mod registry;
mod row;
mod utils;

pub use classify::*;
pub use cost::*;
pub use error::*;
pub use metrics::*;
pub use order::*;
pub use pipeline::*;
pub use predicate::*;
pub use registry::*;
pub use row::*;
pub use utils::*;
