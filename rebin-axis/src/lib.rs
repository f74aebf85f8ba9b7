pub mod axis;
pub mod config;
pub mod cut_set;
pub mod describe;
pub mod error;
pub mod node;

pub use axis::{Axis, BaseAxis, EdgeTarget};
pub use cut_set::CutSet;
pub use describe::DescribeOptions;
pub use error::{ConfigurationAbort, RebinError};
pub use node::AxisNode;
