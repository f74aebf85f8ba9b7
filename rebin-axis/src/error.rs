#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RebinError {
    #[error("Group size must be at least 1, got {0}")]
    InvalidGroupSize(i64),

    #[error("Axis node has no base axis configured")]
    MissingBaseAxis,

    #[error(
        "Child range ends at base bin {child_max_base}, beyond parent range ending at base bin {parent_max_base}"
    )]
    ContainmentViolation {
        child_max_base: i64,
        parent_max_base: i64,
    },

    #[error("Axis must contain at least one bin")]
    EmptyAxis,

    #[error("Axis lower bound ({min}) must be below upper bound ({max})")]
    InvalidAxisRange { min: f64, max: f64 },

    #[error("Edges must be in ascending order: {0:?}")]
    EdgesNotAscending(Vec<f64>),

    #[error("Label count ({label_len}) does not match bin count ({bin_count})")]
    LabelCountMismatch { label_len: usize, bin_count: usize },

    #[error("Unknown describe flag: {0}")]
    UnknownDescribeFlag(String),

    #[error("Expected {expected} base axes, got {actual}")]
    DimensionCountMismatch { expected: usize, actual: usize },

    #[error("Invalid binning configuration: {0}")]
    Json(String),
}

impl From<serde_json::Error> for RebinError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

/// Panic payload raised when a binning configuration breaks the containment
/// invariant.
///
/// The aborting tree operations ([`AxisNode::append_child`] and
/// [`AxisNode::append_range`]) never return a malformed tree. They log the
/// diagnostic and unwind with this payload instead. Callers that need to
/// survive a bad configuration either use the `try_` variants or isolate the
/// call behind [`std::panic::catch_unwind`] (or a process boundary) and
/// recover the cause with [`ConfigurationAbort::from_panic`].
///
/// [`AxisNode::append_child`]: crate::node::AxisNode::append_child
/// [`AxisNode::append_range`]: crate::node::AxisNode::append_range
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationAbort(pub RebinError);

impl ConfigurationAbort {
    /// Unwind the current thread with this abort as payload
    pub fn raise(self) -> ! {
        std::panic::panic_any(self)
    }

    /// Recover the abort from a payload returned by `catch_unwind`, or hand
    /// back foreign panics untouched.
    pub fn from_panic(
        payload: Box<dyn std::any::Any + Send>,
    ) -> Result<Self, Box<dyn std::any::Any + Send>> {
        payload.downcast::<Self>().map(|abort| *abort)
    }

    pub fn error(&self) -> &RebinError {
        &self.0
    }
}

impl std::fmt::Display for ConfigurationAbort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fatal binning configuration error: {}", self.0)
    }
}
