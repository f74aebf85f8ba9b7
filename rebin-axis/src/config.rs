use serde::{Deserialize, Serialize};

use crate::axis::Axis;
use crate::cut_set::CutSet;
use crate::error::RebinError;
use crate::node::AxisNode;

/// Serializable description of a multidimensional binning scheme
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinningConfig {
    pub dimensions: Vec<DimensionConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionConfig {
    #[serde(default)]
    pub name: Option<String>,
    pub axis: AxisConfig,
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    /// Consecutive sub-ranges, applied in order with `append_range`
    #[serde(default)]
    pub ranges: Vec<RangeConfig>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AxisConfig {
    Uniform { bins: usize, min: f64, max: f64 },
    Edges { edges: Vec<f64> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeConfig {
    pub group_size: i64,
    /// Number of grouped bins, or the rest of the domain when absent
    #[serde(default)]
    pub bins: Option<i64>,
}

impl AxisConfig {
    pub fn build(&self) -> Result<Axis, RebinError> {
        match self {
            AxisConfig::Uniform { bins, min, max } => Axis::uniform(*bins, *min, *max),
            AxisConfig::Edges { edges } => Axis::try_from_edges(edges.clone()),
        }
    }
}

impl DimensionConfig {
    pub fn display_name(&self, index: usize) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("dim{index}"))
    }
}

impl BinningConfig {
    pub fn from_json(json: &str) -> Result<Self, RebinError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Base axes of every dimension, in order
    pub fn build_axes(&self) -> Result<Vec<Axis>, RebinError> {
        self.dimensions
            .iter()
            .map(|dim| {
                let axis = dim.axis.build()?;
                match &dim.labels {
                    Some(labels) => axis.with_labels(labels.clone()),
                    None => Ok(axis),
                }
            })
            .collect()
    }

    /// Build one rebinning tree per dimension over `axes`.
    ///
    /// Configuration errors are returned rather than aborting.
    pub fn build_cut_set<'a>(&self, axes: &'a [Axis]) -> Result<CutSet<'a>, RebinError> {
        if axes.len() != self.dimensions.len() {
            return Err(RebinError::DimensionCountMismatch {
                expected: self.dimensions.len(),
                actual: axes.len(),
            });
        }

        let mut cuts = CutSet::new();
        for (index, (dim, axis)) in self.dimensions.iter().zip(axes).enumerate() {
            let mut root = AxisNode::new(axis);
            for range in &dim.ranges {
                root.try_append_range(range.group_size, range.bins)?;
            }
            tracing::debug!(
                dimension = %dim.display_name(index),
                ranges = dim.ranges.len(),
                "Built rebinning tree"
            );
            cuts.add_axis(root);
        }
        Ok(cuts)
    }
}
