use serde::{Deserialize, Serialize};

use crate::error::RebinError;

/// Finest-granularity binning of one measurement dimension.
///
/// Bins are numbered from 1 to `bin_count()`. Bin 0 and `bin_count() + 1`
/// are reserved for underflow and overflow. Implementations must not panic
/// for those indices (or any index beyond them) since diagnostics of a
/// malformed tree may ask for them.
pub trait BaseAxis {
    fn bin_count(&self) -> usize;

    /// Lower edge of `bin`
    fn low_edge(&self, bin: usize) -> f64;

    /// Upper edge of `bin`
    fn up_edge(&self, bin: usize) -> f64;

    /// Label of `bin`, used for diagnostics only
    fn bin_label(&self, _bin: usize) -> Option<&str> {
        None
    }
}

/// A concrete axis that can be re-initialized with variable-width edges.
pub trait EdgeTarget {
    /// Replace the binning with `edges.len() - 1` intervals
    fn set_edges(&mut self, edges: &[f64]);
}

/// Fixed or variable width axis defined by its bin edges.
///
/// Deserialization goes through the same checks as
/// [`Axis::try_from_edges`] and [`Axis::with_labels`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "AxisDef")]
pub struct Axis {
    edges: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    labels: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct AxisDef {
    edges: Vec<f64>,
    #[serde(default)]
    labels: Option<Vec<String>>,
}

impl TryFrom<AxisDef> for Axis {
    type Error = RebinError;

    fn try_from(def: AxisDef) -> Result<Self, Self::Error> {
        let axis = Axis::try_from_edges(def.edges)?;
        match def.labels {
            Some(labels) => axis.with_labels(labels),
            None => Ok(axis),
        }
    }
}

impl Axis {
    /// Create an axis with `bins` equal-width bins spanning `[min, max]`
    pub fn uniform(bins: usize, min: f64, max: f64) -> Result<Self, RebinError> {
        if bins == 0 {
            return Err(RebinError::EmptyAxis);
        }
        if !(min < max) {
            return Err(RebinError::InvalidAxisRange { min, max });
        }
        let width = (max - min) / bins as f64;
        let mut edges: Vec<f64> = (0..bins).map(|i| min + width * i as f64).collect();
        // Avoid accumulating rounding error in the last edge
        edges.push(max);
        Ok(Self {
            edges,
            labels: None,
        })
    }

    pub fn try_from_edges(edges: Vec<f64>) -> Result<Self, RebinError> {
        if edges.len() < 2 {
            return Err(RebinError::EmptyAxis);
        }
        if !edges.windows(2).all(|w| w[0] < w[1]) {
            return Err(RebinError::EdgesNotAscending(edges));
        }
        Ok(Self {
            edges,
            labels: None,
        })
    }

    pub fn with_labels<S: Into<String>>(mut self, labels: Vec<S>) -> Result<Self, RebinError> {
        if labels.len() != self.bin_count() {
            return Err(RebinError::LabelCountMismatch {
                label_len: labels.len(),
                bin_count: self.bin_count(),
            });
        }
        self.labels = Some(labels.into_iter().map(Into::into).collect());
        Ok(self)
    }

    /// Returns a reference to the bin edges
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Lowest edge, NaN for an axis flattened to no edges
    pub fn min(&self) -> f64 {
        self.edges.first().copied().unwrap_or(f64::NAN)
    }

    pub fn max(&self) -> f64 {
        self.edges.last().copied().unwrap_or(f64::NAN)
    }

    /// Find the bin containing `x`.
    ///
    /// Bins are half-open `[low, up)`. Values below the axis map to 0 and
    /// values at or above the last edge map to `bin_count() + 1`.
    pub fn find_bin(&self, x: f64) -> usize {
        if x.is_nan() || !(x >= self.min()) {
            return 0;
        }
        match self.edges.binary_search_by(|e| e.total_cmp(&x)) {
            Ok(i) => i + 1,
            Err(i) => i,
        }
    }
}

impl BaseAxis for Axis {
    fn bin_count(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    fn low_edge(&self, bin: usize) -> f64 {
        match bin {
            0 => f64::NEG_INFINITY,
            b if b <= self.edges.len() => self.edges[b - 1],
            _ => f64::INFINITY,
        }
    }

    fn up_edge(&self, bin: usize) -> f64 {
        self.edges.get(bin).copied().unwrap_or(f64::INFINITY)
    }

    fn bin_label(&self, bin: usize) -> Option<&str> {
        self.labels
            .as_ref()
            .and_then(|labels| labels.get(bin.checked_sub(1)?))
            .map(String::as_str)
    }
}

impl EdgeTarget for Axis {
    fn set_edges(&mut self, edges: &[f64]) {
        self.edges = edges.to_vec();
        // Labels describe the old binning
        self.labels = None;
    }
}
