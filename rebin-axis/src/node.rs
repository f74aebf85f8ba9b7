//! Rebinning tree over a fixed-granularity base axis.
//!
//! An [`AxisNode`] folds `group_size` consecutive base bins into one grouped
//! bin, optionally skipping `skip_offset` leading base bins. Children carve
//! the node's domain into sub-ranges, each with its own group size, and the
//! tree is finally flattened into a variable-width edge list.
//!
//! Coordinates are 1-based. For grouped index `b`:
//!
//! ```text
//! first base bin = (b - 1) * group_size + 1 + skip_offset
//! last base bin  =  b      * group_size     + skip_offset
//! ```
//!
//! With `group_size == 1` grouped and base coordinates are identical and the
//! skip offset does not take part in the mapping.

use std::fmt;

use itertools::Itertools;

use crate::axis::{Axis, BaseAxis, EdgeTarget};
use crate::describe::DescribeOptions;
use crate::error::{ConfigurationAbort, RebinError};

/// One node of a rebinning tree.
///
/// The base axis is borrowed for the lifetime of the tree. Children are owned
/// and dropped together with their parent.
#[derive(Debug)]
pub struct AxisNode<'a, A: BaseAxis + ?Sized = Axis> {
    base: Option<&'a A>,
    group_size: i64,
    skip_offset: i64,
    local_min: i64,
    local_max: i64,
    grouped_bin_count: i64,
    children: Vec<AxisNode<'a, A>>,
}

/// Unconfigured node without a base axis
impl<A: BaseAxis + ?Sized> Default for AxisNode<'_, A> {
    fn default() -> Self {
        Self {
            base: None,
            group_size: 1,
            skip_offset: 0,
            local_min: 1,
            local_max: 0,
            grouped_bin_count: 0,
            children: Vec::new(),
        }
    }
}

impl<'a, A: BaseAxis + ?Sized> AxisNode<'a, A> {
    /// Create a root node covering the whole base axis bin by bin
    pub fn new(base: &'a A) -> Self {
        Self::default().with_base_axis(base)
    }

    /// Create a node over `base`.
    ///
    /// When `local_max` is `None` or below `local_min`, the node covers up to
    /// its own grouped bin count. No further validation is done here: a skip
    /// offset larger than the base axis yields a negative grouped bin count.
    pub fn try_new(
        base: &'a A,
        group_size: i64,
        skip_offset: i64,
        local_min: i64,
        local_max: Option<i64>,
    ) -> Result<Self, RebinError> {
        if group_size < 1 {
            return Err(RebinError::InvalidGroupSize(group_size));
        }
        let grouped_bin_count = (base.bin_count() as i64 - skip_offset).div_euclid(group_size);
        let local_max = match local_max {
            Some(max) if max >= local_min => max,
            _ => grouped_bin_count,
        };
        Ok(Self {
            base: Some(base),
            group_size,
            skip_offset,
            local_min,
            local_max,
            grouped_bin_count,
            children: Vec::new(),
        })
    }

    /// Attach a base axis to a deferred node, recomputing its grouped bin count
    pub fn with_base_axis(mut self, base: &'a A) -> Self {
        self.base = Some(base);
        self.grouped_bin_count =
            (base.bin_count() as i64 - self.skip_offset).div_euclid(self.group_size);
        if self.local_max < self.local_min {
            self.local_max = self.grouped_bin_count;
        }
        self
    }

    pub fn base_axis(&self) -> Option<&'a A> {
        self.base
    }

    pub fn group_size(&self) -> i64 {
        self.group_size
    }

    pub fn skip_offset(&self) -> i64 {
        self.skip_offset
    }

    pub fn local_min(&self) -> i64 {
        self.local_min
    }

    pub fn local_max(&self) -> i64 {
        self.local_max
    }

    pub fn grouped_bin_count(&self) -> i64 {
        self.grouped_bin_count
    }

    pub fn children(&self) -> &[AxisNode<'a, A>] {
        &self.children
    }

    pub fn child(&self, index: usize) -> Option<&AxisNode<'a, A>> {
        self.children.get(index)
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// First base bin of grouped bin `grouped`
    pub fn group_first_base(&self, grouped: i64) -> i64 {
        first_base(self.group_size, self.skip_offset, grouped)
    }

    /// Last base bin of grouped bin `grouped`
    pub fn group_last_base(&self, grouped: i64) -> i64 {
        last_base(self.group_size, self.skip_offset, grouped)
    }

    /// First base bin covered by this node's local range
    pub fn bin_min_base(&self) -> i64 {
        self.group_first_base(self.local_min)
    }

    /// Last base bin covered by this node's local range
    pub fn bin_max_base(&self) -> i64 {
        self.group_last_base(self.local_max)
    }

    /// Append a child node sharing this node's base axis.
    ///
    /// A `local_max` of `None` inherits this node's own `local_max`, unlike
    /// [`AxisNode::try_new`] which falls back to the child's grouped bin count.
    /// Fails with [`RebinError::ContainmentViolation`] when the child would
    /// end beyond this node's last base bin.
    pub fn try_append_child(
        &mut self,
        group_size: i64,
        skip_offset: i64,
        local_min: i64,
        local_max: Option<i64>,
    ) -> Result<&mut AxisNode<'a, A>, RebinError> {
        let child = self.make_child(group_size, skip_offset, local_min, local_max)?;
        self.check_containment(&child)?;
        Ok(self.push_child(child))
    }

    /// Aborting form of [`AxisNode::try_append_child`].
    ///
    /// A malformed child is never added: the diagnostic is logged and the
    /// thread unwinds with a [`ConfigurationAbort`] payload. When
    /// `diagnostics` is given, the new child's structure is logged.
    pub fn append_child(
        &mut self,
        group_size: i64,
        skip_offset: i64,
        local_min: i64,
        local_max: Option<i64>,
        diagnostics: Option<DescribeOptions>,
    ) -> &mut AxisNode<'a, A> {
        let child = match self.make_child(group_size, skip_offset, local_min, local_max) {
            Ok(child) => child,
            Err(err) => self.abort(err, None),
        };
        if let Err(err) = self.check_containment(&child) {
            self.abort(err, Some(&child))
        }
        let child = self.push_child(child);
        if let Some(options) = diagnostics {
            tracing::info!("Appended axis node\n{}", child.describe(&options));
        }
        child
    }

    /// Append the next contiguous sub-range as a child.
    ///
    /// The child's skip offset and local range are derived from the ranges
    /// already appended, so repeated calls tile the domain without manual bin
    /// arithmetic. `grouped_bins` of `None` lets the child run to the end of
    /// this node's range, never past the last bin of the base axis.
    ///
    /// The first accepted range also rebases this node: its skip offset and
    /// `local_min` are re-expressed in units of `group_size` and `local_max`
    /// is shifted so the total coverage stays the same. A rejected range
    /// leaves the node untouched.
    pub fn try_append_range(
        &mut self,
        group_size: i64,
        grouped_bins: Option<i64>,
    ) -> Result<&mut AxisNode<'a, A>, RebinError> {
        match self.stage_range(group_size, grouped_bins) {
            Ok(child) => Ok(self.push_child(child)),
            Err(rejected) => Err(rejected.error),
        }
    }

    /// Aborting form of [`AxisNode::try_append_range`], see
    /// [`AxisNode::append_child`].
    pub fn append_range(
        &mut self,
        group_size: i64,
        grouped_bins: Option<i64>,
    ) -> &mut AxisNode<'a, A> {
        match self.stage_range(group_size, grouped_bins) {
            Ok(child) => self.push_child(child),
            Err(rejected) => self.abort(rejected.error, rejected.child.as_ref()),
        }
    }

    /// Check that the children tile this node's domain in insertion order.
    ///
    /// Only direct children are inspected; nested children are treated as
    /// opaque ranges. The first child sets the baseline and every later child
    /// must start one base bin after its predecessor ends. The start of a
    /// later child is shifted by this node's `local_min`, matching the
    /// rebasing done by [`AxisNode::append_range`].
    pub fn validate_contiguity(&self) -> bool {
        let Some((first, rest)) = self.children.split_first() else {
            tracing::warn!("Axis node has no children, nothing tiles its range");
            return false;
        };

        let mut expected = first.bin_max_base() + 1;
        for (index, child) in rest.iter().enumerate() {
            let start = child.bin_min_base() + self.local_min - 1;
            if start != expected {
                tracing::warn!(
                    child = index + 1,
                    start,
                    expected,
                    "Axis node children are not contiguous\n{}",
                    child.describe(&DescribeOptions::default().without_ranges())
                );
                return false;
            }
            expected = child.bin_max_base() + 1;
        }
        true
    }

    /// Edges implied by this node's children.
    ///
    /// Empty when the node has no children. Otherwise the lower edge of the
    /// first child's first base bin followed by the upper edge of every
    /// grouped bin of every child, in order.
    pub fn flattened_edges(&self) -> Vec<f64> {
        let (Some(base), Some(first)) = (self.base, self.children.first()) else {
            return Vec::new();
        };

        let capacity = usize::try_from(self.grouped_bin_count + 1).unwrap_or(0);
        let mut edges = Vec::with_capacity(capacity);
        edges.push(base.low_edge(base_index(first.bin_min_base())));
        for child in &self.children {
            edges.extend(
                (child.local_min..=child.local_max)
                    .map(|grouped| base.up_edge(base_index(child.group_last_base(grouped)))),
            );
        }
        edges
    }

    /// Re-initialize `target` with the edges implied by this node's children.
    ///
    /// Leaves `target` untouched when the node has no children.
    pub fn flatten<T: EdgeTarget + ?Sized>(&self, target: &mut T) {
        let edges = self.flattened_edges();
        if edges.is_empty() {
            return;
        }
        tracing::debug!(edges = edges.len(), "Flattened axis node");
        target.set_edges(&edges);
    }

    /// Diagnostic dump of this node and its children
    pub fn describe(&self, options: &DescribeOptions) -> String {
        let pad = options.pad();
        let Some(base) = self.base else {
            return format!("{pad}AxisNode (no base axis)\n");
        };

        let n = base.bin_count();
        let mut out = if n == 0 {
            format!("{pad}Base axis: 0 bins\n")
        } else {
            format!(
                "{pad}Base axis: {n} bins [{}, {}]\n",
                base.low_edge(1),
                base.up_edge(n)
            )
        };
        if options.base_only {
            return out;
        }

        out.push_str(&format!(
            "{pad}AxisNode: group_size={} skip_offset={} range=[{}, {}] base_range=[{}, {}] grouped_bins={}\n",
            self.group_size,
            self.skip_offset,
            self.local_min,
            self.local_max,
            self.bin_min_base(),
            self.bin_max_base(),
            self.grouped_bin_count,
        ));

        if options.ranges && self.local_max >= self.local_min {
            let ranges = (self.local_min..=self.local_max)
                .map(|grouped| self.describe_grouped_bin(base, grouped, &pad))
                .join("\n");
            out.push_str(&ranges);
            out.push('\n');
        }

        if !self.children.is_empty() {
            out.push_str(&format!("{pad}  children ({}):\n", self.children.len()));
            let nested = options.nested().nested();
            for child in &self.children {
                out.push_str(&child.describe(&nested));
            }
        }
        out
    }

    fn describe_grouped_bin(&self, base: &A, grouped: i64, pad: &str) -> String {
        let first = self.group_first_base(grouped);
        let last = self.group_last_base(grouped);
        let mut line = format!(
            "{pad}  [{grouped}] base {first}..{last}: [{}, {})",
            base.low_edge(base_index(first)),
            base.up_edge(base_index(last)),
        );
        if first == last {
            if let Some(label) = base.bin_label(base_index(first)) {
                line.push_str(&format!(" \"{label}\""));
            }
        }
        line
    }

    fn make_child(
        &self,
        group_size: i64,
        skip_offset: i64,
        local_min: i64,
        local_max: Option<i64>,
    ) -> Result<AxisNode<'a, A>, RebinError> {
        let base = self.base.ok_or(RebinError::MissingBaseAxis)?;
        let local_max = local_max.unwrap_or(self.local_max);
        AxisNode::try_new(base, group_size, skip_offset, local_min, Some(local_max))
    }

    fn check_containment(&self, child: &AxisNode<'a, A>) -> Result<(), RebinError> {
        let child_max_base = child.bin_max_base();
        let parent_max_base = self.bin_max_base();
        if child_max_base > parent_max_base {
            return Err(RebinError::ContainmentViolation {
                child_max_base,
                parent_max_base,
            });
        }
        Ok(())
    }

    fn push_child(&mut self, child: AxisNode<'a, A>) -> &mut AxisNode<'a, A> {
        let index = self.children.len();
        self.children.push(child);
        &mut self.children[index]
    }

    /// Build the child of the next range without adding it.
    ///
    /// The child is checked against this node as rebased by the range, and
    /// the rebase is kept only when the child is accepted.
    fn stage_range(
        &mut self,
        group_size: i64,
        grouped_bins: Option<i64>,
    ) -> Result<AxisNode<'a, A>, Rejected<'a, A>> {
        let plan = self.plan_range(group_size, grouped_bins)?;
        let saved = (self.skip_offset, self.local_min, self.local_max);
        if let Some((skip_offset, local_min, local_max)) = plan.rebase {
            self.skip_offset = skip_offset;
            self.local_min = local_min;
            self.local_max = local_max;
        }

        let staged = self
            .make_child(group_size, plan.skip_offset, plan.local_min, Some(plan.local_max))
            .map_err(Rejected::from)
            .and_then(|child| match self.check_containment(&child) {
                Ok(()) => Ok(child),
                Err(error) => Err(Rejected {
                    error,
                    child: Some(child),
                }),
            });
        if staged.is_err() {
            (self.skip_offset, self.local_min, self.local_max) = saved;
        }
        staged
    }

    /// Derive the placement of the next range
    fn plan_range(
        &self,
        group_size: i64,
        grouped_bins: Option<i64>,
    ) -> Result<RangePlan, RebinError> {
        if group_size < 1 {
            return Err(RebinError::InvalidGroupSize(group_size));
        }
        let base = self.base.ok_or(RebinError::MissingBaseAxis)?;

        let (skip_offset, local_min, rebase) = if self.children.is_empty() {
            let skip_offset = self.local_min.rem_euclid(group_size);
            let local_min = self.local_min.div_euclid(group_size);
            let rebase = (skip_offset, local_min, self.local_max - (skip_offset - 1));
            (skip_offset, local_min, Some(rebase))
        } else {
            let consumed: i64 = self
                .children
                .iter()
                .map(|child| child.group_size * (child.local_max - child.local_min + 1))
                .sum();
            let mut skip_offset = consumed.rem_euclid(group_size);
            let local_min = consumed.div_euclid(group_size) + 1;
            if self.skip_offset != 0 {
                skip_offset += self.skip_offset;
            }
            (skip_offset, local_min, None)
        };

        let local_max = match grouped_bins {
            Some(bins) if rebase.is_some() => bins,
            Some(bins) => local_min + bins - 1,
            None => {
                // Rest of this node's range, clipped to the base axis
                let (parent_skip, _, parent_max) =
                    rebase.unwrap_or((self.skip_offset, self.local_min, self.local_max));
                let parent_end = last_base(self.group_size, parent_skip, parent_max)
                    .min(base.bin_count() as i64);
                (parent_end - skip_offset).div_euclid(group_size)
            }
        };

        tracing::info!(
            group_size,
            skip_offset,
            local_min,
            local_max,
            "Appending axis range"
        );
        Ok(RangePlan {
            skip_offset,
            local_min,
            local_max,
            rebase,
        })
    }

    fn abort(&self, err: RebinError, child: Option<&AxisNode<'a, A>>) -> ! {
        tracing::error!(
            "{err}\nParent:\n{}",
            self.describe(&DescribeOptions::default().base_only())
        );
        if let Some(child) = child {
            tracing::error!(
                "Offending child:\n{}",
                child.describe(&DescribeOptions::default().without_ranges())
            );
        }
        ConfigurationAbort(err).raise()
    }
}

impl<A: BaseAxis + ?Sized> fmt::Display for AxisNode<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(&DescribeOptions::default()))
    }
}

/// Placement of the next range and, for the first one, the rebased
/// `(skip_offset, local_min, local_max)` of the parent
struct RangePlan {
    skip_offset: i64,
    local_min: i64,
    local_max: i64,
    rebase: Option<(i64, i64, i64)>,
}

/// A range that was not appended, with the child when one was built
struct Rejected<'a, A: BaseAxis + ?Sized> {
    error: RebinError,
    child: Option<AxisNode<'a, A>>,
}

impl<A: BaseAxis + ?Sized> From<RebinError> for Rejected<'_, A> {
    fn from(error: RebinError) -> Self {
        Self { error, child: None }
    }
}

fn first_base(group_size: i64, skip_offset: i64, grouped: i64) -> i64 {
    if group_size == 1 {
        grouped
    } else {
        (grouped - 1) * group_size + 1 + skip_offset
    }
}

fn last_base(group_size: i64, skip_offset: i64, grouped: i64) -> i64 {
    if group_size == 1 {
        grouped
    } else {
        grouped * group_size + skip_offset
    }
}

/// Clamp a base coordinate to the underflow bin
fn base_index(bin: i64) -> usize {
    usize::try_from(bin).unwrap_or(0)
}
