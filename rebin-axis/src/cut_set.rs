use std::ops::Index;

use rayon::prelude::*;

use crate::axis::{Axis, BaseAxis};
use crate::describe::DescribeOptions;
use crate::node::AxisNode;

/// Ordered collection of independent rebinning trees, one per dimension.
///
/// Once configuration is done the set is handed out by shared reference;
/// all read operations are safe to run concurrently.
#[derive(Debug)]
pub struct CutSet<'a, A: BaseAxis + ?Sized = Axis> {
    axes: Vec<AxisNode<'a, A>>,
}

impl<A: BaseAxis + ?Sized> Default for CutSet<'_, A> {
    fn default() -> Self {
        Self { axes: Vec::new() }
    }
}

impl<'a, A: BaseAxis + ?Sized> CutSet<'a, A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the tree of the next dimension, returning its index
    pub fn add_axis(&mut self, node: AxisNode<'a, A>) -> usize {
        self.axes.push(node);
        self.axes.len() - 1
    }

    /// Tree of dimension `index`.
    ///
    /// # Panics
    /// Panics if `index` is out of range, use [`CutSet::get`] otherwise.
    pub fn axis(&self, index: usize) -> &AxisNode<'a, A> {
        &self.axes[index]
    }

    pub fn axis_mut(&mut self, index: usize) -> &mut AxisNode<'a, A> {
        &mut self.axes[index]
    }

    pub fn get(&self, index: usize) -> Option<&AxisNode<'a, A>> {
        self.axes.get(index)
    }

    pub fn len(&self) -> usize {
        self.axes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AxisNode<'a, A>> {
        self.axes.iter()
    }

    /// Whether every dimension is tiled contiguously by its children.
    ///
    /// All dimensions are checked so each failure gets logged.
    pub fn validate(&self) -> bool {
        self.axes
            .iter()
            .enumerate()
            .map(|(dim, node)| {
                let valid = node.validate_contiguity();
                if !valid {
                    tracing::warn!(dim, "Dimension failed contiguity validation");
                }
                valid
            })
            .fold(true, |acc, valid| acc && valid)
    }

    /// Diagnostic dump of every dimension in insertion order
    pub fn describe(&self, options: &DescribeOptions) -> String {
        let pad = options.pad();
        let nested = options.nested();
        self.axes
            .iter()
            .enumerate()
            .map(|(dim, node)| format!("{pad}Dimension {dim}:\n{}", node.describe(&nested)))
            .collect()
    }
}

impl<A: BaseAxis + Sync + ?Sized> CutSet<'_, A> {
    /// Flattened edges of every dimension, computed in parallel
    pub fn flattened_edges(&self) -> Vec<Vec<f64>> {
        self.axes
            .par_iter()
            .map(|node| node.flattened_edges())
            .collect()
    }
}

impl<'a, A: BaseAxis + ?Sized> Index<usize> for CutSet<'a, A> {
    type Output = AxisNode<'a, A>;

    fn index(&self, index: usize) -> &Self::Output {
        self.axis(index)
    }
}

impl<'s, 'a, A: BaseAxis + ?Sized> IntoIterator for &'s CutSet<'a, A> {
    type Item = &'s AxisNode<'a, A>;
    type IntoIter = std::slice::Iter<'s, AxisNode<'a, A>>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
