use std::panic::{catch_unwind, AssertUnwindSafe};

use float_cmp::assert_approx_eq;
use rebin_axis::{Axis, AxisNode, BaseAxis, ConfigurationAbort, CutSet, DescribeOptions, RebinError};

/// Base axis with `n` unit bins, edges 0..=n
fn unit_axis(n: usize) -> Axis {
    Axis::uniform(n, 0.0, n as f64).unwrap()
}

/// Axis whose low edge is not zero, to catch off-by-one edge lookups
#[derive(Debug)]
struct ShiftedAxis {
    offset: f64,
    bins: usize,
}

impl BaseAxis for ShiftedAxis {
    fn bin_count(&self) -> usize {
        self.bins
    }

    fn low_edge(&self, bin: usize) -> f64 {
        self.offset + bin as f64 - 1.0
    }

    fn up_edge(&self, bin: usize) -> f64 {
        self.offset + bin as f64
    }
}

#[test]
fn test_ranges_over_full_axis_validate() -> Result<(), RebinError> {
    let axis = unit_axis(10);
    let mut root = AxisNode::try_new(&axis, 1, 0, 1, Some(10))?;
    root.append_range(1, Some(5));
    root.append_range(1, Some(5));
    assert_eq!(root.children()[0].bin_min_base(), 1);
    assert_eq!(root.children()[0].bin_max_base(), 5);
    assert_eq!(root.children()[1].bin_min_base(), 6);
    assert_eq!(root.children()[1].bin_max_base(), 10);
    assert!(root.validate_contiguity());
    Ok(())
}

#[test]
fn test_open_ended_range_flattens_to_finite_edges() -> Result<(), RebinError> {
    let axis = unit_axis(10);
    let mut root = AxisNode::new(&axis);
    root.append_range(1, Some(5));
    let rest = root.append_range(1, None);
    assert_eq!(rest.bin_max_base(), 10);
    assert!(root.validate_contiguity());

    let mut target = unit_axis(1);
    root.flatten(&mut target);
    assert_eq!(target.bin_count(), 10);
    for (edge, expected) in target.edges().iter().zip(0..=10) {
        assert_approx_eq!(f64, *edge, f64::from(expected));
    }
    Ok(())
}

#[test]
fn test_open_ended_grouped_range_drops_partial_group() -> Result<(), RebinError> {
    let axis = unit_axis(12);
    let mut root = AxisNode::new(&axis);
    root.append_range(1, Some(2));
    let rest = root.append_range(3, None);
    assert_eq!(rest.bin_min_base(), 3);
    // Base bin 12 would only start a fourth group
    assert_eq!(rest.bin_max_base(), 11);
    assert_eq!(
        root.flattened_edges(),
        vec![0.0, 1.0, 2.0, 5.0, 8.0, 11.0]
    );
    Ok(())
}

#[test]
fn test_gap_between_children_fails_validation() -> Result<(), RebinError> {
    let axis = unit_axis(10);
    let mut root = AxisNode::try_new(&axis, 1, 0, 1, Some(10))?;
    root.append_child(1, 0, 1, Some(5), None);
    root.append_child(1, 0, 7, Some(10), None);
    assert!(!root.validate_contiguity());
    Ok(())
}

#[test]
fn test_flatten_pairs_of_unit_bins() -> Result<(), RebinError> {
    let axis = unit_axis(10);
    let mut root = AxisNode::new(&axis);
    root.append_child(2, 0, 1, Some(5), None);

    let mut target = unit_axis(1);
    root.flatten(&mut target);
    let expected = [0.0, 2.0, 4.0, 6.0, 8.0, 10.0];
    assert_eq!(target.edges().len(), expected.len());
    for (edge, expected) in target.edges().iter().zip(expected) {
        assert_approx_eq!(f64, *edge, expected);
    }

    // Flattening again gives the same binning
    let before = target.clone();
    root.flatten(&mut target);
    assert_eq!(target, before);
    Ok(())
}

#[test]
fn test_flatten_custom_base_axis() -> Result<(), RebinError> {
    let axis = ShiftedAxis {
        offset: 100.0,
        bins: 6,
    };
    let mut root: AxisNode<ShiftedAxis> = AxisNode::new(&axis);
    root.append_range(1, Some(2));
    root.append_range(2, Some(2));
    assert!(root.validate_contiguity());

    let edges = root.flattened_edges();
    assert_eq!(edges, vec![100.0, 101.0, 102.0, 104.0, 106.0]);
    Ok(())
}

#[test]
fn test_dyn_base_axis() -> Result<(), RebinError> {
    let axis = unit_axis(4);
    let base: &dyn BaseAxis = &axis;
    let mut root: AxisNode<dyn BaseAxis> = AxisNode::new(base);
    root.try_append_child(4, 0, 1, Some(1))?;
    assert_eq!(root.flattened_edges(), vec![0.0, 4.0]);
    Ok(())
}

#[test]
fn test_containment_abort_is_typed() {
    let axis = unit_axis(6);
    let mut root = AxisNode::new(&axis);
    root.append_range(1, Some(3));

    let payload = catch_unwind(AssertUnwindSafe(|| {
        root.append_range(2, Some(3));
    }))
    .unwrap_err();
    let abort = ConfigurationAbort::from_panic(payload).unwrap();
    assert!(matches!(
        abort.error(),
        RebinError::ContainmentViolation { .. }
    ));
    assert!(abort.to_string().starts_with("Fatal binning configuration error"));

    // The tree is unchanged by the aborted call
    assert_eq!(root.children().len(), 1);
}

#[test]
fn test_foreign_panic_is_not_an_abort() {
    let payload = catch_unwind(|| panic!("unrelated")).unwrap_err();
    assert!(ConfigurationAbort::from_panic(payload).is_err());
}

#[test]
fn test_empty_cut_set_describes_nothing() {
    let cuts: CutSet = CutSet::new();
    assert_eq!(cuts.describe(&DescribeOptions::default()), "");
    assert_eq!(cuts.describe(&DescribeOptions::default().base_only()), "");
}

#[test]
fn test_frozen_cut_set_is_shared_across_threads() -> Result<(), RebinError> {
    let x = unit_axis(8);
    let y = unit_axis(6);

    let mut cuts = CutSet::new();
    let dim = cuts.add_axis(AxisNode::new(&x));
    cuts.axis_mut(dim).append_range(1, Some(4));
    cuts.axis_mut(dim).append_range(4, Some(1));
    let dim = cuts.add_axis(AxisNode::new(&y));
    cuts.axis_mut(dim).append_range(1, Some(3));
    cuts.axis_mut(dim).append_range(3, Some(1));

    let frozen = &cuts;
    let expected = frozen.flattened_edges();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(move || {
                    assert!(frozen.validate());
                    frozen.flattened_edges()
                })
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), expected);
        }
    });
    assert_eq!(expected[0], vec![0.0, 1.0, 2.0, 3.0, 4.0, 8.0]);
    assert_eq!(expected[1], vec![0.0, 1.0, 2.0, 3.0, 6.0]);
    Ok(())
}
