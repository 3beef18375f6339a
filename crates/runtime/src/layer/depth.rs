//! Longest-path depth computation.

use std::collections::HashMap;

use crate::types::SlotId;

/// Deepest tracked operand, or `None` when no operand is produced in this layer.
pub(super) fn operand_depth(outputs: &HashMap<SlotId, usize>, operands: &[SlotId]) -> Option<usize> {
    operands
        .iter()
        .filter_map(|operand| outputs.get(operand).copied())
        .max()
}

/// Depth a unit with these operands is placed at.
pub(super) fn unit_depth(outputs: &HashMap<SlotId, usize>, operands: &[SlotId]) -> usize {
    operand_depth(outputs, operands).map_or(0, |deepest| deepest + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_untracked_operands_give_depth_zero() {
        let outputs = HashMap::new();
        assert_eq!(operand_depth(&outputs, &[SlotId::fresh(), SlotId::fresh()]), None);
        assert_eq!(unit_depth(&outputs, &[]), 0);
    }

    #[test]
    fn test_depth_follows_deepest_tracked_operand() {
        let (a, b, c) = (SlotId::fresh(), SlotId::fresh(), SlotId::fresh());
        let outputs = HashMap::from([(a, 0), (b, 3)]);

        assert_eq!(operand_depth(&outputs, &[a, b, c]), Some(3));
        assert_eq!(unit_depth(&outputs, &[a, b, c]), 4);
        assert_eq!(unit_depth(&outputs, &[a]), 1);
        assert_eq!(unit_depth(&outputs, &[c]), 0);
    }
}
