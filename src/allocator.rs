//! Size slot allocation within a variant

use crate::models::{SizeCode, Variant};

/// Size codes still free on `variant`, ascending.
///
/// Codes held by deleted slots count as free. `excluding` is always part of
/// the result so a slot's own code stays selectable while re-editing it.
pub fn available_codes(variant: &Variant, excluding: Option<SizeCode>) -> Vec<SizeCode> {
    SizeCode::ALL
        .into_iter()
        .filter(|code| {
            Some(*code) == excluding || !variant.active_sizes().any(|slot| slot.code == *code)
        })
        .collect()
}

/// First free code, if any
pub fn next_code(variant: &Variant) -> Option<SizeCode> {
    available_codes(variant, None).into_iter().next()
}
