//! Attribute-set matching for draft migration.

use store::{AttributeSet, Variant};

/// Finds an existing variant whose attribute set matches `attributes`
/// exactly.
///
/// A match requires identical cardinality and identical name/value pairs on
/// both sides; subsets and supersets never match. This keeps an
/// under-specified draft like `{Color: Red}` from silently merging into a
/// more specific existing variant like `{Color: Red, Size: M}`; it creates
/// a new variant instead.
pub fn find_exact_variant<'a>(
    variants: &'a [Variant],
    attributes: &AttributeSet,
) -> Option<&'a Variant> {
    variants.iter().find(|v| &v.attributes == attributes)
}
