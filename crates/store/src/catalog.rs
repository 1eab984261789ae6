//! Catalog entities: suppliers, products, variants, and attribute sets.

use std::collections::BTreeMap;

use common::{Money, ProductId, SupplierId, VariantId};
use serde::{Deserialize, Serialize};

/// A supplier that purchase orders are placed against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Supplier {
    /// Unique supplier identifier.
    pub id: SupplierId,

    /// Supplier display name.
    pub name: String,

    /// Inactive suppliers cannot receive new orders.
    pub active: bool,
}

impl Supplier {
    /// Creates a new active supplier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: SupplierId::new(),
            name: name.into(),
            active: true,
        }
    }
}

/// Lifecycle status of a catalog product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ProductStatus {
    /// Product is available for ordering and sale.
    #[default]
    Active,

    /// Product was created by a draft migration and awaits manual review.
    Pending,
}

impl ProductStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Active => "active",
            ProductStatus::Pending => "pending",
        }
    }

    /// Parses a status from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ProductStatus::Active),
            "pending" => Some(ProductStatus::Pending),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProductStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    /// Unique product identifier.
    pub id: ProductId,

    /// Product display name.
    pub name: String,

    /// Current cost price. None for products whose pricing lives entirely
    /// on their variants.
    pub cost: Option<Money>,

    /// Lifecycle status.
    pub status: ProductStatus,
}

impl Product {
    /// Creates a new product.
    pub fn new(name: impl Into<String>, cost: Option<Money>, status: ProductStatus) -> Self {
        Self {
            id: ProductId::new(),
            name: name.into(),
            cost,
            status,
        }
    }
}

/// Lifecycle status of a catalog variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VariantStatus {
    /// Variant is available for sale.
    #[default]
    Active,

    /// Variant was created by a draft migration and awaits manual
    /// activation and sale pricing.
    Inactive,
}

impl VariantStatus {
    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            VariantStatus::Active => "active",
            VariantStatus::Inactive => "inactive",
        }
    }

    /// Parses a status from its string form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(VariantStatus::Active),
            "inactive" => Some(VariantStatus::Inactive),
            _ => None,
        }
    }
}

impl std::fmt::Display for VariantStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A concrete attribute combination of a product (e.g. Color: Red, Size: M).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    /// Unique variant identifier.
    pub id: VariantId,

    /// The product this variant belongs to.
    pub product_id: ProductId,

    /// Current cost price.
    pub cost: Money,

    /// Lifecycle status.
    pub status: VariantStatus,

    /// The attribute combination identifying this variant.
    pub attributes: AttributeSet,
}

impl Variant {
    /// Creates a new variant of a product.
    pub fn new(
        product_id: ProductId,
        cost: Money,
        status: VariantStatus,
        attributes: AttributeSet,
    ) -> Self {
        Self {
            id: VariantId::new(),
            product_id,
            cost,
            status,
            attributes,
        }
    }
}

/// A single attribute name/value pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeValue {
    /// Attribute name (e.g. "Color").
    pub name: String,

    /// Attribute value (e.g. "Red").
    pub value: String,
}

/// An ordered, normalized set of attribute name/value pairs.
///
/// Pairs are trimmed, sorted by attribute name, and de-duplicated (last
/// value wins), so two sets describing the same combination compare equal
/// with `==` regardless of input order. Equality is exact: identical
/// cardinality and identical pairs; a subset or superset never compares
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeSet(Vec<AttributeValue>);

impl AttributeSet {
    /// Builds a normalized attribute set from name/value pairs.
    pub fn new<I, N, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (N, V)>,
        N: Into<String>,
        V: Into<String>,
    {
        let mut map = BTreeMap::new();
        for (name, value) in pairs {
            let name = name.into().trim().to_string();
            let value = value.into().trim().to_string();
            map.insert(name, value);
        }
        Self(
            map.into_iter()
                .map(|(name, value)| AttributeValue { name, value })
                .collect(),
        )
    }

    /// Returns the number of attribute pairs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the set has no attributes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the pairs in attribute-name order.
    pub fn iter(&self) -> impl Iterator<Item = &AttributeValue> {
        self.0.iter()
    }

    /// Iterates over the attribute names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|a| a.name.as_str())
    }

    /// Looks up the value for an attribute name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }
}

impl std::fmt::Display for AttributeSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for attr in &self.0 {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", attr.name, attr.value)?;
            first = false;
        }
        Ok(())
    }
}

/// Reference to either a catalog product or a catalog variant.
///
/// Order line items and price history entries point at exactly one of the
/// two, never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CatalogRef {
    /// A product-level reference.
    Product(ProductId),

    /// A variant-level reference.
    Variant(VariantId),
}

impl std::fmt::Display for CatalogRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CatalogRef::Product(id) => write!(f, "product {id}"),
            CatalogRef::Variant(id) => write!(f, "variant {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attribute_set_is_order_insensitive() {
        let a = AttributeSet::new([("Size", "M"), ("Color", "Red")]);
        let b = AttributeSet::new([("Color", "Red"), ("Size", "M")]);
        assert_eq!(a, b);
    }

    #[test]
    fn attribute_set_trims_whitespace() {
        let a = AttributeSet::new([(" Color ", " Red ")]);
        let b = AttributeSet::new([("Color", "Red")]);
        assert_eq!(a, b);
        assert_eq!(a.get("Color"), Some("Red"));
    }

    #[test]
    fn attribute_set_last_value_wins() {
        let set = AttributeSet::new([("Color", "Red"), ("Color", "Blue")]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("Color"), Some("Blue"));
    }

    #[test]
    fn attribute_set_subset_is_not_equal() {
        let narrow = AttributeSet::new([("Color", "Red")]);
        let wide = AttributeSet::new([("Color", "Red"), ("Size", "M")]);
        assert_ne!(narrow, wide);
    }

    #[test]
    fn attribute_set_differing_value_is_not_equal() {
        let red = AttributeSet::new([("Color", "Red")]);
        let blue = AttributeSet::new([("Color", "Blue")]);
        assert_ne!(red, blue);
    }

    #[test]
    fn attribute_set_display() {
        let set = AttributeSet::new([("Size", "M"), ("Color", "Red")]);
        assert_eq!(set.to_string(), "Color: Red, Size: M");
    }

    #[test]
    fn attribute_set_serialization_roundtrip() {
        let set = AttributeSet::new([("Color", "Red"), ("Size", "M")]);
        let json = serde_json::to_string(&set).unwrap();
        let deserialized: AttributeSet = serde_json::from_str(&json).unwrap();
        assert_eq!(set, deserialized);
    }

    #[test]
    fn product_status_parse_roundtrip() {
        for status in [ProductStatus::Active, ProductStatus::Pending] {
            assert_eq!(ProductStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(ProductStatus::parse("bogus"), None);
    }

    #[test]
    fn variant_status_parse_roundtrip() {
        for status in [VariantStatus::Active, VariantStatus::Inactive] {
            assert_eq!(VariantStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(VariantStatus::parse("bogus"), None);
    }

    #[test]
    fn supplier_new_is_active() {
        let supplier = Supplier::new("Acme Wholesale");
        assert!(supplier.active);
        assert_eq!(supplier.name, "Acme Wholesale");
    }
}
