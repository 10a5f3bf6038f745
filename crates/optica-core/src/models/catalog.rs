//! Branch and catalog models (lens materials, frame products).

use serde::{Deserialize, Serialize};

use super::new_id;

/// A physical retail location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Branch {
    pub id: String,
    pub name: String,
    pub active: bool,
}

impl Branch {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            name: name.into(),
            active: true,
        }
    }
}

/// A lens material that can be prescribed on a visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Material {
    /// Unique identifier
    pub id: String,
    /// Description shown to staff (e.g. "Polycarbonate AR")
    pub description: String,
    /// Manufacturer brand
    pub brand: Option<String>,
    /// Whether the material can still be selected
    pub active: bool,
}

impl Material {
    pub fn new(description: impl Into<String>, brand: Option<String>) -> Self {
        Self {
            id: new_id(),
            description: description.into(),
            brand,
            active: true,
        }
    }
}

/// A sellable product; frames selected on a visit reference these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    /// Unique identifier
    pub id: String,
    /// Stock Keeping Unit - unique across the chain
    pub sku: String,
    /// Product name
    pub name: String,
    /// Category label (e.g. "frame", "lens", "accessory")
    pub category: String,
    /// Whether this product is currently sold
    pub active: bool,
}

impl Product {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            id: new_id(),
            sku: sku.into(),
            name: name.into(),
            category: category.into(),
            active: true,
        }
    }

    /// Check whether the product belongs to a category (case-insensitive).
    pub fn is_category(&self, category: &str) -> bool {
        self.category.eq_ignore_ascii_case(category)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_product() {
        let product = Product::new("FR-001", "Classic Frame", "Frame");
        assert!(product.active);
        assert!(product.is_category("frame"));
        assert!(!product.is_category("lens"));
        assert_eq!(product.id.len(), 36);
    }

    #[test]
    fn test_new_material() {
        let material = Material::new("Polycarbonate", Some("Essilor".into()));
        assert!(material.active);
        assert_eq!(material.brand.as_deref(), Some("Essilor"));
    }
}
