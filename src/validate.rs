//! Completeness checks run before a draft is synchronized

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::models::{Product, Variant};

/// Field name -> human readable message
pub type FieldErrors = BTreeMap<String, String>;

/// Outcome of validating a product and its variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "errors", rename_all = "snake_case")]
pub enum ValidationResult {
    Valid,
    Invalid(FieldErrors),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn errors(&self) -> Option<&FieldErrors> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid(errors) => Some(errors),
        }
    }

    /// Ok when valid, the field errors otherwise
    pub fn into_result(self) -> Result<(), FieldErrors> {
        match self {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid(errors) => Err(errors),
        }
    }
}

fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
}

/// Check every completeness rule. Never fails; problems are reported per field.
pub fn validate(product: &Product, variants: &[Variant]) -> ValidationResult {
    let mut errors = FieldErrors::new();

    if is_blank(&product.name) {
        errors.insert("name".into(), "Product name is required".into());
    }
    if is_blank(&product.description) {
        errors.insert("description".into(), "Description is required".into());
    }
    if is_blank(&product.sku) {
        errors.insert("sku".into(), "SKU is required".into());
    }
    if product.price <= Decimal::ZERO {
        errors.insert("price".into(), "Price must be greater than zero".into());
    }
    if product.discount_price < Decimal::ZERO {
        errors.insert(
            "discount_price".into(),
            "Discount price cannot be negative".into(),
        );
    }
    if product.assets.is_empty() {
        errors.insert(
            "assets".into(),
            "At least one image or video is required".into(),
        );
    }
    if product.category_id.as_deref().is_none_or(is_blank) {
        errors.insert("category_id".into(), "Category is required".into());
    }

    for (index, variant) in variants.iter().enumerate() {
        if !variant.is_active() {
            continue;
        }

        if is_blank(&variant.color_name) {
            errors.insert(
                format!("variants[{}].color_name", index),
                "Color name is required".into(),
            );
        }

        let mut seen = HashSet::new();
        let mut duplicate = None;
        let mut active = 0;
        for slot in variant.active_sizes() {
            active += 1;
            if !seen.insert(slot.code) && duplicate.is_none() {
                duplicate = Some(slot.code);
            }
        }

        if active == 0 {
            errors.insert(
                format!("variants[{}].sizes", index),
                "At least one size is required".into(),
            );
        } else if let Some(code) = duplicate {
            errors.insert(
                format!("variants[{}].sizes", index),
                format!("Size {} is assigned more than once", code),
            );
        }
    }

    if errors.is_empty() {
        ValidationResult::Valid
    } else {
        ValidationResult::Invalid(errors)
    }
}
