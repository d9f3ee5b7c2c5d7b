//! Backend collaborators consumed by the reconciliation engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::future::Future;

use crate::models::{Asset, ColorHex, Product, ProductSnapshot, ProductStatus, SizeCode, Variant};

/// Errors raised by an inventory backend
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Invalid request: {0}")]
    Invalid(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),

    #[error("{0}")]
    Unavailable(String),
}

/// Product fields as sent to the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: Decimal,
    pub discount_price: Decimal,
    pub category_id: Option<String>,
    pub sku: String,
    pub status: ProductStatus,
    pub tags: Vec<String>,
    pub assets: Vec<Asset>,
}

impl From<&Product> for ProductInput {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.trim().to_string(),
            description: product.description.trim().to_string(),
            price: product.price,
            discount_price: product.discount_price,
            category_id: product.category_id.clone(),
            sku: product.sku.trim().to_string(),
            status: product.status,
            tags: product.tags.clone(),
            assets: product.assets.clone(),
        }
    }
}

/// Canonical identity of a persisted product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRef {
    pub id: String,
    pub slug: String,
}

/// Mutable fields of a variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantFields {
    pub color_name: String,
    pub color_hex: ColorHex,
    pub images: Vec<Asset>,
}

impl From<&Variant> for VariantFields {
    fn from(variant: &Variant) -> Self {
        Self {
            color_name: variant.color_name.trim().to_string(),
            color_hex: variant.color_hex.clone(),
            images: variant.images.clone(),
        }
    }
}

/// A size code with its stock level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeStock {
    pub code: SizeCode,
    pub stock: u32,
}

/// Payload for creating a variant together with its sizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantInput {
    #[serde(flatten)]
    pub fields: VariantFields,
    pub sizes: Vec<SizeStock>,
}

/// Backend id assigned to a created size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedSize {
    pub id: String,
    pub code: SizeCode,
}

/// Backend ids assigned to a created variant and its sizes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedVariant {
    pub id: String,
    pub sizes: Vec<CreatedSize>,
}

/// A selectable product category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
}

/// Persistence backend for products, variants and sizes
pub trait InventoryService: Send + Sync {
    fn create_product(
        &self,
        product: &ProductInput,
    ) -> impl Future<Output = Result<ProductRef, ServiceError>> + Send;

    fn update_product(
        &self,
        id: &str,
        product: &ProductInput,
    ) -> impl Future<Output = Result<ProductRef, ServiceError>> + Send;

    fn create_variant(
        &self,
        product_id: &str,
        variant: &VariantInput,
    ) -> impl Future<Output = Result<CreatedVariant, ServiceError>> + Send;

    fn update_variant(
        &self,
        variant_id: &str,
        fields: &VariantFields,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    /// Removes the variant and every size under it
    fn delete_variant(&self, variant_id: &str)
    -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn add_sizes(
        &self,
        variant_id: &str,
        sizes: &[SizeStock],
    ) -> impl Future<Output = Result<Vec<CreatedSize>, ServiceError>> + Send;

    fn update_size_stock(
        &self,
        size_id: &str,
        stock: u32,
    ) -> impl Future<Output = Result<(), ServiceError>> + Send;

    fn delete_size(&self, size_id: &str) -> impl Future<Output = Result<(), ServiceError>> + Send;

    /// Current persisted state of a product, used as a draft baseline
    fn load_product(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<ProductSnapshot, ServiceError>> + Send;
}

/// Read-only source of selectable categories
pub trait CategoryDirectory: Send + Sync {
    fn list_categories(&self) -> impl Future<Output = Result<Vec<Category>, ServiceError>> + Send;
}
