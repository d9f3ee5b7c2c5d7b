//! Product inventory data model (shared between the draft, the engine and the store)
//!
//! Ids are opaque strings: client-generated tokens for nodes that only exist
//! in a draft, backend UUIDs once persisted.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Publication status of a product
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProductStatus {
    #[default]
    Draft,
    Published,
}

impl ProductStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductStatus::Draft => "DRAFT",
            ProductStatus::Published => "PUBLISHED",
        }
    }
}

impl FromStr for ProductStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DRAFT" => Ok(ProductStatus::Draft),
            "PUBLISHED" => Ok(ProductStatus::Published),
            other => Err(format!("unknown product status '{}'", other)),
        }
    }
}

/// Kind of media attached to a product or variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MediaType {
    #[default]
    Image,
    Video,
}

/// An image or video reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    pub url: String,
    #[serde(default)]
    pub media_type: MediaType,
}

impl Asset {
    pub fn image(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            media_type: MediaType::Image,
        }
    }
}

/// Product-level fields of the edit form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Backend id, `None` until the first synchronization
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// MRP
    pub price: Decimal,
    /// Selling price
    #[serde(default)]
    pub discount_price: Decimal,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub sku: String,
    #[serde(default)]
    pub status: ProductStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub assets: Vec<Asset>,
}

/// Size codes, ordered ascending
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SizeCode {
    #[serde(rename = "SIZE_36")]
    Size36,
    #[serde(rename = "SIZE_38")]
    Size38,
    #[serde(rename = "SIZE_40")]
    Size40,
    #[serde(rename = "SIZE_42")]
    Size42,
    #[serde(rename = "SIZE_44")]
    Size44,
    #[serde(rename = "SIZE_46")]
    Size46,
}

impl SizeCode {
    /// Every size code in ascending order
    pub const ALL: [SizeCode; 6] = [
        SizeCode::Size36,
        SizeCode::Size38,
        SizeCode::Size40,
        SizeCode::Size42,
        SizeCode::Size44,
        SizeCode::Size46,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SizeCode::Size36 => "SIZE_36",
            SizeCode::Size38 => "SIZE_38",
            SizeCode::Size40 => "SIZE_40",
            SizeCode::Size42 => "SIZE_42",
            SizeCode::Size44 => "SIZE_44",
            SizeCode::Size46 => "SIZE_46",
        }
    }
}

impl fmt::Display for SizeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SizeCode {
    type Err = String;

    /// Accepts both `SIZE_40` and the bare `40`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let bare = upper.strip_prefix("SIZE_").unwrap_or(&upper);
        SizeCode::ALL
            .into_iter()
            .find(|code| &code.as_str()[5..] == bare)
            .ok_or_else(|| format!("unknown size code '{}'", s))
    }
}

/// Error returned when parsing a color hex string
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid color hex '{0}': expected 6 hex digits")]
pub struct ColorHexError(pub String);

/// Canonical color value: six upper-case hex digits, no `#`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ColorHex(String);

impl ColorHex {
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        Self(format!("{:02X}{:02X}{:02X}", r, g, b))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode into an (r, g, b) triple
    pub fn rgb(&self) -> (u8, u8, u8) {
        // Validated on construction
        let channel = |i: usize| u8::from_str_radix(&self.0[i..i + 2], 16).unwrap_or(0);
        (channel(0), channel(2), channel(4))
    }
}

impl FromStr for ColorHex {
    type Err = ColorHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().trim_start_matches('#');
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorHexError(s.to_string()));
        }
        Ok(Self(digits.to_ascii_uppercase()))
    }
}

impl TryFrom<String> for ColorHex {
    type Error = ColorHexError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ColorHex> for String {
    fn from(hex: ColorHex) -> Self {
        hex.0
    }
}

impl fmt::Display for ColorHex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where a draft node stands relative to the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifecycle {
    /// Created locally, never transmitted
    #[default]
    New,
    /// Known to the backend
    Persisted,
    /// Persisted, removed locally, awaiting a backend delete
    Deleted,
}

impl Lifecycle {
    pub fn is_active(&self) -> bool {
        !matches!(self, Lifecycle::Deleted)
    }
}

/// One (size code, stock) pairing under a variant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizeSlot {
    pub id: String,
    pub variant_id: String,
    pub code: SizeCode,
    pub stock: u32,
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

/// A color option of a product
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub id: String,
    #[serde(default)]
    pub product_id: Option<String>,
    pub color_name: String,
    pub color_hex: ColorHex,
    #[serde(default)]
    pub images: Vec<Asset>,
    #[serde(default)]
    pub sizes: Vec<SizeSlot>,
    #[serde(default)]
    pub lifecycle: Lifecycle,
}

impl Variant {
    pub fn is_active(&self) -> bool {
        self.lifecycle.is_active()
    }

    /// Size slots that are not pending deletion
    pub fn active_sizes(&self) -> impl Iterator<Item = &SizeSlot> {
        self.sizes.iter().filter(|s| s.lifecycle.is_active())
    }

    pub fn size(&self, size_id: &str) -> Option<&SizeSlot> {
        self.sizes.iter().find(|s| s.id == size_id)
    }
}

/// A persisted product and its variants, as last loaded from the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub product: Product,
    #[serde(default)]
    pub variants: Vec<Variant>,
}

impl ProductSnapshot {
    pub fn variant(&self, id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }
}
