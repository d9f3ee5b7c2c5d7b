//! Editable variant graph of a single product
//!
//! Every mutation is a pure transform `(draft, action) -> draft`: `apply`
//! never touches the receiver, so a rejected action leaves the caller's
//! draft exactly as it was and a sequence of actions replays
//! deterministically. Locally created nodes get ids from a counter carried
//! in the draft itself.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::allocator;
use crate::color::{self, Classifier};
use crate::models::{
    Asset, ColorHex, Lifecycle, Product, ProductSnapshot, ProductStatus, SizeCode, SizeSlot,
    Variant,
};
use crate::reconcile::{Operation, OperationStatus, ReconciliationReport};
use crate::validate::{self, ValidationResult};

/// Errors raised by draft mutations. The draft is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("Variant not found: {0}")]
    VariantNotFound(String),

    #[error("Size not found: {0}")]
    SizeNotFound(String),

    #[error("Variant {0} has been removed")]
    VariantRemoved(String),

    #[error("Size {0} has been removed")]
    SizeRemoved(String),

    #[error("All sizes are already assigned for this color")]
    AllocationExhausted { variant_id: String },

    #[error("Size {code} is already assigned for this color")]
    CodeTaken { code: SizeCode },
}

/// Partial update of product fields; `None` leaves a field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub price: Option<Decimal>,
    #[serde(default)]
    pub discount_price: Option<Decimal>,
    #[serde(default)]
    pub category_id: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub status: Option<ProductStatus>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
    #[serde(default)]
    pub assets: Option<Vec<Asset>>,
}

/// A single user edit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DraftAction {
    AddVariant,
    RemoveVariant {
        variant_id: String,
    },
    AddSize {
        variant_id: String,
    },
    RemoveSize {
        variant_id: String,
        size_id: String,
    },
    EditVariantColor {
        variant_id: String,
        name: String,
        hex: ColorHex,
    },
    EditSizeStock {
        size_id: String,
        stock: u32,
    },
    EditSizeCode {
        variant_id: String,
        size_id: String,
        code: SizeCode,
    },
    EditProduct {
        patch: ProductPatch,
    },
}

/// The product being edited, its variants, and the baseline they were loaded from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VariantDraft {
    product: Product,
    #[serde(default)]
    variants: Vec<Variant>,
    #[serde(default)]
    baseline: Option<ProductSnapshot>,
    #[serde(default)]
    next_local_id: u64,
}

impl VariantDraft {
    /// Draft for a product that does not exist on the backend yet
    pub fn new(product: Product) -> Self {
        Self {
            product,
            variants: Vec::new(),
            baseline: None,
            next_local_id: 0,
        }
    }

    /// Draft seeded from persisted state; the snapshot becomes the baseline
    pub fn load(snapshot: ProductSnapshot) -> Self {
        let mut variants = snapshot.variants.clone();
        for variant in &mut variants {
            variant.lifecycle = Lifecycle::Persisted;
            for slot in &mut variant.sizes {
                slot.lifecycle = Lifecycle::Persisted;
            }
        }

        Self {
            product: snapshot.product.clone(),
            variants,
            baseline: Some(snapshot),
            next_local_id: 0,
        }
    }

    pub fn product(&self) -> &Product {
        &self.product
    }

    pub fn variants(&self) -> &[Variant] {
        &self.variants
    }

    pub fn variant(&self, id: &str) -> Option<&Variant> {
        self.variants.iter().find(|v| v.id == id)
    }

    pub fn active_variants(&self) -> impl Iterator<Item = &Variant> {
        self.variants.iter().filter(|v| v.is_active())
    }

    pub fn baseline(&self) -> Option<&ProductSnapshot> {
        self.baseline.as_ref()
    }

    /// Check the draft's completeness rules
    pub fn validate(&self) -> ValidationResult {
        validate::validate(&self.product, &self.variants)
    }

    /// Apply an action, returning the next draft
    pub fn apply(&self, action: DraftAction) -> Result<Self, DraftError> {
        let mut next = self.clone();
        next.reduce(action)?;
        Ok(next)
    }

    /// Append a new variant; returns the draft and the new variant's id
    pub fn add_variant(&self) -> (Self, String) {
        let mut next = self.clone();
        let id = next.push_variant();
        (next, id)
    }

    pub fn remove_variant(&self, variant_id: &str) -> Result<Self, DraftError> {
        self.apply(DraftAction::RemoveVariant {
            variant_id: variant_id.to_string(),
        })
    }

    /// Append a size with the first free code; returns the draft and the new size's id
    pub fn add_size(&self, variant_id: &str) -> Result<(Self, String), DraftError> {
        let mut next = self.clone();
        let id = next.push_size(variant_id)?;
        Ok((next, id))
    }

    pub fn remove_size(&self, variant_id: &str, size_id: &str) -> Result<Self, DraftError> {
        self.apply(DraftAction::RemoveSize {
            variant_id: variant_id.to_string(),
            size_id: size_id.to_string(),
        })
    }

    pub fn edit_variant_color(
        &self,
        variant_id: &str,
        name: &str,
        hex: ColorHex,
    ) -> Result<Self, DraftError> {
        self.apply(DraftAction::EditVariantColor {
            variant_id: variant_id.to_string(),
            name: name.to_string(),
            hex,
        })
    }

    /// Free-pick a color; the name comes from the classifier
    pub fn pick_color(
        &self,
        variant_id: &str,
        hex: ColorHex,
        classifier: &Classifier,
    ) -> Result<Self, DraftError> {
        let matched = classifier.classify(&hex);
        self.edit_variant_color(variant_id, &matched.name, matched.hex)
    }

    pub fn edit_size_stock(&self, size_id: &str, stock: u32) -> Result<Self, DraftError> {
        self.apply(DraftAction::EditSizeStock {
            size_id: size_id.to_string(),
            stock,
        })
    }

    /// Codes selectable for a slot (or for a new slot when `size_id` is `None`)
    pub fn available_codes(
        &self,
        variant_id: &str,
        size_id: Option<&str>,
    ) -> Result<Vec<SizeCode>, DraftError> {
        let variant = self.find_variant(variant_id)?;
        let current = match size_id {
            Some(id) => Some(
                variant
                    .size(id)
                    .ok_or_else(|| DraftError::SizeNotFound(id.to_string()))?
                    .code,
            ),
            None => None,
        };
        Ok(allocator::available_codes(variant, current))
    }

    fn reduce(&mut self, action: DraftAction) -> Result<(), DraftError> {
        match action {
            DraftAction::AddVariant => {
                self.push_variant();
            }
            DraftAction::RemoveVariant { variant_id } => {
                let index = self.variant_index(&variant_id)?;
                match self.variants[index].lifecycle {
                    Lifecycle::New => {
                        self.variants.remove(index);
                    }
                    _ => self.variants[index].lifecycle = Lifecycle::Deleted,
                }
            }
            DraftAction::AddSize { variant_id } => {
                self.push_size(&variant_id)?;
            }
            DraftAction::RemoveSize {
                variant_id,
                size_id,
            } => {
                let variant = self.find_variant_mut(&variant_id)?;
                let index = variant
                    .sizes
                    .iter()
                    .position(|s| s.id == size_id)
                    .ok_or(DraftError::SizeNotFound(size_id))?;
                match variant.sizes[index].lifecycle {
                    Lifecycle::New => {
                        variant.sizes.remove(index);
                    }
                    _ => variant.sizes[index].lifecycle = Lifecycle::Deleted,
                }
            }
            DraftAction::EditVariantColor {
                variant_id,
                name,
                hex,
            } => {
                let variant = self.find_active_variant_mut(&variant_id)?;
                variant.color_name = name;
                variant.color_hex = hex;
            }
            DraftAction::EditSizeStock { size_id, stock } => {
                let variant = self
                    .variants
                    .iter_mut()
                    .find(|v| v.size(&size_id).is_some())
                    .ok_or_else(|| DraftError::SizeNotFound(size_id.clone()))?;
                if !variant.is_active() {
                    return Err(DraftError::VariantRemoved(variant.id.clone()));
                }
                let slot = active_slot_mut(variant, &size_id)?;
                slot.stock = stock;
            }
            DraftAction::EditSizeCode {
                variant_id,
                size_id,
                code,
            } => {
                active_slot_mut(self.find_active_variant_mut(&variant_id)?, &size_id)?;
                let allowed = self.available_codes(&variant_id, Some(&size_id))?;
                if !allowed.contains(&code) {
                    return Err(DraftError::CodeTaken { code });
                }
                let variant = self.find_active_variant_mut(&variant_id)?;
                let slot = active_slot_mut(variant, &size_id)?;
                if slot.code == code {
                    return Ok(());
                }
                if slot.lifecycle == Lifecycle::New {
                    slot.code = code;
                    return Ok(());
                }

                // Sizes are keyed by code in the store, so a persisted slot
                // is deleted and re-added under the new code
                slot.lifecycle = Lifecycle::Deleted;
                let stock = slot.stock;
                let id = self.issue_id("size");
                let variant = self.find_variant_mut(&variant_id)?;
                variant.sizes.push(SizeSlot {
                    id,
                    variant_id,
                    code,
                    stock,
                    lifecycle: Lifecycle::New,
                });
            }
            DraftAction::EditProduct { patch } => self.patch_product(patch),
        }
        Ok(())
    }

    fn patch_product(&mut self, patch: ProductPatch) {
        let product = &mut self.product;
        if let Some(name) = patch.name {
            product.name = name;
        }
        if let Some(description) = patch.description {
            product.description = description;
        }
        if let Some(price) = patch.price {
            product.price = price;
        }
        if let Some(discount_price) = patch.discount_price {
            product.discount_price = discount_price;
        }
        if let Some(category_id) = patch.category_id {
            product.category_id = Some(category_id);
        }
        if let Some(sku) = patch.sku {
            product.sku = sku;
        }
        if let Some(status) = patch.status {
            product.status = status;
        }
        if let Some(tags) = patch.tags {
            product.tags = tags;
        }
        if let Some(assets) = patch.assets {
            product.assets = assets;
        }
    }

    fn push_variant(&mut self) -> String {
        let id = self.issue_id("variant");
        let color = color::default_color();
        let sizes = SizeCode::ALL
            .into_iter()
            .map(|code| SizeSlot {
                id: self.issue_id("size"),
                variant_id: id.clone(),
                code,
                stock: 0,
                lifecycle: Lifecycle::New,
            })
            .collect();

        self.variants.push(Variant {
            id: id.clone(),
            product_id: self.product.id.clone(),
            color_name: color.name,
            color_hex: color.hex,
            images: Vec::new(),
            sizes,
            lifecycle: Lifecycle::New,
        });
        id
    }

    fn push_size(&mut self, variant_id: &str) -> Result<String, DraftError> {
        let variant = self.find_variant(variant_id)?;
        if !variant.is_active() {
            return Err(DraftError::VariantRemoved(variant_id.to_string()));
        }
        let code =
            allocator::next_code(variant).ok_or_else(|| DraftError::AllocationExhausted {
                variant_id: variant_id.to_string(),
            })?;

        let id = self.issue_id("size");
        let variant = self.find_variant_mut(variant_id)?;
        variant.sizes.push(SizeSlot {
            id: id.clone(),
            variant_id: variant_id.to_string(),
            code,
            stock: 0,
            lifecycle: Lifecycle::New,
        });
        Ok(id)
    }

    /// Next unused local id. Skips ids already present so drafts read back
    /// from disk never collide.
    fn issue_id(&mut self, kind: &str) -> String {
        loop {
            self.next_local_id += 1;
            let id = format!("local-{}-{}", kind, self.next_local_id);
            if !self.contains_id(&id) {
                return id;
            }
        }
    }

    fn contains_id(&self, id: &str) -> bool {
        self.variants
            .iter()
            .any(|v| v.id == id || v.sizes.iter().any(|s| s.id == id))
    }

    fn variant_index(&self, id: &str) -> Result<usize, DraftError> {
        self.variants
            .iter()
            .position(|v| v.id == id)
            .ok_or_else(|| DraftError::VariantNotFound(id.to_string()))
    }

    fn find_variant(&self, id: &str) -> Result<&Variant, DraftError> {
        self.variant(id)
            .ok_or_else(|| DraftError::VariantNotFound(id.to_string()))
    }

    fn find_active_variant_mut(&mut self, id: &str) -> Result<&mut Variant, DraftError> {
        let variant = self.find_variant_mut(id)?;
        if !variant.is_active() {
            return Err(DraftError::VariantRemoved(id.to_string()));
        }
        Ok(variant)
    }

    fn find_variant_mut(&mut self, id: &str) -> Result<&mut Variant, DraftError> {
        self.variants
            .iter_mut()
            .find(|v| v.id == id)
            .ok_or_else(|| DraftError::VariantNotFound(id.to_string()))
    }

    /// Apply the lifecycle transitions of a finished pass.
    ///
    /// Created nodes take their backend ids and become persisted, deleted
    /// nodes whose delete succeeded leave the draft, and the baseline
    /// absorbs every successful operation. Nodes behind failed operations
    /// keep their state so the next pass retries them.
    pub fn settle(&self, report: &ReconciliationReport) -> Self {
        let Some(product_ref) = report.product() else {
            return self.clone();
        };

        let mut next = self.clone();
        next.product.id = Some(product_ref.id.clone());
        next.product.slug = Some(product_ref.slug.clone());

        let mut baseline = next.baseline.take().unwrap_or_else(|| ProductSnapshot {
            product: next.product.clone(),
            variants: Vec::new(),
        });
        baseline.product = next.product.clone();

        for outcome in report.outcomes() {
            match (&outcome.operation, &outcome.status) {
                (_, OperationStatus::Failed(_)) => {}
                (
                    Operation::CreateVariant { variant_id, .. },
                    OperationStatus::CreatedVariant(created),
                ) => {
                    if let Some(variant) = next.variants.iter_mut().find(|v| &v.id == variant_id)
                    {
                        variant.id = created.id.clone();
                        variant.lifecycle = Lifecycle::Persisted;
                        variant.sizes.retain(|s| s.lifecycle.is_active());
                        for slot in &mut variant.sizes {
                            if let Some(size) =
                                created.sizes.iter().find(|c| c.code == slot.code)
                            {
                                slot.id = size.id.clone();
                            }
                            slot.variant_id = created.id.clone();
                            slot.lifecycle = Lifecycle::Persisted;
                        }
                        baseline.variants.push(variant.clone());
                    }
                }
                (Operation::UpdateVariant { variant_id, fields }, _) => {
                    if let Some(previous) =
                        baseline.variants.iter_mut().find(|v| &v.id == variant_id)
                    {
                        previous.color_name = fields.color_name.clone();
                        previous.color_hex = fields.color_hex.clone();
                        previous.images = fields.images.clone();
                    }
                }
                (Operation::DeleteVariant { variant_id }, _) => {
                    next.variants.retain(|v| &v.id != variant_id);
                    baseline.variants.retain(|v| &v.id != variant_id);
                }
                (
                    Operation::AddSizes { variant_id, .. },
                    OperationStatus::CreatedSizes(created),
                ) => {
                    if let Some(variant) = next.variants.iter_mut().find(|v| &v.id == variant_id)
                    {
                        let mut promoted = Vec::new();
                        for slot in &mut variant.sizes {
                            if slot.lifecycle != Lifecycle::New {
                                continue;
                            }
                            if let Some(size) = created.iter().find(|c| c.code == slot.code) {
                                slot.id = size.id.clone();
                                slot.lifecycle = Lifecycle::Persisted;
                                promoted.push(slot.clone());
                            }
                        }
                        if let Some(previous) =
                            baseline.variants.iter_mut().find(|v| &v.id == variant_id)
                        {
                            previous.sizes.extend(promoted);
                        }
                    }
                }
                (
                    Operation::UpdateSizeStock {
                        variant_id,
                        size_id,
                        stock,
                    },
                    _,
                ) => {
                    if let Some(slot) = baseline
                        .variants
                        .iter_mut()
                        .filter(|v| &v.id == variant_id)
                        .flat_map(|v| v.sizes.iter_mut())
                        .find(|s| &s.id == size_id)
                    {
                        slot.stock = *stock;
                    }
                }
                (
                    Operation::DeleteSize {
                        variant_id,
                        size_id,
                    },
                    _,
                ) => {
                    for variant in next
                        .variants
                        .iter_mut()
                        .chain(baseline.variants.iter_mut())
                        .filter(|v| &v.id == variant_id)
                    {
                        variant.sizes.retain(|s| &s.id != size_id);
                    }
                }
                _ => {}
            }
        }

        for variant in &mut next.variants {
            variant.product_id = Some(product_ref.id.clone());
        }
        for variant in &mut baseline.variants {
            variant.product_id = Some(product_ref.id.clone());
        }

        next.baseline = Some(baseline);
        next
    }
}

fn active_slot_mut<'a>(
    variant: &'a mut Variant,
    size_id: &str,
) -> Result<&'a mut SizeSlot, DraftError> {
    let slot = variant
        .sizes
        .iter_mut()
        .find(|s| s.id == size_id)
        .ok_or_else(|| DraftError::SizeNotFound(size_id.to_string()))?;
    if !slot.lifecycle.is_active() {
        return Err(DraftError::SizeRemoved(size_id.to_string()));
    }
    Ok(slot)
}
