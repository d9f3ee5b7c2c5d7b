//! Reconciliation of a draft against the backend
//!
//! A pass is planned up front as a pure diff of the draft against its
//! baseline, then executed against an [`InventoryService`]. The product
//! anchor always resolves first since every variant operation needs its id.
//! After that each operation is awaited in plan order and its result is
//! recorded; a failure never stops or rolls back the operations after it.

use serde::{Deserialize, Serialize};

use crate::draft::VariantDraft;
use crate::models::{Lifecycle, ProductSnapshot, Variant};
use crate::service::{
    CreatedSize, CreatedVariant, InventoryService, ProductInput, ProductRef, SizeStock,
    VariantFields, VariantInput,
};
use crate::validate::{FieldErrors, ValidationResult};

/// Tuning for a reconciliation pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOptions {
    /// Skip persisted variants and sizes whose fields match the baseline
    #[serde(default)]
    pub skip_unchanged: bool,
}

/// The first call of every pass: creates or updates the product
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum AnchorOp {
    CreateProduct { product: ProductInput },
    UpdateProduct { id: String, product: ProductInput },
}

impl AnchorOp {
    pub fn name(&self) -> &'static str {
        match self {
            AnchorOp::CreateProduct { .. } => "create_product",
            AnchorOp::UpdateProduct { .. } => "update_product",
        }
    }
}

/// A variant or size level backend call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
    CreateVariant {
        /// Draft-local id, replaced once the backend answers
        variant_id: String,
        variant: VariantInput,
    },
    UpdateVariant {
        variant_id: String,
        fields: VariantFields,
    },
    DeleteVariant {
        variant_id: String,
    },
    AddSizes {
        variant_id: String,
        sizes: Vec<SizeStock>,
    },
    UpdateSizeStock {
        variant_id: String,
        size_id: String,
        stock: u32,
    },
    DeleteSize {
        variant_id: String,
        size_id: String,
    },
}

impl Operation {
    pub fn name(&self) -> &'static str {
        match self {
            Operation::CreateVariant { .. } => "create_variant",
            Operation::UpdateVariant { .. } => "update_variant",
            Operation::DeleteVariant { .. } => "delete_variant",
            Operation::AddSizes { .. } => "add_sizes",
            Operation::UpdateSizeStock { .. } => "update_size_stock",
            Operation::DeleteSize { .. } => "delete_size",
        }
    }

    pub fn variant_id(&self) -> &str {
        match self {
            Operation::CreateVariant { variant_id, .. }
            | Operation::UpdateVariant { variant_id, .. }
            | Operation::DeleteVariant { variant_id }
            | Operation::AddSizes { variant_id, .. }
            | Operation::UpdateSizeStock { variant_id, .. }
            | Operation::DeleteSize { variant_id, .. } => variant_id,
        }
    }
}

/// Every call a pass will make, in dispatch order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPlan {
    pub anchor: AnchorOp,
    pub operations: Vec<Operation>,
}

/// What happened to one operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum OperationStatus {
    Done,
    CreatedVariant(CreatedVariant),
    CreatedSizes(Vec<CreatedSize>),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationOutcome {
    pub operation: Operation,
    pub status: OperationStatus,
}

impl OperationOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self.status, OperationStatus::Failed(_))
    }
}

/// Aggregate result of a reconciliation pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum ReconciliationReport {
    /// Anchor and every operation succeeded
    Success {
        product: ProductRef,
        outcomes: Vec<OperationOutcome>,
    },
    /// Anchor succeeded, at least one operation failed
    PartialFailure {
        product: ProductRef,
        outcomes: Vec<OperationOutcome>,
    },
    /// Anchor failed, nothing else was attempted
    Fatal { anchor: AnchorOp, error: String },
}

impl ReconciliationReport {
    pub fn is_success(&self) -> bool {
        matches!(self, ReconciliationReport::Success { .. })
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, ReconciliationReport::Fatal { .. })
    }

    /// The anchored product, unless the pass was fatal
    pub fn product(&self) -> Option<&ProductRef> {
        match self {
            ReconciliationReport::Success { product, .. }
            | ReconciliationReport::PartialFailure { product, .. } => Some(product),
            ReconciliationReport::Fatal { .. } => None,
        }
    }

    pub fn outcomes(&self) -> &[OperationOutcome] {
        match self {
            ReconciliationReport::Success { outcomes, .. }
            | ReconciliationReport::PartialFailure { outcomes, .. } => outcomes,
            ReconciliationReport::Fatal { .. } => &[],
        }
    }

    /// Operations that need a retry
    pub fn failed(&self) -> impl Iterator<Item = &OperationOutcome> {
        self.outcomes().iter().filter(|o| o.is_failure())
    }
}

/// Errors that prevent a pass from starting
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Draft is invalid: {} field(s) need attention", .0.len())]
    Invalid(FieldErrors),
}

/// Diff the draft against the baseline
pub fn plan(
    draft: &VariantDraft,
    baseline: Option<&ProductSnapshot>,
    options: SyncOptions,
) -> SyncPlan {
    let product = ProductInput::from(draft.product());
    let anchor = match &draft.product().id {
        Some(id) => AnchorOp::UpdateProduct {
            id: id.clone(),
            product,
        },
        None => AnchorOp::CreateProduct { product },
    };

    let mut operations = Vec::new();
    for variant in draft.variants() {
        let previous = baseline.and_then(|b| b.variant(&variant.id));
        plan_variant(variant, previous, options, &mut operations);
    }

    SyncPlan { anchor, operations }
}

fn plan_variant(
    variant: &Variant,
    previous: Option<&Variant>,
    options: SyncOptions,
    operations: &mut Vec<Operation>,
) {
    let variant_id = variant.id.clone();

    match variant.lifecycle {
        Lifecycle::New => {
            let sizes = variant
                .active_sizes()
                .map(|slot| SizeStock {
                    code: slot.code,
                    stock: slot.stock,
                })
                .collect();
            operations.push(Operation::CreateVariant {
                variant_id,
                variant: VariantInput {
                    fields: VariantFields::from(variant),
                    sizes,
                },
            });
        }
        Lifecycle::Deleted => {
            operations.push(Operation::DeleteVariant { variant_id });
        }
        Lifecycle::Persisted => {
            let fields = VariantFields::from(variant);
            let unchanged = options.skip_unchanged
                && previous.is_some_and(|p| VariantFields::from(p) == fields);
            if !unchanged {
                operations.push(Operation::UpdateVariant {
                    variant_id: variant_id.clone(),
                    fields,
                });
            }

            let mut added = Vec::new();
            for slot in &variant.sizes {
                match slot.lifecycle {
                    Lifecycle::New => added.push(SizeStock {
                        code: slot.code,
                        stock: slot.stock,
                    }),
                    Lifecycle::Deleted => operations.push(Operation::DeleteSize {
                        variant_id: variant_id.clone(),
                        size_id: slot.id.clone(),
                    }),
                    Lifecycle::Persisted => {
                        let unchanged = options.skip_unchanged
                            && previous
                                .and_then(|p| p.size(&slot.id))
                                .is_some_and(|p| p.stock == slot.stock);
                        if !unchanged {
                            operations.push(Operation::UpdateSizeStock {
                                variant_id: variant_id.clone(),
                                size_id: slot.id.clone(),
                                stock: slot.stock,
                            });
                        }
                    }
                }
            }

            if !added.is_empty() {
                operations.push(Operation::AddSizes {
                    variant_id,
                    sizes: added,
                });
            }
        }
    }
}

/// Run a plan against the backend
pub async fn execute<S: InventoryService>(service: &S, plan: SyncPlan) -> ReconciliationReport {
    let anchored = match &plan.anchor {
        AnchorOp::CreateProduct { product } => service.create_product(product).await,
        AnchorOp::UpdateProduct { id, product } => service.update_product(id, product).await,
    };

    let product = match anchored {
        Ok(product) => product,
        Err(e) => {
            tracing::error!(op = plan.anchor.name(), error = %e, "Product anchor failed");
            return ReconciliationReport::Fatal {
                anchor: plan.anchor,
                error: e.to_string(),
            };
        }
    };

    tracing::info!(
        product_id = %product.id,
        op = plan.anchor.name(),
        operations = plan.operations.len(),
        "Product anchored"
    );

    let mut outcomes = Vec::with_capacity(plan.operations.len());
    for operation in plan.operations {
        let status = dispatch(service, &product.id, &operation).await;
        if let OperationStatus::Failed(error) = &status {
            tracing::warn!(
                op = operation.name(),
                variant_id = %operation.variant_id(),
                error = %error,
                "Operation failed"
            );
        }
        outcomes.push(OperationOutcome { operation, status });
    }

    let failures = outcomes.iter().filter(|o| o.is_failure()).count();
    tracing::info!(
        product_id = %product.id,
        operations = outcomes.len(),
        failures,
        "Reconciliation complete"
    );

    if failures == 0 {
        ReconciliationReport::Success { product, outcomes }
    } else {
        ReconciliationReport::PartialFailure { product, outcomes }
    }
}

async fn dispatch<S: InventoryService>(
    service: &S,
    product_id: &str,
    operation: &Operation,
) -> OperationStatus {
    let result = match operation {
        Operation::CreateVariant { variant, .. } => service
            .create_variant(product_id, variant)
            .await
            .map(OperationStatus::CreatedVariant),
        Operation::UpdateVariant { variant_id, fields } => service
            .update_variant(variant_id, fields)
            .await
            .map(|_| OperationStatus::Done),
        Operation::DeleteVariant { variant_id } => service
            .delete_variant(variant_id)
            .await
            .map(|_| OperationStatus::Done),
        Operation::AddSizes { variant_id, sizes } => service
            .add_sizes(variant_id, sizes)
            .await
            .map(OperationStatus::CreatedSizes),
        Operation::UpdateSizeStock { size_id, stock, .. } => service
            .update_size_stock(size_id, *stock)
            .await
            .map(|_| OperationStatus::Done),
        Operation::DeleteSize { size_id, .. } => service
            .delete_size(size_id)
            .await
            .map(|_| OperationStatus::Done),
    };

    result.unwrap_or_else(|e| OperationStatus::Failed(e.to_string()))
}

/// Plan and execute a pass for `draft` against `baseline`
pub async fn synchronize<S: InventoryService>(
    service: &S,
    draft: &VariantDraft,
    baseline: Option<&ProductSnapshot>,
    options: SyncOptions,
) -> ReconciliationReport {
    execute(service, plan(draft, baseline, options)).await
}

/// Validate, synchronize and settle a draft in one step.
///
/// Returns the report together with the settled draft, whose remaining
/// pending nodes are exactly the operations that failed.
pub async fn save<S: InventoryService>(
    service: &S,
    draft: &VariantDraft,
    options: SyncOptions,
) -> Result<(ReconciliationReport, VariantDraft), SyncError> {
    if let ValidationResult::Invalid(errors) = draft.validate() {
        tracing::info!(fields = errors.len(), "Draft rejected by validation");
        return Err(SyncError::Invalid(errors));
    }

    let report = synchronize(service, draft, draft.baseline(), options).await;
    let settled = draft.settle(&report);
    Ok((report, settled))
}
