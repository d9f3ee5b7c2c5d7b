//! In-memory inventory backend that records every call

use std::collections::HashSet;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::ProductSnapshot;
use crate::service::{
    CreatedSize, CreatedVariant, InventoryService, ProductInput, ProductRef, ServiceError,
    SizeStock, VariantFields, VariantInput,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CreateProduct {
        name: String,
    },
    UpdateProduct {
        id: String,
    },
    CreateVariant {
        product_id: String,
        color_name: String,
        sizes: Vec<SizeStock>,
    },
    UpdateVariant {
        variant_id: String,
        color_name: String,
    },
    DeleteVariant {
        variant_id: String,
    },
    AddSizes {
        variant_id: String,
        sizes: Vec<SizeStock>,
    },
    UpdateSizeStock {
        size_id: String,
        stock: u32,
    },
    DeleteSize {
        size_id: String,
    },
}

/// Records calls in order; operations named in `failing` return an error
#[derive(Debug, Default)]
pub struct RecordingService {
    calls: Mutex<Vec<Call>>,
    failing: HashSet<&'static str>,
    next_id: AtomicU64,
}

impl RecordingService {
    pub fn failing(ops: &[&'static str]) -> Self {
        Self {
            failing: ops.iter().copied().collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, call: Call) -> Result<(), ServiceError> {
        self.calls.lock().unwrap().push(call);
        if self.failing.contains(op) {
            return Err(ServiceError::Unavailable(format!("{} rejected", op)));
        }
        Ok(())
    }

    fn issue(&self, prefix: &str) -> String {
        format!("{}-{}", prefix, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

impl InventoryService for RecordingService {
    async fn create_product(&self, product: &ProductInput) -> Result<ProductRef, ServiceError> {
        self.record(
            "create_product",
            Call::CreateProduct {
                name: product.name.clone(),
            },
        )?;
        Ok(ProductRef {
            id: self.issue("product"),
            slug: product.name.to_lowercase().replace(' ', "-"),
        })
    }

    async fn update_product(
        &self,
        id: &str,
        product: &ProductInput,
    ) -> Result<ProductRef, ServiceError> {
        self.record("update_product", Call::UpdateProduct { id: id.to_string() })?;
        Ok(ProductRef {
            id: id.to_string(),
            slug: product.name.to_lowercase().replace(' ', "-"),
        })
    }

    async fn create_variant(
        &self,
        product_id: &str,
        variant: &VariantInput,
    ) -> Result<CreatedVariant, ServiceError> {
        self.record(
            "create_variant",
            Call::CreateVariant {
                product_id: product_id.to_string(),
                color_name: variant.fields.color_name.clone(),
                sizes: variant.sizes.clone(),
            },
        )?;
        Ok(CreatedVariant {
            id: self.issue("variant"),
            sizes: variant
                .sizes
                .iter()
                .map(|s| CreatedSize {
                    id: self.issue("size"),
                    code: s.code,
                })
                .collect(),
        })
    }

    async fn update_variant(
        &self,
        variant_id: &str,
        fields: &VariantFields,
    ) -> Result<(), ServiceError> {
        self.record(
            "update_variant",
            Call::UpdateVariant {
                variant_id: variant_id.to_string(),
                color_name: fields.color_name.clone(),
            },
        )
    }

    async fn delete_variant(&self, variant_id: &str) -> Result<(), ServiceError> {
        self.record(
            "delete_variant",
            Call::DeleteVariant {
                variant_id: variant_id.to_string(),
            },
        )
    }

    async fn add_sizes(
        &self,
        variant_id: &str,
        sizes: &[SizeStock],
    ) -> Result<Vec<CreatedSize>, ServiceError> {
        self.record(
            "add_sizes",
            Call::AddSizes {
                variant_id: variant_id.to_string(),
                sizes: sizes.to_vec(),
            },
        )?;
        Ok(sizes
            .iter()
            .map(|s| CreatedSize {
                id: self.issue("size"),
                code: s.code,
            })
            .collect())
    }

    async fn update_size_stock(&self, size_id: &str, stock: u32) -> Result<(), ServiceError> {
        self.record(
            "update_size_stock",
            Call::UpdateSizeStock {
                size_id: size_id.to_string(),
                stock,
            },
        )
    }

    async fn delete_size(&self, size_id: &str) -> Result<(), ServiceError> {
        self.record(
            "delete_size",
            Call::DeleteSize {
                size_id: size_id.to_string(),
            },
        )
    }

    async fn load_product(&self, id: &str) -> Result<ProductSnapshot, ServiceError> {
        Err(ServiceError::NotFound {
            entity: "product",
            id: id.to_string(),
        })
    }
}
