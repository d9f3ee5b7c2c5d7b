//! SQLite inventory store

use anyhow::Context;
use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::models::{ColorHex, Lifecycle, Product, ProductSnapshot, SizeCode, SizeSlot, Variant};
use crate::service::{
    Category, CategoryDirectory, CreatedSize, CreatedVariant, InventoryService, ProductInput,
    ProductRef, ServiceError, SizeStock, VariantFields, VariantInput,
};

/// Thread-safe database wrapper
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(path).context("Failed to open database")?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init()?;

        Ok(db)
    }

    /// Fresh database that lives as long as the value
    pub fn open_in_memory() -> Result<Self, ServiceError> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.init()?;
        Ok(db)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, ServiceError> {
        self.conn
            .lock()
            .map_err(|_| ServiceError::Unavailable("database lock poisoned".into()))
    }

    /// Initialize the database schema
    fn init(&self) -> Result<(), ServiceError> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS categories (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS products (
                id TEXT PRIMARY KEY,
                slug TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                description TEXT NOT NULL,
                price TEXT NOT NULL,
                discount_price TEXT NOT NULL,
                category_id TEXT,
                sku TEXT NOT NULL,
                status TEXT NOT NULL DEFAULT 'DRAFT',
                tags TEXT NOT NULL DEFAULT '[]',
                assets TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (category_id) REFERENCES categories(id)
            );

            CREATE TABLE IF NOT EXISTS variants (
                id TEXT PRIMARY KEY,
                product_id TEXT NOT NULL,
                color_name TEXT NOT NULL,
                color_hex TEXT NOT NULL,
                images TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                FOREIGN KEY (product_id) REFERENCES products(id) ON DELETE CASCADE
            );

            CREATE TABLE IF NOT EXISTS sizes (
                id TEXT PRIMARY KEY,
                variant_id TEXT NOT NULL,
                code TEXT NOT NULL,
                stock INTEGER NOT NULL DEFAULT 0,
                updated_at TEXT NOT NULL,
                UNIQUE (variant_id, code),
                FOREIGN KEY (variant_id) REFERENCES variants(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_products_sku ON products(sku);
            CREATE INDEX IF NOT EXISTS idx_variants_product ON variants(product_id);
            CREATE INDEX IF NOT EXISTS idx_sizes_variant ON sizes(variant_id);
            "#,
        )?;

        Ok(())
    }

    /// Register a category and return it
    pub fn add_category(&self, name: &str) -> Result<Category, ServiceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ServiceError::Invalid("category name is empty".into()));
        }

        let conn = self.conn()?;
        let category = Category {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
        };
        conn.execute(
            "INSERT INTO categories (id, name, created_at) VALUES (?1, ?2, ?3)",
            params![&category.id, &category.name, Utc::now().to_rfc3339()],
        )?;

        Ok(category)
    }

    fn insert_product(&self, product: &ProductInput) -> Result<ProductRef, ServiceError> {
        let conn = self.conn()?;
        let id = Uuid::new_v4().to_string();
        let slug = format!("{}-{}", slugify(&product.name), &id[..8]);
        let now = Utc::now().to_rfc3339();

        conn.execute(
            r#"INSERT INTO products (id, slug, name, description, price, discount_price,
               category_id, sku, status, tags, assets, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?12)"#,
            params![
                &id,
                &slug,
                &product.name,
                &product.description,
                product.price.to_string(),
                product.discount_price.to_string(),
                &product.category_id,
                &product.sku,
                product.status.as_str(),
                serde_json::to_string(&product.tags)?,
                serde_json::to_string(&product.assets)?,
                &now,
            ],
        )?;

        tracing::debug!(product_id = %id, slug = %slug, "Product created");
        Ok(ProductRef { id, slug })
    }

    fn write_product(&self, id: &str, product: &ProductInput) -> Result<ProductRef, ServiceError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"UPDATE products SET name = ?2, description = ?3, price = ?4, discount_price = ?5,
               category_id = ?6, sku = ?7, status = ?8, tags = ?9, assets = ?10, updated_at = ?11
               WHERE id = ?1"#,
            params![
                id,
                &product.name,
                &product.description,
                product.price.to_string(),
                product.discount_price.to_string(),
                &product.category_id,
                &product.sku,
                product.status.as_str(),
                serde_json::to_string(&product.tags)?,
                serde_json::to_string(&product.assets)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        if updated == 0 {
            return Err(not_found("product", id));
        }

        let slug: String = conn.query_row(
            "SELECT slug FROM products WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
        Ok(ProductRef {
            id: id.to_string(),
            slug,
        })
    }

    fn insert_variant(
        &self,
        product_id: &str,
        variant: &VariantInput,
    ) -> Result<CreatedVariant, ServiceError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let exists: Option<String> = tx
            .query_row(
                "SELECT id FROM products WHERE id = ?1",
                params![product_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(not_found("product", product_id));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now().to_rfc3339();
        tx.execute(
            r#"INSERT INTO variants (id, product_id, color_name, color_hex, images, created_at, updated_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)"#,
            params![
                &id,
                product_id,
                &variant.fields.color_name,
                variant.fields.color_hex.as_str(),
                serde_json::to_string(&variant.fields.images)?,
                &now,
            ],
        )?;
        let sizes = insert_sizes(&tx, &id, &variant.sizes, &now)?;
        tx.commit()?;

        Ok(CreatedVariant { id, sizes })
    }

    fn write_variant(&self, variant_id: &str, fields: &VariantFields) -> Result<(), ServiceError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            r#"UPDATE variants SET color_name = ?2, color_hex = ?3, images = ?4, updated_at = ?5
               WHERE id = ?1"#,
            params![
                variant_id,
                &fields.color_name,
                fields.color_hex.as_str(),
                serde_json::to_string(&fields.images)?,
                Utc::now().to_rfc3339(),
            ],
        )?;
        if updated == 0 {
            return Err(not_found("variant", variant_id));
        }
        Ok(())
    }

    fn remove_variant(&self, variant_id: &str) -> Result<(), ServiceError> {
        let conn = self.conn()?;
        // Sizes go with it through the cascade
        let deleted = conn.execute("DELETE FROM variants WHERE id = ?1", params![variant_id])?;
        if deleted == 0 {
            return Err(not_found("variant", variant_id));
        }
        Ok(())
    }

    fn append_sizes(
        &self,
        variant_id: &str,
        sizes: &[SizeStock],
    ) -> Result<Vec<CreatedSize>, ServiceError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let exists: Option<String> = tx
            .query_row(
                "SELECT id FROM variants WHERE id = ?1",
                params![variant_id],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(not_found("variant", variant_id));
        }

        let created = insert_sizes(&tx, variant_id, sizes, &Utc::now().to_rfc3339())?;
        tx.commit()?;
        Ok(created)
    }

    fn write_stock(&self, size_id: &str, stock: u32) -> Result<(), ServiceError> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE sizes SET stock = ?2, updated_at = ?3 WHERE id = ?1",
            params![size_id, stock, Utc::now().to_rfc3339()],
        )?;
        if updated == 0 {
            return Err(not_found("size", size_id));
        }
        Ok(())
    }

    fn remove_size(&self, size_id: &str) -> Result<(), ServiceError> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM sizes WHERE id = ?1", params![size_id])?;
        if deleted == 0 {
            return Err(not_found("size", size_id));
        }
        Ok(())
    }

    /// Read a product with all of its variants and sizes
    pub fn snapshot(&self, id: &str) -> Result<ProductSnapshot, ServiceError> {
        let conn = self.conn()?;

        let product = conn
            .query_row(
                r#"SELECT id, slug, name, description, price, discount_price, category_id, sku,
                   status, tags, assets FROM products WHERE id = ?1"#,
                params![id],
                product_from_row,
            )
            .optional()?
            .ok_or_else(|| not_found("product", id))?;

        let mut stmt = conn.prepare(
            r#"SELECT id, product_id, color_name, color_hex, images FROM variants
               WHERE product_id = ?1 ORDER BY created_at, rowid"#,
        )?;
        let mut variants = stmt
            .query_map(params![id], variant_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        let mut size_stmt = conn.prepare(
            "SELECT id, variant_id, code, stock FROM sizes WHERE variant_id = ?1 ORDER BY code",
        )?;
        for variant in &mut variants {
            variant.sizes = size_stmt
                .query_map(params![&variant.id], size_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
        }

        Ok(ProductSnapshot { product, variants })
    }

    /// All categories, by name
    pub fn categories(&self) -> Result<Vec<Category>, ServiceError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT id, name FROM categories ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok(Category {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?;

        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }
}

fn insert_sizes(
    conn: &Connection,
    variant_id: &str,
    sizes: &[SizeStock],
    now: &str,
) -> Result<Vec<CreatedSize>, ServiceError> {
    let mut created = Vec::with_capacity(sizes.len());
    for size in sizes {
        let id = Uuid::new_v4().to_string();
        conn.execute(
            "INSERT INTO sizes (id, variant_id, code, stock, updated_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![&id, variant_id, size.code.as_str(), size.stock, now],
        )?;
        created.push(CreatedSize {
            id,
            code: size.code,
        });
    }
    Ok(created)
}

fn not_found(entity: &'static str, id: &str) -> ServiceError {
    ServiceError::NotFound {
        entity,
        id: id.to_string(),
    }
}

/// Lower-case, dash-separated form of a product name
fn slugify(name: &str) -> String {
    let slug = name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect::<Vec<_>>()
        .join("-");
    if slug.is_empty() {
        "product".to_string()
    } else {
        slug
    }
}

fn conversion_error(
    idx: usize,
    err: impl Into<Box<dyn std::error::Error + Send + Sync>>,
) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn parsed_column<T>(row: &Row, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion_error(idx, e))
}

fn json_column<T: DeserializeOwned>(row: &Row, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn product_from_row(row: &Row) -> rusqlite::Result<Product> {
    Ok(Product {
        id: Some(row.get(0)?),
        slug: Some(row.get(1)?),
        name: row.get(2)?,
        description: row.get(3)?,
        price: parsed_column::<Decimal>(row, 4)?,
        discount_price: parsed_column::<Decimal>(row, 5)?,
        category_id: row.get(6)?,
        sku: row.get(7)?,
        status: parsed_column(row, 8)?,
        tags: json_column(row, 9)?,
        assets: json_column(row, 10)?,
    })
}

fn variant_from_row(row: &Row) -> rusqlite::Result<Variant> {
    Ok(Variant {
        id: row.get(0)?,
        product_id: Some(row.get(1)?),
        color_name: row.get(2)?,
        color_hex: parsed_column::<ColorHex>(row, 3)?,
        images: json_column(row, 4)?,
        sizes: Vec::new(), // Filled by the caller
        lifecycle: Lifecycle::Persisted,
    })
}

fn size_from_row(row: &Row) -> rusqlite::Result<SizeSlot> {
    Ok(SizeSlot {
        id: row.get(0)?,
        variant_id: row.get(1)?,
        code: parsed_column::<SizeCode>(row, 2)?,
        stock: row.get(3)?,
        lifecycle: Lifecycle::Persisted,
    })
}

impl InventoryService for Database {
    async fn create_product(&self, product: &ProductInput) -> Result<ProductRef, ServiceError> {
        self.insert_product(product)
    }

    async fn update_product(
        &self,
        id: &str,
        product: &ProductInput,
    ) -> Result<ProductRef, ServiceError> {
        self.write_product(id, product)
    }

    async fn create_variant(
        &self,
        product_id: &str,
        variant: &VariantInput,
    ) -> Result<CreatedVariant, ServiceError> {
        self.insert_variant(product_id, variant)
    }

    async fn update_variant(
        &self,
        variant_id: &str,
        fields: &VariantFields,
    ) -> Result<(), ServiceError> {
        self.write_variant(variant_id, fields)
    }

    async fn delete_variant(&self, variant_id: &str) -> Result<(), ServiceError> {
        self.remove_variant(variant_id)
    }

    async fn add_sizes(
        &self,
        variant_id: &str,
        sizes: &[SizeStock],
    ) -> Result<Vec<CreatedSize>, ServiceError> {
        self.append_sizes(variant_id, sizes)
    }

    async fn update_size_stock(&self, size_id: &str, stock: u32) -> Result<(), ServiceError> {
        self.write_stock(size_id, stock)
    }

    async fn delete_size(&self, size_id: &str) -> Result<(), ServiceError> {
        self.remove_size(size_id)
    }

    async fn load_product(&self, id: &str) -> Result<ProductSnapshot, ServiceError> {
        self.snapshot(id)
    }
}

impl CategoryDirectory for Database {
    async fn list_categories(&self) -> Result<Vec<Category>, ServiceError> {
        self.categories()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Asset, ProductStatus};
    use assert_matches::assert_matches;

    fn input(category_id: Option<String>) -> ProductInput {
        ProductInput {
            name: "Linen Shirt".into(),
            description: "Breathable".into(),
            price: Decimal::new(2999, 2),
            discount_price: Decimal::new(2499, 2),
            category_id,
            sku: "LS-001".into(),
            status: ProductStatus::Published,
            tags: vec!["summer".into(), "linen".into()],
            assets: vec![Asset::image("https://cdn.example.com/a.jpg")],
        }
    }

    fn red(sizes: Vec<SizeStock>) -> VariantInput {
        VariantInput {
            fields: VariantFields {
                color_name: "Red".into(),
                color_hex: "FF0000".parse().unwrap(),
                images: Vec::new(),
            },
            sizes,
        }
    }

    #[test]
    fn slugify_collapses_punctuation() {
        assert_eq!(slugify("  Linen Shirt (Slim) "), "linen-shirt-slim");
        assert_eq!(slugify("!!!"), "product");
    }

    #[tokio::test]
    async fn product_round_trips_through_snapshot() {
        let db = Database::open_in_memory().unwrap();
        let category = db.add_category("Shirts").unwrap();
        let created = db.create_product(&input(Some(category.id.clone()))).await.unwrap();
        assert!(created.slug.starts_with("linen-shirt-"));

        let variant = db
            .create_variant(
                &created.id,
                &red(vec![
                    SizeStock {
                        code: SizeCode::Size40,
                        stock: 2,
                    },
                    SizeStock {
                        code: SizeCode::Size36,
                        stock: 1,
                    },
                ]),
            )
            .await
            .unwrap();
        assert_eq!(variant.sizes.len(), 2);

        let snapshot = db.load_product(&created.id).await.unwrap();
        assert_eq!(snapshot.product.price, Decimal::new(2999, 2));
        assert_eq!(snapshot.product.category_id, Some(category.id));
        assert_eq!(snapshot.product.tags, vec!["summer", "linen"]);
        assert_eq!(snapshot.variants.len(), 1);
        let codes: Vec<_> = snapshot.variants[0].sizes.iter().map(|s| s.code).collect();
        assert_eq!(codes, vec![SizeCode::Size36, SizeCode::Size40]);
    }

    #[tokio::test]
    async fn duplicate_size_code_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        let product = db.create_product(&input(None)).await.unwrap();
        let size = SizeStock {
            code: SizeCode::Size38,
            stock: 1,
        };
        let variant = db.create_variant(&product.id, &red(vec![size])).await.unwrap();

        let result = db.add_sizes(&variant.id, &[size]).await;
        assert_matches!(result, Err(ServiceError::Storage(_)));
    }

    #[tokio::test]
    async fn deleting_variant_removes_its_sizes() {
        let db = Database::open_in_memory().unwrap();
        let product = db.create_product(&input(None)).await.unwrap();
        let variant = db
            .create_variant(
                &product.id,
                &red(vec![SizeStock {
                    code: SizeCode::Size42,
                    stock: 4,
                }]),
            )
            .await
            .unwrap();

        db.delete_variant(&variant.id).await.unwrap();
        let result = db.update_size_stock(&variant.sizes[0].id, 1).await;
        assert_matches!(result, Err(ServiceError::NotFound { entity: "size", .. }));
    }

    #[tokio::test]
    async fn missing_rows_report_not_found() {
        let db = Database::open_in_memory().unwrap();
        assert_matches!(
            db.update_product("nope", &input(None)).await,
            Err(ServiceError::NotFound { entity: "product", .. })
        );
        assert_matches!(
            db.delete_size("nope").await,
            Err(ServiceError::NotFound { entity: "size", .. })
        );
        assert_matches!(
            db.create_variant("nope", &red(Vec::new())).await,
            Err(ServiceError::NotFound { entity: "product", .. })
        );
    }

    #[tokio::test]
    async fn categories_are_listed_by_name() {
        let db = Database::open_in_memory().unwrap();
        db.add_category("Trousers").unwrap();
        db.add_category("Dresses").unwrap();
        let names: Vec<_> = db
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["Dresses", "Trousers"]);
        assert!(db.add_category("  ").is_err());
    }
}
