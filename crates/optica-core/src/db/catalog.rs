//! Catalog database operations (materials and products).

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbResult};
use crate::models::{Material, Product};

impl Database {
    /// Insert or update a material.
    pub fn upsert_material(&self, material: &Material) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO materials (id, description, brand, active)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(id) DO UPDATE SET
                description = excluded.description,
                brand = excluded.brand,
                active = excluded.active
            "#,
            params![
                material.id,
                material.description,
                material.brand,
                material.active,
            ],
        )?;
        Ok(())
    }

    /// Get a material by ID.
    pub fn get_material(&self, id: &str) -> DbResult<Option<Material>> {
        self.conn
            .query_row(
                "SELECT id, description, brand, active FROM materials WHERE id = ?",
                [id],
                material_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// List materials ordered by description.
    pub fn list_materials(&self, active_only: bool) -> DbResult<Vec<Material>> {
        let sql = if active_only {
            "SELECT id, description, brand, active FROM materials WHERE active = 1 ORDER BY description"
        } else {
            "SELECT id, description, brand, active FROM materials ORDER BY description"
        };

        let mut stmt = self.conn.prepare(sql)?;
        let materials = stmt
            .query_map([], material_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(materials)
    }

    /// Insert or update a product. A SKU already used by another product is a conflict.
    pub fn upsert_product(&self, product: &Product) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO products (id, sku, name, category, active)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(id) DO UPDATE SET
                sku = excluded.sku,
                name = excluded.name,
                category = excluded.category,
                active = excluded.active
            "#,
            params![
                product.id,
                product.sku,
                product.name,
                product.category,
                product.active,
            ],
        )?;
        Ok(())
    }

    /// Get a product by ID.
    pub fn get_product(&self, id: &str) -> DbResult<Option<Product>> {
        self.conn
            .query_row(
                "SELECT id, sku, name, category, active FROM products WHERE id = ?",
                [id],
                product_from_row,
            )
            .optional()
            .map_err(Into::into)
    }

    /// Search active products using FTS5 (BM25 ranking), optionally within one
    /// category. Filters apply before the limit.
    pub fn search_products(&self, query: &str, category: Option<&str>, limit: usize) -> DbResult<Vec<Product>> {
        let escaped_query = escape_fts_query(query);
        if escaped_query.is_empty() {
            return Ok(Vec::new());
        }

        let mut stmt = self.conn.prepare(
            r#"
            SELECT p.id, p.sku, p.name, p.category, p.active,
                   bm25(products_fts) as rank
            FROM products p
            JOIN products_fts fts ON p.rowid = fts.rowid
            WHERE products_fts MATCH ?1
            AND p.active = 1
            AND (?2 IS NULL OR lower(p.category) = lower(?2))
            ORDER BY rank
            LIMIT ?3
            "#,
        )?;

        let products = stmt
            .query_map(params![escaped_query, category, limit as i64], product_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    /// List products, optionally restricted to one category.
    pub fn list_products(&self, category: Option<&str>, active_only: bool) -> DbResult<Vec<Product>> {
        let mut stmt = self.conn.prepare(
            r#"
            SELECT id, sku, name, category, active
            FROM products
            WHERE (?1 IS NULL OR lower(category) = lower(?1))
            AND (?2 = 0 OR active = 1)
            ORDER BY name
            "#,
        )?;

        let products = stmt
            .query_map(params![category, active_only], product_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(products)
    }

    /// Mark product as inactive (soft delete).
    pub fn deactivate_product(&self, id: &str) -> DbResult<bool> {
        let rows_affected = self
            .conn
            .execute("UPDATE products SET active = 0 WHERE id = ?", [id])?;
        Ok(rows_affected > 0)
    }
}

fn material_from_row(row: &Row<'_>) -> rusqlite::Result<Material> {
    Ok(Material {
        id: row.get(0)?,
        description: row.get(1)?,
        brand: row.get(2)?,
        active: row.get(3)?,
    })
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    Ok(Product {
        id: row.get(0)?,
        sku: row.get(1)?,
        name: row.get(2)?,
        category: row.get(3)?,
        active: row.get(4)?,
    })
}

/// Escape special FTS5 characters and prepare query for prefix matching.
fn escape_fts_query(query: &str) -> String {
    let cleaned: String = query
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();

    cleaned
        .split_whitespace()
        .map(|word| format!("{}*", word))
        .collect::<Vec<_>>()
        .join(" ")
}
