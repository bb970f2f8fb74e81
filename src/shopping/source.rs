use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

use crate::error::AppResult;
use crate::shopping::aggregate::{CartRecipe, IngredientLine};

/// Read side of the shopping cart: everything an export needs for one user.
#[async_trait]
pub trait ShoppingCartSource: Send + Sync {
    /// Recipes in the user's cart in the order they were added, each with its
    /// ingredient lines in insertion order.
    async fn cart_recipes(&self, user_id: i64) -> AppResult<Vec<CartRecipe>>;
}

#[async_trait]
impl ShoppingCartSource for SqlitePool {
    async fn cart_recipes(&self, user_id: i64) -> AppResult<Vec<CartRecipe>> {
        let recipe_rows = sqlx::query(
            r#"SELECT r.id, r.name
               FROM shopping_cart c JOIN recipes r ON r.id = c.recipe_id
               WHERE c.user_id = ?1
               ORDER BY c.id"#,
        )
        .bind(user_id)
        .fetch_all(self)
        .await?;

        let mut recipes: Vec<CartRecipe> = recipe_rows
            .iter()
            .map(|r| CartRecipe { recipe_id: r.get("id"), name: r.get("name"), lines: Vec::new() })
            .collect();
        if recipes.is_empty() {
            return Ok(recipes);
        }

        let line_rows = sqlx::query(
            r#"SELECT ri.recipe_id, p.name, ri.amount, p.measurement_unit
               FROM shopping_cart c
               JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
               JOIN products p ON p.id = ri.product_id
               WHERE c.user_id = ?1
               ORDER BY c.id, ri.id"#,
        )
        .bind(user_id)
        .fetch_all(self)
        .await?;

        let positions: HashMap<i64, usize> =
            recipes.iter().enumerate().map(|(i, r)| (r.recipe_id, i)).collect();
        for row in line_rows {
            let recipe_id: i64 = row.get("recipe_id");
            if let Some(&pos) = positions.get(&recipe_id) {
                recipes[pos].lines.push(IngredientLine {
                    name: row.get("name"),
                    amount: row.get("amount"),
                    measurement_unit: row.get("measurement_unit"),
                });
            }
        }

        tracing::debug!(user_id, recipes = recipes.len(), "Loaded shopping cart snapshot");
        Ok(recipes)
    }
}
