//! Shopping list export: cart snapshot, aggregation, document rendering.
//!
//! - `source`: loads a user's cart recipes and their ingredient lines
//! - `aggregate`: merges lines by ingredient name
//! - `render`: turns the merged list into a PDF or text document

pub mod aggregate;
pub mod render;
pub mod source;

pub use aggregate::{aggregate, AggregateError, AggregatedIngredient, CartRecipe, IngredientLine, ShoppingList};
pub use render::{render_pdf, render_text, RenderError, RenderOptions, RenderedDocument};
pub use source::ShoppingCartSource;

/// Loads the cart of `user_id` and aggregates it.
pub async fn build_shopping_list<S>(source: &S, user_id: i64) -> crate::error::AppResult<ShoppingList>
where
    S: ShoppingCartSource + ?Sized,
{
    let recipes = source.cart_recipes(user_id).await?;
    Ok(aggregate(&recipes)?)
}
