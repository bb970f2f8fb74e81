//! Ingredient aggregation for shopping list exports.
//!
//! Lines are grouped by ingredient *name*, not by product id: two catalogue
//! products that share a display name end up in one row. Units are never
//! converted; the first unit seen for a name is the one reported.

use std::collections::HashMap;

use serde::Serialize;

/// One ingredient line of a recipe: the quantity of a product it needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientLine {
    pub name: String,
    pub amount: i64,
    pub measurement_unit: String,
}

impl IngredientLine {
    pub fn new(name: impl Into<String>, amount: i64, measurement_unit: impl Into<String>) -> Self {
        Self { name: name.into(), amount, measurement_unit: measurement_unit.into() }
    }
}

/// A recipe in a user's shopping cart together with its ingredient lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartRecipe {
    pub recipe_id: i64,
    pub name: String,
    pub lines: Vec<IngredientLine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AggregatedIngredient {
    pub name: String,
    pub amount: i64,
    pub measurement_unit: String,
}

/// The finished shopping list: recipe names in cart order and one entry per
/// distinct ingredient name in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ShoppingList {
    pub recipes: Vec<String>,
    pub ingredients: Vec<AggregatedIngredient>,
}

impl ShoppingList {
    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&AggregatedIngredient> {
        self.ingredients.iter().find(|i| i.name == name)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AggregateError {
    #[error("total amount of {name:?} does not fit in a 64-bit integer")]
    AmountOverflow { name: String },
}

/// Sums ingredient amounts across all recipes, keyed by ingredient name.
///
/// Recipes without lines still contribute their name to `recipes`. Amounts are
/// added as given; positivity is enforced when lines are created. A total that
/// overflows `i64` is an error rather than a clamped value.
pub fn aggregate(recipes: &[CartRecipe]) -> Result<ShoppingList, AggregateError> {
    let mut recipe_names = Vec::with_capacity(recipes.len());
    let mut ingredients: Vec<AggregatedIngredient> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for recipe in recipes {
        recipe_names.push(recipe.name.clone());
        for line in &recipe.lines {
            match index.get(line.name.as_str()) {
                Some(&pos) => {
                    let entry = &mut ingredients[pos];
                    entry.amount = entry
                        .amount
                        .checked_add(line.amount)
                        .ok_or_else(|| AggregateError::AmountOverflow { name: line.name.clone() })?;
                }
                None => {
                    index.insert(line.name.as_str(), ingredients.len());
                    ingredients.push(AggregatedIngredient {
                        name: line.name.clone(),
                        amount: line.amount,
                        measurement_unit: line.measurement_unit.clone(),
                    });
                }
            }
        }
    }

    Ok(ShoppingList { recipes: recipe_names, ingredients })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recipe(id: i64, name: &str, lines: &[(&str, i64, &str)]) -> CartRecipe {
        CartRecipe {
            recipe_id: id,
            name: name.to_string(),
            lines: lines.iter().map(|(n, a, u)| IngredientLine::new(*n, *a, *u)).collect(),
        }
    }

    #[test]
    fn test_merges_same_name_across_recipes() {
        let cart = vec![
            recipe(1, "Borscht", &[("salt", 5, "g"), ("beet", 2, "pcs")]),
            recipe(2, "Soup", &[("salt", 3, "g")]),
        ];
        let list = aggregate(&cart).unwrap();

        assert_eq!(list.recipes, vec!["Borscht", "Soup"]);
        assert_eq!(list.ingredients.len(), 2);
        assert_eq!(list.get("salt").map(|i| (i.amount, i.measurement_unit.as_str())), Some((8, "g")));
        assert_eq!(list.get("beet").map(|i| (i.amount, i.measurement_unit.as_str())), Some((2, "pcs")));
    }

    #[test]
    fn test_first_seen_unit_wins() {
        let cart = vec![recipe(1, "A", &[("salt", 5, "g")]), recipe(2, "B", &[("salt", 1, "kg")])];
        let list = aggregate(&cart).unwrap();

        let salt = list.get("salt").unwrap();
        assert_eq!(salt.amount, 6);
        assert_eq!(salt.measurement_unit, "g");
    }

    #[test]
    fn test_preserves_first_seen_order() {
        let cart = vec![
            recipe(1, "A", &[("onion", 1, "pcs"), ("carrot", 2, "pcs")]),
            recipe(2, "B", &[("butter", 10, "g"), ("onion", 1, "pcs")]),
        ];
        let names: Vec<_> = aggregate(&cart).unwrap().ingredients.into_iter().map(|i| i.name).collect();
        assert_eq!(names, vec!["onion", "carrot", "butter"]);
    }

    #[test]
    fn test_empty_cart_is_empty_list() {
        let list = aggregate(&[]).unwrap();
        assert!(list.is_empty());
        assert!(list.recipes.is_empty());
    }

    #[test]
    fn test_recipe_without_lines_is_listed_but_adds_nothing() {
        let cart = vec![recipe(1, "Toast", &[]), recipe(2, "Tea", &[("water", 250, "ml")])];
        let list = aggregate(&cart).unwrap();

        assert_eq!(list.recipes, vec!["Toast", "Tea"]);
        assert_eq!(list.ingredients.len(), 1);
        assert_eq!(list.ingredients[0].amount, 250);
    }

    #[test]
    fn test_names_are_case_sensitive() {
        let cart = vec![recipe(1, "A", &[("Salt", 1, "g"), ("salt", 2, "g")])];
        assert_eq!(aggregate(&cart).unwrap().ingredients.len(), 2);
    }

    #[test]
    fn test_totals_do_not_depend_on_line_order() {
        let forward = vec![
            recipe(1, "A", &[("salt", 5, "g"), ("sugar", 7, "g")]),
            recipe(2, "B", &[("salt", 3, "g"), ("sugar", 1, "g"), ("salt", 4, "g")]),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();
        for r in reversed.iter_mut() {
            r.lines.reverse();
        }

        let a = aggregate(&forward).unwrap();
        let b = aggregate(&reversed).unwrap();
        for name in ["salt", "sugar"] {
            assert_eq!(a.get(name).unwrap().amount, b.get(name).unwrap().amount);
        }
        assert_eq!(a.get("salt").unwrap().amount, 12);
        assert_eq!(a.get("sugar").unwrap().amount, 8);
    }

    #[test]
    fn test_is_idempotent() {
        let cart = vec![
            recipe(1, "Borscht", &[("salt", 5, "g"), ("beet", 2, "pcs")]),
            recipe(2, "Soup", &[("salt", 3, "g")]),
        ];
        assert_eq!(aggregate(&cart).unwrap(), aggregate(&cart).unwrap());
    }

    #[test]
    fn test_overflowing_total_is_an_error() {
        let cart = vec![recipe(1, "A", &[("salt", i64::MAX, "g")]), recipe(2, "B", &[("salt", 1, "g")])];
        assert_eq!(aggregate(&cart), Err(AggregateError::AmountOverflow { name: "salt".to_string() }));

        let cart = vec![recipe(1, "A", &[("salt", i64::MAX - 1, "g")]), recipe(2, "B", &[("salt", 1, "g")])];
        assert_eq!(aggregate(&cart).unwrap().ingredients[0].amount, i64::MAX);
    }
}
