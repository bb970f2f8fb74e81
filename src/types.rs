use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::auth::CurrentUser;

lazy_static! {
    static ref USERNAME_RE: Regex = Regex::new(r"^[\w.@+-]+$").expect("static regex");
}

fn username_not_reserved(username: &str) -> Result<(), ValidationError> {
    if username.eq_ignore_ascii_case("me") {
        let mut err = ValidationError::new("reserved");
        err.message = Some("This username is not allowed".into());
        return Err(err);
    }
    Ok(())
}

// Users

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(email(message = "Enter a valid email address"), length(max = 254))]
    pub email: String,
    #[validate(
        length(min = 1, max = 150),
        regex(path = *USERNAME_RE, message = "Letters, digits and @/./+/-/_ only"),
        custom(function = "username_not_reserved")
    )]
    pub username: String,
    #[validate(length(min = 1, max = 150))]
    pub first_name: String,
    #[validate(length(min = 1, max = 150))]
    pub last_name: String,
    #[validate(length(min = 1, max = 150))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SetPasswordRequest {
    #[validate(length(min = 1, max = 150))]
    pub current_password: String,
    #[validate(length(min = 1, max = 150))]
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub auth_token: String,
}

/// A user as returned on registration (no viewer context yet).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedUserDto {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserDto {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
}

impl UserDto {
    pub fn me(user: &CurrentUser) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            username: user.username.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            is_subscribed: false,
        }
    }
}

/// An author the viewer follows, with a preview of their recipes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionDto {
    #[serde(flatten)]
    pub user: UserDto,
    pub recipes: Vec<ShortRecipeDto>,
    pub recipes_count: i64,
}

// Catalogue

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagDto {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProductDto {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

// Recipes

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RecipeIngredientDto {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDto {
    pub id: i64,
    pub tags: Vec<TagDto>,
    pub author: UserDto,
    pub ingredients: Vec<RecipeIngredientDto>,
    pub name: String,
    pub image: String,
    pub text: String,
    pub cooking_time: i64,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ShortRecipeDto {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i64,
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct IngredientAmount {
    pub id: i64,
    #[validate(range(min = 1, message = "Amount must be at least 1"))]
    pub amount: i64,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRecipeRequest {
    #[validate(length(min = 1, message = "At least one ingredient is required"), nested)]
    pub ingredients: Vec<IngredientAmount>,
    #[validate(length(min = 1, message = "At least one tag is required"))]
    pub tags: Vec<i64>,
    #[validate(length(min = 1))]
    pub image: String,
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[validate(length(min = 1))]
    pub text: String,
    #[validate(range(min = 1, message = "Cooking time must be at least 1 minute"))]
    pub cooking_time: i64,
}

/// PATCH body; absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateRecipeRequest {
    pub ingredients: Option<Vec<IngredientAmount>>,
    pub tags: Option<Vec<i64>>,
    #[validate(length(min = 1))]
    pub image: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(min = 1))]
    pub text: Option<String>,
    #[validate(range(min = 1, message = "Cooking time must be at least 1 minute"))]
    pub cooking_time: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn register(username: &str, email: &str) -> RegisterRequest {
        RegisterRequest {
            email: email.to_string(),
            username: username.to_string(),
            first_name: "Ann".to_string(),
            last_name: "Lee".to_string(),
            password: "pass".to_string(),
        }
    }

    #[test]
    fn test_register_validation() {
        assert!(register("ann.lee", "ann@example.com").validate().is_ok());
        assert!(register("Me", "ann@example.com").validate().is_err());
        assert!(register("ann lee", "ann@example.com").validate().is_err());
        assert!(register("ann", "not-an-email").validate().is_err());
    }

    #[test]
    fn test_create_recipe_validation() {
        let ok = CreateRecipeRequest {
            ingredients: vec![IngredientAmount { id: 1, amount: 3 }],
            tags: vec![1],
            image: "data:image/png;base64,AAAA".to_string(),
            name: "Soup".to_string(),
            text: "Boil".to_string(),
            cooking_time: 10,
        };
        assert!(ok.validate().is_ok());

        let mut bad = ok.clone();
        bad.ingredients[0].amount = 0;
        assert!(bad.validate().is_err());

        let mut bad = ok.clone();
        bad.cooking_time = 0;
        assert!(bad.validate().is_err());

        let mut bad = ok;
        bad.tags.clear();
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_subscription_flattens_user() {
        let dto = SubscriptionDto {
            user: UserDto {
                id: 1,
                email: "a@b.c".to_string(),
                username: "a".to_string(),
                first_name: "A".to_string(),
                last_name: "B".to_string(),
                is_subscribed: true,
            },
            recipes: vec![],
            recipes_count: 0,
        };
        let v = serde_json::to_value(&dto).unwrap();
        assert_eq!(v["username"], "a");
        assert_eq!(v["is_subscribed"], true);
        assert_eq!(v["recipes_count"], 0);
    }
}
