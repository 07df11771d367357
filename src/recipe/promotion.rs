//! Featured-product placement in generated recipes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Recipe, RecipeIngredient};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FeaturedProduct {
    /// Branded name as it must appear in the recipe.
    pub name: String,
    pub amount: String,
    pub unit: String,
}

pub fn default_featured_products() -> Vec<FeaturedProduct> {
    vec![
        FeaturedProduct {
            name: "Harvest Gold Extra Virgin Olive Oil".to_string(),
            amount: "1".to_string(),
            unit: "tbsp".to_string(),
        },
        FeaturedProduct {
            name: "Harvest Gold Sea Salt".to_string(),
            amount: "1".to_string(),
            unit: "tsp".to_string(),
        },
    ]
}

fn mentions(text: &str, product: &FeaturedProduct) -> bool {
    text.to_lowercase().contains(&product.name.to_lowercase())
}

/// Guarantees at least one featured product is named in the ingredient list
/// or the steps. Returns `true` when the recipe had to be changed.
///
/// Existing ingredients are never renamed: when no product is mentioned the
/// first one is appended as a new ingredient and mentioned in the first step.
pub fn ensure_featured_products(recipe: &mut Recipe, products: &[FeaturedProduct]) -> bool {
    if products.is_empty() {
        return false;
    }

    let mut mentioned = false;
    for ingredient in &mut recipe.ingredients {
        if products.iter().any(|product| mentions(&ingredient.name, product)) {
            ingredient.is_promoted = true;
            mentioned = true;
        }
    }
    mentioned |= recipe
        .steps
        .iter()
        .any(|step| products.iter().any(|product| mentions(&step.instruction, product)));
    if mentioned {
        return false;
    }

    let product = &products[0];
    tracing::debug!(product = %product.name, "inserting featured product");
    recipe.ingredients.push(RecipeIngredient {
        name: product.name.clone(),
        amount: Some(product.amount.clone()),
        unit: Some(product.unit.clone()),
        notes: None,
        is_promoted: true,
    });
    if let Some(step) = recipe.steps.first_mut() {
        step.instruction = format!(
            "{} Finish with {} {} of {}.",
            step.instruction.trim_end(),
            product.amount,
            product.unit,
            product.name
        );
    }
    true
}

/// True when any ingredient or step names a featured product.
pub fn has_featured_product(recipe: &Recipe, products: &[FeaturedProduct]) -> bool {
    products.iter().any(|product| {
        recipe
            .ingredients
            .iter()
            .any(|ingredient| mentions(&ingredient.name, product))
            || recipe
                .steps
                .iter()
                .any(|step| mentions(&step.instruction, product))
    })
}
