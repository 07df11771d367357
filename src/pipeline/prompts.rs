use crate::ingredients::DetectionOptions;
use crate::recipe::{FeaturedProduct, RecipePreferences};

pub const DETECTION_SYSTEM_PROMPT: &str = concat!(
    "You are a kitchen inventory assistant. Identify every food ingredient visible in the photo.\n",
    "Reply with a single JSON object and nothing else, shaped as:\n",
    "{\"ingredients\": [{\"name\": string, \"confidence\": number between 0 and 1, ",
    "\"quantity\": string, \"category\": string, \"freshness\": \"fresh\" | \"good\" | \"use soon\" | \"spoiled\"}], ",
    "\"suggestions\": [string], \"warnings\": [string], \"imageQuality\": \"good\" | \"fair\" | \"poor\"}\n",
    "Use common grocery names in singular form. Do not list packaging, utensils or non-food items."
);

pub fn detection_user_prompt(options: &DetectionOptions) -> String {
    let mut prompt = String::from("List the ingredients you can see in this image.");
    if options.include_quantities {
        prompt.push_str(" Estimate the visible quantity of each one.");
    } else {
        prompt.push_str(" Omit quantities.");
    }
    if options.include_freshness {
        prompt.push_str(" Judge how fresh each one looks.");
    }
    if let Some(min_confidence) = options.min_confidence {
        prompt.push_str(&format!(
            " Only include items you are at least {:.0}% sure about.",
            min_confidence.clamp(0.0, 1.0) * 100.0
        ));
    }
    prompt
}

const RECIPE_SHAPE: &str = concat!(
    "{\"title\": string, \"summary\": string, \"description\": string, ",
    "\"ingredients\": [{\"name\": string, \"amount\": string, \"unit\": string, \"notes\": string}], ",
    "\"steps\": [{\"instruction\": string, \"durationMinutes\": number, \"temperature\": string}], ",
    "\"details\": {\"servings\": number, \"prepMinutes\": number, \"cookMinutes\": number, ",
    "\"difficulty\": \"easy\" | \"medium\" | \"hard\", \"cuisine\": string, ",
    "\"costTier\": \"budget\" | \"moderate\" | \"premium\", \"equipment\": [string]}, ",
    "\"nutrition\": {\"calories\": number, \"proteinG\": number, \"carbsG\": number, \"fatG\": number, \"fiberG\": number}, ",
    "\"tips\": [string], \"variations\": [string], \"tags\": [string]}"
);

pub fn recipe_system_prompt(products: &[FeaturedProduct]) -> String {
    let mut prompt = format!(
        "You are a professional chef who writes clear, reliable home recipes.\n\
Reply with a single JSON object and nothing else, shaped as:\n{RECIPE_SHAPE}\n\
Quantities must be practical, steps must be in cooking order, and times are in minutes."
    );
    if !products.is_empty() {
        let names: Vec<&str> = products.iter().map(|product| product.name.as_str()).collect();
        prompt.push_str(&format!(
            "\nMANDATORY: the recipe must use at least one of these products by its exact name, \
in the ingredient list and in the step where it is used: {}.",
            names.join(", ")
        ));
    }
    prompt
}

pub fn recipe_user_prompt(ingredients: &[String], preferences: &RecipePreferences) -> String {
    let mut prompt = format!(
        "Create one recipe that uses these ingredients: {}.\n\
You may add common pantry staples.",
        ingredients.join(", ")
    );
    if let Some(servings) = preferences.servings {
        prompt.push_str(&format!("\nServings: {servings}."));
    }
    if let Some(cuisine) = preferences.cuisine.as_deref().filter(|c| !c.trim().is_empty()) {
        prompt.push_str(&format!("\nCuisine: {}.", cuisine.trim()));
    }
    if !preferences.dietary_restrictions.is_empty() {
        prompt.push_str(&format!(
            "\nDietary restrictions: {}.",
            preferences.dietary_restrictions.join(", ")
        ));
    }
    if let Some(max_minutes) = preferences.max_minutes {
        prompt.push_str(&format!("\nTotal time must not exceed {max_minutes} minutes."));
    }
    if let Some(difficulty) = preferences.difficulty.as_deref().filter(|d| !d.trim().is_empty()) {
        prompt.push_str(&format!("\nDifficulty: {}.", difficulty.trim()));
    }
    if let Some(meal_type) = preferences.meal_type.as_deref().filter(|m| !m.trim().is_empty()) {
        prompt.push_str(&format!("\nMeal type: {}.", meal_type.trim()));
    }
    prompt
}

pub fn image_prompt(prompt: &str) -> String {
    format!(
        "Professional food photography of {}, plated beautifully, natural window light, \
shallow depth of field, high detail, appetizing",
        prompt.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recipe::default_featured_products;

    #[test]
    fn recipe_prompt_lists_featured_products() {
        let prompt = recipe_system_prompt(&default_featured_products());
        assert!(prompt.contains("MANDATORY"));
        assert!(prompt.contains("Harvest Gold Sea Salt"));
        assert!(!recipe_system_prompt(&[]).contains("MANDATORY"));
    }

    #[test]
    fn user_prompt_carries_preferences() {
        let preferences = RecipePreferences {
            servings: Some(2),
            dietary_restrictions: vec!["gluten-free".to_string()],
            max_minutes: Some(30),
            ..Default::default()
        };
        let prompt = recipe_user_prompt(&["rice".to_string(), "egg".to_string()], &preferences);
        assert!(prompt.contains("rice, egg"));
        assert!(prompt.contains("Servings: 2."));
        assert!(prompt.contains("gluten-free"));
        assert!(prompt.contains("30 minutes"));
        assert!(!prompt.contains("Cuisine"));
    }

    #[test]
    fn detection_prompt_follows_options() {
        let options = DetectionOptions {
            include_quantities: false,
            include_freshness: false,
            min_confidence: Some(0.75),
        };
        let prompt = detection_user_prompt(&options);
        assert!(prompt.contains("Omit quantities"));
        assert!(!prompt.contains("fresh"));
        assert!(prompt.contains("75%"));
    }

    #[test]
    fn image_prompt_is_embellished() {
        assert!(image_prompt(" ramen ").starts_with("Professional food photography of ramen,"));
    }
}
