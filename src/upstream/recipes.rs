//! Spoonacular recipe batches and LLM condensing
//!
//! Batches of random recipes are pulled to save API quota and pooled;
//! one recipe at a time is condensed for the display by the LLM, with a
//! deterministic local formatting fallback so condensing never fails.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use super::chat::chat_completion;
use super::RecipeSource;
use crate::error::Result;
use crate::fetch::{extract_json, send_with_retry, RetryPolicy};
use crate::models::{FormattedRecipe, Recipe};

const RANDOM_RECIPES_URL: &str = "https://api.spoonacular.com/recipes/random";
const MAX_COMPLETION_TOKENS: u32 = 600;
const MAX_INGREDIENTS: usize = 15;

#[derive(Debug, Deserialize)]
struct SpoonacularResponse {
    #[serde(default)]
    recipes: Vec<Recipe>,
}

// == Spoonacular Source ==
pub struct SpoonacularSource {
    client: Client,
    api_key: String,
    openai_api_key: String,
    model: String,
    policy: RetryPolicy,
}

impl SpoonacularSource {
    pub fn new(
        client: Client,
        api_key: impl Into<String>,
        openai_api_key: impl Into<String>,
        model: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            openai_api_key: openai_api_key.into(),
            model: model.into(),
            policy,
        }
    }

    async fn condense_via_llm(
        &self,
        recipe: &Recipe,
        requested_cuisine: &str,
    ) -> Result<FormattedRecipe> {
        let prompt = build_condense_prompt(recipe, requested_cuisine);
        let content = chat_completion(
            &self.client,
            &self.openai_api_key,
            &self.model,
            &prompt,
            MAX_COMPLETION_TOKENS,
            &self.policy,
        )
        .await?;

        let payload = extract_json(&content).ok_or_else(|| {
            crate::error::RelayError::MalformedPayload("no JSON in chat content".to_string())
        })?;
        let formatted: FormattedRecipe = serde_json::from_str(payload)?;
        info!(title = %formatted.title, "recipe condensed via LLM");
        Ok(formatted)
    }
}

#[async_trait]
impl RecipeSource for SpoonacularSource {
    async fn fetch_batch(&self, cuisine: &str, count: usize) -> Result<Vec<Recipe>> {
        info!(cuisine, count, "fetching recipe batch from Spoonacular");

        let request = self.client.get(RANDOM_RECIPES_URL).query(&[
            ("apiKey", self.api_key.as_str()),
            ("number", &count.to_string()),
            ("cuisine", cuisine),
            ("instructionsRequired", "true"),
            ("addRecipeInformation", "true"),
            ("fillIngredients", "true"),
            ("includeNutrition", "false"),
            ("tags", "main course"),
        ]);

        let response = send_with_retry(request, &self.policy).await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Spoonacular rejected the batch fetch: {}", body);
            return Ok(Vec::new());
        }

        let parsed: SpoonacularResponse = response
            .json()
            .await
            .map_err(|e| crate::error::RelayError::MalformedPayload(e.to_string()))?;
        info!(returned = parsed.recipes.len(), "Spoonacular batch received");
        Ok(parsed.recipes)
    }

    async fn condense(&self, recipe: &Recipe, requested_cuisine: &str) -> FormattedRecipe {
        match self.condense_via_llm(recipe, requested_cuisine).await {
            Ok(formatted) => formatted,
            Err(e) => {
                warn!(
                    recipe_id = recipe.id,
                    "LLM condensing failed, using local formatting: {}", e
                );
                fallback_format(recipe, requested_cuisine)
            }
        }
    }
}

fn build_condense_prompt(recipe: &Recipe, requested_cuisine: &str) -> String {
    let ingredient_list = recipe
        .extended_ingredients
        .iter()
        .map(|i| i.original.as_str())
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are formatting a recipe for a small e-ink display. Be extremely concise.\n\
         \n\
         Recipe: {title}\n\
         Requested Cuisine: {requested_cuisine}\n\
         Cuisines from API: {api_cuisines}\n\
         \n\
         Ingredients:\n{ingredient_list}\n\
         \n\
         Instructions:\n{instructions}\n\
         \n\
         Please provide:\n\
         1. TITLE: A clear, appetizing title focusing on the FOOD itself. Remove cooking \
         method terms (like \"foil packs\", \"sheet pan\", \"one pot\", \"instant pot\", \
         \"slow cooker\", \"skillet\"). Focus on main ingredients and flavors. Remove brand \
         names. Keep it concise (max 6 words).\n\
         2. INGREDIENTS: List ALL key ingredients with amounts (max 15 items). Include the \
         main protein, vegetables, sauces, spices, and any sides mentioned.\n\
         3. INSTRUCTIONS: Summarize the cooking method in 3-4 sentences (max 80 words \
         total). Include key steps and techniques.\n\
         4. COOK_TIME: Estimate total time based ONLY on the ingredients and instructions \
         above. Return a short string like \"45 min\", \"1 hr 30 min\", or \"2 hrs\".\n\
         5. CUISINE: Determine the ACTUAL cuisine based on the dish's ingredients, cooking \
         techniques, and origin - NOT the requested cuisine. Ignore brand names. If it \
         isn't clearly regional, say \"American\" or the correct origin. Be accurate.\n\
         \n\
         Respond in this exact JSON format:\n\
         {{\"title\": \"...\", \"ingredients\": \"...\", \"instructions\": \"...\", \
         \"cook_time\": \"...\", \"cuisine\": \"...\"}}",
        title = recipe.title,
        api_cuisines = if recipe.cuisines.is_empty() {
            "Unknown".to_string()
        } else {
            recipe.cuisines.join(", ")
        },
        instructions = recipe.instructions.as_deref().unwrap_or("No instructions provided"),
    )
}

// == Local Fallback ==
/// Deterministic display formatting used when the LLM path fails.
pub(super) fn fallback_format(recipe: &Recipe, requested_cuisine: &str) -> FormattedRecipe {
    FormattedRecipe {
        title: recipe.title.clone(),
        ingredients: recipe
            .extended_ingredients
            .iter()
            .take(MAX_INGREDIENTS)
            .map(|i| i.name.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        instructions: fallback_instructions(recipe),
        cook_time: match recipe.ready_in_minutes {
            Some(minutes) => format!("{} min", minutes),
            None => "? min".to_string(),
        },
        cuisine: requested_cuisine.to_string(),
    }
}

/// First ~150 chars of the raw instructions, HTML stripped, cut at a
/// sentence boundary where one lands late enough, else a word boundary.
fn fallback_instructions(recipe: &Recipe) -> String {
    let raw = match recipe.instructions.as_deref() {
        Some(raw) if !raw.is_empty() => raw,
        _ => return "Instructions not available for this recipe.".to_string(),
    };

    let plain = collapse_whitespace(&strip_html(raw));
    if plain.is_empty() {
        return "Instructions not available for this recipe.".to_string();
    }
    if plain.len() <= 150 {
        return plain;
    }

    let truncated = truncate_at_char_boundary(&plain, 150);
    if let Some(last_period) = truncated.rfind('.') {
        if last_period > 80 {
            return truncated[..=last_period].to_string();
        }
    }

    match truncated.rfind(' ') {
        Some(last_space) => format!("{}...", &truncated[..last_space]),
        None => format!("{}...", truncated),
    }
}

fn strip_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_tag = false;
    for c in text.chars() {
        match c {
            '<' => in_tag = true,
            '>' if in_tag => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn truncate_at_char_boundary(text: &str, max: usize) -> &str {
    if text.len() <= max {
        return text;
    }
    let mut end = max;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Ingredient;

    fn recipe_with_instructions(instructions: Option<&str>) -> Recipe {
        Recipe {
            id: 7,
            title: "Garlic Lemon Shrimp Foil Packs".to_string(),
            ready_in_minutes: Some(30),
            servings: Some(4),
            source_url: None,
            image: None,
            cuisines: vec![],
            dish_types: vec![],
            extended_ingredients: vec![
                Ingredient {
                    original: "1 lb shrimp, peeled".to_string(),
                    name: "shrimp".to_string(),
                    amount: 1.0,
                    unit: "lb".to_string(),
                },
                Ingredient {
                    original: "2 lemons".to_string(),
                    name: "lemon".to_string(),
                    amount: 2.0,
                    unit: "".to_string(),
                },
            ],
            instructions: instructions.map(|s| s.to_string()),
            summary: None,
        }
    }

    #[test]
    fn test_fallback_format_fields() {
        let recipe = recipe_with_instructions(Some("<p>Toss shrimp with lemon. Grill.</p>"));
        let formatted = fallback_format(&recipe, "caribbean");

        assert_eq!(formatted.title, "Garlic Lemon Shrimp Foil Packs");
        assert_eq!(formatted.ingredients, "shrimp, lemon");
        assert_eq!(formatted.cook_time, "30 min");
        assert_eq!(formatted.cuisine, "caribbean");
        assert_eq!(formatted.instructions, "Toss shrimp with lemon. Grill.");
    }

    #[test]
    fn test_fallback_instructions_missing() {
        let recipe = recipe_with_instructions(None);
        assert_eq!(
            fallback_instructions(&recipe),
            "Instructions not available for this recipe."
        );
    }

    #[test]
    fn test_fallback_instructions_truncates_at_sentence() {
        let long = format!(
            "{} End of the first sentence lands right about here. {}",
            "Start cooking the base sauce slowly over low heat",
            "x".repeat(200)
        );
        let recipe = recipe_with_instructions(Some(&long));

        let result = fallback_instructions(&recipe);
        assert!(result.len() <= 150);
        assert!(result.ends_with('.'));
    }

    #[test]
    fn test_fallback_instructions_word_boundary() {
        let long = "word ".repeat(60);
        let recipe = recipe_with_instructions(Some(&long));

        let result = fallback_instructions(&recipe);
        assert!(result.ends_with("..."));
        assert!(result.len() <= 153);
    }

    #[test]
    fn test_strip_html() {
        assert_eq!(
            collapse_whitespace(&strip_html("<ol><li>Chop</li><li>Fry</li></ol>")),
            "Chop Fry"
        );
    }

    #[test]
    fn test_cook_time_unknown() {
        let mut recipe = recipe_with_instructions(None);
        recipe.ready_in_minutes = None;
        assert_eq!(fallback_format(&recipe, "thai").cook_time, "? min");
    }
}
