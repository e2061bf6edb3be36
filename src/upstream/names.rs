//! Name generation via OpenAI, with a static local fallback
//!
//! The prompt embeds a random seed, a randomized style hint and the
//! advisory recent-names list. Any failure along the LLM path (HTTP,
//! API error body, unparsable content, short item count) degrades to a
//! static dataset filtered against recent names; the fallback itself
//! never fails, though it may return fewer items than asked once the
//! filtered dataset runs out.

use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, warn};

use super::chat::chat_completion;
use super::NameSource;
use crate::error::{RelayError, Result};
use crate::fetch::{extract_json, RetryPolicy};
use crate::models::NameEntry;

const MAX_COMPLETION_TOKENS: u32 = 4000;

const STYLE_HINTS: [&str; 4] = [
    "Focus on SHORT names (1 syllable preferred): Jake, Sam, Max, Cole, Seth, Ian, Jack, \
     Luke, Mark, Paul, Pete, Tom, Joe, Nick, Pat, Drew, Troy, Wade, Dean, Jude, Finn, Leo, \
     Lane, Reid, Beau, Clay, Trey, Grant, Blake, Chase, Brett, Shane, Cody, Kyle, Ryan",
    "Focus on CLASSIC names: Matthew, Michael, Christopher, Nicholas, Benjamin, Jonathan, \
     Timothy, Stephen, Andrew, Peter, Thomas, David, Daniel, Joseph, Anthony, Vincent, \
     Patrick, Dominic, Sebastian, Nathaniel, William, Robert, Richard, Edward, Charles, \
     George, Henry, Philip, Lawrence, Francis",
    "Focus on TIMELESS names: James, John, Paul, Mark, Luke, Peter, Simon, Thomas, Philip, \
     Andrew, Nathan, Aaron, Adam, Eric, Brian, Kevin, Sean, Scott, Craig, Keith, Alan, \
     Carl, Dennis, Gary, Roger, Bruce, Glenn, Wayne, Dale, Neil",
    "Mix of SHORT and FULL names: Jake/Jacob, Sam/Samuel, Matt/Matthew, Mike/Michael, \
     Nick/Nicholas, Ben/Benjamin, Dan/Daniel, Tom/Thomas, Joe/Joseph, Tim/Timothy, \
     Steve/Stephen, Andy/Andrew, Pete/Peter, Chris/Christopher, Nate/Nathan, Zach/Zachary",
];

const FALLBACK_DATASET: &[(&str, &str)] = &[
    // Classic Biblical
    ("Luke", "Light-giving; Gospel author"),
    ("Matthew", "Gift of God; apostle"),
    ("James", "Supplanter; apostle"),
    ("Michael", "Who is like God; archangel"),
    ("Gabriel", "God is my strength; angel"),
    ("David", "Beloved; king of Israel"),
    ("Daniel", "God is my judge; prophet"),
    ("Nathan", "He gave; prophet"),
    ("Caleb", "Faithful, devoted"),
    ("Benjamin", "Son of the right hand"),
    ("Samuel", "Heard by God; prophet"),
    ("Andrew", "Strong; first apostle called"),
    ("Simon", "He has heard; apostle Peter"),
    ("Timothy", "Honoring God"),
    ("Stephen", "Crown; first martyr"),
    ("Noah", "Rest, comfort"),
    ("Joshua", "The Lord is salvation"),
    ("Aaron", "High mountain; priest"),
    ("Adam", "Man; first human"),
    ("Joseph", "He will add"),
    ("Peter", "Rock; leader of apostles"),
    ("Paul", "Small, humble; apostle"),
    ("John", "God is gracious; apostle"),
    ("Mark", "Warlike; Gospel author"),
    ("Philip", "Lover of horses; apostle"),
    ("Thomas", "Twin; doubting apostle"),
    // Short forms
    ("Jake", "Supplanter; from Jacob"),
    ("Sam", "Heard by God; from Samuel"),
    ("Max", "Greatest"),
    ("Jack", "God is gracious"),
    ("Cole", "Victory of the people"),
    ("Matt", "Gift of God"),
    ("Ben", "Son of the right hand"),
    ("Dan", "God is my judge"),
    ("Nick", "Victory of the people"),
    ("Tom", "Twin"),
    ("Joe", "He will add"),
    ("Tim", "Honoring God"),
    ("Steve", "Crown"),
    ("Pete", "Rock"),
    ("Andy", "Strong, manly"),
    ("Chris", "Bearer of Christ"),
    ("Nate", "Gift from God"),
    ("Zach", "God remembers"),
    // Modern classics
    ("Ryan", "Little king"),
    ("Kyle", "Narrow strait"),
    ("Sean", "God is gracious"),
    ("Brian", "Noble, strong"),
    ("Kevin", "Handsome, beloved"),
    ("Eric", "Eternal ruler"),
    ("Scott", "From Scotland"),
    ("Grant", "Great, large"),
    ("Blake", "Dark, fair"),
    ("Chase", "Hunter"),
    ("Drew", "Strong, manly"),
    ("Troy", "Foot soldier"),
    ("Shane", "God is gracious"),
    ("Dean", "Valley"),
    ("Wade", "River crossing"),
    ("Reid", "Red-haired"),
    ("Jude", "Praised"),
    ("Finn", "Fair"),
    ("Owen", "Young warrior"),
    ("Leo", "Lion"),
    ("Ian", "God is gracious"),
    ("Seth", "Appointed"),
    ("Evan", "God is gracious"),
    ("Ethan", "Strong, firm"),
];

#[derive(Debug, Deserialize)]
struct NamesPayload {
    #[serde(default)]
    names: Vec<NameEntry>,
}

// == OpenAI Name Source ==
pub struct OpenAiNames {
    client: Client,
    api_key: String,
    model: String,
    policy: RetryPolicy,
}

impl OpenAiNames {
    pub fn new(
        client: Client,
        api_key: impl Into<String>,
        model: impl Into<String>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            client,
            api_key: api_key.into(),
            model: model.into(),
            policy,
        }
    }

    fn build_prompt(&self, count: usize, avoid: &[String]) -> String {
        let mut rng = rand::thread_rng();
        let style_hint = STYLE_HINTS.choose(&mut rng).copied().unwrap_or(STYLE_HINTS[0]);
        let seed: u32 = rng.gen_range(0..10_000);

        let avoid_list = if avoid.is_empty() {
            String::new()
        } else {
            format!("\nAVOID THESE RECENT NAMES: {}", avoid.join(", "))
        };

        format!(
            "Generate exactly {count} random Christian boy names that would be good for a baby born today.\n\
             \n\
             RANDOM SEED: {seed} - Use this to vary your selections.\n\
             STYLE HINT: {style_hint}{avoid_list}\n\
             \n\
             IMPORTANT RULES:\n\
             - Choose names that real parents actually use - nothing too unusual\n\
             - NO trendy misspellings (no Jaxon, Jaycen, Brayden, Kayden, Aiden variants)\n\
             - NO old-fashioned Biblical prophet/patriarch names (Ezekiel, Isaiah, Jeremiah, \
             Obadiah, Elijah, Elisha, Micah, Amos, Hosea, Joel, Jonah, Nahum, Habakkuk, \
             Zephaniah, Haggai, Zechariah, Malachi, Abraham, Moses, Gideon, Samson, etc.)\n\
             - NO Levi\n\
             - Names should have Christian/Biblical roots or meaning\n\
             - Keep meanings concise (under 10 words)\n\
             - Be RANDOM - pick different names each time\n\
             \n\
             Respond with ONLY valid JSON:\n\
             {{\"names\": [{{\"name\": \"Name1\", \"meaning\": \"meaning\"}}, ...]}}"
        )
    }

    async fn generate_via_llm(&self, count: usize, avoid: &[String]) -> Result<Vec<NameEntry>> {
        let prompt = self.build_prompt(count, avoid);
        let content = chat_completion(
            &self.client,
            &self.api_key,
            &self.model,
            &prompt,
            MAX_COMPLETION_TOKENS,
            &self.policy,
        )
        .await?;

        let payload = extract_json(&content)
            .ok_or_else(|| RelayError::MalformedPayload("no JSON in chat content".to_string()))?;
        let parsed: NamesPayload = serde_json::from_str(payload)?;

        if parsed.names.len() < count {
            return Err(RelayError::MalformedPayload(format!(
                "asked for {} names, got {}",
                count,
                parsed.names.len()
            )));
        }

        let mut names = parsed.names;
        names.truncate(count);
        info!(count = names.len(), "generated names via LLM");
        Ok(names)
    }
}

#[async_trait]
impl NameSource for OpenAiNames {
    async fn generate(&self, count: usize, avoid: &[String]) -> Result<Vec<NameEntry>> {
        match self.generate_via_llm(count, avoid).await {
            Ok(names) => Ok(names),
            Err(e) => {
                warn!("LLM name generation failed, using static fallback: {}", e);
                Ok(fallback_names(avoid, count))
            }
        }
    }
}

// == Static Fallback ==
/// Names from the static dataset, minus recently served ones, shuffled
/// and truncated to `count`. Returns whatever remains after filtering,
/// even when that is fewer than asked.
pub fn fallback_names(avoid: &[String], count: usize) -> Vec<NameEntry> {
    let mut available: Vec<NameEntry> = FALLBACK_DATASET
        .iter()
        .filter(|(name, _)| !avoid.iter().any(|a| a == name))
        .map(|(name, meaning)| NameEntry::new(*name, *meaning))
        .collect();

    available.shuffle(&mut rand::thread_rng());
    available.truncate(count);
    available
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_returns_requested_count() {
        let names = fallback_names(&[], 4);
        assert_eq!(names.len(), 4);
    }

    #[test]
    fn test_fallback_filters_recent_names() {
        let avoid: Vec<String> = vec!["Luke".to_string(), "Jake".to_string()];
        for _ in 0..20 {
            let names = fallback_names(&avoid, 10);
            assert!(names.iter().all(|n| n.name != "Luke" && n.name != "Jake"));
        }
    }

    #[test]
    fn test_fallback_never_fails_when_filtered_dry() {
        // Avoid the whole dataset: the fallback degrades to an empty list
        // instead of erroring.
        let avoid: Vec<String> = FALLBACK_DATASET
            .iter()
            .map(|(name, _)| name.to_string())
            .collect();
        let names = fallback_names(&avoid, 4);
        assert!(names.is_empty());
    }

    #[test]
    fn test_prompt_includes_avoid_list_and_count() {
        let source = OpenAiNames::new(
            Client::new(),
            "key",
            "test-model",
            RetryPolicy::default(),
        );
        let avoid = vec!["Luke".to_string(), "Sam".to_string()];

        let prompt = source.build_prompt(4, &avoid);

        assert!(prompt.contains("exactly 4 random"));
        assert!(prompt.contains("AVOID THESE RECENT NAMES: Luke, Sam"));
        assert!(prompt.contains("STYLE HINT:"));
    }

    #[test]
    fn test_prompt_omits_avoid_section_when_empty() {
        let source = OpenAiNames::new(
            Client::new(),
            "key",
            "test-model",
            RetryPolicy::default(),
        );
        let prompt = source.build_prompt(4, &[]);
        assert!(!prompt.contains("AVOID THESE RECENT NAMES"));
    }

    #[test]
    fn test_names_payload_parses_llm_shape() {
        let parsed: NamesPayload = serde_json::from_str(
            r#"{"names": [{"name": "Luke", "meaning": "Light-giving"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.names[0].name, "Luke");
    }
}
