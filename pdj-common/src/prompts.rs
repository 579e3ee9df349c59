//! Prompt model
//!
//! A `PromptSet` is the ordered `promptId → Prompt` mapping handed to the
//! live session on every update. The set is always replaced wholesale; the
//! core only reads `text` and `weight`.

use crate::{Error, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A single weighted text prompt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prompt {
    /// Unique identifier within a set
    pub prompt_id: String,
    /// Text sent to the generation service
    pub text: String,
    /// Blend weight (>= 0, 0 means inactive)
    pub weight: f64,
    /// Controller number bound to this prompt
    pub cc: u32,
    /// Display color
    pub color: String,
}

/// `{text, weight}` pair as sent to the remote service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeightedPrompt {
    pub text: String,
    pub weight: f64,
}

/// Ordered mapping `promptId → Prompt`
///
/// Insertion order is preserved; inserting an existing id replaces that
/// entry in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PromptSet {
    prompts: Vec<Prompt>,
}

impl PromptSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a set from a list, validating ids and weights
    ///
    /// # Errors
    /// - duplicate `promptId`
    /// - negative or non-finite weight
    pub fn from_prompts(prompts: Vec<Prompt>) -> Result<Self> {
        let mut seen = HashSet::new();
        for prompt in &prompts {
            if !seen.insert(prompt.prompt_id.as_str()) {
                return Err(Error::InvalidInput(format!(
                    "duplicate promptId '{}'",
                    prompt.prompt_id
                )));
            }
            validate_weight(prompt)?;
        }
        Ok(Self { prompts })
    }

    /// Insert or replace a prompt by id
    pub fn insert(&mut self, prompt: Prompt) -> Result<()> {
        validate_weight(&prompt)?;
        match self.prompts.iter_mut().find(|p| p.prompt_id == prompt.prompt_id) {
            Some(existing) => *existing = prompt,
            None => self.prompts.push(prompt),
        }
        Ok(())
    }

    pub fn get(&self, prompt_id: &str) -> Option<&Prompt> {
        self.prompts.iter().find(|p| p.prompt_id == prompt_id)
    }

    pub fn len(&self) -> usize {
        self.prompts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prompts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Prompt> {
        self.prompts.iter()
    }

    /// Prompts with non-zero weight whose text has not been filtered
    pub fn active<'a>(&'a self, filtered: &'a HashSet<String>) -> impl Iterator<Item = &'a Prompt> {
        self.prompts
            .iter()
            .filter(move |p| p.weight != 0.0 && !filtered.contains(&p.text))
    }

    /// Active subset as `{text, weight}` pairs, in set order
    pub fn weighted(&self, filtered: &HashSet<String>) -> Vec<WeightedPrompt> {
        self.active(filtered)
            .map(|p| WeightedPrompt {
                text: p.text.clone(),
                weight: p.weight,
            })
            .collect()
    }
}

fn validate_weight(prompt: &Prompt) -> Result<()> {
    if !prompt.weight.is_finite() || prompt.weight < 0.0 {
        return Err(Error::InvalidInput(format!(
            "prompt '{}' has invalid weight {}",
            prompt.prompt_id, prompt.weight
        )));
    }
    Ok(())
}

/// Built-in prompt bank: (color, text)
pub const DEFAULT_PROMPTS: [(&str, &str); 16] = [
    ("#9900ff", "Bossa Nova at 60 bpm"),
    ("#5200ff", "Chillwave at 60 bpm"),
    ("#ff25f6", "Drum and Bass at 60 bpm"),
    ("#2af6de", "Post Punk at 60 bpm"),
    ("#FFA500", "Afrobeat rhythm at 60 bpm"),
    ("#2af6de", "Funk at 60 bpm"),
    ("#9900ff", "Chiptune at 60 bpm"),
    ("#3dffab", "Lush Strings at 60 bpm"),
    ("#d8ff3e", "Sparkling Arpeggios at 60 bpm"),
    ("#d9b2ff", "Staccato Rhythms at 60 bpm"),
    ("#3dffab", "Punchy Kick at 60 bpm"),
    ("#ffdd28", "Dubstep at 60 bpm"),
    ("#A0522D", "Balafon at 60 bpm"),
    ("#d8ff3e", "Neo Soul at 60 bpm"),
    ("#E2725B", "Kora rhythm at 60 bpm"),
    ("#ff6600", "Mbalakh rhythm at 60 bpm"),
];

/// Number of bank prompts that start at weight 1
pub const INITIALLY_ACTIVE: usize = 3;

/// Default prompt set: the full bank, three random prompts at weight 1
pub fn default_prompt_set() -> PromptSet {
    default_prompt_set_with(&mut rand::thread_rng())
}

/// Default prompt set using the supplied random source
pub fn default_prompt_set_with<R: Rng + ?Sized>(rng: &mut R) -> PromptSet {
    let mut indices: Vec<usize> = (0..DEFAULT_PROMPTS.len()).collect();
    indices.shuffle(rng);
    let start_on: HashSet<usize> = indices.into_iter().take(INITIALLY_ACTIVE).collect();

    let prompts = DEFAULT_PROMPTS
        .iter()
        .enumerate()
        .map(|(i, (color, text))| Prompt {
            prompt_id: format!("prompt-{}", i),
            text: (*text).to_string(),
            weight: if start_on.contains(&i) { 1.0 } else { 0.0 },
            cc: i as u32,
            color: (*color).to_string(),
        })
        .collect();

    PromptSet { prompts }
}
