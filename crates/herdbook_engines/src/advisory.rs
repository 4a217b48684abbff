#![forbid(unsafe_code)]

//! Input/output contract for an external breeding advisory provider.
//!
//! The provider receives a plain-language prompt describing both candidates
//! and must answer with a single JSON object matching [`AdvisoryVerdict`].

use chrono::{DateTime, Utc};
use herdbook_kernel_contracts::breeding::AdvisoryVerdict;
use herdbook_kernel_contracts::pedigree::{Animal, AnimalRecordId, BreedingPair};
use herdbook_kernel_contracts::{ContractViolation, Validate};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdvisoryError {
    #[error("advisory provider is not configured")]
    Unavailable,
    #[error("advisory provider transport failed: {kind}")]
    Transport {
        kind: &'static str,
        http_status: Option<u16>,
    },
    #[error("advisory provider timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
    #[error("advisory provider reply is malformed: {0}")]
    Malformed(String),
    #[error("advisory provider reply violates the advice contract: {0}")]
    Schema(#[from] ContractViolation),
}

impl AdvisoryError {
    /// Short, secret-free label for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::Transport { kind, .. } => kind,
            Self::Timeout { .. } => "timeout",
            Self::Malformed(_) => "malformed",
            Self::Schema(_) => "schema",
        }
    }
}

pub fn build_prompt(pair: &BreedingPair, now: DateTime<Utc>) -> String {
    format!(
        "As a livestock breeding expert, assess whether these two animals should be bred together.\n\n\
         Male:\n{}\n\
         Female:\n{}\n\
         Respond with only a JSON object of this exact shape:\n\
         {{\"compatible\": true|false, \"recommendationScore\": <integer 0-100>, \
         \"reasoning\": \"<explanation>\", \"breedingRecommendations\": [\"...\"], \
         \"healthConsiderations\": [\"...\"]}}",
        describe_candidate(&pair.male, now),
        describe_candidate(&pair.female, now),
    )
}

fn describe_candidate(a: &Animal, now: DateTime<Utc>) -> String {
    let unknown = || "unknown".to_string();
    let breed = match (&a.breed, &a.secondary_breed) {
        (Some(b), Some(s)) if a.is_mixed => format!("{b} x {s}"),
        (Some(b), _) => b.clone(),
        (None, _) => unknown(),
    };
    let parent = |id: Option<AnimalRecordId>| id.map(|v| v.0.to_string()).unwrap_or_else(unknown);
    format!(
        "- ID: {} ({})\n- Breed: {}\n- Age: {}\n- Health: {}\n- Weight: {}\n- Sire: {}\n- Dam: {}\n- Generation: {}\n",
        a.animal_id,
        a.name,
        breed,
        a.age_in_months(now)
            .map(|m| format!("{m} months"))
            .unwrap_or_else(unknown),
        a.health
            .map(|h| format!("{h}/100"))
            .unwrap_or_else(unknown),
        a.weight
            .map(|w| format!("{w:.1} kg"))
            .unwrap_or_else(unknown),
        parent(a.parent_male_id),
        parent(a.parent_female_id),
        a.generation,
    )
}

/// Decodes and validates a provider reply. Language models often wrap the
/// object in prose or a fenced block, so the outermost `{...}` span is used.
/// Guidance lists are tidied first; only the score, reasoning and required
/// fields can reject a reply.
pub fn parse_provider_reply(raw: &str) -> Result<AdvisoryVerdict, AdvisoryError> {
    let body = extract_json_object(raw)
        .ok_or_else(|| AdvisoryError::Malformed("no JSON object in reply".to_string()))?;
    let verdict = serde_json::from_str::<AdvisoryVerdict>(body)
        .map_err(|e| AdvisoryError::Malformed(format!("json_parse: {e}")))?
        .normalized();
    verdict.validate()?;
    Ok(verdict)
}

fn extract_json_object(raw: &str) -> Option<&str> {
    let start = raw.find('{')?;
    let end = raw.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&raw[start..=end])
}
