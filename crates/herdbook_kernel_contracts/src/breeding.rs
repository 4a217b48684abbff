#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::validate_text;
use crate::pedigree::{AnimalRecordId, BreedingPair};
use crate::{ContractViolation, SchemaVersion, Validate};

pub const BREEDING_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

pub const MAX_SCORE: u8 = 100;
pub const MAX_GUIDANCE_ITEMS: usize = 16;
pub const MAX_GUIDANCE_ITEM_CHARS: usize = 512;
pub const HISTORY_LOG_CAPACITY: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceSource {
    Provider,
    Rules,
}

fn validate_guidance(field: &'static str, items: &[String]) -> Result<(), ContractViolation> {
    if items.len() > MAX_GUIDANCE_ITEMS {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be <= 16 entries",
        });
    }
    for item in items {
        validate_text(field, item, MAX_GUIDANCE_ITEM_CHARS)?;
    }
    Ok(())
}

/// Advisory payload as returned by an external provider: the advice shape
/// without a timestamp. Scores arrive as raw integers so out-of-range values
/// are caught by validation rather than by the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvisoryVerdict {
    pub compatible: bool,
    pub recommendation_score: i64,
    pub reasoning: String,
    pub breeding_recommendations: Vec<String>,
    pub health_considerations: Vec<String>,
}

fn normalize_guidance(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| {
            item.trim()
                .chars()
                .map(|c| if c.is_control() && c != '\n' { ' ' } else { c })
                .take(MAX_GUIDANCE_ITEM_CHARS)
                .collect::<String>()
        })
        .filter(|item| !item.trim().is_empty())
        .take(MAX_GUIDANCE_ITEMS)
        .collect()
}

impl AdvisoryVerdict {
    /// Tidies the guidance lists of a provider reply: blank items are dropped,
    /// control characters become spaces, and over-long items and lists are
    /// cut to the advice limits. Score and reasoning are left for validation.
    pub fn normalized(self) -> Self {
        Self {
            breeding_recommendations: normalize_guidance(self.breeding_recommendations),
            health_considerations: normalize_guidance(self.health_considerations),
            ..self
        }
    }

    pub fn into_advice(
        self,
        timestamp: DateTime<Utc>,
        source: AdviceSource,
    ) -> Result<CompatibilityAdvice, ContractViolation> {
        self.validate()?;
        CompatibilityAdvice::v1(
            self.compatible,
            self.recommendation_score as u8,
            self.reasoning,
            self.breeding_recommendations,
            self.health_considerations,
            timestamp,
            source,
        )
    }
}

impl Validate for AdvisoryVerdict {
    fn validate(&self) -> Result<(), ContractViolation> {
        if !(0..=i64::from(MAX_SCORE)).contains(&self.recommendation_score) {
            return Err(ContractViolation::InvalidRange {
                field: "advisory_verdict.recommendation_score",
                min: 0.0,
                max: f64::from(MAX_SCORE),
                got: self.recommendation_score as f64,
            });
        }
        validate_text("advisory_verdict.reasoning", &self.reasoning, 4096)?;
        validate_guidance(
            "advisory_verdict.breeding_recommendations",
            &self.breeding_recommendations,
        )?;
        validate_guidance(
            "advisory_verdict.health_considerations",
            &self.health_considerations,
        )?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompatibilityAdvice {
    pub compatible: bool,
    pub recommendation_score: u8,
    pub reasoning: String,
    pub breeding_recommendations: Vec<String>,
    pub health_considerations: Vec<String>,
    pub timestamp: DateTime<Utc>,
    pub source: AdviceSource,
}

impl CompatibilityAdvice {
    pub fn v1(
        compatible: bool,
        recommendation_score: u8,
        reasoning: String,
        breeding_recommendations: Vec<String>,
        health_considerations: Vec<String>,
        timestamp: DateTime<Utc>,
        source: AdviceSource,
    ) -> Result<Self, ContractViolation> {
        let a = Self {
            compatible,
            recommendation_score,
            reasoning,
            breeding_recommendations,
            health_considerations,
            timestamp,
            source,
        };
        a.validate()?;
        Ok(a)
    }
}

impl Validate for CompatibilityAdvice {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.recommendation_score > MAX_SCORE {
            return Err(ContractViolation::InvalidRange {
                field: "compatibility_advice.recommendation_score",
                min: 0.0,
                max: f64::from(MAX_SCORE),
                got: f64::from(self.recommendation_score),
            });
        }
        validate_text("compatibility_advice.reasoning", &self.reasoning, 4096)?;
        validate_guidance(
            "compatibility_advice.breeding_recommendations",
            &self.breeding_recommendations,
        )?;
        validate_guidance(
            "compatibility_advice.health_considerations",
            &self.health_considerations,
        )?;
        Ok(())
    }
}

/// One row of the evaluation history. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationLogEntry {
    pub schema_version: SchemaVersion,
    pub male_record_id: AnimalRecordId,
    pub male_animal_id: String,
    pub male_name: String,
    pub female_record_id: AnimalRecordId,
    pub female_animal_id: String,
    pub female_name: String,
    pub advice: CompatibilityAdvice,
    pub logged_at: DateTime<Utc>,
}

impl EvaluationLogEntry {
    pub fn v1(
        pair: &BreedingPair,
        advice: CompatibilityAdvice,
        logged_at: DateTime<Utc>,
    ) -> Result<Self, ContractViolation> {
        let e = Self {
            schema_version: BREEDING_CONTRACT_VERSION,
            male_record_id: pair.male.id,
            male_animal_id: pair.male.animal_id.clone(),
            male_name: pair.male.name.clone(),
            female_record_id: pair.female.id,
            female_animal_id: pair.female.animal_id.clone(),
            female_name: pair.female.name.clone(),
            advice,
            logged_at,
        };
        e.validate()?;
        Ok(e)
    }

    pub fn involves(&self, animal_code: &str) -> bool {
        self.male_animal_id == animal_code || self.female_animal_id == animal_code
    }
}

impl Validate for EvaluationLogEntry {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != BREEDING_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "evaluation_log_entry.schema_version",
                reason: "must match BREEDING_CONTRACT_VERSION",
            });
        }
        self.male_record_id.validate()?;
        self.female_record_id.validate()?;
        validate_text(
            "evaluation_log_entry.male_animal_id",
            &self.male_animal_id,
            64,
        )?;
        validate_text("evaluation_log_entry.male_name", &self.male_name, 128)?;
        validate_text(
            "evaluation_log_entry.female_animal_id",
            &self.female_animal_id,
            64,
        )?;
        validate_text("evaluation_log_entry.female_name", &self.female_name, 128)?;
        self.advice.validate()
    }
}
