#![forbid(unsafe_code)]

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::{validate_opt_text, validate_text};
use crate::{ContractViolation, SchemaVersion, Validate};

pub const PEDIGREE_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Average month length used for every age derivation in the engine.
pub const DAYS_PER_MONTH: f64 = 30.44;

pub const MAX_PEDIGREE_LEVEL: u8 = 5;
pub const MAX_ANCESTRY_ENTRIES: usize = 512;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct AnimalRecordId(pub u64);

impl Validate for AnimalRecordId {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "animal_record_id",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnimalStatus {
    Active,
    Breeding,
    Retired,
    Sold,
    Deceased,
}

impl AnimalStatus {
    pub fn is_breeding_candidate(self) -> bool {
        matches!(self, Self::Active | Self::Breeding)
    }
}

/// Pedigree record as owned by the persistence layer. The engine only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Animal {
    pub id: AnimalRecordId,
    pub animal_id: String,
    pub name: String,
    pub gender: Gender,
    #[serde(default)]
    pub breed: Option<String>,
    #[serde(default)]
    pub secondary_breed: Option<String>,
    #[serde(default)]
    pub is_mixed: bool,
    #[serde(default)]
    pub mix_ratio: Option<String>,
    #[serde(default)]
    pub date_of_birth: Option<NaiveDate>,
    #[serde(default)]
    pub health: Option<u8>,
    #[serde(default)]
    pub fertility: Option<u8>,
    #[serde(default)]
    pub growth_rate: Option<u8>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub parent_male_id: Option<AnimalRecordId>,
    #[serde(default)]
    pub parent_female_id: Option<AnimalRecordId>,
    #[serde(default)]
    pub generation: u32,
    #[serde(default)]
    pub ancestry: Vec<AnimalRecordId>,
    #[serde(default)]
    pub pedigree_level: u8,
    pub status: AnimalStatus,
}

impl Animal {
    /// Foundation-stock record with every optional trait unknown.
    pub fn v1(
        id: AnimalRecordId,
        animal_id: String,
        name: String,
        gender: Gender,
        status: AnimalStatus,
    ) -> Result<Self, ContractViolation> {
        let a = Self {
            id,
            animal_id,
            name,
            gender,
            breed: None,
            secondary_breed: None,
            is_mixed: false,
            mix_ratio: None,
            date_of_birth: None,
            health: None,
            fertility: None,
            growth_rate: None,
            weight: None,
            parent_male_id: None,
            parent_female_id: None,
            generation: 0,
            ancestry: Vec::new(),
            pedigree_level: 0,
            status,
        };
        a.validate()?;
        Ok(a)
    }

    /// Whole months elapsed since birth, `None` when the birth date is unknown.
    /// Birth dates after `now` count as zero months.
    pub fn age_in_months(&self, now: DateTime<Utc>) -> Option<u32> {
        self.date_of_birth.map(|dob| age_in_months(dob, now))
    }

    pub fn parent_ids(&self) -> impl Iterator<Item = AnimalRecordId> + '_ {
        self.parent_male_id.iter().chain(self.parent_female_id.iter()).copied()
    }

    pub fn has_ancestor(&self, id: AnimalRecordId) -> bool {
        self.parent_male_id == Some(id)
            || self.parent_female_id == Some(id)
            || self.ancestry.contains(&id)
    }
}

/// Whole average-length months elapsed from midnight UTC on the birth date.
pub fn age_in_months(date_of_birth: NaiveDate, now: DateTime<Utc>) -> u32 {
    let born = date_of_birth.and_time(NaiveTime::default()).and_utc();
    let elapsed_secs = now.signed_duration_since(born).num_seconds();
    if elapsed_secs <= 0 {
        return 0;
    }
    (elapsed_secs as f64 / (DAYS_PER_MONTH * 86_400.0)).floor() as u32
}

fn validate_scale(field: &'static str, value: Option<u8>) -> Result<(), ContractViolation> {
    if let Some(v) = value {
        if !(1..=100).contains(&v) {
            return Err(ContractViolation::InvalidRange {
                field,
                min: 1.0,
                max: 100.0,
                got: f64::from(v),
            });
        }
    }
    Ok(())
}

impl Validate for Animal {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        validate_text("animal.animal_id", &self.animal_id, 64)?;
        validate_text("animal.name", &self.name, 128)?;
        validate_opt_text("animal.breed", &self.breed, 64)?;
        validate_opt_text("animal.secondary_breed", &self.secondary_breed, 64)?;
        validate_opt_text("animal.mix_ratio", &self.mix_ratio, 64)?;
        validate_scale("animal.health", self.health)?;
        validate_scale("animal.fertility", self.fertility)?;
        validate_scale("animal.growth_rate", self.growth_rate)?;
        if let Some(w) = self.weight {
            if !w.is_finite() {
                return Err(ContractViolation::NotFinite {
                    field: "animal.weight",
                });
            }
            if w <= 0.0 {
                return Err(ContractViolation::InvalidValue {
                    field: "animal.weight",
                    reason: "must be > 0 when provided",
                });
            }
        }
        for parent in self.parent_ids() {
            parent.validate()?;
            if parent == self.id {
                return Err(ContractViolation::InvalidValue {
                    field: "animal.parent_id",
                    reason: "must not reference the animal itself",
                });
            }
        }
        if self.parent_male_id.is_some() && self.parent_male_id == self.parent_female_id {
            return Err(ContractViolation::InvalidValue {
                field: "animal.parent_female_id",
                reason: "must differ from parent_male_id",
            });
        }
        if self.ancestry.len() > MAX_ANCESTRY_ENTRIES {
            return Err(ContractViolation::InvalidValue {
                field: "animal.ancestry",
                reason: "must be <= 512 entries",
            });
        }
        if self.ancestry.contains(&self.id) {
            return Err(ContractViolation::InvalidValue {
                field: "animal.ancestry",
                reason: "must not contain the animal's own id",
            });
        }
        if self.pedigree_level > MAX_PEDIGREE_LEVEL {
            return Err(ContractViolation::InvalidRange {
                field: "animal.pedigree_level",
                min: 0.0,
                max: f64::from(MAX_PEDIGREE_LEVEL),
                got: f64::from(self.pedigree_level),
            });
        }
        Ok(())
    }
}

/// A validated (male, female) candidate pair. Both records are eligible for
/// breeding and play the role their gender says they play.
#[derive(Debug, Clone, PartialEq)]
pub struct BreedingPair {
    pub schema_version: SchemaVersion,
    pub male: Animal,
    pub female: Animal,
}

impl BreedingPair {
    pub fn v1(male: Animal, female: Animal) -> Result<Self, ContractViolation> {
        let p = Self {
            schema_version: PEDIGREE_CONTRACT_VERSION,
            male,
            female,
        };
        p.validate()?;
        Ok(p)
    }
}

impl Validate for BreedingPair {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.schema_version != PEDIGREE_CONTRACT_VERSION {
            return Err(ContractViolation::InvalidValue {
                field: "breeding_pair.schema_version",
                reason: "must match PEDIGREE_CONTRACT_VERSION",
            });
        }
        self.male.validate()?;
        self.female.validate()?;
        if self.male.gender != Gender::Male {
            return Err(ContractViolation::InvalidValue {
                field: "breeding_pair.male.gender",
                reason: "must be male",
            });
        }
        if self.female.gender != Gender::Female {
            return Err(ContractViolation::InvalidValue {
                field: "breeding_pair.female.gender",
                reason: "must be female",
            });
        }
        if !self.male.status.is_breeding_candidate() {
            return Err(ContractViolation::InvalidValue {
                field: "breeding_pair.male.status",
                reason: "must be active or breeding",
            });
        }
        if !self.female.status.is_breeding_candidate() {
            return Err(ContractViolation::InvalidValue {
                field: "breeding_pair.female.status",
                reason: "must be active or breeding",
            });
        }
        if self.male.id == self.female.id || self.male.animal_id == self.female.animal_id {
            return Err(ContractViolation::InvalidValue {
                field: "breeding_pair",
                reason: "candidates must be two distinct animals",
            });
        }
        Ok(())
    }
}
