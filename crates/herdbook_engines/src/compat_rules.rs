#![forbid(unsafe_code)]

use chrono::{DateTime, Utc};
use herdbook_kernel_contracts::breeding::{AdviceSource, CompatibilityAdvice, MAX_SCORE};
use herdbook_kernel_contracts::pedigree::{Animal, BreedingPair};
use herdbook_kernel_contracts::{ContractViolation, ReasonCodeId, Validate};

use crate::lineage::relationship;

pub mod reason_codes {
    use herdbook_kernel_contracts::ReasonCodeId;

    // Breeding rule namespace (0x4252 = "BR").
    pub const BR_UNDERAGE: ReasonCodeId = ReasonCodeId(0x4252_0001);
    pub const BR_LOW_HEALTH: ReasonCodeId = ReasonCodeId(0x4252_0002);
    pub const BR_CLOSE_RELATION: ReasonCodeId = ReasonCodeId(0x4252_0003);
}

pub const BASELINE_REASONING: &str =
    "Basic compatibility assessment based on standard breeding guidelines.";

pub const STANDARD_BREEDING_RECOMMENDATIONS: [&str; 3] = [
    "Provide balanced nutrition with adequate protein and minerals for both animals before and during breeding.",
    "Keep the pair in a clean, low-stress environment with enough space and shelter.",
    "Monitor the female closely through breeding and gestation, and record service dates.",
];

pub const STANDARD_HEALTH_CONSIDERATIONS: [&str; 3] = [
    "Check both animals for respiratory issues before pairing.",
    "Screen for internal and external parasites and treat as needed.",
    "Watch for signs of pregnancy complications and schedule veterinary checks during gestation.",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreedingRulesConfig {
    pub baseline_score: u8,
    pub breed_mismatch_penalty: u8,
    pub min_age_months: u32,
    pub underage_penalty: u8,
    pub min_health: u8,
    pub low_health_penalty: u8,
    pub lineage_check_enabled: bool,
    pub close_relation_penalty: u8,
}

impl BreedingRulesConfig {
    pub fn mvp_v1() -> Self {
        Self {
            baseline_score: 85,
            breed_mismatch_penalty: 10,
            min_age_months: 6,
            underage_penalty: 20,
            min_health: 70,
            low_health_penalty: 20,
            lineage_check_enabled: false,
            close_relation_penalty: 30,
        }
    }

    /// Baseline rules plus the pedigree check.
    pub fn with_lineage_check() -> Self {
        Self {
            lineage_check_enabled: true,
            ..Self::mvp_v1()
        }
    }
}

// Declaration order is reporting order: most severe axis first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Axis {
    Lineage,
    Health,
    Age,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Role {
    Female,
    Male,
}

impl Role {
    fn label(self) -> &'static str {
        match self {
            Self::Female => "female",
            Self::Male => "male",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Finding {
    axis: Axis,
    role: Role,
    reason_code: ReasonCodeId,
    text: String,
}

/// Deterministic fallback evaluator. No I/O; `now` is supplied by the caller.
#[derive(Debug, Clone)]
pub struct BreedingRulesRuntime {
    config: BreedingRulesConfig,
}

impl BreedingRulesRuntime {
    pub fn new(config: BreedingRulesConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> BreedingRulesConfig {
        self.config
    }

    pub fn evaluate(
        &self,
        pair: &BreedingPair,
        now: DateTime<Utc>,
    ) -> Result<CompatibilityAdvice, ContractViolation> {
        pair.validate()?;
        let c = self.config;
        let male = &pair.male;
        let female = &pair.female;

        let mut score = i32::from(c.baseline_score);
        let mut findings: Vec<Finding> = Vec::new();
        let mut breed_advisory = None;
        let mut health_considerations: Vec<String> = STANDARD_HEALTH_CONSIDERATIONS
            .iter()
            .map(|s| s.to_string())
            .collect();

        if let (Some(mb), Some(fb)) = (male.breed.as_deref(), female.breed.as_deref()) {
            if !same_breed(mb, fb) {
                score -= i32::from(c.breed_mismatch_penalty);
                breed_advisory = Some(format!(
                    "Cross-breeding {mb} with {fb}: offspring may gain hybrid vigor, but traits will be less predictable than a purebred pairing."
                ));
            }
        }

        for (role, a) in [(Role::Male, male), (Role::Female, female)] {
            if let Some(months) = a.age_in_months(now) {
                if months < c.min_age_months {
                    score -= i32::from(c.underage_penalty);
                    findings.push(Finding {
                        axis: Axis::Age,
                        role,
                        reason_code: reason_codes::BR_UNDERAGE,
                        text: format!(
                            "The {} {} ({}) is only {months} months old; breeding candidates must be at least {} months.",
                            role.label(),
                            a.animal_id,
                            a.name,
                            c.min_age_months
                        ),
                    });
                }
            }
        }

        for (role, a) in [(Role::Male, male), (Role::Female, female)] {
            if let Some(health) = a.health {
                if health < c.min_health {
                    score -= i32::from(c.low_health_penalty);
                    findings.push(Finding {
                        axis: Axis::Health,
                        role,
                        reason_code: reason_codes::BR_LOW_HEALTH,
                        text: format!(
                            "The {} {} ({}) has a health score of {health}, below the minimum of {}.",
                            role.label(),
                            a.animal_id,
                            a.name,
                            c.min_health
                        ),
                    });
                }
            }
        }

        if c.lineage_check_enabled {
            let rel = relationship(male, female);
            if rel.is_distant() {
                health_considerations.push(format!(
                    "{} and {} are {}; review the pedigree for inbreeding risk before confirming the pairing.",
                    male.animal_id,
                    female.animal_id,
                    rel.describe()
                ));
            } else if rel.is_close() {
                score -= i32::from(c.close_relation_penalty);
                findings.push(Finding {
                    axis: Axis::Lineage,
                    role: Role::Female,
                    reason_code: reason_codes::BR_CLOSE_RELATION,
                    text: format!(
                        "{} and {} are {}; pairing them risks inbreeding depression.",
                        male.animal_id,
                        female.animal_id,
                        rel.describe()
                    ),
                });
            }
        }

        let score = score.clamp(0, i32::from(MAX_SCORE)) as u8;
        let compatible = findings.is_empty();
        let reasoning = compose_reasoning(findings, breed_advisory);

        CompatibilityAdvice::v1(
            compatible,
            score,
            reasoning,
            STANDARD_BREEDING_RECOMMENDATIONS
                .iter()
                .map(|s| s.to_string())
                .collect(),
            health_considerations,
            now,
            AdviceSource::Rules,
        )
    }

    /// Convenience entry that validates the raw records into a pair first.
    pub fn evaluate_animals(
        &self,
        male: &Animal,
        female: &Animal,
        now: DateTime<Utc>,
    ) -> Result<CompatibilityAdvice, ContractViolation> {
        let pair = BreedingPair::v1(male.clone(), female.clone())?;
        self.evaluate(&pair, now)
    }
}

fn same_breed(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn compose_reasoning(mut findings: Vec<Finding>, breed_advisory: Option<String>) -> String {
    findings.sort_by_key(|f| (f.axis, f.role));
    let mut iter = findings.into_iter();
    let Some(primary) = iter.next() else {
        return breed_advisory.unwrap_or_else(|| BASELINE_REASONING.to_string());
    };
    let rest: Vec<String> = iter.map(|f| f.text).collect();
    if rest.is_empty() {
        primary.text
    } else {
        format!("{} Additional concerns: {}", primary.text, rest.join(" "))
    }
}
