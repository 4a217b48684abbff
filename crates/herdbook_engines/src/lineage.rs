#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use herdbook_kernel_contracts::pedigree::{Animal, AnimalRecordId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relationship {
    Unrelated,
    ParentOffspring,
    FullSiblings,
    HalfSiblings,
    AncestorDescendant,
    SharedAncestry { shared_ancestors: usize },
}

impl Relationship {
    /// First-degree relations: parent/offspring or a shared sire or dam.
    pub fn is_close(self) -> bool {
        matches!(
            self,
            Self::ParentOffspring | Self::FullSiblings | Self::HalfSiblings
        )
    }

    /// Relation that only shows up through the recorded ancestry lists.
    pub fn is_distant(self) -> bool {
        matches!(
            self,
            Self::AncestorDescendant | Self::SharedAncestry { .. }
        )
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Unrelated => "unrelated",
            Self::ParentOffspring => "parent and offspring",
            Self::FullSiblings => "full siblings",
            Self::HalfSiblings => "half siblings",
            Self::AncestorDescendant => "ancestor and descendant",
            Self::SharedAncestry { .. } => "related through shared ancestors",
        }
    }
}

/// Classifies how two records are related using only parent pointers and the
/// recorded ancestry lists. Closest relation wins.
pub fn relationship(a: &Animal, b: &Animal) -> Relationship {
    if a.parent_male_id == Some(b.id)
        || a.parent_female_id == Some(b.id)
        || b.parent_male_id == Some(a.id)
        || b.parent_female_id == Some(a.id)
    {
        return Relationship::ParentOffspring;
    }

    let same_sire = a.parent_male_id.is_some() && a.parent_male_id == b.parent_male_id;
    let same_dam = a.parent_female_id.is_some() && a.parent_female_id == b.parent_female_id;
    match (same_sire, same_dam) {
        (true, true) => return Relationship::FullSiblings,
        (true, false) | (false, true) => return Relationship::HalfSiblings,
        (false, false) => {}
    }

    if a.ancestry.contains(&b.id) || b.ancestry.contains(&a.id) {
        return Relationship::AncestorDescendant;
    }

    let lineage_a = lineage_set(a);
    let shared = lineage_set(b).intersection(&lineage_a).count();
    if shared > 0 {
        return Relationship::SharedAncestry {
            shared_ancestors: shared,
        };
    }
    Relationship::Unrelated
}

fn lineage_set(a: &Animal) -> BTreeSet<AnimalRecordId> {
    a.parent_ids().chain(a.ancestry.iter().copied()).collect()
}

pub fn offspring_generation(male: &Animal, female: &Animal) -> u32 {
    male.generation.max(female.generation).saturating_add(1)
}

/// Ancestry list for an offspring of the pair: both parents first, then each
/// parent's own lineage in recorded order, without duplicates.
pub fn offspring_ancestry(male: &Animal, female: &Animal) -> Vec<AnimalRecordId> {
    let mut seen = BTreeSet::new();
    let mut out = Vec::new();
    let candidates = [male.id, female.id]
        .into_iter()
        .chain(male.parent_ids())
        .chain(male.ancestry.iter().copied())
        .chain(female.parent_ids())
        .chain(female.ancestry.iter().copied());
    for id in candidates {
        if seen.insert(id) {
            out.push(id);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use herdbook_kernel_contracts::pedigree::{AnimalStatus, Gender};

    fn animal(id: u64, gender: Gender) -> Animal {
        Animal::v1(
            AnimalRecordId(id),
            format!("A{id}"),
            format!("Animal {id}"),
            gender,
            AnimalStatus::Active,
        )
        .unwrap()
    }

    #[test]
    fn at_lin_01_parent_pointer_wins_over_everything() {
        let sire = animal(1, Gender::Male);
        let mut daughter = animal(2, Gender::Female);
        daughter.parent_male_id = Some(sire.id);
        assert_eq!(relationship(&sire, &daughter), Relationship::ParentOffspring);
        assert_eq!(relationship(&daughter, &sire), Relationship::ParentOffspring);
    }

    #[test]
    fn at_lin_02_siblings_are_detected_from_shared_parents() {
        let mut m = animal(10, Gender::Male);
        let mut f = animal(11, Gender::Female);
        m.parent_male_id = Some(AnimalRecordId(1));
        f.parent_male_id = Some(AnimalRecordId(1));
        assert_eq!(relationship(&m, &f), Relationship::HalfSiblings);

        m.parent_female_id = Some(AnimalRecordId(2));
        f.parent_female_id = Some(AnimalRecordId(2));
        assert_eq!(relationship(&m, &f), Relationship::FullSiblings);
        assert!(relationship(&m, &f).is_close());
    }

    #[test]
    fn at_lin_03_ancestry_lists_expose_distant_relations() {
        let grandsire = animal(1, Gender::Male);
        let mut granddaughter = animal(5, Gender::Female);
        granddaughter.ancestry = vec![AnimalRecordId(3), grandsire.id];
        assert_eq!(
            relationship(&grandsire, &granddaughter),
            Relationship::AncestorDescendant
        );

        let mut m = animal(20, Gender::Male);
        let mut f = animal(21, Gender::Female);
        m.ancestry = vec![AnimalRecordId(7), AnimalRecordId(8)];
        f.ancestry = vec![AnimalRecordId(8), AnimalRecordId(9)];
        assert_eq!(
            relationship(&m, &f),
            Relationship::SharedAncestry {
                shared_ancestors: 1
            }
        );
        assert!(!relationship(&m, &f).is_close());
        assert!(relationship(&m, &f).is_distant());
        assert!(!relationship(&grandsire, &granddaughter).is_close());
    }

    #[test]
    fn at_lin_04_unrelated_when_no_lineage_overlaps() {
        let mut m = animal(30, Gender::Male);
        let mut f = animal(31, Gender::Female);
        m.ancestry = vec![AnimalRecordId(1)];
        f.ancestry = vec![AnimalRecordId(2)];
        assert_eq!(relationship(&m, &f), Relationship::Unrelated);
        assert!(!relationship(&m, &f).is_close());
        assert!(!relationship(&m, &f).is_distant());
    }

    #[test]
    fn at_lin_05_offspring_lineage_follows_parents() {
        let mut m = animal(40, Gender::Male);
        let mut f = animal(41, Gender::Female);
        m.generation = 2;
        f.generation = 0;
        m.parent_male_id = Some(AnimalRecordId(3));
        m.ancestry = vec![AnimalRecordId(3), AnimalRecordId(1)];
        f.ancestry = vec![AnimalRecordId(1), AnimalRecordId(2)];
        assert_eq!(offspring_generation(&m, &f), 3);
        assert_eq!(
            offspring_ancestry(&m, &f),
            vec![
                AnimalRecordId(40),
                AnimalRecordId(41),
                AnimalRecordId(3),
                AnimalRecordId(1),
                AnimalRecordId(2),
            ]
        );
    }
}
