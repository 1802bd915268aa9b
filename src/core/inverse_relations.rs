// Inverse relation resolution. Relationships are declared once but must be
// browsable from both ends, so the "other side" is computed at read time from
// the stored definitions rather than materialized as mirror rows. Both call
// sites (definition listing and relation listing) resolve their candidates
// here so the membership rules cannot drift apart.

use crate::models::{EntityKind, RelationDefinition};

/// Whether `kind` is a declared target of `definition`.
pub fn targets_include(definition: &RelationDefinition, kind: &EntityKind) -> bool {
    definition.target_entity_types.contains(kind)
}

/// True when `candidate` declares the return trip of `current`: its source is
/// one of `current`'s targets and its targets include `current`'s source.
fn declares_return_trip(candidate: &RelationDefinition, current: &RelationDefinition) -> bool {
    candidate.id != current.id
        && candidate.is_active
        && targets_include(current, &candidate.source_entity_type)
        && targets_include(candidate, &current.source_entity_type)
}

/// Definitions that should appear as virtual inverse entries when listing
/// definitions for `entity_type`: bidirectional definitions declared from
/// another kind that name `entity_type` among their targets.
pub fn bidirectional_inverses_for<'a>(
    definitions: &'a [RelationDefinition],
    entity_type: &EntityKind,
) -> Vec<&'a RelationDefinition> {
    definitions
        .iter()
        .filter(|def| {
            def.is_active
                && def.is_bidirectional
                && def.source_entity_type != *entity_type
                && targets_include(def, entity_type)
        })
        .collect()
}

/// Candidate definitions whose edges may point *at* an entity traversed under
/// `current`. A bidirectional `current` is its own candidate - its stored
/// edges read backward when listed from a target-side entity. Other
/// definitions qualify as independently declared matching pairs, plus
/// bidirectional ones when `current` itself is not bidirectional. The union
/// is deduplicated by definition id.
pub fn inverse_candidates_for<'a>(
    definitions: &'a [RelationDefinition],
    current: &'a RelationDefinition,
) -> Vec<&'a RelationDefinition> {
    let own = current.is_bidirectional.then_some(current);

    let matching_pairs = definitions
        .iter()
        .filter(|def| declares_return_trip(def, current));

    let bidirectional: Vec<&RelationDefinition> = if current.is_bidirectional {
        Vec::new()
    } else {
        definitions
            .iter()
            .filter(|def| def.is_bidirectional && declares_return_trip(def, current))
            .collect()
    };

    let mut seen = std::collections::HashSet::new();
    own.into_iter()
        .chain(matching_pairs)
        .chain(bidirectional)
        .filter(|def| seen.insert(def.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RelationType;
    use chrono::Utc;
    use uuid::Uuid;

    fn definition(
        source: EntityKind,
        targets: Vec<EntityKind>,
        bidirectional: bool,
    ) -> RelationDefinition {
        RelationDefinition {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            name: "related".to_string(),
            field_key: "related".to_string(),
            source_entity_type: source,
            target_entity_types: targets,
            relation_type: RelationType::ManyToMany,
            is_bidirectional: bidirectional,
            inverse_name: None,
            display_fields: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn matching_pair_is_found() {
        let current = definition(EntityKind::Project, vec![EntityKind::Supplier], false);
        let pair = definition(EntityKind::Supplier, vec![EntityKind::Project], false);
        let unrelated = definition(EntityKind::Client, vec![EntityKind::Task], false);
        let defs = vec![current.clone(), pair.clone(), unrelated];

        let candidates = inverse_candidates_for(&defs, &current);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, pair.id);
    }

    #[test]
    fn inactive_definitions_are_never_candidates() {
        let current = definition(EntityKind::Project, vec![EntityKind::Supplier], false);
        let mut pair = definition(EntityKind::Supplier, vec![EntityKind::Project], false);
        pair.is_active = false;
        let defs = vec![current.clone(), pair];

        assert!(inverse_candidates_for(&defs, &current).is_empty());
    }

    #[test]
    fn union_is_deduplicated_by_definition_id() {
        let current = definition(EntityKind::Project, vec![EntityKind::Supplier], false);
        // Bidirectional return trip satisfies both candidate rules at once.
        let both = definition(EntityKind::Supplier, vec![EntityKind::Project], true);
        let defs = vec![current.clone(), both.clone()];

        let candidates = inverse_candidates_for(&defs, &current);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, both.id);
    }

    #[test]
    fn unidirectional_definition_is_not_its_own_candidate() {
        // Self-referential kind: project -> project.
        let current = definition(EntityKind::Project, vec![EntityKind::Project], false);
        let defs = vec![current.clone()];

        assert!(inverse_candidates_for(&defs, &current).is_empty());
    }

    #[test]
    fn bidirectional_definition_is_its_own_inverse_candidate() {
        let current = definition(EntityKind::Project, vec![EntityKind::Supplier], true);
        let defs = vec![current.clone()];

        let candidates = inverse_candidates_for(&defs, &current);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, current.id);
    }

    #[test]
    fn bidirectional_listing_inverse_requires_other_source() {
        let bidi = definition(EntityKind::Project, vec![EntityKind::Supplier], true);
        let plain = definition(EntityKind::Client, vec![EntityKind::Supplier], false);
        let defs = vec![bidi.clone(), plain];

        let inverses = bidirectional_inverses_for(&defs, &EntityKind::Supplier);
        assert_eq!(inverses.len(), 1);
        assert_eq!(inverses[0].id, bidi.id);

        // From the declaring side itself there is nothing to invert.
        assert!(bidirectional_inverses_for(&defs, &EntityKind::Project).is_empty());
    }
}
