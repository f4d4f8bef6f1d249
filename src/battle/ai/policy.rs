//! Decision policy: snapshot + assessment + skill -> decision bundle

use rand::Rng;

use crate::battle::ai::decisions::{DecisionBundle, Posture};
use crate::battle::ai::faction_tactics::FactionTacticTable;
use crate::battle::ai::formations::{formation_adjustments, target_priorities};
use crate::battle::ai::maneuvers::{
    faction_signature, posture_menu, truncate_by_priority, MenuOptions, MAX_MANEUVERS,
};
use crate::battle::ai::responses::{opportunity_actions, threat_responses};
use crate::battle::ai::variation;
use crate::battle::evaluator::Assessment;
use crate::battle::snapshot::Snapshot;
use crate::core::config::{FeatureToggles, TacticsConfig};

/// Rule-based decision policy
///
/// Holds only configuration; every call is a function of its inputs and
/// the caller's random generator.
#[derive(Debug, Clone)]
pub struct DecisionPolicy {
    features: FeatureToggles,
    envelopment_min_strength: u32,
    faction_table: FactionTacticTable,
}

impl DecisionPolicy {
    pub fn new(config: &TacticsConfig) -> Self {
        Self {
            features: config.features.clone(),
            envelopment_min_strength: config.envelopment_min_strength,
            faction_table: config.faction_table.clone(),
        }
    }

    /// Decide posture, maneuvers, responses, actions, formations and
    /// target priorities for one faction.
    pub fn decide<R: Rng + ?Sized>(
        &self,
        snapshot: &Snapshot,
        assessment: &Assessment,
        skill: f32,
        rng: &mut R,
    ) -> DecisionBundle {
        let posture = Posture::from_situation(assessment.overall_situation);

        let options = MenuOptions {
            advanced: self.features.advanced_maneuvers,
            envelopment_min_strength: self.envelopment_min_strength,
        };
        let mut maneuvers = posture_menu(posture, snapshot, assessment, options);
        if self.features.faction_tactics {
            maneuvers.extend(faction_signature(snapshot, &self.faction_table));
        }
        truncate_by_priority(&mut maneuvers, MAX_MANEUVERS);

        let mut responses = threat_responses(snapshot);
        let mut actions = opportunity_actions(snapshot);

        variation::apply(
            &mut maneuvers,
            &mut responses,
            &mut actions,
            skill,
            self.features.unexpected_maneuvers,
            rng,
        );

        let offensive_infantry = if self.features.faction_tactics {
            self.faction_table
                .lookup(&snapshot.key)
                .and_then(|t| t.offensive_infantry)
        } else {
            None
        };

        DecisionBundle {
            faction: snapshot.faction,
            time: snapshot.time,
            posture,
            overall_situation: assessment.overall_situation,
            maneuvers,
            responses,
            actions,
            formations: formation_adjustments(posture, snapshot, assessment, offensive_infantry),
            targets: target_priorities(snapshot),
        }
    }
}
