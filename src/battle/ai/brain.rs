//! Tactical brain: per-faction arena and the tick-driven decision loop
//!
//! Each registered faction runs snapshot -> evaluate -> decide -> execute
//! to completion before the next one starts. A failure in one faction is
//! logged and skipped; the next natural cycle is the retry.

use ahash::AHashMap;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use std::collections::VecDeque;

use crate::battle::ai::decisions::{DecisionBundle, ManeuverKind, Posture};
use crate::battle::ai::executor::Executor;
use crate::battle::ai::policy::DecisionPolicy;
use crate::battle::ai::stabilizer::{GateState, GateVerdict};
use crate::battle::evaluator::BattlefieldEvaluator;
use crate::battle::groups::TeamInfo;
use crate::battle::host::{BattleHost, GroupCommands};
use crate::battle::snapshot::Snapshot;
use crate::battle::tracking::ThreatBoard;
use crate::core::config::TacticsConfig;
use crate::core::error::Result;
use crate::core::types::{FactionId, MissionTime};
use crate::spatial::TerrainQuery;

/// Skill assumed for a faction without any commander
pub const LEADERLESS_SKILL: f32 = 0.5;

/// Bookkeeping for one AI faction, keyed by its stable id
#[derive(Debug, Clone)]
pub struct FactionContext {
    pub id: FactionId,
    pub key: String,
    /// Commander skill in 0..=1
    pub skill: f32,
    rng: ChaCha8Rng,
    last_update: Option<MissionTime>,
    history: VecDeque<DecisionBundle>,
    history_len: usize,
    gate: GateState,
    board: ThreatBoard,
}

impl FactionContext {
    fn new(team: &TeamInfo, config: &TacticsConfig) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(faction_seed(config.seed, team.faction));
        let base = match team.leader_skill {
            Some(skill) => skill,
            None if team.has_leader => rng.gen_range(0.3..=1.0),
            None => LEADERLESS_SKILL,
        };
        Self {
            id: team.faction,
            key: team.key.clone(),
            skill: (base * config.commander.skill_multiplier).clamp(0.0, 1.0),
            rng,
            last_update: None,
            history: VecDeque::with_capacity(config.history_len),
            history_len: config.history_len,
            gate: GateState::default(),
            board: ThreatBoard::new(),
        }
    }

    /// Has the update interval elapsed? The first call always evaluates.
    fn should_evaluate(&self, now: MissionTime, interval: f32) -> bool {
        match self.last_update {
            None => true,
            Some(last) => now - last >= interval,
        }
    }

    fn remember(&mut self, bundle: DecisionBundle) {
        if self.history_len == 0 {
            return;
        }
        while self.history.len() >= self.history_len {
            self.history.pop_front();
        }
        self.history.push_back(bundle);
    }

    /// Recent decisions, oldest first
    pub fn history(&self) -> impl Iterator<Item = &DecisionBundle> {
        self.history.iter()
    }

    pub fn last_applied(&self) -> Option<&DecisionBundle> {
        self.gate.last_applied()
    }

    pub fn board(&self) -> &ThreatBoard {
        &self.board
    }
}

/// Independent, order-insensitive seed per faction
fn faction_seed(base: u64, faction: FactionId) -> u64 {
    base ^ u64::from(faction.0).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Result of one faction's evaluation cycle
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub faction: FactionId,
    pub time: MissionTime,
    pub posture: Posture,
    pub overall_situation: f32,
    pub maneuvers: Vec<ManeuverKind>,
    pub threats: usize,
    pub opportunities: usize,
    pub responses: usize,
    pub actions: usize,
    pub verdict: GateVerdict,
    pub orders: usize,
}

impl CycleReport {
    pub fn applied(&self) -> bool {
        self.verdict.passes()
    }
}

/// A faction cycle that failed and was skipped
#[derive(Debug, Clone, Serialize)]
pub struct FactionFailure {
    pub faction: FactionId,
    pub message: String,
}

/// Everything that happened during one tick
#[derive(Debug, Clone, Default, Serialize)]
pub struct TickReport {
    pub time: MissionTime,
    pub cycles: Vec<CycleReport>,
    pub failures: Vec<FactionFailure>,
}

impl TickReport {
    pub fn applied(&self) -> impl Iterator<Item = &CycleReport> {
        self.cycles.iter().filter(|c| c.applied())
    }
}

/// Drives every AI faction of one engagement
pub struct TacticalBrain {
    config: TacticsConfig,
    evaluator: BattlefieldEvaluator,
    policy: DecisionPolicy,
    executor: Executor,
    factions: Vec<FactionContext>,
    index: AHashMap<FactionId, usize>,
}

impl TacticalBrain {
    pub fn new(config: TacticsConfig) -> Self {
        Self {
            evaluator: BattlefieldEvaluator::new(&config),
            policy: DecisionPolicy::new(&config),
            executor: Executor::new(&config),
            factions: Vec::new(),
            index: AHashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &TacticsConfig {
        &self.config
    }

    /// Register every valid, non-player team. Any previous engagement
    /// state is dropped first.
    pub fn begin_engagement(&mut self, host: &dyn BattleHost) {
        self.end_engagement();
        for team in host.teams().iter().filter(|t| t.is_valid && !t.is_player) {
            if self.index.contains_key(&team.faction) {
                continue;
            }
            let context = FactionContext::new(team, &self.config);
            tracing::info!(faction = %team.faction, key = %team.key, skill = context.skill, "faction registered");
            self.index.insert(team.faction, self.factions.len());
            self.factions.push(context);
        }
    }

    /// Clear all per-faction state
    pub fn end_engagement(&mut self) {
        if !self.factions.is_empty() {
            tracing::info!(factions = self.factions.len(), "engagement ended");
        }
        self.factions.clear();
        self.index.clear();
    }

    pub fn faction(&self, id: FactionId) -> Option<&FactionContext> {
        self.index.get(&id).map(|&i| &self.factions[i])
    }

    pub fn factions(&self) -> &[FactionContext] {
        &self.factions
    }

    /// Run every faction whose update interval has elapsed.
    ///
    /// Never fails: per-faction errors land in the report's failures.
    pub fn tick(
        &mut self,
        host: &dyn BattleHost,
        terrain: &dyn TerrainQuery,
        sink: &mut dyn GroupCommands,
    ) -> TickReport {
        let now = host.mission_time();
        let mut report = TickReport {
            time: now,
            ..TickReport::default()
        };

        let Self {
            config,
            evaluator,
            policy,
            executor,
            factions,
            ..
        } = self;
        let engine = Engine {
            config,
            evaluator,
            policy,
            executor,
        };

        for faction in factions.iter_mut() {
            if !faction.should_evaluate(now, engine.config.timing.update_interval) {
                continue;
            }
            let result = engine.cycle(faction, host, terrain, sink, now);
            faction.last_update = Some(now);

            match result {
                Ok(cycle) => report.cycles.push(cycle),
                Err(e) => {
                    tracing::warn!(faction = %faction.id, error = %e, "tactical cycle failed");
                    report.failures.push(FactionFailure {
                        faction: faction.id,
                        message: e.to_string(),
                    });
                }
            }
        }
        report
    }
}

/// Shared, read-only parts of the brain for one tick
struct Engine<'a> {
    config: &'a TacticsConfig,
    evaluator: &'a BattlefieldEvaluator,
    policy: &'a DecisionPolicy,
    executor: &'a Executor,
}

impl Engine<'_> {
    fn cycle(
        &self,
        faction: &mut FactionContext,
        host: &dyn BattleHost,
        terrain: &dyn TerrainQuery,
        sink: &mut dyn GroupCommands,
        now: MissionTime,
    ) -> Result<CycleReport> {
        let elapsed = faction.last_update.map_or(0.0, |last| now - last);

        let mut snapshot = Snapshot::capture(host, terrain, faction.id)?;
        let threats = self.evaluator.detect_threats(&snapshot, terrain);
        let opportunities = self.evaluator.detect_opportunities(&snapshot, terrain);
        faction
            .board
            .refresh(&snapshot, elapsed, now, threats, opportunities);
        snapshot.attach(&faction.board);

        let assessment = self.evaluator.assess(&snapshot, terrain);
        let bundle = self
            .policy
            .decide(&snapshot, &assessment, faction.skill, &mut faction.rng);

        if self.config.debug_mode {
            tracing::info!(
                faction = %faction.id,
                posture = ?bundle.posture,
                situation = assessment.overall_situation,
                maneuvers = bundle.maneuvers.len(),
                threats = snapshot.threats.len(),
                opportunities = snapshot.opportunities.len(),
                "tactical cycle"
            );
        } else {
            tracing::debug!(
                faction = %faction.id,
                posture = ?bundle.posture,
                maneuvers = bundle.maneuvers.len(),
                "tactical cycle"
            );
        }

        let outcome = self
            .executor
            .execute_decisions(&mut faction.gate, &snapshot, terrain, &bundle, sink, now)?;
        if outcome.applied() {
            tracing::info!(faction = %faction.id, verdict = ?outcome.verdict, orders = outcome.orders, "bundle applied");
        }

        let report = CycleReport {
            faction: faction.id,
            time: now,
            posture: bundle.posture,
            overall_situation: bundle.overall_situation,
            maneuvers: bundle.maneuver_kinds(),
            threats: snapshot.threats.len(),
            opportunities: snapshot.opportunities.len(),
            responses: bundle.responses.len(),
            actions: bundle.actions.len(),
            verdict: outcome.verdict,
            orders: outcome.orders,
        };
        faction.remember(bundle);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::groups::{GroupState, IssuedOrder, UnitClass};
    use crate::battle::sandbox::{border_skirmish, SandboxBattle};
    use crate::spatial::HeightField;
    use glam::{Vec2, Vec3};

    fn run_ticks(brain: &mut TacticalBrain, battle: &mut SandboxBattle, ticks: usize, dt: f32) -> Vec<TickReport> {
        let mut reports = Vec::new();
        for _ in 0..ticks {
            let mut orders: Vec<IssuedOrder> = Vec::new();
            let terrain = battle.terrain().clone();
            reports.push(brain.tick(battle, &terrain, &mut orders));
            battle.apply(&orders).unwrap();
            battle.advance(dt);
        }
        reports
    }

    #[test]
    fn test_registers_only_ai_factions() {
        let mut battle = border_skirmish();
        let mut player = TeamInfo::new(FactionId(3), "player", 0);
        player.is_player = true;
        battle.add_team(player);
        let mut broken = TeamInfo::new(FactionId(4), "gone", 0);
        broken.is_valid = false;
        battle.add_team(broken);

        let mut brain = TacticalBrain::new(TacticsConfig::default());
        brain.begin_engagement(&battle);
        let ids: Vec<FactionId> = brain.factions().iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![FactionId(1), FactionId(2)]);
    }

    #[test]
    fn test_skill_sources() {
        let config = TacticsConfig::default();
        let mut team = TeamInfo::new(FactionId(1), "x", 10);
        assert_eq!(FactionContext::new(&team, &config).skill, LEADERLESS_SKILL);

        team.leader_skill = Some(0.8);
        assert_eq!(FactionContext::new(&team, &config).skill, 0.8);

        team.leader_skill = None;
        team.has_leader = true;
        let skill = FactionContext::new(&team, &config).skill;
        assert!((0.3..=1.0).contains(&skill));

        let mut doubled = config.clone();
        doubled.commander.skill_multiplier = 2.0;
        team.leader_skill = Some(0.8);
        assert_eq!(FactionContext::new(&team, &doubled).skill, 1.0);
    }

    #[test]
    fn test_first_tick_applies_for_every_faction() {
        let mut battle = border_skirmish();
        let mut brain = TacticalBrain::new(TacticsConfig::default());
        brain.begin_engagement(&battle);
        let reports = run_ticks(&mut brain, &mut battle, 1, 1.0);
        assert_eq!(reports[0].cycles.len(), 2);
        assert!(reports[0].failures.is_empty());
        assert!(reports[0].cycles.iter().all(|c| c.verdict == GateVerdict::First));
        assert!(reports[0].cycles.iter().all(|c| c.orders > 0));
    }

    #[test]
    fn test_update_interval_respected() {
        let mut battle = border_skirmish();
        let mut brain = TacticalBrain::new(TacticsConfig::default());
        brain.begin_engagement(&battle);
        // Ticks at t = 0, 1, 2, ... 10: evaluations at 0, 5 and 10
        let reports = run_ticks(&mut brain, &mut battle, 11, 1.0);
        let evaluated: Vec<usize> = reports
            .iter()
            .enumerate()
            .filter(|(_, r)| !r.cycles.is_empty())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(evaluated, vec![0, 5, 10]);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut battle = border_skirmish();
        let mut config = TacticsConfig::default();
        config.history_len = 2;
        config.timing.update_interval = 0.0;
        let mut brain = TacticalBrain::new(config);
        brain.begin_engagement(&battle);
        run_ticks(&mut brain, &mut battle, 5, 1.0);
        let faction = brain.faction(FactionId(1)).unwrap();
        assert_eq!(faction.history().count(), 2);
    }

    #[test]
    fn test_missing_faction_is_isolated() {
        let mut battle = SandboxBattle::new(HeightField::new(Vec2::splat(-200.0), 20.0, 21, 21));
        battle.add_team(TeamInfo::new(FactionId(1), "imperial", 0));
        battle.add_team(TeamInfo::new(FactionId(2), "steppe", 0));
        battle.add_group(GroupState::new(FactionId(1), UnitClass::Infantry, 30, Vec3::ZERO, Vec2::X));
        battle.add_group(GroupState::new(
            FactionId(2),
            UnitClass::Infantry,
            30,
            Vec3::new(150.0, 0.0, 0.0),
            Vec2::NEG_X,
        ));

        let mut brain = TacticalBrain::new(TacticsConfig::default());
        brain.begin_engagement(&battle);

        // The host drops faction 2 mid-engagement
        let mut reduced = SandboxBattle::new(battle.terrain().clone());
        reduced.add_team(TeamInfo::new(FactionId(1), "imperial", 0));
        for group in battle.all_groups() {
            reduced.add_group(*group);
        }

        let mut orders: Vec<IssuedOrder> = Vec::new();
        let terrain = reduced.terrain().clone();
        let report = brain.tick(&reduced, &terrain, &mut orders);
        assert_eq!(report.cycles.len(), 1);
        assert_eq!(report.cycles[0].faction, FactionId(1));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].faction, FactionId(2));
    }

    #[test]
    fn test_end_engagement_clears_state() {
        let mut battle = border_skirmish();
        let mut brain = TacticalBrain::new(TacticsConfig::default());
        brain.begin_engagement(&battle);
        run_ticks(&mut brain, &mut battle, 1, 1.0);
        brain.end_engagement();
        assert!(brain.factions().is_empty());
        assert!(brain.faction(FactionId(1)).is_none());
    }
}
