//! Executor: turns an approved decision bundle into group orders
//!
//! Orders are collected in an `OrderContext` buffer and only handed to the
//! host once the whole bundle ran through. A bundle that fails while
//! building leaves the host untouched and the gate state unchanged. If the
//! host rejects an order during the flush, whatever it already accepted
//! stays applied, so the gate records the bundle as soon as one order got
//! through.

use glam::Vec2;
use ordered_float::OrderedFloat;
use serde::Serialize;
use std::cmp::Reverse;

use crate::battle::ai::decisions::DecisionBundle;
use crate::battle::ai::placement::apply_formations;
use crate::battle::ai::stabilizer::{GateState, GateVerdict, StabilizationGate};
use crate::battle::groups::{FirePolicy, GroupOrder, GroupState, IssuedOrder, Shape, Spacing, UnitClass};
use crate::battle::host::GroupCommands;
use crate::battle::snapshot::Snapshot;
use crate::core::config::TacticsConfig;
use crate::core::error::{Result, TacticsError};
use crate::core::types::{GroupId, MissionTime};
use crate::spatial::{direction_to, TerrainQuery};

/// Something in a bundle that can be turned into orders
///
/// Implemented for maneuvers, threat responses and opportunity actions;
/// each dispatches on its closed kind enum to one handler per kind.
pub trait Directive {
    fn priority(&self) -> f32;
    fn execute(&self, ctx: &mut OrderContext<'_>) -> Result<()>;
}

/// Read access to the cycle's snapshot plus the pending order buffer
pub struct OrderContext<'a> {
    snapshot: &'a Snapshot,
    terrain: &'a dyn TerrainQuery,
    orders: Vec<IssuedOrder>,
}

impl<'a> OrderContext<'a> {
    pub fn new(snapshot: &'a Snapshot, terrain: &'a dyn TerrainQuery) -> Self {
        Self {
            snapshot,
            terrain,
            orders: Vec::new(),
        }
    }

    pub fn snapshot(&self) -> &'a Snapshot {
        self.snapshot
    }

    pub fn terrain(&self) -> &'a dyn TerrainQuery {
        self.terrain
    }

    /// Own groups among `ids` that still have units; unknown ids are skipped
    pub fn own_groups(&self, ids: &[GroupId]) -> Vec<&'a GroupState> {
        let snapshot = self.snapshot;
        ids.iter()
            .filter_map(|id| snapshot.own_groups.iter().find(|g| g.id == *id))
            .filter(|g| g.is_active())
            .collect()
    }

    /// Active own groups of one class
    pub fn own_of(&self, class: UnitClass) -> Vec<&'a GroupState> {
        self.snapshot.own_of(class).filter(|g| g.is_active()).collect()
    }

    pub fn enemy(&self, id: GroupId) -> Option<&'a GroupState> {
        self.snapshot
            .enemy_groups
            .iter()
            .find(|g| g.id == id && g.is_active())
    }

    pub fn nearest_enemy(&self, from: Vec2) -> Option<&'a GroupState> {
        self.snapshot
            .enemy_groups
            .iter()
            .filter(|g| g.is_active())
            .min_by_key(|g| OrderedFloat(g.ground().distance(from)))
    }

    pub fn own_center(&self) -> Option<Vec2> {
        self.snapshot.own_centroid()
    }

    pub fn enemy_center(&self) -> Option<Vec2> {
        self.snapshot.enemy_centroid()
    }

    /// Direction from our centroid to the enemy centroid
    pub fn front(&self) -> Option<Vec2> {
        let own = self.own_center()?;
        let enemy = self.enemy_center()?;
        let dir = direction_to(own, enemy);
        (dir != Vec2::ZERO).then_some(dir)
    }

    /// Move a group to a ground point, lifted onto the terrain
    pub fn move_to(&mut self, group: &GroupState, point: Vec2) -> Result<()> {
        if !point.is_finite() {
            return Err(TacticsError::CommandRejected {
                group: group.id,
                reason: format!("non-finite move target {point}"),
            });
        }
        let target = self.terrain.surface(point);
        self.push(group.id, GroupOrder::MoveTo(target));
        Ok(())
    }

    /// Face along a direction; zero directions are ignored
    pub fn face(&mut self, group: &GroupState, direction: Vec2) {
        let direction = direction.normalize_or_zero();
        if direction != Vec2::ZERO {
            self.push(group.id, GroupOrder::Face(direction));
        }
    }

    /// Face toward a ground point
    pub fn face_point(&mut self, group: &GroupState, point: Vec2) {
        self.face(group, point - group.ground());
    }

    pub fn shape(&mut self, group: &GroupState, shape: Shape) {
        self.push(group.id, GroupOrder::SetShape(shape));
    }

    pub fn spacing(&mut self, group: &GroupState, spacing: Spacing) {
        self.push(group.id, GroupOrder::SetSpacing(spacing));
    }

    pub fn width(&mut self, group: &GroupState, files: u32) {
        self.push(group.id, GroupOrder::SetWidth(files.max(1)));
    }

    pub fn fire(&mut self, group: &GroupState, policy: FirePolicy) {
        self.push(group.id, GroupOrder::SetFire(policy));
    }

    pub fn charge(&mut self, group: &GroupState) {
        self.push(group.id, GroupOrder::Charge);
    }

    pub fn speed(&mut self, group: &GroupState, multiplier: f32) {
        self.push(group.id, GroupOrder::SetSpeed(multiplier));
    }

    /// Charge when already close to `point`, otherwise move there
    pub fn close_and_charge(&mut self, group: &GroupState, point: Vec2, within: f32) -> Result<()> {
        if group.ground().distance(point) < within {
            self.charge(group);
            Ok(())
        } else {
            self.move_to(group, point)
        }
    }

    pub fn orders(&self) -> &[IssuedOrder] {
        &self.orders
    }

    pub fn into_orders(self) -> Vec<IssuedOrder> {
        self.orders
    }

    fn push(&mut self, group: GroupId, order: GroupOrder) {
        self.orders.push(IssuedOrder { group, order });
    }
}

/// What happened to one bundle at the executor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ExecutionOutcome {
    pub verdict: GateVerdict,
    /// Orders handed to the host (zero when the gate blocked)
    pub orders: usize,
}

impl ExecutionOutcome {
    pub fn applied(&self) -> bool {
        self.verdict.passes()
    }
}

/// Gated bundle executor
#[derive(Debug, Clone)]
pub struct Executor {
    gate: StabilizationGate,
    debug_mode: bool,
}

impl Executor {
    pub fn new(config: &TacticsConfig) -> Self {
        Self {
            gate: StabilizationGate::new(config),
            debug_mode: config.debug_mode,
        }
    }

    /// Apply `bundle` if the stabilization gate lets it through.
    ///
    /// Formation adjustments go first, then maneuvers, responses and
    /// actions, each in descending priority. The bundle becomes the
    /// faction's last applied bundle once the host accepted any of its
    /// orders, even when a later order is rejected and the error returned.
    pub fn execute_decisions(
        &self,
        state: &mut GateState,
        snapshot: &Snapshot,
        terrain: &dyn TerrainQuery,
        bundle: &DecisionBundle,
        sink: &mut dyn GroupCommands,
        now: MissionTime,
    ) -> Result<ExecutionOutcome> {
        let verdict = self.gate.evaluate(state, bundle, now);
        tracing::trace!(faction = %bundle.faction, ?verdict, "stabilization gate");
        if !verdict.passes() {
            return Ok(ExecutionOutcome { verdict, orders: 0 });
        }

        let orders = self.build_orders(snapshot, terrain, bundle)?;
        let delivered = flush(&orders, sink);
        if delivered.accepted > 0 || orders.is_empty() {
            state.record(bundle.clone(), now);
        }
        if let Some(e) = delivered.error {
            if delivered.accepted > 0 {
                tracing::warn!(
                    faction = %bundle.faction,
                    accepted = delivered.accepted,
                    total = orders.len(),
                    "host rejected part of an applied bundle"
                );
            }
            return Err(e);
        }

        Ok(ExecutionOutcome {
            verdict,
            orders: delivered.accepted,
        })
    }

    /// Run every directive of the bundle into a fresh order buffer
    pub fn build_orders(
        &self,
        snapshot: &Snapshot,
        terrain: &dyn TerrainQuery,
        bundle: &DecisionBundle,
    ) -> Result<Vec<IssuedOrder>> {
        let mut ctx = OrderContext::new(snapshot, terrain);

        apply_formations(&mut ctx, &bundle.formations)?;
        run_by_priority(&bundle.maneuvers, &mut ctx)?;
        run_by_priority(&bundle.responses, &mut ctx)?;
        run_by_priority(&bundle.actions, &mut ctx)?;

        // Target tables are advisory; the host has no order for them
        for (class, table) in &bundle.targets {
            if self.debug_mode {
                tracing::info!(faction = %bundle.faction, ?class, ?table, "target priorities");
            } else {
                tracing::debug!(faction = %bundle.faction, ?class, ?table, "target priorities");
            }
        }

        Ok(ctx.into_orders())
    }
}

/// How far a flush got before the host refused an order
struct Delivery {
    accepted: usize,
    error: Option<TacticsError>,
}

fn flush(orders: &[IssuedOrder], sink: &mut dyn GroupCommands) -> Delivery {
    for (accepted, order) in orders.iter().enumerate() {
        if let Err(e) = sink.issue(order.group, order.order) {
            return Delivery {
                accepted,
                error: Some(e),
            };
        }
    }
    Delivery {
        accepted: orders.len(),
        error: None,
    }
}

fn run_by_priority<D: Directive>(directives: &[D], ctx: &mut OrderContext<'_>) -> Result<()> {
    let mut ordered: Vec<&D> = directives.iter().collect();
    ordered.sort_by_key(|d| Reverse(OrderedFloat(d.priority())));
    for directive in ordered {
        directive.execute(ctx)?;
    }
    Ok(())
}
