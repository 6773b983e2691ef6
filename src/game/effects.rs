use serde::{Deserialize, Serialize};

use super::catalog::EffectCatalog;
use super::rules::RuleError;
use super::state::{
    opponent_of, Card, CardId, CreatureClass, DuelState, EffectInstanceId, Element, EquipBinding,
    GameEvent, PlayerId, ZONE_COUNT,
};

/// 效果作用的一方。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetScope {
    #[serde(rename = "self")]
    Own,
    Opponent,
    All,
}

impl Default for TargetScope {
    fn default() -> Self {
        TargetScope::Opponent
    }
}

impl TargetScope {
    pub fn affects(self, acting: PlayerId, player: PlayerId) -> bool {
        match self {
            TargetScope::Own => player == acting,
            TargetScope::Opponent => player == opponent_of(acting),
            TargetScope::All => true,
        }
    }

    pub fn players(self, acting: PlayerId) -> Vec<PlayerId> {
        [0, 1]
            .into_iter()
            .filter(|&player| self.affects(acting, player))
            .collect()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EquipStat {
    Attack,
    Defense,
    Both,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonsterFilter {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub classes: Vec<CreatureClass>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_attack: Option<i32>,
}

impl MonsterFilter {
    pub fn matches(&self, card: &Card) -> bool {
        let class_ok = self.classes.is_empty()
            || card
                .creature_class
                .map_or(false, |class| self.classes.contains(&class));
        let element_ok = self.elements.is_empty()
            || card
                .element
                .map_or(false, |element| self.elements.contains(&element));
        let attack_ok = self
            .min_attack
            .map_or(true, |min| card.base_attack() >= min);
        class_ok && element_ok && attack_ok
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum EffectKind {
    DirectDamage {
        amount: i32,
        #[serde(default)]
        scope: TargetScope,
    },
    Heal {
        amount: i32,
    },
    DestroyAll {
        #[serde(default)]
        scope: TargetScope,
        #[serde(default)]
        filter: MonsterFilter,
    },
    DestroyTarget {
        #[serde(default)]
        scope: TargetScope,
    },
    Equip {
        stat: EquipStat,
        amount: i32,
        /// 可装备的怪兽，为空时不限。
        #[serde(default)]
        filter: MonsterFilter,
    },
    Field {
        amount: i32,
        #[serde(default)]
        classes: Vec<CreatureClass>,
    },
    Draw {
        count: u8,
    },
    Restrict {
        #[serde(default)]
        scope: TargetScope,
        turns: u8,
    },
    Negate {
        #[serde(default)]
        turns: Option<u8>,
    },
    Utility {
        #[serde(default)]
        turns: Option<u8>,
    },
}

impl EffectKind {
    /// 装备卡和场地卡结算后留在场上。
    pub fn persists(&self) -> bool {
        matches!(self, EffectKind::Equip { .. } | EffectKind::Field { .. })
    }

    pub fn is_field(&self) -> bool {
        matches!(self, EffectKind::Field { .. })
    }
}

/// 效果表中的一条描述。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectDescriptor {
    pub card_id: CardId,
    #[serde(default)]
    pub description: String,
    pub kind: EffectKind,
}

/// 场上仍在生效的效果实例。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveEffect {
    pub instance_id: EffectInstanceId,
    pub card_id: CardId,
    pub effect: EffectKind,
    pub owner: PlayerId,
    /// 装备卡绑定的怪兽格。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_zone: Option<usize>,
    /// 来源卡所在的魔陷格。
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub card_zone: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub turns_remaining: Option<u8>,
}

impl ActiveEffect {
    pub fn restricts_attacks_of(&self, player: PlayerId) -> bool {
        match self.effect {
            EffectKind::Restrict { scope, .. } => scope.affects(self.owner, player),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EffectContext {
    pub card_id: CardId,
    pub player: PlayerId,
    pub target_zone: Option<usize>,
    pub card_zone: Option<usize>,
}

impl EffectContext {
    pub fn new(card_id: CardId, player: PlayerId) -> Self {
        Self {
            card_id,
            player,
            target_zone: None,
            card_zone: None,
        }
    }

    pub fn with_target_zone(mut self, zone: Option<usize>) -> Self {
        self.target_zone = zone;
        self
    }

    pub fn with_card_zone(mut self, zone: usize) -> Self {
        self.card_zone = Some(zone);
        self
    }
}

impl EffectKind {
    pub fn apply(
        &self,
        ctx: &EffectContext,
        state: &mut DuelState,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let mut events = Vec::new();
        match self {
            EffectKind::DirectDamage { amount, scope } => {
                for target_player in scope.players(ctx.player) {
                    let player = state.player_mut(target_player);
                    player.life_points = (player.life_points - amount).max(0);
                    events.push(GameEvent::DamageResolved {
                        target_player,
                        source_card: Some(ctx.card_id),
                        amount: *amount,
                    });
                }
            }
            EffectKind::Heal { amount } => {
                let player = state.player_mut(ctx.player);
                player.life_points = player.life_points.saturating_add(*amount);
                events.push(GameEvent::LifeGained {
                    player_id: ctx.player,
                    amount: *amount,
                });
            }
            EffectKind::DestroyAll { scope, filter } => {
                for target_player in scope.players(ctx.player) {
                    let doomed: Vec<usize> = state
                        .player(target_player)
                        .monsters()
                        .filter(|(_, card)| filter.matches(card))
                        .map(|(zone, _)| zone)
                        .collect();
                    for zone in doomed {
                        events.extend(state.destroy_monster(target_player, zone));
                    }
                }
            }
            EffectKind::DestroyTarget { scope } => {
                let zone = checked_zone(ctx.target_zone)?;
                let side = match scope {
                    TargetScope::Own => ctx.player,
                    TargetScope::Opponent | TargetScope::All => opponent_of(ctx.player),
                };
                if state.player(side).monster_at(zone).is_none() {
                    return Err(RuleError::EmptyZone { zone });
                }
                events.extend(state.destroy_monster(side, zone));
            }
            EffectKind::Equip { filter, .. } => {
                let zone = checked_zone(ctx.target_zone)?;
                if !state.player(ctx.player).has_monster() {
                    return Err(RuleError::NoMonsterToEquip);
                }
                match state.player(ctx.player).monster_at(zone) {
                    None => return Err(RuleError::EmptyZone { zone }),
                    Some(card) if !filter.matches(card) => {
                        return Err(RuleError::EquipNotAllowed {
                            card_id: ctx.card_id,
                            zone,
                        })
                    }
                    Some(_) => {}
                }
                if state.binding_at(ctx.player, zone).is_some() {
                    return Err(RuleError::ZoneAlreadyEquipped { zone });
                }
                state.equip_bindings.push(EquipBinding {
                    player: ctx.player,
                    monster_zone: zone,
                    spell_zone: ctx.card_zone,
                    card_id: ctx.card_id,
                });
                push_active(state, ctx, self.clone(), Some(zone), None);
                events.push(GameEvent::EquipBound {
                    player_id: ctx.player,
                    card_id: ctx.card_id,
                    monster_zone: zone,
                });
            }
            EffectKind::Field { .. } => {
                events.extend(clear_field(state));
                push_active(state, ctx, self.clone(), None, None);
            }
            EffectKind::Draw { count } => {
                events.extend(state.draw(ctx.player, usize::from(*count)));
            }
            EffectKind::Restrict { turns, .. } => {
                push_active(state, ctx, self.clone(), None, Some(*turns));
            }
            EffectKind::Negate { turns } | EffectKind::Utility { turns } => match turns {
                Some(turns) => push_active(state, ctx, self.clone(), None, Some(*turns)),
                None => log::debug!("card {} has no lasting effect", ctx.card_id),
            },
        }
        Ok(events)
    }
}

fn checked_zone(zone: Option<usize>) -> Result<usize, RuleError> {
    let zone = zone.ok_or(RuleError::TargetRequired)?;
    if zone >= ZONE_COUNT {
        return Err(RuleError::InvalidZone { zone });
    }
    Ok(zone)
}

fn push_active(
    state: &mut DuelState,
    ctx: &EffectContext,
    effect: EffectKind,
    target_zone: Option<usize>,
    turns_remaining: Option<u8>,
) {
    let instance_id = state.allocate_effect_id();
    state.active_effects.push(ActiveEffect {
        instance_id,
        card_id: ctx.card_id,
        effect,
        owner: ctx.player,
        target_zone,
        card_zone: ctx.card_zone,
        turns_remaining,
    });
}

/// 移除当前场地魔法，并把它的卡送入持有者墓地。
pub(crate) fn clear_field(state: &mut DuelState) -> Vec<GameEvent> {
    let (previous, kept): (Vec<ActiveEffect>, Vec<ActiveEffect>) = state
        .active_effects
        .drain(..)
        .partition(|effect| effect.effect.is_field());
    state.active_effects = kept;

    let mut events = Vec::new();
    for effect in previous {
        if let Some(zone) = effect.card_zone {
            let player = state.player_mut(effect.owner);
            if let Some(slot) = player.spell_trap_zones.get_mut(zone).and_then(Option::take) {
                player.graveyard.push(slot.card);
            }
        }
        events.push(GameEvent::FieldReplaced {
            player_id: effect.owner,
            card_id: effect.card_id,
        });
    }
    events
}

/// 将效果表中的效果作用到对局状态上。
pub struct EffectEngine<'a> {
    effects: &'a EffectCatalog,
}

impl<'a> EffectEngine<'a> {
    pub fn new(effects: &'a EffectCatalog) -> Self {
        Self { effects }
    }

    /// 在状态副本上结算 `card_id` 的效果；被拒绝时原样返回输入。
    pub fn apply_effect(
        &self,
        state: &DuelState,
        card_id: CardId,
        player: PlayerId,
        target_zone: Option<usize>,
    ) -> DuelState {
        let mut next = state.clone();
        let ctx = EffectContext::new(card_id, player).with_target_zone(target_zone);
        match self.resolve(&mut next, &ctx) {
            Ok(_) => next,
            Err(err) => {
                log::debug!("effect of card {card_id} rejected: {err}");
                state.clone()
            }
        }
    }

    /// 没有效果描述的卡结算为空。
    pub fn resolve(
        &self,
        state: &mut DuelState,
        ctx: &EffectContext,
    ) -> Result<Vec<GameEvent>, RuleError> {
        match self.effects.get(ctx.card_id) {
            Some(descriptor) => descriptor.kind.apply(ctx, state),
            None => Ok(Vec::new()),
        }
    }

    pub fn descriptor(&self, card_id: CardId) -> Option<&'a EffectDescriptor> {
        self.effects.get(card_id)
    }

    /// 回合结束时递减持续回合数并清除到期效果。
    pub fn tick_effects(state: &mut DuelState) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let mut kept = Vec::with_capacity(state.active_effects.len());
        for mut effect in state.active_effects.drain(..) {
            match effect.turns_remaining {
                Some(turns) if turns <= 1 => events.push(GameEvent::EffectExpired {
                    owner: effect.owner,
                    card_id: effect.card_id,
                }),
                Some(turns) => {
                    effect.turns_remaining = Some(turns - 1);
                    kept.push(effect);
                }
                None => kept.push(effect),
            }
        }
        state.active_effects = kept;
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::state::Position;
    use crate::game::testing::{blank_state, monster, place_monster, place_spell};

    fn catalog(descriptors: Vec<(CardId, EffectKind)>) -> EffectCatalog {
        EffectCatalog::new(
            descriptors
                .into_iter()
                .map(|(card_id, kind)| EffectDescriptor {
                    card_id,
                    description: String::new(),
                    kind,
                })
                .collect(),
        )
    }

    #[test]
    fn direct_damage_is_floored_at_zero() {
        let effects = catalog(vec![(
            344,
            EffectKind::DirectDamage {
                amount: 500,
                scope: TargetScope::Opponent,
            },
        )]);
        let engine = EffectEngine::new(&effects);
        let mut state = blank_state();
        state.players[1].life_points = 300;

        let next = engine.apply_effect(&state, 344, 0, None);

        assert_eq!(next.players[1].life_points, 0);
        assert_eq!(next.players[0].life_points, 8000);
    }

    #[test]
    fn damage_to_all_hits_both_players() {
        let effects = catalog(vec![(
            347,
            EffectKind::DirectDamage {
                amount: 1000,
                scope: TargetScope::All,
            },
        )]);
        let engine = EffectEngine::new(&effects);

        let next = engine.apply_effect(&blank_state(), 347, 1, None);

        assert_eq!(next.life_points(), [7000, 7000]);
    }

    #[test]
    fn heal_raises_acting_player_only() {
        let effects = catalog(vec![(342, EffectKind::Heal { amount: 1000 })]);
        let engine = EffectEngine::new(&effects);

        let next = engine.apply_effect(&blank_state(), 342, 1, None);

        assert_eq!(next.life_points(), [8000, 9000]);
    }

    #[test]
    fn destroy_all_respects_scope_and_filter() {
        let effects = catalog(vec![(
            661,
            EffectKind::DestroyAll {
                scope: TargetScope::All,
                filter: MonsterFilter {
                    min_attack: Some(1500),
                    ..MonsterFilter::default()
                },
            },
        )]);
        let engine = EffectEngine::new(&effects);
        let mut state = blank_state();
        place_monster(&mut state, 0, 0, monster(1, 1800));
        place_monster(&mut state, 0, 1, monster(2, 1000));
        place_monster(&mut state, 1, 3, monster(3, 1500));

        let next = engine.apply_effect(&state, 661, 0, None);

        assert!(next.players[0].monster_at(0).is_none());
        assert!(next.players[0].monster_at(1).is_some());
        assert!(next.players[1].monster_at(3).is_none());
        assert_eq!(next.players[0].graveyard.len(), 1);
        assert_eq!(next.players[1].graveyard.len(), 1);
    }

    #[test]
    fn destroy_target_needs_a_monster() {
        let effects = catalog(vec![(
            660,
            EffectKind::DestroyTarget {
                scope: TargetScope::Opponent,
            },
        )]);
        let engine = EffectEngine::new(&effects);
        let mut state = blank_state();
        place_monster(&mut state, 1, 2, monster(5, 1200));

        let missed = engine.apply_effect(&state, 660, 0, Some(1));
        let hit = engine.apply_effect(&state, 660, 0, Some(2));

        assert_eq!(missed, state);
        assert!(hit.players[1].monster_at(2).is_none());
        assert_eq!(hit.players[1].graveyard[0].id, 5);
    }

    #[test]
    fn equip_requires_own_monster() {
        let effects = catalog(vec![(
            301,
            EffectKind::Equip {
                stat: EquipStat::Attack,
                amount: 300,
                filter: MonsterFilter::default(),
            },
        )]);
        let engine = EffectEngine::new(&effects);
        let mut state = blank_state();
        place_monster(&mut state, 1, 0, monster(9, 1000));

        let next = engine.apply_effect(&state, 301, 0, Some(0));

        assert_eq!(next, state);
    }

    #[test]
    fn equip_binds_and_boosts_attack() {
        let effects = catalog(vec![(
            311,
            EffectKind::Equip {
                stat: EquipStat::Both,
                amount: 500,
                filter: MonsterFilter::default(),
            },
        )]);
        let engine = EffectEngine::new(&effects);
        let mut state = blank_state();
        place_monster(&mut state, 0, 0, monster(9, 1000));

        let next = engine.apply_effect(&state, 311, 0, Some(0));

        assert_eq!(next.effective_attack(0, 0), Some(1500));
        assert_eq!(next.effective_defense(0, 0), Some(1500));
        assert_eq!(next.binding_at(0, 0).map(|b| b.card_id), Some(311));
        assert_eq!(next.integrity_check(), Ok(()));
    }

    #[test]
    fn new_field_replaces_previous_one() {
        let effects = catalog(vec![
            (
                330,
                EffectKind::Field {
                    amount: 200,
                    classes: vec![CreatureClass::Beast],
                },
            ),
            (
                332,
                EffectKind::Field {
                    amount: 200,
                    classes: vec![CreatureClass::Dragon],
                },
            ),
        ]);
        let engine = EffectEngine::new(&effects);
        let mut state = blank_state();
        place_spell(&mut state, 1, 0, 330, Position::Attack);
        let ctx = EffectContext::new(330, 1).with_card_zone(0);
        engine.resolve(&mut state, &ctx).expect("field resolves");

        place_spell(&mut state, 0, 2, 332, Position::Attack);
        let ctx = EffectContext::new(332, 0).with_card_zone(2);
        let events = engine.resolve(&mut state, &ctx).expect("field resolves");

        assert_eq!(state.field_effect().map(|e| e.card_id), Some(332));
        assert!(state.players[1].spell_trap_zones[0].is_none());
        assert_eq!(state.players[1].graveyard[0].id, 330);
        assert!(events.contains(&GameEvent::FieldReplaced {
            player_id: 1,
            card_id: 330
        }));
    }

    #[test]
    fn equip_filter_checks_class_and_element() {
        let effects = catalog(vec![(
            302,
            EffectKind::Equip {
                stat: EquipStat::Attack,
                amount: 400,
                filter: MonsterFilter {
                    elements: vec![Element::Dark],
                    ..MonsterFilter::default()
                },
            },
        )]);
        let engine = EffectEngine::new(&effects);
        let mut state = blank_state();
        place_monster(&mut state, 0, 0, monster(9, 1000));
        let mut fiend = monster(10, 1200);
        fiend.element = Some(Element::Dark);
        place_monster(&mut state, 0, 1, fiend);

        let mut refused = state.clone();
        let ctx = EffectContext::new(302, 0).with_target_zone(Some(0));
        assert_eq!(
            engine.resolve(&mut refused, &ctx),
            Err(RuleError::EquipNotAllowed {
                card_id: 302,
                zone: 0
            })
        );

        let next = engine.apply_effect(&state, 302, 0, Some(1));
        assert_eq!(next.effective_attack(0, 1), Some(1600));
    }

    #[test]
    fn effects_without_duration_are_not_kept() {
        let effects = catalog(vec![
            (690, EffectKind::Utility { turns: None }),
            (687, EffectKind::Negate { turns: Some(1) }),
        ]);
        let engine = EffectEngine::new(&effects);

        let bluff = engine.apply_effect(&blank_state(), 690, 0, None);
        assert!(bluff.active_effects.is_empty());

        let mut negated = engine.apply_effect(&bluff, 687, 0, None);
        assert_eq!(negated.active_effects.len(), 1);
        EffectEngine::tick_effects(&mut negated);
        assert!(negated.active_effects.is_empty());
    }

    #[test]
    fn draw_effect_draws_for_acting_player() {
        let effects = catalog(vec![(338, EffectKind::Draw { count: 2 })]);
        let engine = EffectEngine::new(&effects);
        let mut state = blank_state();
        state.players[0].deck = vec![monster(1, 100)];

        let next = engine.apply_effect(&state, 338, 0, None);

        assert_eq!(next.players[0].hand.len(), 1);
        assert!(next.players[0].deck.is_empty());
    }

    #[test]
    fn unknown_effect_is_noop() {
        let effects = EffectCatalog::default();
        let engine = EffectEngine::new(&effects);
        let state = blank_state();

        assert_eq!(engine.apply_effect(&state, 12345, 0, None), state);
    }

    #[test]
    fn tick_prunes_expired_effects() {
        let effects = catalog(vec![(
            348,
            EffectKind::Restrict {
                scope: TargetScope::Opponent,
                turns: 2,
            },
        )]);
        let engine = EffectEngine::new(&effects);
        let mut state = engine.apply_effect(&blank_state(), 348, 0, None);
        assert!(state.attacks_restricted(1));
        assert!(!state.attacks_restricted(0));

        let first = EffectEngine::tick_effects(&mut state);
        assert!(first.is_empty());
        assert_eq!(state.active_effects[0].turns_remaining, Some(1));

        let second = EffectEngine::tick_effects(&mut state);
        assert_eq!(
            second,
            vec![GameEvent::EffectExpired {
                owner: 0,
                card_id: 348
            }]
        );
        assert!(state.active_effects.is_empty());
    }

    #[test]
    fn filter_parses_from_effect_json() {
        let json = r#"{"card_id": 653, "kind": {"type": "DestroyAll", "scope": "all", "filter": {"classes": ["Warrior"]}}}"#;
        let descriptor: EffectDescriptor = serde_json::from_str(json).expect("valid descriptor");

        let EffectKind::DestroyAll { scope, filter } = descriptor.kind else {
            panic!("expected DestroyAll");
        };
        assert_eq!(scope, TargetScope::All);
        assert!(filter.matches(&monster(1, 100)));
    }
}
