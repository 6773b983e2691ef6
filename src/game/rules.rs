use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{
    catalog::Catalog,
    config::{DuelConfig, SetupError},
    effects::{clear_field, EffectContext, EffectEngine},
    fusion::FusionResolver,
    state::{
        opponent_of, Card, CardId, DuelOutcome, DuelState, GameEvent, Phase, PlayerId, Position,
        ZoneCard, ZONE_COUNT,
    },
};

fn default_draw_count() -> u8 {
    1
}

/// 玩家（或对手策略）提交给状态机的动作。除 `Draw` 外均由当前回合玩家执行。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum Action {
    Draw {
        player: PlayerId,
        #[serde(default = "default_draw_count")]
        count: u8,
    },
    Summon {
        card_id: CardId,
        #[serde(default)]
        position: Position,
    },
    Attack {
        attacker_id: CardId,
        target_zone: usize,
    },
    ActivateSpell {
        card_id: CardId,
        #[serde(default)]
        target_zone: Option<usize>,
    },
    ActivateSetCard {
        zone: usize,
        #[serde(default)]
        target_zone: Option<usize>,
    },
    SetSpellTrap {
        card_id: CardId,
    },
    Fuse {
        material_a: CardId,
        material_b: CardId,
    },
    AdvancePhase,
    EndTurn,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Error)]
#[serde(tag = "type")]
pub enum RuleError {
    #[error("the duel is already decided")]
    DuelFinished,
    #[error("unknown player {player_id}")]
    UnknownPlayer { player_id: PlayerId },
    #[error("expected {expected:?} phase, duel is in {actual:?}")]
    WrongPhase { expected: Phase, actual: Phase },
    #[error("no phase follows End")]
    NoNextPhase,
    #[error("a monster was already summoned this turn")]
    AlreadySummoned,
    #[error("an attack was already declared this turn")]
    AlreadyAttacked,
    #[error("no attacks on the first turn")]
    FirstTurnAttack,
    #[error("attacks are restricted by an active effect")]
    AttackRestricted,
    #[error("card {card_id} is not in hand")]
    CardNotInHand { card_id: CardId },
    #[error("card {card_id} is not on the field")]
    CardNotOnField { card_id: CardId },
    #[error("card {card_id} is not a monster")]
    NotAMonster { card_id: CardId },
    #[error("card {card_id} is not a spell or trap")]
    NotASpellOrTrap { card_id: CardId },
    #[error("every monster zone is occupied")]
    MonsterZoneFull,
    #[error("every spell/trap zone is occupied")]
    SpellTrapZoneFull,
    #[error("zone {zone} does not exist")]
    InvalidZone { zone: usize },
    #[error("zone {zone} holds no monster")]
    EmptyZone { zone: usize },
    #[error("zone {zone} holds no face-down card")]
    NotSetCard { zone: usize },
    #[error("effect needs a target zone")]
    TargetRequired,
    #[error("no monster to equip")]
    NoMonsterToEquip,
    #[error("zone {zone} is already equipped")]
    ZoneAlreadyEquipped { zone: usize },
    #[error("card {card_id} cannot equip the monster in zone {zone}")]
    EquipNotAllowed { card_id: CardId, zone: usize },
    #[error("{material_a} and {material_b} do not fuse")]
    NoFusion {
        material_a: CardId,
        material_b: CardId,
    },
    #[error("card {card_id} is not in the catalog")]
    UnknownCard { card_id: CardId },
}

/// 一次状态转移的结果。被拒绝的动作返回原状态，`rejected` 给出原因。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleResolution {
    pub state: DuelState,
    pub events: Vec<GameEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<RuleError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<DuelOutcome>,
}

impl RuleResolution {
    pub fn new(state: DuelState, events: Vec<GameEvent>) -> Self {
        let outcome = state.outcome();
        Self {
            state,
            events,
            rejected: None,
            outcome,
        }
    }

    pub fn rejection(state: DuelState, error: RuleError) -> Self {
        let outcome = state.outcome();
        Self {
            state,
            events: Vec::new(),
            rejected: Some(error),
            outcome,
        }
    }

    pub fn is_accepted(&self) -> bool {
        self.rejected.is_none()
    }
}

/// 回合/阶段状态机。只读地引用卡表，所有转移都作用在状态副本上。
pub struct RuleEngine<'a> {
    catalog: &'a Catalog,
    config: DuelConfig,
}

impl<'a> RuleEngine<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            config: DuelConfig::default(),
        }
    }

    pub fn with_config(mut self, config: DuelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn catalog(&self) -> &'a Catalog {
        self.catalog
    }

    pub fn config(&self) -> &DuelConfig {
        &self.config
    }

    pub fn effect_engine(&self) -> EffectEngine<'a> {
        EffectEngine::new(&self.catalog.effects)
    }

    pub fn fusion_resolver(&self) -> FusionResolver<'a> {
        FusionResolver::new(&self.catalog.cards, &self.catalog.fusions)
    }

    pub fn new_duel(
        &self,
        deck_one: &[CardId],
        deck_two: &[CardId],
        seed: u64,
    ) -> Result<DuelState, SetupError> {
        DuelState::new(
            &self.config,
            self.catalog.deck_from_ids(deck_one)?,
            self.catalog.deck_from_ids(deck_two)?,
            seed,
        )
    }

    /// 状态转移函数：非法动作不改变状态，原因写入 `rejected`。
    pub fn apply(&self, state: &DuelState, action: &Action) -> RuleResolution {
        let mut next = state.clone();
        match self.execute(&mut next, action) {
            Ok(events) => {
                if let Some(outcome) = next.outcome() {
                    log::info!("duel decided: {outcome:?}");
                }
                RuleResolution::new(next, events)
            }
            Err(error) => {
                log::debug!("rejected {action:?}: {error}");
                RuleResolution::rejection(state.clone(), error)
            }
        }
    }

    pub fn apply_state(&self, state: &DuelState, action: &Action) -> DuelState {
        self.apply(state, action).state
    }

    fn execute(&self, state: &mut DuelState, action: &Action) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_in_progress(state)?;

        match action {
            Action::Draw { player, count } => Self::draw(state, *player, *count),
            Action::Summon { card_id, position } => Self::summon(state, *card_id, *position),
            Action::Attack {
                attacker_id,
                target_zone,
            } => Self::attack(state, *attacker_id, *target_zone),
            Action::ActivateSpell {
                card_id,
                target_zone,
            } => self.activate_spell(state, *card_id, *target_zone),
            Action::ActivateSetCard { zone, target_zone } => {
                self.activate_set_card(state, *zone, *target_zone)
            }
            Action::SetSpellTrap { card_id } => self.set_spell_trap(state, *card_id),
            Action::Fuse {
                material_a,
                material_b,
            } => self.fuse(state, *material_a, *material_b),
            Action::AdvancePhase => Self::advance_phase(state),
            Action::EndTurn => Ok(self.end_turn(state)),
        }
    }

    fn ensure_in_progress(state: &DuelState) -> Result<(), RuleError> {
        if state.is_finished() {
            return Err(RuleError::DuelFinished);
        }
        Ok(())
    }

    fn ensure_battle_phase(state: &DuelState) -> Result<(), RuleError> {
        if state.phase != Phase::Battle {
            return Err(RuleError::WrongPhase {
                expected: Phase::Battle,
                actual: state.phase,
            });
        }
        Ok(())
    }

    fn ensure_zone(zone: usize) -> Result<(), RuleError> {
        if zone >= ZONE_COUNT {
            return Err(RuleError::InvalidZone { zone });
        }
        Ok(())
    }

    fn draw(state: &mut DuelState, player: PlayerId, count: u8) -> Result<Vec<GameEvent>, RuleError> {
        if player > 1 {
            return Err(RuleError::UnknownPlayer { player_id: player });
        }
        Ok(state.draw(player, usize::from(count)).into_iter().collect())
    }

    fn summon(
        state: &mut DuelState,
        card_id: CardId,
        position: Position,
    ) -> Result<Vec<GameEvent>, RuleError> {
        if state.phase == Phase::End {
            return Err(RuleError::WrongPhase {
                expected: Phase::Main,
                actual: state.phase,
            });
        }

        let player_id = state.turn;
        let player = state.player(player_id);
        if player.has_summoned {
            return Err(RuleError::AlreadySummoned);
        }
        let hand_index = player
            .find_card_in_hand_index(card_id)
            .ok_or(RuleError::CardNotInHand { card_id })?;
        if !player.hand[hand_index].is_monster() {
            return Err(RuleError::NotAMonster { card_id });
        }
        let zone = player
            .first_empty_monster_zone()
            .ok_or(RuleError::MonsterZoneFull)?;

        let player = state.player_mut(player_id);
        let card = player.hand.remove(hand_index);
        player.monster_zones[zone] = Some(ZoneCard::new(card, position));
        player.has_summoned = true;

        let mut events = vec![GameEvent::MonsterSummoned {
            player_id,
            card_id,
            zone,
            position,
        }];
        if state.phase != Phase::Battle {
            events.push(GameEvent::PhaseChanged {
                from: state.phase,
                to: Phase::Battle,
            });
            state.phase = Phase::Battle;
        }
        Ok(events)
    }

    fn attack(
        state: &mut DuelState,
        attacker_id: CardId,
        target_zone: usize,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_battle_phase(state)?;
        if state.turn_count == 1 {
            return Err(RuleError::FirstTurnAttack);
        }

        let attacker_owner = state.turn;
        let player = state.player(attacker_owner);
        if player.has_attacked {
            return Err(RuleError::AlreadyAttacked);
        }
        Self::ensure_zone(target_zone)?;
        let attacker_zone = player
            .monster_zone_of(attacker_id)
            .ok_or(RuleError::CardNotOnField {
                card_id: attacker_id,
            })?;
        if state.attacks_restricted(attacker_owner) {
            return Err(RuleError::AttackRestricted);
        }

        Ok(Self::resolve_battle(
            state,
            attacker_owner,
            attacker_zone,
            target_zone,
        ))
    }

    /// 战斗结算：双方各自扣除对方怪兽的实际攻击力，攻击力低者被破坏，相同则同归于尽。
    /// 目标格为空时为直接攻击。
    pub fn resolve_battle(
        state: &mut DuelState,
        attacker_owner: PlayerId,
        attacker_zone: usize,
        target_zone: usize,
    ) -> Vec<GameEvent> {
        let defender_owner = opponent_of(attacker_owner);
        let Some(attacker_id) = state
            .player(attacker_owner)
            .monster_at(attacker_zone)
            .map(|card| card.id)
        else {
            return Vec::new();
        };
        let attacker_attack = state
            .effective_attack(attacker_owner, attacker_zone)
            .unwrap_or(0);
        let defender_id = state
            .player(defender_owner)
            .monster_at(target_zone)
            .map(|card| card.id);

        let mut events = vec![GameEvent::AttackDeclared {
            attacker_owner,
            attacker_id,
            attacker_zone,
            target_zone,
            defender_id,
        }];

        state.player_mut(defender_owner).life_points -= attacker_attack;
        events.push(GameEvent::DamageResolved {
            target_player: defender_owner,
            source_card: Some(attacker_id),
            amount: attacker_attack,
        });

        if let Some(defender_id) = defender_id {
            let defender_attack = state
                .effective_attack(defender_owner, target_zone)
                .unwrap_or(0);
            state.player_mut(attacker_owner).life_points -= defender_attack;
            events.push(GameEvent::DamageResolved {
                target_player: attacker_owner,
                source_card: Some(defender_id),
                amount: defender_attack,
            });

            match attacker_attack.cmp(&defender_attack) {
                Ordering::Greater => {
                    events.extend(state.destroy_monster(defender_owner, target_zone));
                }
                Ordering::Less => {
                    events.extend(state.destroy_monster(attacker_owner, attacker_zone));
                }
                Ordering::Equal => {
                    events.extend(state.destroy_monster(defender_owner, target_zone));
                    events.extend(state.destroy_monster(attacker_owner, attacker_zone));
                }
            }
        }

        state.player_mut(attacker_owner).has_attacked = true;
        events
    }

    fn activate_spell(
        &self,
        state: &mut DuelState,
        card_id: CardId,
        target_zone: Option<usize>,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let player_id = state.turn;
        let hand_index = Self::spell_in_hand(state, player_id, card_id)?;
        let card = state.player_mut(player_id).hand.remove(hand_index);
        self.resolve_spell(state, card, player_id, target_zone, None)
    }

    fn set_spell_trap(
        &self,
        state: &mut DuelState,
        card_id: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let player_id = state.turn;
        let hand_index = Self::spell_in_hand(state, player_id, card_id)?;

        let is_field = self
            .effect_engine()
            .descriptor(card_id)
            .map_or(false, |descriptor| descriptor.kind.is_field());
        if is_field {
            let card = state.player_mut(player_id).hand.remove(hand_index);
            return self.resolve_spell(state, card, player_id, None, None);
        }

        let zone = state
            .player(player_id)
            .first_empty_spell_trap_zone()
            .ok_or(RuleError::SpellTrapZoneFull)?;
        let player = state.player_mut(player_id);
        let card = player.hand.remove(hand_index);
        player.spell_trap_zones[zone] = Some(ZoneCard::new(card, Position::FaceDown));
        Ok(vec![GameEvent::CardSet {
            player_id,
            card_id,
            zone,
        }])
    }

    fn activate_set_card(
        &self,
        state: &mut DuelState,
        zone: usize,
        target_zone: Option<usize>,
    ) -> Result<Vec<GameEvent>, RuleError> {
        Self::ensure_zone(zone)?;
        let player_id = state.turn;
        let slot = &mut state.player_mut(player_id).spell_trap_zones[zone];
        let set = match slot.take() {
            Some(set) if set.position == Position::FaceDown => set,
            other => {
                *slot = other;
                return Err(RuleError::NotSetCard { zone });
            }
        };
        self.resolve_spell(state, set.card, player_id, target_zone, Some(zone))
    }

    fn spell_in_hand(
        state: &DuelState,
        player_id: PlayerId,
        card_id: CardId,
    ) -> Result<usize, RuleError> {
        let player = state.player(player_id);
        let hand_index = player
            .find_card_in_hand_index(card_id)
            .ok_or(RuleError::CardNotInHand { card_id })?;
        if player.hand[hand_index].is_monster() {
            return Err(RuleError::NotASpellOrTrap { card_id });
        }
        Ok(hand_index)
    }

    /// 装备与场地卡留在魔陷区（翻开的盖卡留在原格），其余卡结算后送墓。
    fn resolve_spell(
        &self,
        state: &mut DuelState,
        card: Card,
        player_id: PlayerId,
        target_zone: Option<usize>,
        origin_zone: Option<usize>,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let engine = self.effect_engine();
        let card_id = card.id;
        let mut events = vec![GameEvent::SpellActivated { player_id, card_id }];
        let ctx = EffectContext::new(card_id, player_id).with_target_zone(target_zone);

        let kind = engine.descriptor(card_id).map(|descriptor| &descriptor.kind);
        if kind.map_or(false, |kind| kind.persists()) {
            // 旧场地卡先离场，它空出的格子可以放新场地卡
            if kind.map_or(false, |kind| kind.is_field()) {
                events.extend(clear_field(state));
            }
            let zone = match origin_zone {
                Some(zone) => zone,
                None => state
                    .player(player_id)
                    .first_empty_spell_trap_zone()
                    .ok_or(RuleError::SpellTrapZoneFull)?,
            };
            state.player_mut(player_id).spell_trap_zones[zone] =
                Some(ZoneCard::new(card, Position::Attack));
            events.extend(engine.resolve(state, &ctx.with_card_zone(zone))?);
        } else {
            events.extend(engine.resolve(state, &ctx)?);
            state.player_mut(player_id).graveyard.push(card);
        }
        Ok(events)
    }

    fn fuse(
        &self,
        state: &mut DuelState,
        material_a: CardId,
        material_b: CardId,
    ) -> Result<Vec<GameEvent>, RuleError> {
        let player_id = state.turn;
        let player = state.player(player_id);
        let missing = if material_a == material_b {
            (player.count_in_hand(material_a) < 2).then_some(material_a)
        } else {
            [material_a, material_b]
                .into_iter()
                .find(|id| player.find_card_in_hand_index(*id).is_none())
        };
        if let Some(card_id) = missing {
            return Err(RuleError::CardNotInHand { card_id });
        }

        let mut rng = state.fork_rng();
        let result_id = self
            .fusion_resolver()
            .resolve(material_a, material_b, &mut rng)
            .ok_or(RuleError::NoFusion {
                material_a,
                material_b,
            })?;
        let result = self
            .catalog
            .card(result_id)
            .cloned()
            .ok_or(RuleError::UnknownCard { card_id: result_id })?;

        let player = state.player_mut(player_id);
        player.remove_card_from_hand(material_a);
        player.remove_card_from_hand(material_b);
        player.hand.push(result);

        Ok(vec![GameEvent::FusionCompleted {
            player_id,
            materials: [material_a, material_b],
            result: result_id,
        }])
    }

    fn advance_phase(state: &mut DuelState) -> Result<Vec<GameEvent>, RuleError> {
        let from = state.phase;
        let to = from.next();
        if from == to {
            return Err(RuleError::NoNextPhase);
        }
        state.phase = to;
        Ok(vec![GameEvent::PhaseChanged { from, to }])
    }

    fn end_turn(&self, state: &mut DuelState) -> Vec<GameEvent> {
        let current = state.turn;
        let next = opponent_of(current);

        state.turn = next;
        state.turn_count += 1;
        state.phase = Phase::Draw;
        for player in &mut state.players {
            player.reset_turn_flags();
        }

        let mut events = vec![GameEvent::TurnEnded {
            player_id: current,
            next_player: next,
            turn_count: state.turn_count,
        }];
        events.extend(EffectEngine::tick_effects(state));

        let missing = self
            .config
            .hand_size
            .saturating_sub(state.player(next).hand.len());
        events.extend(state.draw(next, missing));

        log::info!("turn {} begins for player {next}", state.turn_count);
        events
    }
}
