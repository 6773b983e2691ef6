use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::config::{DuelConfig, SetupError};
use super::effects::{ActiveEffect, EffectKind, EquipStat};

/// 每名玩家的怪兽区与魔陷区格数。
pub const ZONE_COUNT: usize = 5;

/// 全局唯一的卡牌编号（卡表编号）。
pub type CardId = u32;
/// 玩家标识，仅取 0 或 1。
pub type PlayerId = u8;
/// 持续效果实例标识。
pub type EffectInstanceId = u32;

pub type MonsterZones = [Option<ZoneCard>; ZONE_COUNT];
pub type SpellTrapZones = [Option<ZoneCard>; ZONE_COUNT];

pub fn opponent_of(player: PlayerId) -> PlayerId {
    if player == 0 {
        1
    } else {
        0
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum CardKind {
    Monster,
    Spell,
    Trap,
}

impl Default for CardKind {
    fn default() -> Self {
        CardKind::Monster
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum Element {
    Earth,
    Water,
    Fire,
    Wind,
    Light,
    Dark,
}

impl Element {
    /// 光暗高于炎水，炎水高于地风。
    pub fn strength(self) -> u8 {
        match self {
            Element::Light | Element::Dark => 3,
            Element::Fire | Element::Water => 2,
            Element::Earth | Element::Wind => 1,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CreatureClass {
    Dragon,
    Spellcaster,
    Zombie,
    Warrior,
    #[serde(rename = "Beast-Warrior")]
    BeastWarrior,
    Beast,
    #[serde(rename = "Winged Beast")]
    WingedBeast,
    Fiend,
    Fairy,
    Insect,
    Dinosaur,
    Reptile,
    Fish,
    #[serde(rename = "Sea Serpent")]
    SeaSerpent,
    Machine,
    Thunder,
    Aqua,
    Pyro,
    Rock,
    Plant,
}

/// 卡表中的一张卡，只读。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Card {
    pub id: CardId,
    pub name: String,
    #[serde(default)]
    pub kind: CardKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attack: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub defense: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<Element>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creature_class: Option<CreatureClass>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u8>,
}

impl Card {
    pub fn monster(
        id: CardId,
        name: impl Into<String>,
        attack: i32,
        defense: i32,
        level: u8,
        element: Element,
        creature_class: CreatureClass,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind: CardKind::Monster,
            attack: Some(attack),
            defense: Some(defense),
            element: Some(element),
            creature_class: Some(creature_class),
            level: Some(level),
        }
    }

    pub fn spell(id: CardId, name: impl Into<String>) -> Self {
        Self::non_monster(id, name, CardKind::Spell)
    }

    pub fn trap(id: CardId, name: impl Into<String>) -> Self {
        Self::non_monster(id, name, CardKind::Trap)
    }

    fn non_monster(id: CardId, name: impl Into<String>, kind: CardKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            attack: None,
            defense: None,
            element: None,
            creature_class: None,
            level: None,
        }
    }

    pub fn is_monster(&self) -> bool {
        self.kind == CardKind::Monster
    }

    pub fn base_attack(&self) -> i32 {
        self.attack.unwrap_or(0)
    }

    pub fn base_defense(&self) -> i32 {
        self.defense.unwrap_or(0)
    }

    pub fn level_or_zero(&self) -> u8 {
        self.level.unwrap_or(0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Position {
    Attack,
    Defense,
    FaceDown,
}

impl Default for Position {
    fn default() -> Self {
        Position::Attack
    }
}

/// 场上某一格中的卡及其表示形式。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ZoneCard {
    pub card: Card,
    #[serde(default)]
    pub position: Position,
}

impl ZoneCard {
    pub fn new(card: Card, position: Position) -> Self {
        Self { card, position }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Draw,
    Standby,
    Main,
    Battle,
    End,
}

impl Default for Phase {
    fn default() -> Self {
        Phase::Draw
    }
}

impl Phase {
    pub fn next(self) -> Self {
        match self {
            Phase::Draw => Phase::Standby,
            Phase::Standby => Phase::Main,
            Phase::Main => Phase::Battle,
            Phase::Battle | Phase::End => Phase::End,
        }
    }
}

/// 单名玩家的全部区域。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Player {
    pub life_points: i32,
    #[serde(default)]
    pub hand: Vec<Card>,
    #[serde(default)]
    pub deck: Vec<Card>,
    #[serde(default)]
    pub monster_zones: MonsterZones,
    #[serde(default)]
    pub spell_trap_zones: SpellTrapZones,
    #[serde(default)]
    pub graveyard: Vec<Card>,
    #[serde(default)]
    pub has_summoned: bool,
    #[serde(default)]
    pub has_attacked: bool,
}

impl Player {
    pub fn new(life_points: i32, deck: Vec<Card>) -> Self {
        Self {
            life_points,
            hand: Vec::new(),
            deck,
            monster_zones: Default::default(),
            spell_trap_zones: Default::default(),
            graveyard: Vec::new(),
            has_summoned: false,
            has_attacked: false,
        }
    }

    pub fn find_card_in_hand_index(&self, card_id: CardId) -> Option<usize> {
        self.hand.iter().position(|card| card.id == card_id)
    }

    pub fn remove_card_from_hand(&mut self, card_id: CardId) -> Option<Card> {
        let idx = self.find_card_in_hand_index(card_id)?;
        Some(self.hand.remove(idx))
    }

    pub fn count_in_hand(&self, card_id: CardId) -> usize {
        self.hand.iter().filter(|card| card.id == card_id).count()
    }

    pub fn monster_at(&self, zone: usize) -> Option<&Card> {
        self.monster_zones
            .get(zone)
            .and_then(|slot| slot.as_ref())
            .map(|slot| &slot.card)
    }

    pub fn monster_zone_of(&self, card_id: CardId) -> Option<usize> {
        self.monster_zones
            .iter()
            .position(|slot| slot.as_ref().map_or(false, |slot| slot.card.id == card_id))
    }

    pub fn first_empty_monster_zone(&self) -> Option<usize> {
        self.monster_zones.iter().position(Option::is_none)
    }

    pub fn first_empty_spell_trap_zone(&self) -> Option<usize> {
        self.spell_trap_zones.iter().position(Option::is_none)
    }

    pub fn has_monster(&self) -> bool {
        self.monster_zones.iter().any(Option::is_some)
    }

    pub fn monsters(&self) -> impl Iterator<Item = (usize, &Card)> {
        self.monster_zones
            .iter()
            .enumerate()
            .filter_map(|(zone, slot)| slot.as_ref().map(|slot| (zone, &slot.card)))
    }

    /// 从牌库顶抽至多 `count` 张，返回实际抽到的卡号。
    pub fn draw(&mut self, count: usize) -> Vec<CardId> {
        let available = count.min(self.deck.len());
        let drawn: Vec<Card> = self.deck.drain(..available).collect();
        let ids = drawn.iter().map(|card| card.id).collect();
        self.hand.extend(drawn);
        ids
    }

    pub fn reset_turn_flags(&mut self) {
        self.has_summoned = false;
        self.has_attacked = false;
    }
}

/// 装备卡与怪兽格的绑定。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EquipBinding {
    pub player: PlayerId,
    pub monster_zone: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spell_zone: Option<usize>,
    pub card_id: CardId,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum DuelOutcome {
    Victory { winner: PlayerId, loser: PlayerId },
    Draw,
}

/// 对局事件流。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum GameEvent {
    CardsDrawn {
        player_id: PlayerId,
        card_ids: Vec<CardId>,
    },
    MonsterSummoned {
        player_id: PlayerId,
        card_id: CardId,
        zone: usize,
        position: Position,
    },
    PhaseChanged {
        from: Phase,
        to: Phase,
    },
    AttackDeclared {
        attacker_owner: PlayerId,
        attacker_id: CardId,
        attacker_zone: usize,
        target_zone: usize,
        #[serde(skip_serializing_if = "Option::is_none")]
        defender_id: Option<CardId>,
    },
    DamageResolved {
        target_player: PlayerId,
        #[serde(skip_serializing_if = "Option::is_none")]
        source_card: Option<CardId>,
        amount: i32,
    },
    LifeGained {
        player_id: PlayerId,
        amount: i32,
    },
    CardDestroyed {
        player_id: PlayerId,
        zone: usize,
        card_id: CardId,
    },
    SpellActivated {
        player_id: PlayerId,
        card_id: CardId,
    },
    CardSet {
        player_id: PlayerId,
        card_id: CardId,
        zone: usize,
    },
    EquipBound {
        player_id: PlayerId,
        card_id: CardId,
        monster_zone: usize,
    },
    EquipReleased {
        player_id: PlayerId,
        card_id: CardId,
        monster_zone: usize,
    },
    FieldReplaced {
        player_id: PlayerId,
        card_id: CardId,
    },
    FusionCompleted {
        player_id: PlayerId,
        materials: [CardId; 2],
        result: CardId,
    },
    EffectExpired {
        owner: PlayerId,
        card_id: CardId,
    },
    TurnEnded {
        player_id: PlayerId,
        next_player: PlayerId,
        turn_count: u32,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum IntegrityError {
    InvalidPlayerIndex { player_id: PlayerId },
    DanglingEquipBinding { player_id: PlayerId, monster_zone: usize },
    EquipWithoutEffect { card_id: CardId },
}

/// 对局整体状态，可直接序列化保存。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DuelState {
    pub turn: PlayerId,
    pub turn_count: u32,
    pub phase: Phase,
    pub players: [Player; 2],
    #[serde(default)]
    pub active_effects: Vec<ActiveEffect>,
    #[serde(default)]
    pub equip_bindings: Vec<EquipBinding>,
    #[serde(default)]
    pub next_effect_id: EffectInstanceId,
    #[serde(default)]
    pub rng_seed: u64,
}

impl DuelState {
    /// 由两副牌组开局：洗牌后各抽起手牌。
    pub fn new(
        config: &DuelConfig,
        deck_one: Vec<Card>,
        deck_two: Vec<Card>,
        seed: u64,
    ) -> Result<Self, SetupError> {
        let mut rng = SmallRng::seed_from_u64(seed);
        let mut decks = [deck_one, deck_two];
        for (player, deck) in decks.iter_mut().enumerate() {
            if deck.len() < config.deck_size {
                return Err(SetupError::DeckTooSmall {
                    player: player as PlayerId,
                    required: config.deck_size,
                    actual: deck.len(),
                });
            }
            deck.truncate(config.deck_size);
            deck.shuffle(&mut rng);
        }

        let [deck_one, deck_two] = decks;
        let mut state = Self::from_players(
            Player::new(config.starting_life_points, deck_one),
            Player::new(config.starting_life_points, deck_two),
        );
        state.rng_seed = rng.gen();
        for player in &mut state.players {
            player.draw(config.hand_size);
        }
        log::info!(
            "duel created: {} cards per deck, hand size {}",
            config.deck_size,
            config.hand_size
        );
        Ok(state)
    }

    pub fn from_players(first: Player, second: Player) -> Self {
        Self {
            turn: 0,
            turn_count: 1,
            phase: Phase::Draw,
            players: [first, second],
            active_effects: Vec::new(),
            equip_bindings: Vec::new(),
            next_effect_id: 1,
            rng_seed: 0,
        }
    }

    pub fn with_phase(mut self, phase: Phase) -> Self {
        self.phase = phase;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng_seed = seed;
        self
    }

    pub fn player(&self, id: PlayerId) -> &Player {
        &self.players[usize::from(id & 1)]
    }

    pub fn player_mut(&mut self, id: PlayerId) -> &mut Player {
        &mut self.players[usize::from(id & 1)]
    }

    pub fn acting_player(&self) -> PlayerId {
        self.turn
    }

    pub fn life_points(&self) -> [i32; 2] {
        [self.players[0].life_points, self.players[1].life_points]
    }

    pub fn draw(&mut self, player_id: PlayerId, count: usize) -> Option<GameEvent> {
        let card_ids = self.player_mut(player_id).draw(count);
        if card_ids.is_empty() {
            return None;
        }
        Some(GameEvent::CardsDrawn {
            player_id,
            card_ids,
        })
    }

    pub fn binding_at(&self, player: PlayerId, monster_zone: usize) -> Option<&EquipBinding> {
        self.equip_bindings
            .iter()
            .find(|binding| binding.player == player && binding.monster_zone == monster_zone)
    }

    /// 某怪兽格上装备带来的 (攻击, 守备) 加成。
    pub fn equip_bonus(&self, player: PlayerId, monster_zone: usize) -> (i32, i32) {
        self.active_effects
            .iter()
            .filter(|effect| effect.owner == player && effect.target_zone == Some(monster_zone))
            .filter_map(|effect| match &effect.effect {
                EffectKind::Equip { stat, amount, .. } => Some(match stat {
                    EquipStat::Attack => (*amount, 0),
                    EquipStat::Defense => (0, *amount),
                    EquipStat::Both => (*amount, *amount),
                }),
                _ => None,
            })
            .fold((0, 0), |(atk, def), (a, d)| (atk + a, def + d))
    }

    pub fn effective_attack(&self, player: PlayerId, zone: usize) -> Option<i32> {
        let card = self.player(player).monster_at(zone)?;
        Some(card.base_attack() + self.equip_bonus(player, zone).0)
    }

    pub fn effective_defense(&self, player: PlayerId, zone: usize) -> Option<i32> {
        let card = self.player(player).monster_at(zone)?;
        Some(card.base_defense() + self.equip_bonus(player, zone).1)
    }

    pub fn field_effect(&self) -> Option<&ActiveEffect> {
        self.active_effects
            .iter()
            .find(|effect| matches!(effect.effect, EffectKind::Field { .. }))
    }

    /// 当前场地魔法给这张卡的加成，仅用于显示。
    pub fn field_bonus(&self, card: &Card) -> i32 {
        match self.field_effect().map(|effect| &effect.effect) {
            Some(EffectKind::Field { amount, classes }) => match card.creature_class {
                Some(class) if classes.contains(&class) => *amount,
                _ => 0,
            },
            _ => 0,
        }
    }

    pub fn attacks_restricted(&self, player: PlayerId) -> bool {
        self.active_effects
            .iter()
            .any(|effect| effect.restricts_attacks_of(player))
    }

    pub fn allocate_effect_id(&mut self) -> EffectInstanceId {
        let id = self.next_effect_id;
        self.next_effect_id = self.next_effect_id.wrapping_add(1);
        id
    }

    /// 为一次随机决定派生随机源，并推进对局的种子。
    pub fn fork_rng(&mut self) -> SmallRng {
        let mut seeder = SmallRng::seed_from_u64(self.rng_seed);
        self.rng_seed = seeder.gen();
        SmallRng::seed_from_u64(seeder.gen())
    }

    /// 破坏怪兽并送入墓地，同时解除该格上的装备。
    pub fn destroy_monster(&mut self, player_id: PlayerId, zone: usize) -> Vec<GameEvent> {
        let mut events = Vec::new();
        let Some(slot) = self
            .player_mut(player_id)
            .monster_zones
            .get_mut(zone)
            .and_then(Option::take)
        else {
            return events;
        };

        let card_id = slot.card.id;
        self.player_mut(player_id).graveyard.push(slot.card);
        events.push(GameEvent::CardDestroyed {
            player_id,
            zone,
            card_id,
        });
        events.extend(self.release_equip(player_id, zone));
        events
    }

    fn release_equip(&mut self, player_id: PlayerId, monster_zone: usize) -> Option<GameEvent> {
        let pos = self.equip_bindings.iter().position(|binding| {
            binding.player == player_id && binding.monster_zone == monster_zone
        })?;
        let binding = self.equip_bindings.remove(pos);

        self.active_effects.retain(|effect| {
            !(effect.owner == player_id
                && effect.card_id == binding.card_id
                && effect.target_zone == Some(monster_zone))
        });

        if let Some(spell_zone) = binding.spell_zone {
            let player = self.player_mut(player_id);
            if let Some(slot) = player.spell_trap_zones.get_mut(spell_zone).and_then(Option::take) {
                player.graveyard.push(slot.card);
            }
        }

        Some(GameEvent::EquipReleased {
            player_id,
            card_id: binding.card_id,
            monster_zone,
        })
    }

    pub fn outcome(&self) -> Option<DuelOutcome> {
        let [first, second] = self.life_points();
        match (first <= 0, second <= 0) {
            (true, true) => Some(DuelOutcome::Draw),
            (true, false) => Some(DuelOutcome::Victory {
                winner: 1,
                loser: 0,
            }),
            (false, true) => Some(DuelOutcome::Victory {
                winner: 0,
                loser: 1,
            }),
            (false, false) => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.outcome().is_some()
    }

    pub fn integrity_check(&self) -> Result<(), IntegrityError> {
        if self.turn > 1 {
            return Err(IntegrityError::InvalidPlayerIndex {
                player_id: self.turn,
            });
        }

        for binding in &self.equip_bindings {
            if binding.player > 1
                || self.player(binding.player).monster_at(binding.monster_zone).is_none()
            {
                return Err(IntegrityError::DanglingEquipBinding {
                    player_id: binding.player,
                    monster_zone: binding.monster_zone,
                });
            }
            let has_effect = self.active_effects.iter().any(|effect| {
                effect.card_id == binding.card_id
                    && effect.owner == binding.player
                    && effect.target_zone == Some(binding.monster_zone)
            });
            if !has_effect {
                return Err(IntegrityError::EquipWithoutEffect {
                    card_id: binding.card_id,
                });
            }
        }

        Ok(())
    }
}
