use super::catalog::Catalog;
use super::state::{
    Card, CardId, CreatureClass, DuelState, Element, Phase, Player, PlayerId, Position, ZoneCard,
};

pub(crate) fn builtin() -> &'static Catalog {
    Catalog::builtin().expect("embedded data is valid")
}

pub(crate) fn catalog_card(id: CardId) -> Card {
    builtin()
        .card(id)
        .cloned()
        .unwrap_or_else(|| panic!("card {id} is in the builtin catalog"))
}

pub(crate) fn monster(id: CardId, attack: i32) -> Card {
    Card::monster(
        id,
        format!("Monster {id}"),
        attack,
        1000,
        4,
        Element::Earth,
        CreatureClass::Warrior,
    )
}

/// 双方 8000 LP、空卡组，第 1 回合由玩家 0 行动。
pub(crate) fn blank_state() -> DuelState {
    DuelState::from_players(Player::new(8000, Vec::new()), Player::new(8000, Vec::new()))
}

/// 第 2 回合玩家 0 的战斗阶段，可以攻击。
pub(crate) fn battle_state() -> DuelState {
    let mut state = blank_state().with_phase(Phase::Battle);
    state.turn_count = 2;
    state
}

pub(crate) fn place_monster(state: &mut DuelState, player: PlayerId, zone: usize, card: Card) {
    state.player_mut(player).monster_zones[zone] = Some(ZoneCard::new(card, Position::Attack));
}

pub(crate) fn place_spell(
    state: &mut DuelState,
    player: PlayerId,
    zone: usize,
    card_id: CardId,
    position: Position,
) {
    let card = Card::spell(card_id, format!("Spell {card_id}"));
    state.player_mut(player).spell_trap_zones[zone] = Some(ZoneCard::new(card, position));
}
