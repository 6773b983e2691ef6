use crate::game::{opponent_of, Action, Card, DuelState, MonsterZones, Position};

/// 对手决策：能召唤就召唤最强的手牌怪兽，能攻击就用最强怪兽攻击对方最弱怪兽，否则结束回合。
///
/// 策略不发动魔陷，也不融合。
pub fn decide(
    hand: &[Card],
    own_field: &MonsterZones,
    opponent_field: &MonsterZones,
    has_summoned: bool,
    has_attacked: bool,
) -> Action {
    let has_empty_zone = own_field.iter().any(Option::is_none);
    if !has_summoned && has_empty_zone {
        if let Some(card) = strongest_in_hand(hand) {
            log::debug!("opponent summons {} ({})", card.name, card.base_attack());
            return Action::Summon {
                card_id: card.id,
                position: Position::Attack,
            };
        }
    }

    if !has_attacked {
        if let Some(attacker) = strongest_on_field(own_field) {
            let target_zone = weakest_zone(opponent_field).unwrap_or(0);
            log::debug!("opponent attacks zone {target_zone} with {}", attacker.name);
            return Action::Attack {
                attacker_id: attacker.id,
                target_zone,
            };
        }
    }

    Action::EndTurn
}

/// 从对局状态中取出当前行动方的决策输入。
pub fn decide_for(state: &DuelState) -> Action {
    let own = state.player(state.turn);
    let opponent = state.player(opponent_of(state.turn));
    decide(
        &own.hand,
        &own.monster_zones,
        &opponent.monster_zones,
        own.has_summoned,
        own.has_attacked,
    )
}

/// 先比攻击力，再比守备力，完全相同时取靠前的卡。
fn strongest_in_hand(hand: &[Card]) -> Option<&Card> {
    let key = |card: &Card| (card.base_attack(), card.base_defense());
    hand.iter()
        .filter(|card| card.is_monster())
        .fold(None, |best: Option<&Card>, card| match best {
            Some(current) if key(current) >= key(card) => Some(current),
            _ => Some(card),
        })
}

fn strongest_on_field(field: &MonsterZones) -> Option<&Card> {
    field
        .iter()
        .flatten()
        .map(|slot| &slot.card)
        .fold(None, |best: Option<&Card>, card| match best {
            Some(current) if current.base_attack() >= card.base_attack() => Some(current),
            _ => Some(card),
        })
}

fn weakest_zone(field: &MonsterZones) -> Option<usize> {
    field
        .iter()
        .enumerate()
        .filter_map(|(zone, slot)| slot.as_ref().map(|slot| (zone, slot.card.base_attack())))
        .min_by_key(|&(_, attack)| attack)
        .map(|(zone, _)| zone)
}
