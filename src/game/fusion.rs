use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::catalog::{CardCatalog, FusionTable};
use super::state::{Card, CardId, CreatureClass, Element};

const FALLBACK_SCORE_THRESHOLD: f64 = -50.0;
const FALLBACK_MAX_LEVEL: u8 = 2;
const FALLBACK_MAX_ATTACK: i32 = 500;

/// 种族相性表：左侧种族与右侧列出的种族相容。
fn compatible_classes(class: CreatureClass) -> &'static [CreatureClass] {
    use CreatureClass::*;
    match class {
        Dragon => &[Dinosaur, Reptile],
        Dinosaur => &[Reptile],
        Warrior => &[BeastWarrior],
        Beast => &[BeastWarrior, WingedBeast],
        BeastWarrior => &[Beast],
        Fiend => &[Zombie],
        Zombie => &[Fiend],
        Spellcaster => &[Fairy],
        Fish => &[SeaSerpent, Aqua],
        Aqua => &[Fish, SeaSerpent],
        Machine => &[Thunder, Rock],
        Pyro => &[Dinosaur],
        Insect => &[Plant],
        _ => &[],
    }
}

/// 由两张素材推出的启发式搜索目标。
#[derive(Debug, Clone, PartialEq)]
pub struct FusionTarget {
    pub attack: i32,
    pub defense: i32,
    pub level: i32,
    pub class: Option<CreatureClass>,
    pub element: Option<Element>,
}

impl FusionTarget {
    pub fn from_materials(a: &Card, b: &Card) -> Self {
        let level = (f64::from(a.level_or_zero()) + f64::from(b.level_or_zero())) / 2.0;
        Self {
            attack: (a.base_attack() + b.base_attack()).div_euclid(2),
            defense: (a.base_defense() + b.base_defense()).div_euclid(2),
            level: level.round() as i32,
            class: preferred_class(a, b),
            element: preferred_element(a, b),
        }
    }

    pub fn score(&self, candidate: &Card) -> f64 {
        let stat_gap = (candidate.base_attack() - self.attack).abs()
            + (candidate.base_defense() - self.defense).abs();
        let level_gap = (i32::from(candidate.level_or_zero()) - self.level).abs();

        let mut score = -f64::from(stat_gap) / 100.0 - 5.0 * f64::from(level_gap);
        if self.class.is_some() && candidate.creature_class == self.class {
            score += 20.0;
        }
        if self.element.is_some() && candidate.element == self.element {
            score += 15.0;
        }
        if candidate.base_attack() >= self.attack {
            score += 5.0;
        }
        score
    }
}

/// 等级更高的素材，其次攻击力更高；完全相同时为 `None`。
fn stronger<'c>(a: &'c Card, b: &'c Card) -> Option<&'c Card> {
    let key = |card: &Card| (card.level_or_zero(), card.base_attack());
    match key(a).cmp(&key(b)) {
        std::cmp::Ordering::Greater => Some(a),
        std::cmp::Ordering::Less => Some(b),
        std::cmp::Ordering::Equal => None,
    }
}

fn preferred_class(a: &Card, b: &Card) -> Option<CreatureClass> {
    match (a.creature_class, b.creature_class) {
        (Some(x), Some(y)) if x == y => Some(x),
        (Some(x), Some(y)) => {
            let x_accepts_y = compatible_classes(x).contains(&y);
            let y_accepts_x = compatible_classes(y).contains(&x);
            match (x_accepts_y, y_accepts_x) {
                (true, false) => Some(x),
                (false, true) => Some(y),
                _ => stronger(a, b)
                    .and_then(|card| card.creature_class)
                    .or(Some(x.max(y))),
            }
        }
        (Some(x), None) | (None, Some(x)) => Some(x),
        (None, None) => None,
    }
}

fn preferred_element(a: &Card, b: &Card) -> Option<Element> {
    match (a.element, b.element) {
        (Some(x), Some(y)) if x == y => Some(x),
        (Some(x), Some(y)) => match x.strength().cmp(&y.strength()) {
            std::cmp::Ordering::Greater => Some(x),
            std::cmp::Ordering::Less => Some(y),
            std::cmp::Ordering::Equal => stronger(a, b)
                .and_then(|card| card.element)
                .or(Some(x.max(y))),
        },
        (Some(x), None) | (None, Some(x)) => Some(x),
        (None, None) => None,
    }
}

/// 融合判定：先查固定融合表，再按属性相近度搜索。
pub struct FusionResolver<'a> {
    cards: &'a CardCatalog,
    table: &'a FusionTable,
}

impl<'a> FusionResolver<'a> {
    pub fn new(cards: &'a CardCatalog, table: &'a FusionTable) -> Self {
        Self { cards, table }
    }

    /// 与素材顺序无关：同一随机源下 `resolve(a, b)` 与 `resolve(b, a)` 结果相同。
    pub fn resolve<R: Rng + ?Sized>(&self, a: CardId, b: CardId, rng: &mut R) -> Option<CardId> {
        if let Some(result) = self.table.lookup(a, b) {
            return Some(result);
        }

        let first = self.cards.get(a)?;
        let second = self.cards.get(b)?;
        if !first.is_monster() || !second.is_monster() {
            return None;
        }

        let target = FusionTarget::from_materials(first, second);
        self.best_candidate(&target)
            .or_else(|| self.fallback(rng))
    }

    pub fn resolve_seeded(&self, a: CardId, b: CardId, seed: u64) -> Option<CardId> {
        let mut rng = SmallRng::seed_from_u64(seed);
        self.resolve(a, b, &mut rng)
    }

    /// 得分最高的怪兽；最高分也不超过阈值时返回 `None`。
    fn best_candidate(&self, target: &FusionTarget) -> Option<CardId> {
        let mut best: Option<(f64, CardId)> = None;
        for card in self.cards.monsters() {
            let score = target.score(card);
            if best.map_or(true, |(best_score, _)| score > best_score) {
                best = Some((score, card.id));
            }
        }

        match best {
            Some((score, id)) if score > FALLBACK_SCORE_THRESHOLD => Some(id),
            Some((score, _)) => {
                log::debug!("best fusion candidate scored {score:.1}, using fallback");
                None
            }
            None => None,
        }
    }

    fn fallback<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<CardId> {
        let weak: Vec<CardId> = self
            .cards
            .monsters()
            .filter(|card| {
                card.level_or_zero() <= FALLBACK_MAX_LEVEL
                    && card.base_attack() <= FALLBACK_MAX_ATTACK
            })
            .map(|card| card.id)
            .collect();

        weak.choose(rng)
            .copied()
            .or_else(|| self.cards.monsters().next().map(|card| card.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::catalog::{Catalog, FusionEntry};

    fn card(
        id: CardId,
        attack: i32,
        defense: i32,
        level: u8,
        element: Element,
        class: CreatureClass,
    ) -> Card {
        Card::monster(id, format!("Card {id}"), attack, defense, level, element, class)
    }

    fn small_catalog() -> Catalog {
        let cards = vec![
            card(1, 1200, 700, 3, Element::Wind, CreatureClass::Dragon),
            card(2, 1600, 1200, 4, Element::Earth, CreatureClass::Dinosaur),
            card(3, 1400, 1000, 4, Element::Wind, CreatureClass::Dragon),
            card(4, 300, 200, 1, Element::Dark, CreatureClass::Fiend),
            card(5, 2400, 2000, 7, Element::Wind, CreatureClass::Dragon),
            card(6, 500, 400, 2, Element::Light, CreatureClass::Spellcaster),
            Card::spell(100, "Sparks"),
        ];
        Catalog::new(
            cards,
            Vec::new(),
            vec![FusionEntry {
                materials: [1, 6],
                result: 5,
            }],
        )
        .expect("valid catalog")
    }

    #[test]
    fn exact_table_wins() {
        let catalog = small_catalog();
        let resolver = FusionResolver::new(&catalog.cards, &catalog.fusions);

        assert_eq!(resolver.resolve_seeded(1, 6, 0), Some(5));
        assert_eq!(resolver.resolve_seeded(6, 1, 0), Some(5));
    }

    #[test]
    fn spells_never_fuse() {
        let catalog = small_catalog();
        let resolver = FusionResolver::new(&catalog.cards, &catalog.fusions);

        assert_eq!(resolver.resolve_seeded(1, 100, 0), None);
        assert_eq!(resolver.resolve_seeded(100, 100, 0), None);
    }

    #[test]
    fn unknown_materials_never_fuse() {
        let catalog = small_catalog();
        let resolver = FusionResolver::new(&catalog.cards, &catalog.fusions);

        assert_eq!(resolver.resolve_seeded(1, 999, 0), None);
    }

    #[test]
    fn dragon_absorbs_compatible_dinosaur() {
        let a = card(1, 1200, 700, 3, Element::Wind, CreatureClass::Dragon);
        let b = card(2, 1600, 1200, 4, Element::Earth, CreatureClass::Dinosaur);

        let target = FusionTarget::from_materials(&a, &b);

        assert_eq!(target.class, Some(CreatureClass::Dragon));
        assert_eq!(target.attack, 1400);
        assert_eq!(target.defense, 950);
        assert_eq!(target.level, 4);
    }

    #[test]
    fn stronger_element_is_preferred() {
        let a = card(1, 1000, 1000, 4, Element::Earth, CreatureClass::Rock);
        let b = card(2, 1000, 1000, 3, Element::Dark, CreatureClass::Plant);

        assert_eq!(preferred_element(&a, &b), Some(Element::Dark));
        assert_eq!(preferred_element(&b, &a), Some(Element::Dark));
        // neither class lists the other, so the higher level wins
        assert_eq!(preferred_class(&a, &b), Some(CreatureClass::Rock));
    }

    #[test]
    fn heuristic_picks_closest_match() {
        let catalog = small_catalog();
        let resolver = FusionResolver::new(&catalog.cards, &catalog.fusions);

        // target 1400/950 L4 Dragon EARTH: card 3 matches class, level and attack
        assert_eq!(resolver.resolve_seeded(1, 2, 11), Some(3));
    }

    #[test]
    fn resolution_is_symmetric_for_every_pair() {
        let catalog = Catalog::builtin().expect("embedded data is valid");
        let resolver = FusionResolver::new(&catalog.cards, &catalog.fusions);
        let ids: Vec<CardId> = (1..=38).chain([301, 336]).collect();

        for &a in &ids {
            for &b in &ids {
                assert_eq!(
                    resolver.resolve_seeded(a, b, 5),
                    resolver.resolve_seeded(b, a, 5),
                    "fusion of {a} and {b} depends on order"
                );
            }
        }
    }

    #[test]
    fn poor_matches_fall_back_to_weak_monsters() {
        let cards = vec![
            card(1, 4000, 4000, 12, Element::Light, CreatureClass::Dragon),
            card(2, 4000, 4000, 12, Element::Light, CreatureClass::Dragon),
            card(3, 100, 100, 1, Element::Dark, CreatureClass::Fiend),
            card(4, 400, 300, 2, Element::Earth, CreatureClass::Insect),
        ];
        let catalog = Catalog::new(cards, Vec::new(), Vec::new()).expect("valid catalog");
        let resolver = FusionResolver::new(&catalog.cards, &catalog.fusions);
        let target = FusionTarget::from_materials(
            &card(8, 0, 0, 12, Element::Water, CreatureClass::Fish),
            &card(9, 0, 0, 12, Element::Water, CreatureClass::Fish),
        );

        assert_eq!(resolver.best_candidate(&target), None);
        for seed in 0..8 {
            let mut rng = SmallRng::seed_from_u64(seed);
            let picked = resolver.fallback(&mut rng);
            assert!(matches!(picked, Some(3) | Some(4)));
        }
    }
}
