use std::collections::{BTreeMap, HashMap};

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::config::SetupError;
use super::effects::EffectDescriptor;
use super::state::{Card, CardId};

const BUILTIN_CARDS: &str = include_str!("../../data/cards.json");
const BUILTIN_EFFECTS: &str = include_str!("../../data/effects.json");
const BUILTIN_FUSIONS: &str = include_str!("../../data/fusions.json");

static BUILTIN: Lazy<Result<Catalog, CatalogError>> =
    Lazy::new(|| Catalog::from_json(BUILTIN_CARDS, BUILTIN_EFFECTS, BUILTIN_FUSIONS));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("failed to parse {file}: {message}")]
    Parse { file: &'static str, message: String },
    #[error("card {id} is defined twice")]
    DuplicateCard { id: CardId },
    #[error("{file} references unknown card {id}")]
    UnknownCard { file: &'static str, id: CardId },
}

fn parse<T: for<'de> Deserialize<'de>>(file: &'static str, json: &str) -> Result<T, CatalogError> {
    serde_json::from_str(json).map_err(|err| CatalogError::Parse {
        file,
        message: err.to_string(),
    })
}

/// 卡表：编号到卡牌属性的只读映射。
#[derive(Debug, Clone, Default)]
pub struct CardCatalog {
    cards: BTreeMap<CardId, Card>,
}

impl CardCatalog {
    pub fn new(cards: Vec<Card>) -> Result<Self, CatalogError> {
        let mut map = BTreeMap::new();
        for card in cards {
            let id = card.id;
            if map.insert(id, card).is_some() {
                return Err(CatalogError::DuplicateCard { id });
            }
        }
        Ok(Self { cards: map })
    }

    pub fn get(&self, id: CardId) -> Option<&Card> {
        self.cards.get(&id)
    }

    pub fn contains(&self, id: CardId) -> bool {
        self.cards.contains_key(&id)
    }

    /// 按 id 升序排列的怪兽卡。
    pub fn monsters(&self) -> impl Iterator<Item = &Card> {
        self.cards.values().filter(|card| card.is_monster())
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct EffectCatalog {
    effects: HashMap<CardId, EffectDescriptor>,
}

impl EffectCatalog {
    pub fn new(effects: Vec<EffectDescriptor>) -> Self {
        Self {
            effects: effects
                .into_iter()
                .map(|descriptor| (descriptor.card_id, descriptor))
                .collect(),
        }
    }

    pub fn get(&self, card_id: CardId) -> Option<&EffectDescriptor> {
        self.effects.get(&card_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FusionEntry {
    pub materials: [CardId; 2],
    pub result: CardId,
}

/// 固定融合表，键为排序后的素材对。
#[derive(Debug, Clone, Default)]
pub struct FusionTable {
    entries: HashMap<(CardId, CardId), CardId>,
}

fn pair_key(a: CardId, b: CardId) -> (CardId, CardId) {
    (a.min(b), a.max(b))
}

impl FusionTable {
    pub fn new(entries: Vec<FusionEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|entry| (pair_key(entry.materials[0], entry.materials[1]), entry.result))
                .collect(),
        }
    }

    pub fn lookup(&self, a: CardId, b: CardId) -> Option<CardId> {
        self.entries.get(&pair_key(a, b)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 引擎只读不改的全部静态数据。
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    pub cards: CardCatalog,
    pub effects: EffectCatalog,
    pub fusions: FusionTable,
}

impl Catalog {
    pub fn new(
        cards: Vec<Card>,
        effects: Vec<EffectDescriptor>,
        fusions: Vec<FusionEntry>,
    ) -> Result<Self, CatalogError> {
        let cards = CardCatalog::new(cards)?;
        if let Some(descriptor) = effects.iter().find(|d| !cards.contains(d.card_id)) {
            return Err(CatalogError::UnknownCard {
                file: "effects",
                id: descriptor.card_id,
            });
        }
        for entry in &fusions {
            let ids = [entry.materials[0], entry.materials[1], entry.result];
            if let Some(id) = ids.into_iter().find(|id| !cards.contains(*id)) {
                return Err(CatalogError::UnknownCard {
                    file: "fusions",
                    id,
                });
            }
        }

        Ok(Self {
            cards,
            effects: EffectCatalog::new(effects),
            fusions: FusionTable::new(fusions),
        })
    }

    pub fn from_json(cards: &str, effects: &str, fusions: &str) -> Result<Self, CatalogError> {
        Self::new(
            parse("cards.json", cards)?,
            parse("effects.json", effects)?,
            parse("fusions.json", fusions)?,
        )
    }

    /// 内置卡表，首次访问时解析。
    pub fn builtin() -> Result<&'static Catalog, CatalogError> {
        BUILTIN.as_ref().map_err(Clone::clone)
    }

    pub fn card(&self, id: CardId) -> Option<&Card> {
        self.cards.get(id)
    }

    pub fn deck_from_ids(&self, ids: &[CardId]) -> Result<Vec<Card>, SetupError> {
        ids.iter()
            .map(|&card_id| {
                self.cards
                    .get(card_id)
                    .cloned()
                    .ok_or(SetupError::UnknownCard { card_id })
            })
            .collect()
    }
}
