//! 对局核心逻辑（卡表、状态机、效果、融合、存档）。

pub mod catalog;
pub mod config;
pub mod effects;
pub mod fusion;
pub mod rules;
pub mod session;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use catalog::{Catalog, CatalogError, CardCatalog, EffectCatalog, FusionEntry, FusionTable};
pub use config::{DuelConfig, SetupError};
pub use effects::{
    ActiveEffect,
    EffectContext,
    EffectDescriptor,
    EffectEngine,
    EffectKind,
    EquipStat,
    MonsterFilter,
    TargetScope,
};
pub use fusion::{FusionResolver, FusionTarget};
pub use rules::{Action, RuleEngine, RuleError, RuleResolution};
pub use session::{DuelSession, MemorySessionStore, SessionError, SessionStore};
pub use state::{
    opponent_of,
    Card,
    CardId,
    CardKind,
    CreatureClass,
    DuelOutcome,
    DuelState,
    Element,
    EquipBinding,
    GameEvent,
    IntegrityError,
    MonsterZones,
    Phase,
    Player,
    PlayerId,
    Position,
    SpellTrapZones,
    ZoneCard,
    ZONE_COUNT,
};
