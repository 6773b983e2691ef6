pub mod ai;
pub mod game;
pub mod utils;

use gloo_timers::future::TimeoutFuture;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use std::str::FromStr;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;
use web_sys::js_sys::Promise;

pub use ai::{decide, decide_for, AiConfig, AiDifficulty, OpponentDriver, TurnReport};
pub use game::{
    Action, Card, CardId, Catalog, CatalogError, DuelConfig, DuelOutcome, DuelSession, DuelState,
    EffectEngine, EffectKind, FusionResolver, GameEvent, MemorySessionStore, Phase, PlayerId,
    RuleEngine, RuleError, RuleResolution, SessionError, SessionStore, SetupError,
};

#[cfg(feature = "wee_alloc")]
#[global_allocator]
static ALLOC: wee_alloc::WeeAlloc = wee_alloc::WeeAlloc::INIT;

#[wasm_bindgen(start)]
pub fn start() {
    utils::set_panic_hook();
    utils::init_logging(log::Level::Debug);
}

fn to_js_error<E: std::fmt::Display>(error: E) -> JsValue {
    JsValue::from_str(&error.to_string())
}

fn to_json<T: Serialize>(value: &T) -> Result<String, JsValue> {
    serde_json::to_string(value).map_err(to_js_error)
}

fn catalog() -> Result<&'static Catalog, JsValue> {
    Catalog::builtin().map_err(to_js_error)
}

fn ai_config(difficulty: Option<String>) -> AiConfig {
    let difficulty = difficulty
        .as_deref()
        .and_then(|value| AiDifficulty::from_str(value).ok())
        .unwrap_or(AiDifficulty::Normal);
    AiConfig::from_difficulty(difficulty)
}

/// 浏览器端持有的一局对战。所有规则判定都委托给 `RuleEngine`。
#[wasm_bindgen]
pub struct DuelEngine {
    state: DuelState,
    config: DuelConfig,
}

#[wasm_bindgen]
impl DuelEngine {
    #[wasm_bindgen(constructor)]
    pub fn new(
        deck_one: Vec<u32>,
        deck_two: Vec<u32>,
        seed: u64,
        config_json: Option<String>,
    ) -> Result<DuelEngine, JsValue> {
        let config = match config_json {
            Some(json) => serde_json::from_str(&json).map_err(to_js_error)?,
            None => DuelConfig::default(),
        };
        let engine = RuleEngine::new(catalog()?).with_config(config.clone());
        let state = engine
            .new_duel(&deck_one, &deck_two, seed)
            .map_err(to_js_error)?;
        Ok(DuelEngine { state, config })
    }

    #[wasm_bindgen(js_name = "fromStateJson")]
    pub fn from_state_json(json: &str) -> Result<DuelEngine, JsValue> {
        let state = serde_json::from_str(json).map_err(to_js_error)?;
        Ok(DuelEngine {
            state,
            config: DuelConfig::default(),
        })
    }

    /// 从存档恢复对局，存档过期或损坏时报错。
    #[wasm_bindgen(js_name = "fromSessionJson")]
    pub fn from_session_json(json: &str) -> Result<DuelEngine, JsValue> {
        let session = DuelSession::restore(json, utils::now_ms()).map_err(|err| {
            log::warn!("cannot restore duel session: {err}");
            to_js_error(err)
        })?;
        Ok(DuelEngine {
            state: session.state,
            config: DuelConfig::default(),
        })
    }

    pub fn state_json(&self) -> Result<String, JsValue> {
        to_json(&self.state)
    }

    pub fn set_state_json(&mut self, json: &str) -> Result<(), JsValue> {
        self.state = serde_json::from_str(json).map_err(to_js_error)?;
        Ok(())
    }

    /// 执行一个动作，被拒绝时对局不变，原因见返回结果。
    pub fn apply_json(&mut self, action_json: &str) -> Result<String, JsValue> {
        let action: Action = serde_json::from_str(action_json).map_err(to_js_error)?;
        let resolution = self.rules()?.apply(&self.state, &action);
        self.state = resolution.state.clone();
        to_json(&resolution)
    }

    pub fn opponent_action_json(&self) -> Result<String, JsValue> {
        to_json(&OpponentDriver::default().next_action(&self.state))
    }

    pub fn apply_opponent_turn(&mut self, difficulty: Option<String>) -> Result<String, JsValue> {
        let driver = OpponentDriver::new(ai_config(difficulty));
        let report = driver.play_turn(&self.rules()?, &self.state);
        self.state = report.state.clone();
        to_json(&report)
    }

    /// 模拟思考延迟后返回对手的下一步动作。
    pub fn think_opponent(&self, difficulty: Option<String>, delay_ms: Option<u32>) -> Promise {
        let state = self.state.clone();
        let config = ai_config(difficulty);
        let delay = delay_ms.unwrap_or(config.think_delay_ms);

        future_to_promise(async move {
            if delay > 0 {
                TimeoutFuture::new(delay).await;
            }
            let action = OpponentDriver::new(config).next_action(&state);
            Ok(JsValue::from_str(&to_json(&action)?))
        })
    }

    pub fn resolve_fusion(
        &self,
        material_a: u32,
        material_b: u32,
        seed: u64,
    ) -> Result<Option<u32>, JsValue> {
        let catalog = catalog()?;
        let resolver = FusionResolver::new(&catalog.cards, &catalog.fusions);
        Ok(resolver.resolve_seeded(material_a, material_b, seed))
    }

    pub fn outcome_json(&self) -> Result<String, JsValue> {
        to_json(&self.state.outcome())
    }

    pub fn session_json(&self, opponent_id: u32) -> Result<String, JsValue> {
        DuelSession::new(self.state.clone(), opponent_id, utils::now_ms())
            .encode()
            .map_err(to_js_error)
    }

    fn rules(&self) -> Result<RuleEngine<'static>, JsValue> {
        Ok(RuleEngine::new(catalog()?).with_config(self.config.clone()))
    }
}

/// 查询卡表中的一张卡。
#[wasm_bindgen(js_name = "getCard")]
pub fn get_card(card_id: u32) -> Result<JsValue, JsValue> {
    let card = catalog()?.card(card_id);
    to_value(&card).map_err(JsValue::from)
}

/// 对传入的状态执行一个动作，返回新状态与事件。
#[wasm_bindgen(js_name = "applyAction")]
pub fn apply_action(state: JsValue, action: JsValue) -> Result<JsValue, JsValue> {
    let state: DuelState = from_value(state).map_err(JsValue::from)?;
    let action: Action = from_value(action).map_err(JsValue::from)?;
    let resolution = RuleEngine::new(catalog()?).apply(&state, &action);
    to_value(&resolution).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "decideAction")]
pub fn decide_action(state: JsValue) -> Result<JsValue, JsValue> {
    let state: DuelState = from_value(state).map_err(JsValue::from)?;
    to_value(&decide_for(&state)).map_err(JsValue::from)
}

#[wasm_bindgen(js_name = "validateState")]
pub fn validate_state(state: JsValue) -> Result<(), JsValue> {
    let state: DuelState = from_value(state).map_err(JsValue::from)?;
    state
        .integrity_check()
        .map_err(|error| to_value(&error).unwrap_or_else(to_js_error))
}
