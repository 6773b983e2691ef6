use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::policy::decide_for;
use crate::game::{Action, DuelOutcome, DuelState, GameEvent, Phase, RuleEngine, RuleResolution};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AiDifficulty {
    Easy,
    Normal,
    Hard,
}

impl FromStr for AiDifficulty {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "easy" => Ok(AiDifficulty::Easy),
            "normal" | "medium" => Ok(AiDifficulty::Normal),
            "hard" => Ok(AiDifficulty::Hard),
            _ => Err(()),
        }
    }
}

/// 对手回合参数。难度只影响思考延迟。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiConfig {
    pub max_actions_per_turn: u8,
    pub think_delay_ms: u32,
}

impl AiConfig {
    pub fn from_difficulty(difficulty: AiDifficulty) -> Self {
        let think_delay_ms = match difficulty {
            AiDifficulty::Easy => 900,
            AiDifficulty::Normal => 600,
            AiDifficulty::Hard => 300,
        };
        Self {
            max_actions_per_turn: 12,
            think_delay_ms,
        }
    }

    pub fn with_max_actions(mut self, max_actions_per_turn: u8) -> Self {
        self.max_actions_per_turn = max_actions_per_turn.max(1);
        self
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        AiConfig::from_difficulty(AiDifficulty::Normal)
    }
}

/// 对手一整个回合的执行记录。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnReport {
    pub state: DuelState,
    pub actions: Vec<Action>,
    pub events: Vec<GameEvent>,
    /// 回合由驱动器强制结束，而不是策略主动结束。
    pub forced_end: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<DuelOutcome>,
}

impl TurnReport {
    fn new(state: DuelState) -> Self {
        Self {
            state,
            actions: Vec::new(),
            events: Vec::new(),
            forced_end: false,
            outcome: None,
        }
    }

    fn record(&mut self, action: Action, resolution: RuleResolution) {
        self.actions.push(action);
        self.events.extend(resolution.events);
        self.state = resolution.state;
    }
}

/// 把决策策略的输出逐个喂给状态机，直到回合结束。
#[derive(Debug, Clone, Default)]
pub struct OpponentDriver {
    config: AiConfig,
}

impl OpponentDriver {
    pub fn new(config: AiConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AiConfig {
        &self.config
    }

    /// 策略的下一步；想在战斗阶段前攻击时先推进阶段。
    pub fn next_action(&self, state: &DuelState) -> Action {
        let action = decide_for(state);
        if matches!(action, Action::Attack { .. }) && state.phase < Phase::Battle {
            return Action::AdvancePhase;
        }
        action
    }

    pub fn play_turn(&self, engine: &RuleEngine<'_>, state: &DuelState) -> TurnReport {
        let acting = state.turn;
        let mut report = TurnReport::new(state.clone());

        for _ in 0..self.config.max_actions_per_turn {
            if report.state.is_finished() || report.state.turn != acting {
                break;
            }
            let action = self.next_action(&report.state);
            let resolution = engine.apply(&report.state, &action);
            if let Some(reason) = &resolution.rejected {
                log::debug!("opponent action {action:?} rejected: {reason}");
                break;
            }
            report.record(action, resolution);
        }

        if !report.state.is_finished() && report.state.turn == acting {
            log::debug!("forcing end of turn {}", report.state.turn_count);
            let resolution = engine.apply(&report.state, &Action::EndTurn);
            report.forced_end = true;
            report.record(Action::EndTurn, resolution);
        }

        report.outcome = report.state.outcome();
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::testing::{battle_state, blank_state, builtin, monster, place_monster};

    #[test]
    fn difficulty_parses_and_sets_delay() {
        assert_eq!("HARD".parse::<AiDifficulty>(), Ok(AiDifficulty::Hard));
        assert_eq!("medium".parse::<AiDifficulty>(), Ok(AiDifficulty::Normal));
        assert!("expert".parse::<AiDifficulty>().is_err());

        let easy = AiConfig::from_difficulty(AiDifficulty::Easy);
        assert!(easy.think_delay_ms > AiConfig::default().think_delay_ms);
        assert_eq!(easy.max_actions_per_turn, 12);
    }

    #[test]
    fn first_turn_summons_then_is_forced_to_end() {
        let engine = RuleEngine::new(builtin());
        let mut state = blank_state();
        state.players[0].hand = vec![monster(1, 1000), monster(2, 1800)];

        let report = OpponentDriver::default().play_turn(&engine, &state);

        assert_eq!(
            report.actions.first(),
            Some(&Action::Summon {
                card_id: 2,
                position: Default::default()
            })
        );
        assert!(report.forced_end);
        assert_eq!(report.state.turn, 1);
        assert_eq!(report.state.players[0].monster_at(0).map(|c| c.id), Some(2));
        assert_eq!(report.state.life_points(), [8000, 8000]);
    }

    #[test]
    fn advances_to_battle_before_attacking() {
        let engine = RuleEngine::new(builtin());
        let mut state = blank_state();
        state.turn_count = 4;
        state.players[0].has_summoned = true;
        place_monster(&mut state, 0, 0, monster(1, 1500));
        place_monster(&mut state, 1, 0, monster(2, 1000));

        let report = OpponentDriver::default().play_turn(&engine, &state);

        assert_eq!(
            &report.actions[..4],
            &[
                Action::AdvancePhase,
                Action::AdvancePhase,
                Action::AdvancePhase,
                Action::Attack {
                    attacker_id: 1,
                    target_zone: 0
                }
            ]
        );
        assert_eq!(report.actions.last(), Some(&Action::EndTurn));
        assert!(!report.forced_end);
        assert_eq!(report.state.life_points(), [7000, 6500]);
        assert!(report.state.players[1].monster_at(0).is_none());
    }

    #[test]
    fn budget_exhaustion_forces_end_turn() {
        let engine = RuleEngine::new(builtin());
        let mut state = battle_state();
        place_monster(&mut state, 0, 0, monster(1, 1500));
        state.players[0].has_summoned = true;
        let driver = OpponentDriver::new(AiConfig::default().with_max_actions(1));

        let report = driver.play_turn(&engine, &state);

        assert_eq!(report.actions.len(), 2);
        assert!(report.forced_end);
        assert_eq!(report.state.turn, 1);
    }

    #[test]
    fn lethal_attack_stops_the_turn() {
        let engine = RuleEngine::new(builtin());
        let mut state = battle_state();
        state.players[1].life_points = 1000;
        state.players[0].has_summoned = true;
        place_monster(&mut state, 0, 0, monster(1, 1500));

        let report = OpponentDriver::default().play_turn(&engine, &state);

        assert_eq!(report.actions.len(), 1);
        assert!(!report.forced_end);
        assert_eq!(
            report.outcome,
            Some(DuelOutcome::Victory {
                winner: 0,
                loser: 1
            })
        );
    }
}
