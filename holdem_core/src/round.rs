use crate::game::Game;
use crate::message::{PlayerAction, ServerMessage};
use crate::table::{Chips, PlayerId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// 下注阶段，严格按顺序推进，不会回退
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BettingPhase {
    PreFlop,
    Flop,
    Turn,
    River,
    Showdown,
}

impl BettingPhase {
    /// 下一个阶段。只剩不到两名未弃牌玩家时直接进入摊牌。
    pub const fn next(self, active_players: usize) -> BettingPhase {
        if active_players <= 1 {
            return BettingPhase::Showdown;
        }
        match self {
            BettingPhase::PreFlop => BettingPhase::Flop,
            BettingPhase::Flop => BettingPhase::Turn,
            BettingPhase::Turn => BettingPhase::River,
            BettingPhase::River | BettingPhase::Showdown => BettingPhase::Showdown,
        }
    }

    pub fn initial_options(self) -> Vec<PlayerAction> {
        match self {
            BettingPhase::PreFlop => vec![PlayerAction::Call, PlayerAction::Fold, PlayerAction::Raise],
            BettingPhase::Flop | BettingPhase::Turn | BettingPhase::River => {
                vec![PlayerAction::Check, PlayerAction::Fold, PlayerAction::Raise]
            }
            BettingPhase::Showdown => Vec::new(),
        }
    }

    /// 进入该阶段时要发的公共牌数量
    pub const fn community_cards_to_deal(self) -> usize {
        match self {
            BettingPhase::Flop => 3,
            BettingPhase::Turn | BettingPhase::River => 1,
            BettingPhase::PreFlop | BettingPhase::Showdown => 0,
        }
    }

    /// 第一个行动的座位：翻牌前为大盲的下家，之后为小盲
    pub const fn starting_position(self, sb_pos: usize, bb_pos: usize, seats: usize) -> usize {
        match self {
            BettingPhase::PreFlop => (bb_pos + 1) % seats,
            _ => sb_pos,
        }
    }

    pub const fn initial_bet(self, big_blind: Chips) -> Chips {
        match self {
            BettingPhase::PreFlop => big_blind,
            _ => 0,
        }
    }

    /// 翻牌前没人加注时，大盲可以过牌
    pub fn override_options(self, seat: usize, bb_pos: usize, options: &[PlayerAction]) -> Vec<PlayerAction> {
        match self {
            BettingPhase::PreFlop if seat == bb_pos => {
                vec![PlayerAction::Check, PlayerAction::Fold, PlayerAction::Raise]
            }
            _ => options.to_vec(),
        }
    }
}

// --- 下注轮 ---

impl Game {
    /// 每个下注轮开始前：翻牌前下大小盲，之后清零本轮下注
    pub(crate) async fn setup_round(&mut self, phase: BettingPhase) {
        match phase {
            BettingPhase::PreFlop => {
                let (sb_amount, bb_amount) = (self.settings.small_blind, self.settings.big_blind);

                self.commit(self.sb_pos, sb_amount);
                let player = self.table.players[self.sb_pos].public();
                self.handler.broadcast(ServerMessage::PreFlopSb { sb_amount, player }).await;
                self.handler.broadcast(ServerMessage::Pot { pot: self.pot }).await;

                self.commit(self.bb_pos, bb_amount);
                let player = self.table.players[self.bb_pos].public();
                self.handler.broadcast(ServerMessage::PreFlopBb { bb_amount, player }).await;
                self.handler.broadcast(ServerMessage::Pot { pot: self.pot }).await;
            }
            _ => self.table.players.iter_mut().for_each(|p| p.bet = 0),
        }
    }

    fn active_ids(&self) -> HashSet<PlayerId> {
        self.table
            .players
            .iter()
            .map(|p| p.id)
            .filter(|id| !self.folded.contains(id))
            .collect()
    }

    /// 运行一轮下注，直到每个未弃牌的玩家都对当前最高注做出了回应
    ///
    /// 有人加注时，除加注者外的所有未弃牌玩家需要重新行动。
    pub(crate) async fn run_betting_round(&mut self, phase: BettingPhase) {
        self.setup_round(phase).await;

        let seats = self.table.players.len();
        let mut options = phase.initial_options();
        let mut curr_pos = phase.starting_position(self.sb_pos, self.bb_pos, seats);
        let mut prev_pos = (curr_pos + seats - 1) % seats;
        let mut curr_bet = phase.initial_bet(self.settings.big_blind);
        let mut last_raise = self.settings.min_raise;

        if self.active_count() <= 1 {
            return;
        }

        let mut needs_to_act = self.active_ids();
        let mut action_opened = false;

        while !needs_to_act.is_empty() {
            let player_id = self.table.players[curr_pos].id;
            if self.folded.contains(&player_id) || !needs_to_act.contains(&player_id) {
                curr_pos = (curr_pos + 1) % seats;
                continue;
            }

            let turn_options = if action_opened {
                options.clone()
            } else {
                phase.override_options(curr_pos, self.bb_pos, &options)
            };

            let processed = self
                .process_turn(curr_pos, prev_pos, curr_bet, last_raise, turn_options)
                .await;
            needs_to_act.remove(&player_id);

            if self.folded.contains(&player_id) {
                if self.active_count() <= 1 {
                    needs_to_act.clear();
                }
            } else if processed.action == PlayerAction::Raise {
                action_opened = true;
                curr_bet = processed.current_bet;
                last_raise = processed.raise_size;
                needs_to_act = self.active_ids();
                needs_to_act.remove(&player_id);
                options = vec![PlayerAction::Call, PlayerAction::Raise, PlayerAction::Fold];
                debug!(player = player_id, curr_bet, last_raise, "加注，重新开放行动");
            }

            prev_pos = curr_pos;
            curr_pos = (curr_pos + 1) % seats;
        }

        let prev_player = self.table.players[prev_pos].public();
        self.handler
            .broadcast(ServerMessage::TurnHighlight { prev_player, curr_player: None })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::TurnResponse;
    use crate::testing::{raise, seated_game};

    #[test]
    fn test_phase_transitions() {
        use BettingPhase::*;
        assert_eq!(PreFlop.next(3), Flop);
        assert_eq!(Flop.next(2), Turn);
        assert_eq!(Turn.next(2), River);
        assert_eq!(River.next(2), Showdown);
        assert_eq!(Showdown.next(4), Showdown);
        // 只剩一人时跳过剩余阶段
        assert_eq!(PreFlop.next(1), Showdown);
        assert_eq!(Flop.next(0), Showdown);
    }

    #[test]
    fn test_phase_hooks() {
        use BettingPhase::*;
        assert_eq!(PreFlop.initial_options(), vec![PlayerAction::Call, PlayerAction::Fold, PlayerAction::Raise]);
        assert_eq!(River.initial_options(), vec![PlayerAction::Check, PlayerAction::Fold, PlayerAction::Raise]);
        assert_eq!(
            [PreFlop, Flop, Turn, River].map(BettingPhase::community_cards_to_deal),
            [0, 3, 1, 1]
        );
        assert_eq!(PreFlop.starting_position(1, 2, 4), 3);
        assert_eq!(PreFlop.starting_position(3, 0, 4), 1);
        assert_eq!(Turn.starting_position(1, 2, 4), 1);
        assert_eq!(PreFlop.initial_bet(10), 10);
        assert_eq!(Flop.initial_bet(10), 0);

        let options = PreFlop.initial_options();
        assert_eq!(
            PreFlop.override_options(2, 2, &options),
            vec![PlayerAction::Check, PlayerAction::Fold, PlayerAction::Raise]
        );
        assert_eq!(PreFlop.override_options(1, 2, &options), options);
        assert_eq!(Flop.override_options(2, 2, &Flop.initial_options()), Flop.initial_options());
    }

    #[tokio::test]
    async fn test_preflop_raise_reopens_action_for_everyone_else() {
        // 座位 0..3 对应玩家 1..4；庄家 1，小盲 2，大盲 3，玩家 4 先行动
        let (mut game, handler) = seated_game(&[1000, 1000, 1000, 1000]);
        handler.script(4, [raise(20)]);

        game.start_hand().await.unwrap();
        game.run_betting_round(BettingPhase::PreFlop).await;

        let requests = handler.requests();
        let order: Vec<_> = requests.iter().map(|(id, _)| *id).collect();
        assert_eq!(order, vec![4, 1, 2, 3]);

        // 加注后其余三人只能跟注、加注或弃牌，大盲也不例外
        for (_, request) in &requests[1..] {
            assert_eq!(request.options, vec![PlayerAction::Call, PlayerAction::Raise, PlayerAction::Fold]);
            assert_eq!(request.prev_bet, 30);
            assert_eq!(request.prev_raise, 20);
        }
        assert_eq!(game.pot(), 120);
        assert!(game.table().players().iter().all(|p| p.bet == 30));
    }

    #[tokio::test]
    async fn test_big_blind_may_check_when_unraised() {
        let (mut game, handler) = seated_game(&[1000, 1000, 1000]);
        game.start_hand().await.unwrap();
        game.run_betting_round(BettingPhase::PreFlop).await;

        // 庄家 1 先行动，然后小盲 2，最后大盲 3
        let requests = handler.requests();
        let (last_id, last_request) = requests.last().unwrap();
        assert_eq!(*last_id, 3);
        assert_eq!(last_request.options, vec![PlayerAction::Check, PlayerAction::Fold, PlayerAction::Raise]);
        assert_eq!(requests.len(), 3);
        assert_eq!(game.pot(), 30);
    }

    #[tokio::test]
    async fn test_round_ends_early_when_all_but_one_fold() {
        let (mut game, handler) = seated_game(&[1000, 1000, 1000]);
        handler.script(1, [TurnResponse::fold()]);
        handler.script(2, [TurnResponse::fold()]);

        game.start_hand().await.unwrap();
        game.run_betting_round(BettingPhase::PreFlop).await;

        assert_eq!(handler.requests().len(), 2);
        assert_eq!(game.active_count(), 1);
        // 最后一条消息标记最后行动的玩家
        assert!(matches!(
            handler.broadcasts().last(),
            Some(ServerMessage::TurnHighlight { prev_player, curr_player: None }) if prev_player.id == 2
        ));
    }

    #[tokio::test]
    async fn test_postflop_round_starts_from_small_blind() {
        let (mut game, handler) = seated_game(&[1000, 1000, 1000]);
        game.start_hand().await.unwrap();
        game.run_betting_round(BettingPhase::PreFlop).await;
        game.run_betting_round(BettingPhase::Flop).await;

        let flop_order: Vec<_> = handler.requests()[3..].iter().map(|(id, _)| *id).collect();
        assert_eq!(flop_order, vec![2, 3, 1]);
        assert!(game.table().players().iter().all(|p| p.bet == 0));
        assert_eq!(game.pot(), 30);
    }
}
