use crate::game::Game;
use crate::message::{PlayerAction, ServerMessage, TurnRequest, TurnResponse};
use crate::settings::ContributionPolicy;
use crate::table::{Chips, PlayerId};
use tracing::{debug, warn};

/// 一次行动处理后的结果，供下注轮判断是否重新开放行动
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessedTurn {
    pub action: PlayerAction,
    /// 行动后该玩家本轮的总下注额
    pub current_bet: Chips,
    /// 加注时为新的加注幅度，否则沿用之前的值
    pub raise_size: Chips,
}

/// 不在可选项中的动作视为弃牌；会被计入下注的金额为负时也视为弃牌
fn sanitize(
    player_id: PlayerId,
    response: TurnResponse,
    options: &[PlayerAction],
    policy: ContributionPolicy,
) -> TurnResponse {
    if !options.contains(&response.action) {
        warn!(player = player_id, action = ?response.action, "动作不在可选项中，按弃牌处理");
        return TurnResponse::fold();
    }
    let amount_counts = match response.action {
        PlayerAction::Raise => true,
        PlayerAction::Call => policy == ContributionPolicy::Declared,
        PlayerAction::Check | PlayerAction::Fold => false,
    };
    if amount_counts && response.amount < 0 {
        warn!(player = player_id, amount = response.amount, "金额为负，按弃牌处理");
        return TurnResponse::fold();
    }
    response
}

impl Game {
    /// 请求座位 `seat` 上的玩家行动，并把结果结算到余额、下注和奖池中
    pub(crate) async fn process_turn(
        &mut self,
        seat: usize,
        prev_seat: usize,
        current_bet: Chips,
        prev_raise: Chips,
        options: Vec<PlayerAction>,
    ) -> ProcessedTurn {
        let prev_player = self.table.players[prev_seat].public();
        let curr_player = Some(self.table.players[seat].public());
        self.handler
            .broadcast(ServerMessage::TurnHighlight { prev_player, curr_player })
            .await;

        let acting = &self.table.players[seat];
        let (player_id, player_bet) = (acting.id, acting.bet);
        let request = TurnRequest { player_bet, prev_bet: current_bet, prev_raise, options };
        let options = request.options.clone();
        let response = self.handler.turn(acting, request).await;
        let response = sanitize(player_id, response, &options, self.settings.contribution_policy);

        let to_call = current_bet - player_bet;
        let raise_size = match response.action {
            PlayerAction::Call => {
                let amount = match self.settings.contribution_policy {
                    ContributionPolicy::Declared => response.amount,
                    ContributionPolicy::ToCall => to_call.max(0),
                };
                self.commit(seat, amount);
                prev_raise
            }
            PlayerAction::Raise => {
                self.commit(seat, to_call.max(0) + response.amount);
                response.amount
            }
            PlayerAction::Check => prev_raise,
            PlayerAction::Fold => {
                self.folded.insert(player_id);
                prev_raise
            }
        };
        debug!(player = player_id, action = ?response.action, amount = response.amount, to_call, "玩家行动");

        let acting = &self.table.players[seat];
        let current_bet = acting.bet;
        self.handler
            .broadcast(ServerMessage::TurnResult {
                player: acting.public(),
                action: response.action,
                amount: current_bet,
            })
            .await;
        self.handler.broadcast(ServerMessage::Pot { pot: self.pot }).await;

        ProcessedTurn { action: response.action, current_bet, raise_size }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::round::BettingPhase;
    use crate::settings::GameSettings;
    use crate::testing::{call, raise, seated_game, seated_game_with};

    // 庄家 1，小盲 2 (已下 5)，大盲 3 (已下 10)，当前最高注 10
    async fn started(policy: ContributionPolicy) -> (Game, std::sync::Arc<crate::testing::ScriptedHandler>) {
        let settings = GameSettings { contribution_policy: policy, ..GameSettings::default() };
        let (mut game, handler) = seated_game_with(&[1000, 1000, 1000], settings);
        game.start_hand().await.unwrap();
        game.setup_round(BettingPhase::PreFlop).await;
        (game, handler)
    }

    fn preflop_options() -> Vec<PlayerAction> {
        vec![PlayerAction::Call, PlayerAction::Fold, PlayerAction::Raise]
    }

    #[tokio::test]
    async fn test_call_trusts_declared_amount_by_default() {
        let (mut game, handler) = started(ContributionPolicy::Declared).await;
        handler.script(2, [call(7)]);

        let processed = game.process_turn(1, 0, 10, 10, preflop_options()).await;
        assert_eq!(processed, ProcessedTurn { action: PlayerAction::Call, current_bet: 12, raise_size: 10 });
        assert_eq!(game.table().players()[1].balance, 988);
        assert_eq!(game.pot(), 22);
    }

    #[tokio::test]
    async fn test_call_uses_amount_to_call_when_configured() {
        let (mut game, handler) = started(ContributionPolicy::ToCall).await;
        handler.script(2, [call(999)]);

        let processed = game.process_turn(1, 0, 10, 10, preflop_options()).await;
        assert_eq!(processed.current_bet, 10);
        assert_eq!(game.table().players()[1].balance, 990);
        assert_eq!(game.pot(), 20);
    }

    #[tokio::test]
    async fn test_raise_pays_to_call_plus_raise() {
        let (mut game, handler) = started(ContributionPolicy::Declared).await;
        handler.script(1, [raise(25)]);

        let processed = game.process_turn(0, 2, 10, 10, preflop_options()).await;
        assert_eq!(processed, ProcessedTurn { action: PlayerAction::Raise, current_bet: 35, raise_size: 25 });
        assert_eq!(game.table().players()[0].balance, 965);
        assert_eq!(game.pot(), 50);

        // 最后两条广播：行动结果和奖池
        let broadcasts = handler.broadcasts();
        assert_eq!(
            broadcasts[broadcasts.len() - 2..],
            [
                ServerMessage::TurnResult {
                    player: game.table().players()[0].public(),
                    action: PlayerAction::Raise,
                    amount: 35,
                },
                ServerMessage::Pot { pot: 50 },
            ]
        );
    }

    #[tokio::test]
    async fn test_check_reports_check_and_moves_no_money() {
        let (mut game, handler) = started(ContributionPolicy::Declared).await;
        handler.script(3, [TurnResponse { action: PlayerAction::Check, amount: 0 }]);

        let options = vec![PlayerAction::Check, PlayerAction::Fold, PlayerAction::Raise];
        let processed = game.process_turn(2, 1, 10, 10, options).await;
        assert_eq!(processed.action, PlayerAction::Check);
        assert_eq!(processed.current_bet, 10);
        assert_eq!(game.pot(), 15);
        assert!(!game.is_folded(3));
    }

    #[tokio::test]
    async fn test_fold_marks_player_folded() {
        let (mut game, handler) = started(ContributionPolicy::Declared).await;
        handler.script(1, [TurnResponse::fold()]);

        let processed = game.process_turn(0, 2, 10, 10, preflop_options()).await;
        assert_eq!(processed.action, PlayerAction::Fold);
        assert!(game.is_folded(1));
        assert_eq!(game.table().players()[0].balance, 1000);
    }

    #[tokio::test]
    async fn test_unoffered_action_or_negative_amount_becomes_fold() {
        let (mut game, handler) = started(ContributionPolicy::Declared).await;
        // 翻牌前非大盲不能过牌
        handler.script(1, [TurnResponse { action: PlayerAction::Check, amount: 0 }]);
        handler.script(2, [call(-50)]);

        assert_eq!(game.process_turn(0, 2, 10, 10, preflop_options()).await.action, PlayerAction::Fold);
        assert_eq!(game.process_turn(1, 0, 10, 10, preflop_options()).await.action, PlayerAction::Fold);
        assert!(game.is_folded(1) && game.is_folded(2));
        assert_eq!(game.pot(), 15);
    }

    #[tokio::test]
    async fn test_ignored_negative_amount_does_not_fold() {
        let (mut game, handler) = started(ContributionPolicy::ToCall).await;
        // 按需跟注时申报金额不参与计算
        handler.script(2, [call(-50)]);
        handler.script(1, [raise(-5)]);

        assert_eq!(game.process_turn(1, 0, 10, 10, preflop_options()).await.action, PlayerAction::Call);
        assert_eq!(game.table().players()[1].balance, 990);
        // 加注金额始终计入下注
        assert_eq!(game.process_turn(0, 1, 10, 10, preflop_options()).await.action, PlayerAction::Fold);
        assert_eq!(game.pot(), 20);
    }

    #[tokio::test]
    async fn test_request_carries_bets_and_options() {
        let (mut game, handler) = seated_game(&[1000, 1000]);
        game.start_hand().await.unwrap();
        game.setup_round(BettingPhase::PreFlop).await;
        game.process_turn(1, 0, 10, 10, preflop_options()).await;

        // 两人时庄家 1 为大盲，2 为小盲
        let (id, request) = handler.requests().pop().unwrap();
        assert_eq!(id, 2);
        assert_eq!(
            request,
            TurnRequest { player_bet: 5, prev_bet: 10, prev_raise: 10, options: preflop_options() }
        );
    }
}
