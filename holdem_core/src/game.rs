use crate::coordinator::GameHandler;
use crate::error::GameError;
use crate::hand::{EvaluatedHand, evaluate_hand};
use crate::message::{ServerMessage, ShowdownLoser, ShowdownWinner};
use crate::round::BettingPhase;
use crate::settings::GameSettings;
use crate::table::{Chips, Player, PlayerId, Table};
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

// --- 核心数据结构定义 ---

/// 一张牌桌上的牌局。跨局复用，每次调用 [`Game::play_hand`] 打完完整的一局。
pub struct Game {
    pub(crate) table: Table,
    pub(crate) handler: Arc<dyn GameHandler>,
    pub(crate) settings: GameSettings,
    pub(crate) dealer_pos: Option<usize>, // 第一局之前为 None
    pub(crate) prev_dealer_pos: Option<usize>,
    pub(crate) sb_pos: usize,
    pub(crate) bb_pos: usize,
    pub(crate) pot: Chips, // 等于所有玩家本局投入之和
    pub(crate) folded: HashSet<PlayerId>,
    pub(crate) phase: BettingPhase,
    pub(crate) hand_id: Uuid,
}

/// 一局结束后的结算摘要
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HandSummary {
    pub hand_id: Uuid,
    pub pot: Chips,
    pub winners: Vec<ShowdownWinner>,
    pub losers: Vec<ShowdownLoser>,
}

#[derive(Default)]
pub struct GameBuilder {
    table: Option<Table>,
    handler: Option<Arc<dyn GameHandler>>,
    settings: GameSettings,
}

impl GameBuilder {
    pub fn new() -> Self {
        GameBuilder::default()
    }

    pub fn table(mut self, table: Table) -> Self {
        self.table = Some(table);
        self
    }

    pub fn handler(mut self, handler: Arc<dyn GameHandler>) -> Self {
        self.handler = Some(handler);
        self
    }

    pub fn settings(mut self, settings: GameSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn build(self) -> Result<Game, GameError> {
        self.settings.validate()?;
        let table = self.table.ok_or_else(|| GameError::config("缺少牌桌"))?;
        let handler = self.handler.ok_or_else(|| GameError::config("缺少消息处理器"))?;
        Ok(Game {
            table,
            handler,
            settings: self.settings,
            dealer_pos: None,
            prev_dealer_pos: None,
            sb_pos: 0,
            bb_pos: 0,
            pot: 0,
            folded: HashSet::new(),
            phase: BettingPhase::PreFlop,
            hand_id: Uuid::nil(),
        })
    }
}

impl Game {
    pub fn builder() -> GameBuilder {
        GameBuilder::new()
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// 只应在两局之间修改牌桌 (入座、离座、准备)
    pub fn table_mut(&mut self) -> &mut Table {
        &mut self.table
    }

    pub fn settings(&self) -> &GameSettings {
        &self.settings
    }

    pub fn pot(&self) -> Chips {
        self.pot
    }

    pub fn phase(&self) -> BettingPhase {
        self.phase
    }

    pub fn hand_id(&self) -> Uuid {
        self.hand_id
    }

    pub fn dealer(&self) -> Option<&Player> {
        self.dealer_pos.and_then(|pos| self.table.players.get(pos))
    }

    pub fn is_folded(&self, player_id: PlayerId) -> bool {
        self.folded.contains(&player_id)
    }

    pub(crate) fn active_count(&self) -> usize {
        self.table
            .players
            .iter()
            .filter(|p| !self.folded.contains(&p.id))
            .count()
    }

    /// 把座位 `seat` 上玩家的筹码移入奖池
    pub(crate) fn commit(&mut self, seat: usize, amount: Chips) {
        let player = &mut self.table.players[seat];
        player.commit(amount);
        self.pot += amount;
        if player.balance < 0 {
            warn!(player = player.id, balance = player.balance, "玩家余额为负");
        }
        debug_assert_eq!(
            self.pot,
            self.table.players.iter().map(|p| p.contributed).sum::<Chips>(),
            "奖池与玩家投入之和不一致"
        );
    }

    // --- 核心游戏流程函数 ---

    /// 打完完整的一局：发底牌、四轮下注、摊牌分池
    ///
    /// 少于两人在座时返回 [`GameError::NotEnoughPlayers`]；牌不够发时返回
    /// [`GameError::DeckExhausted`] 并中止本局，已投入的筹码原数退回。
    pub async fn play_hand(&mut self) -> Result<HandSummary, GameError> {
        let seated = self.table.players.len();
        if seated < 2 {
            return Err(GameError::NotEnoughPlayers { seated });
        }
        self.hand_id = Uuid::new_v4();
        let span = info_span!("hand", hand_id = %self.hand_id);
        let result = self.run_hand().instrument(span).await;
        if result.is_err() {
            self.refund_contributions();
        }
        result
    }

    /// 中止的一局：把每个玩家本局的投入退回余额，奖池清零
    fn refund_contributions(&mut self) {
        warn!(hand_id = %self.hand_id, pot = self.pot, "本局中止，退回所有投入");
        for player in &mut self.table.players {
            player.balance += player.contributed;
            player.contributed = 0;
            player.bet = 0;
        }
        self.pot = 0;
    }

    async fn run_hand(&mut self) -> Result<HandSummary, GameError> {
        self.start_hand().await?;

        let mut phase = BettingPhase::PreFlop;
        while phase != BettingPhase::Showdown {
            self.phase = phase;
            debug!(?phase, pot = self.pot, "进入下注轮");
            self.deal_community_cards(phase.community_cards_to_deal()).await?;
            self.run_betting_round(phase).await;
            phase = phase.next(self.active_count());
        }
        self.phase = BettingPhase::Showdown;

        let pot = self.pot;
        let (winners, losers) = self.settle_showdown();
        self.handler
            .broadcast(ServerMessage::ShowdownWinners { winners: winners.clone() })
            .await;
        self.handler
            .broadcast(ServerMessage::ShowdownLosers { losers: losers.clone() })
            .await;

        self.finish_hand().await;
        Ok(HandSummary { hand_id: self.hand_id, pot, winners, losers })
    }

    /// 轮换庄家，重置牌桌，广播 PRE_START 并私发底牌
    pub(crate) async fn start_hand(&mut self) -> Result<(), GameError> {
        let seats = self.table.players.len();
        self.prev_dealer_pos = self.dealer_pos;
        let dealer = self.dealer_pos.map_or(0, |pos| (pos + 1) % seats);
        self.dealer_pos = Some(dealer);
        self.sb_pos = (dealer + 1) % seats;
        self.bb_pos = (self.sb_pos + 1) % seats;

        self.pot = 0;
        self.folded.clear();
        self.phase = BettingPhase::PreFlop;
        self.table.reset_for_hand();

        let curr_dealer = self.table.players[dealer].public();
        info!(dealer = curr_dealer.id, players = seats, "新一局开始");
        let prev_dealer = self
            .prev_dealer_pos
            .and_then(|pos| self.table.players.get(pos))
            .map(Player::public);
        let ordered_player_ids = self.table.players.iter().map(|p| p.id).collect();
        self.handler
            .broadcast(ServerMessage::PreStart { prev_dealer, curr_dealer, ordered_player_ids })
            .await;

        for seat in 0..seats {
            let pocket_cards = self.table.get_cards(2)?;
            let player = &mut self.table.players[seat];
            player.pocket_cards = pocket_cards.clone();
            let player_id = player.id;
            self.handler
                .send_personal(player_id, ServerMessage::PocketCards { pocket_cards })
                .await;
        }
        Ok(())
    }

    async fn deal_community_cards(&mut self, count: usize) -> Result<(), GameError> {
        if count == 0 {
            return Ok(());
        }
        let cards = self.table.get_cards(count)?;
        self.table.community_cards.extend(cards);
        let cards = self.table.community_cards.clone();
        self.handler.broadcast(ServerMessage::CommunityCards { cards }).await;
        Ok(())
    }

    /// 比牌并分配奖池，返回赢家和输家列表
    ///
    /// 只剩一人时直接赢得奖池，不比牌也不亮牌。平局时平分，余数给从小盲位置开始
    /// 遇到的第一个赢家。
    pub(crate) fn settle_showdown(&mut self) -> (Vec<ShowdownWinner>, Vec<ShowdownLoser>) {
        let seats = self.table.players.len();
        let pot = self.pot;
        let active: Vec<usize> = (0..seats)
            .filter(|&seat| !self.folded.contains(&self.table.players[seat].id))
            .collect();

        match active.as_slice() {
            [] => {
                warn!("摊牌时没有未弃牌的玩家，奖池无人领取");
                (Vec::new(), Vec::new())
            }
            [only] => {
                let winner = &mut self.table.players[*only];
                winner.balance += pot;
                info!(winner = winner.id, pot, "其他玩家全部弃牌");
                let winners = vec![ShowdownWinner {
                    winner: winner.public(),
                    won_pot: pot,
                    hand: None,
                    pocket_cards: Vec::new(),
                }];
                (winners, Vec::new())
            }
            _ => self.split_pot(&active),
        }
    }

    fn split_pot(&mut self, active: &[usize]) -> (Vec<ShowdownWinner>, Vec<ShowdownLoser>) {
        let seats = self.table.players.len();
        let pot = self.pot;
        let hands: Vec<(usize, EvaluatedHand)> = active
            .iter()
            .map(|&seat| {
                let player = &self.table.players[seat];
                (seat, evaluate_hand(&self.table.community_cards, &player.pocket_cards))
            })
            .collect();
        let Some(best) = hands.iter().map(|(_, hand)| *hand).max() else {
            return (Vec::new(), Vec::new());
        };

        let is_leading = |seat: usize| {
            hands
                .iter()
                .any(|(s, hand)| *s == seat && hand.cmp(&best) == Ordering::Equal)
        };
        // 从小盲开始按座位顺序排列赢家
        let leading: Vec<usize> = (0..seats)
            .map(|k| (self.sb_pos + k) % seats)
            .filter(|&seat| is_leading(seat))
            .collect();

        let share = pot / leading.len() as Chips;
        let remainder = pot % leading.len() as Chips;
        let mut winners = Vec::with_capacity(leading.len());
        for (i, &seat) in leading.iter().enumerate() {
            let won_pot = if i == 0 { share + remainder } else { share };
            let hand = hands.iter().find(|(s, _)| *s == seat).map(|(_, h)| h.category);
            let player = &mut self.table.players[seat];
            player.balance += won_pot;
            info!(winner = player.id, won_pot, hand = ?hand, "摊牌获胜");
            winners.push(ShowdownWinner {
                winner: player.public(),
                won_pot,
                hand,
                pocket_cards: player.pocket_cards.clone(),
            });
        }
        debug_assert_eq!(winners.iter().map(|w| w.won_pot).sum::<Chips>(), pot);

        let losers = hands
            .iter()
            .filter(|(seat, _)| !leading.contains(seat))
            .map(|(seat, hand)| {
                let player = &self.table.players[*seat];
                ShowdownLoser {
                    player: player.public(),
                    hand: hand.category,
                    pocket_cards: player.pocket_cards.clone(),
                }
            })
            .collect();
        (winners, losers)
    }

    /// 清空准备状态并询问是否再来一局
    async fn finish_hand(&mut self) {
        self.table.players.iter_mut().for_each(|p| p.is_ready = false);
        let players = self.table.public_players();
        self.handler.broadcast(ServerMessage::PlayAgain { players }).await;
        info!(pot = self.pot, "本局结束");
    }
}

// --- 单元测试 ---
