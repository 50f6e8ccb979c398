use crate::card::{Card, Deck};
use crate::error::GameError;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

pub type PlayerId = i64;
/// 筹码数量。使用有符号整数，客户端申报的跟注额过大时余额可能为负。
pub type Chips = i64;

// --- 玩家 ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub balance: Chips, // 跨局保留的余额
    pub pocket_cards: Vec<Card>, // 0 或 2 张
    pub bet: Chips, // 当前下注轮已投入
    pub contributed: Chips, // 本局累计投入
    pub is_ready: bool,
}

/// 对所有人公开的玩家信息，不含底牌
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicPlayer {
    pub id: PlayerId,
    pub name: String,
    pub balance: Chips,
    pub is_ready: bool,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, balance: Chips) -> Self {
        Player {
            id,
            name: name.into(),
            balance,
            pocket_cards: Vec::new(),
            bet: 0,
            contributed: 0,
            is_ready: false,
        }
    }

    pub fn public(&self) -> PublicPlayer {
        PublicPlayer {
            id: self.id,
            name: self.name.clone(),
            balance: self.balance,
            is_ready: self.is_ready,
        }
    }

    /// ID 必须为正数，名字不能为空白
    pub fn validate(&self) -> Result<(), GameError> {
        if self.id <= 0 {
            return Err(GameError::player(format!("玩家 ID 必须为正数, 收到 {}", self.id)));
        }
        if self.name.trim().is_empty() {
            return Err(GameError::player("玩家名称不能为空"));
        }
        Ok(())
    }

    /// 从余额中拿出 `amount` 计入本轮下注和本局投入
    pub(crate) fn commit(&mut self, amount: Chips) {
        self.balance -= amount;
        self.bet += amount;
        self.contributed += amount;
    }

    fn clear_hand(&mut self) {
        self.pocket_cards.clear();
        self.bet = 0;
        self.contributed = 0;
    }
}

// --- 牌桌 ---

/// 牌桌：按入座顺序排列的玩家、公共牌和牌堆。
///
/// 同一张牌桌跨局复用，每局开始时通过 [`Table::reset_for_hand`] 清理。
#[derive(Debug)]
pub struct Table {
    pub(crate) players: Vec<Player>,
    pub(crate) community_cards: Vec<Card>,
    deck: Deck,
    rng: StdRng,
}

impl Default for Table {
    fn default() -> Self {
        Table::new()
    }
}

impl Table {
    pub fn new() -> Self {
        Table::with_rng(StdRng::from_os_rng())
    }

    /// 固定随机种子，洗牌结果可复现
    pub fn with_seed(seed: u64) -> Self {
        Table::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(mut rng: StdRng) -> Self {
        let mut deck = Deck::default();
        deck.reset(&mut rng);
        Table {
            players: Vec::new(),
            community_cards: Vec::new(),
            deck,
            rng,
        }
    }

    pub fn players(&self) -> &[Player] {
        &self.players
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn community_cards(&self) -> &[Card] {
        &self.community_cards
    }

    pub fn public_players(&self) -> Vec<PublicPlayer> {
        self.players.iter().map(Player::public).collect()
    }

    /// 重新生成 52 张牌并洗牌
    pub fn reset_deck(&mut self) {
        self.deck.reset(&mut self.rng);
    }

    /// 从牌堆顶部取牌，牌不够时返回 [`GameError::DeckExhausted`]
    pub fn get_cards(&mut self, count: usize) -> Result<Vec<Card>, GameError> {
        self.deck.draw(count)
    }

    pub fn add_player(&mut self, player: Player) -> Result<(), GameError> {
        player.validate()?;
        if self.player(player.id).is_some() {
            return Err(GameError::DuplicatePlayer(player.id));
        }
        self.players.push(player);
        Ok(())
    }

    /// 移除玩家；不在座时什么也不做
    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        let idx = self.players.iter().position(|p| p.id == id)?;
        Some(self.players.remove(idx))
    }

    /// 设置玩家的准备状态，玩家不存在时返回 false
    pub fn set_ready(&mut self, id: PlayerId, is_ready: bool) -> bool {
        match self.players.iter_mut().find(|p| p.id == id) {
            Some(player) => {
                player.is_ready = is_ready;
                true
            }
            None => false,
        }
    }

    /// 至少两人在座且全部准备
    pub fn all_ready(&self) -> bool {
        self.players.len() >= 2 && self.players.iter().all(|p| p.is_ready)
    }

    /// 新一局开始前：清空公共牌、重新洗牌、清空每个玩家的本局状态
    pub fn reset_for_hand(&mut self) {
        self.community_cards.clear();
        self.reset_deck();
        self.players.iter_mut().for_each(Player::clear_hand);
    }
}

// --- 单元测试 ---

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_player_validation() {
        let mut table = Table::with_seed(1);
        assert!(matches!(
            table.add_player(Player::new(0, "zero", 1000)),
            Err(GameError::InvalidPlayer { .. })
        ));
        assert!(matches!(
            table.add_player(Player::new(-3, "neg", 1000)),
            Err(GameError::InvalidPlayer { .. })
        ));
        assert!(matches!(
            table.add_player(Player::new(1, "  ", 1000)),
            Err(GameError::InvalidPlayer { .. })
        ));

        table.add_player(Player::new(1, "alice", 1000)).unwrap();
        assert_eq!(
            table.add_player(Player::new(1, "alice again", 1000)),
            Err(GameError::DuplicatePlayer(1))
        );
        assert_eq!(table.players().len(), 1);
    }

    #[test]
    fn test_seating_order_and_removal() {
        let mut table = Table::with_seed(1);
        for (id, name) in [(3, "c"), (1, "a"), (2, "b")] {
            table.add_player(Player::new(id, name, 1000)).unwrap();
        }
        let ids: Vec<_> = table.players().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);

        assert_eq!(table.remove_player(1).map(|p| p.name), Some("a".to_string()));
        // 不存在的玩家
        assert_eq!(table.remove_player(42), None);
        let ids: Vec<_> = table.players().iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn test_get_cards_and_exhaustion() {
        let mut table = Table::with_seed(9);
        let dealt = table.get_cards(50).unwrap();
        assert_eq!(dealt.len(), 50);
        assert_eq!(
            table.get_cards(3),
            Err(GameError::DeckExhausted { requested: 3, remaining: 2 })
        );

        table.reset_deck();
        assert_eq!(table.get_cards(52).unwrap().len(), 52);
    }

    #[test]
    fn test_seeded_tables_shuffle_identically() {
        let mut a = Table::with_seed(77);
        let mut b = Table::with_seed(77);
        assert_eq!(a.get_cards(10).unwrap(), b.get_cards(10).unwrap());
    }

    #[test]
    fn test_reset_for_hand_clears_hand_state() {
        let mut table = Table::with_seed(5);
        table.add_player(Player::new(1, "alice", 1000)).unwrap();
        table.community_cards = table.get_cards(3).unwrap();
        {
            let p = &mut table.players[0];
            p.pocket_cards = vec![Card::new(crate::Suit::Heart, crate::Rank::Ace)];
            p.commit(40);
            p.is_ready = true;
        }

        table.reset_for_hand();
        let p = &table.players()[0];
        assert!(table.community_cards().is_empty());
        assert!(p.pocket_cards.is_empty());
        assert_eq!((p.bet, p.contributed, p.balance), (0, 0, 960));
        // 准备状态和余额跨局保留
        assert!(p.is_ready);
    }

    #[test]
    fn test_ready_tracking() {
        let mut table = Table::with_seed(5);
        table.add_player(Player::new(1, "alice", 1000)).unwrap();
        assert!(table.set_ready(1, true));
        // 一个人不能开局
        assert!(!table.all_ready());

        table.add_player(Player::new(2, "bob", 1000)).unwrap();
        assert!(!table.all_ready());
        assert!(table.set_ready(2, true));
        assert!(table.all_ready());
        assert!(!table.set_ready(9, true));
    }

    #[test]
    fn test_public_player_wire_format() {
        let mut player = Player::new(7, "carol", 1000);
        player.pocket_cards = vec![Card::new(crate::Suit::Spade, crate::Rank::King)];
        let json = serde_json::to_value(player.public()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"id": 7, "name": "carol", "balance": 1000, "is_ready": false})
        );
    }
}
