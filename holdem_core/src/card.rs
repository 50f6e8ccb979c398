use crate::error::GameError;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};
use std::fmt;

// --- 核心数据结构定义 ---

/// 花色 (Suit)，序列化为花色符号
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Suit {
    #[serde(rename = "♠")]
    Spade,
    #[serde(rename = "♥")]
    Heart,
    #[serde(rename = "♣")]
    Club,
    #[serde(rename = "♦")]
    Diamond,
}

/// 点数 (Rank)
/// Ace 只作为最大的牌 (14)，不参与 A-2-3-4-5 顺子
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
pub enum Rank {
    #[serde(rename = "2")]
    Two,
    #[serde(rename = "3")]
    Three,
    #[serde(rename = "4")]
    Four,
    #[serde(rename = "5")]
    Five,
    #[serde(rename = "6")]
    Six,
    #[serde(rename = "7")]
    Seven,
    #[serde(rename = "8")]
    Eight,
    #[serde(rename = "9")]
    Nine,
    #[serde(rename = "10")]
    Ten,
    #[serde(rename = "J")]
    Jack,
    #[serde(rename = "Q")]
    Queen,
    #[serde(rename = "K")]
    King,
    #[serde(rename = "A")]
    Ace,
}

impl Suit {
    pub const ALL: [Suit; 4] = [Suit::Heart, Suit::Diamond, Suit::Spade, Suit::Club];
}

impl Rank {
    pub const ALL: [Rank; 13] = [
        Rank::Two, Rank::Three, Rank::Four, Rank::Five, Rank::Six, Rank::Seven,
        Rank::Eight, Rank::Nine, Rank::Ten, Rank::Jack, Rank::Queen, Rank::King, Rank::Ace,
    ];

    /// 牌面数值，2 到 14 (A)
    pub const fn value(self) -> u8 {
        self as u8 + 2
    }
}

/// 单张扑克牌 (Card)
///
/// 线上格式为 `{suit, rank, value}`，反序列化时会校验 `value` 与 `rank` 一致。
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(into = "CardRepr", try_from = "CardRepr")]
pub struct Card {
    pub suit: Suit,
    pub rank: Rank,
}

impl Card {
    pub const fn new(suit: Suit, rank: Rank) -> Card {
        Card { suit, rank }
    }

    pub const fn value(&self) -> u8 {
        self.rank.value()
    }
}

#[derive(Serialize, Deserialize)]
struct CardRepr {
    suit: Suit,
    rank: Rank,
    value: u8,
}

impl From<Card> for CardRepr {
    fn from(card: Card) -> Self {
        CardRepr { suit: card.suit, rank: card.rank, value: card.value() }
    }
}

impl TryFrom<CardRepr> for Card {
    type Error = String;

    fn try_from(repr: CardRepr) -> Result<Self, Self::Error> {
        if repr.value != repr.rank.value() {
            return Err(format!("点数 {} 与牌面 {:?} 不符", repr.value, repr.rank));
        }
        Ok(Card::new(repr.suit, repr.rank))
    }
}

// --- 实现辅助功能 ---

impl fmt::Display for Suit {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Suit::Spade => "♠",
            Suit::Heart => "♥",
            Suit::Club => "♣",
            Suit::Diamond => "♦",
        })
    }
}

impl fmt::Display for Rank {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            Rank::Two => "2",
            Rank::Three => "3",
            Rank::Four => "4",
            Rank::Five => "5",
            Rank::Six => "6",
            Rank::Seven => "7",
            Rank::Eight => "8",
            Rank::Nine => "9",
            Rank::Ten => "10",
            Rank::Jack => "J",
            Rank::Queen => "Q",
            Rank::King => "K",
            Rank::Ace => "A",
        })
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}{}", self.suit, self.rank)
    }
}

// --- 牌堆 ---

/// 一副牌。发牌从牌堆顶部 (向量头部) 取出，直到下一次重置前不会放回。
#[derive(Debug, Clone)]
pub struct Deck {
    cards: Vec<Card>,
}

impl Default for Deck {
    fn default() -> Self {
        Deck { cards: create_deck() }
    }
}

impl Deck {
    /// 使用给定顺序构造牌堆，第一张最先发出。用于复现牌局。
    pub fn from_cards(cards: Vec<Card>) -> Self {
        Deck { cards }
    }

    /// 重新生成完整的 52 张牌并均匀洗牌
    pub fn reset<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.cards = create_deck();
        self.cards.shuffle(rng);
    }

    /// 从牌堆顶部取出 `count` 张牌
    ///
    /// 剩余不足时返回 [`GameError::DeckExhausted`]，此时牌堆保持不变。
    pub fn draw(&mut self, count: usize) -> Result<Vec<Card>, GameError> {
        if self.cards.len() < count {
            return Err(GameError::DeckExhausted {
                requested: count,
                remaining: self.cards.len(),
            });
        }
        Ok(self.cards.drain(..count).collect())
    }

    pub fn remaining(&self) -> usize {
        self.cards.len()
    }
}

/// 创建一副完整的 52 张扑克牌
fn create_deck() -> Vec<Card> {
    let mut deck = Vec::with_capacity(52);
    for &suit in &Suit::ALL {
        for &rank in Rank::ALL.iter().rev() {
            deck.push(Card { suit, rank });
        }
    }
    deck
}

// --- 单元测试 ---
