use crate::card::{Card, Rank, Suit};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// 牌型等级 (HandCategory)
/// 变体按从小到大排列，序号即为 0 (高牌) 到 9 (皇家同花顺)。
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HandCategory {
    HighCard,
    OnePair,
    TwoPairs,
    ThreeOfAKind,
    Straight,
    Flush,
    FullHouse,
    FourOfAKind,
    StraightFlush,
    RoyalFlush,
}

impl HandCategory {
    pub const fn ordinal(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for HandCategory {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", match self {
            HandCategory::HighCard => "高牌",
            HandCategory::OnePair => "一对",
            HandCategory::TwoPairs => "两对",
            HandCategory::ThreeOfAKind => "三条",
            HandCategory::Straight => "顺子",
            HandCategory::Flush => "同花",
            HandCategory::FullHouse => "葫芦",
            HandCategory::FourOfAKind => "四条",
            HandCategory::StraightFlush => "同花顺",
            HandCategory::RoyalFlush => "皇家同花顺",
        })
    }
}

/// 一手牌的评估结果，只在摊牌时计算。
///
/// 比较顺序：牌型 → 主点数 → 副点数 (仅当双方都有) → 踢脚牌。
/// 所有维度都相等时为平局 (`Ordering::Equal`)。
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize, Deserialize)]
pub struct EvaluatedHand {
    pub category: HandCategory,
    /// 主点数：四条/三条/对子的点数，或顺子、同花的最大牌
    pub primary: u8,
    /// 副点数：两对中较小的对子，葫芦中的对子
    pub secondary: Option<u8>,
    /// 踢脚牌：由底牌相对于成牌组合计算
    pub kicker: u8,
}

impl Ord for EvaluatedHand {
    fn cmp(&self, other: &Self) -> Ordering {
        self.category
            .cmp(&other.category)
            .then(self.primary.cmp(&other.primary))
            .then_with(|| match (self.secondary, other.secondary) {
                (Some(a), Some(b)) => a.cmp(&b),
                _ => Ordering::Equal,
            })
            .then(self.kicker.cmp(&other.kicker))
    }
}

impl PartialOrd for EvaluatedHand {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// --- 牌型评估逻辑 ---

/// 某个检测器命中后的成牌组合
struct Qualified {
    category: HandCategory,
    primary: u8,
    secondary: Option<u8>,
    used: Vec<Card>,
}

impl Qualified {
    fn new(category: HandCategory, primary: u8, used: Vec<Card>) -> Self {
        Qualified { category, primary, secondary: None, used }
    }
}

/// 一次性按花色、按点数分组，供所有检测器共享。
/// 同点数的牌中公共牌排在底牌之前。
struct Grouped {
    /// 所有牌按点数从大到小 (稳定排序)
    sorted: Vec<Card>,
    /// 每种花色的牌，按点数从大到小
    by_suit: BTreeMap<Suit, Vec<Card>>,
    /// 点数分组，从大到小
    by_rank: Vec<Vec<Card>>,
}

impl Grouped {
    fn new(community: &[Card], pocket: &[Card]) -> Self {
        let mut sorted: Vec<Card> = community.iter().chain(pocket).copied().collect();
        sorted.sort_by(|a, b| b.rank.cmp(&a.rank));

        let mut by_suit: BTreeMap<Suit, Vec<Card>> = BTreeMap::new();
        let mut ranks: BTreeMap<Rank, Vec<Card>> = BTreeMap::new();
        for card in &sorted {
            by_suit.entry(card.suit).or_default().push(*card);
            ranks.entry(card.rank).or_default().push(*card);
        }

        Grouped {
            sorted,
            by_suit,
            by_rank: ranks.into_values().rev().collect(),
        }
    }

    fn flush_cards(&self) -> Option<&[Card]> {
        self.by_suit.values().find(|cards| cards.len() >= 5).map(Vec::as_slice)
    }

    fn straight_flush_run(&self) -> Option<Vec<Card>> {
        self.flush_cards().and_then(highest_run)
    }
}

/// 在按点数降序、点数互不相同的牌中找到最大的五张连续牌
fn highest_run(cards: &[Card]) -> Option<Vec<Card>> {
    cards
        .windows(5)
        .find(|w| w.windows(2).all(|p| p[0].value() == p[1].value() + 1))
        .map(<[Card]>::to_vec)
}

type Detector = fn(&Grouped) -> Option<Qualified>;

/// 从强到弱排列的检测器，第一个命中的决定牌型
const DETECTORS: [Detector; 10] = [
    royal_flush,
    straight_flush,
    four_of_a_kind,
    full_house,
    flush,
    straight,
    three_of_a_kind,
    two_pairs,
    one_pair,
    high_card,
];

fn royal_flush(g: &Grouped) -> Option<Qualified> {
    g.straight_flush_run()
        .filter(|run| run[0].rank == Rank::Ace)
        .map(|run| Qualified::new(HandCategory::RoyalFlush, Rank::Ace.value(), run))
}

fn straight_flush(g: &Grouped) -> Option<Qualified> {
    g.straight_flush_run()
        .map(|run| Qualified::new(HandCategory::StraightFlush, run[0].value(), run))
}

fn four_of_a_kind(g: &Grouped) -> Option<Qualified> {
    g.by_rank
        .iter()
        .find(|group| group.len() >= 4)
        .map(|group| Qualified::new(HandCategory::FourOfAKind, group[0].value(), group[..4].to_vec()))
}

fn full_house(g: &Grouped) -> Option<Qualified> {
    let trips = g.by_rank.iter().find(|group| group.len() >= 3)?;
    let pair = g
        .by_rank
        .iter()
        .find(|group| group.len() >= 2 && group[0].rank != trips[0].rank)?;

    let mut used = trips[..3].to_vec();
    used.extend_from_slice(&pair[..2]);
    Some(Qualified {
        category: HandCategory::FullHouse,
        primary: trips[0].value(),
        secondary: Some(pair[0].value()),
        used,
    })
}

fn flush(g: &Grouped) -> Option<Qualified> {
    g.flush_cards()
        .map(|cards| Qualified::new(HandCategory::Flush, cards[0].value(), cards[..5].to_vec()))
}

fn straight(g: &Grouped) -> Option<Qualified> {
    // 同点数只算一次，保留排在前面的公共牌
    let mut distinct = g.sorted.clone();
    distinct.dedup_by_key(|c| c.rank);
    highest_run(&distinct).map(|run| Qualified::new(HandCategory::Straight, run[0].value(), run))
}

fn three_of_a_kind(g: &Grouped) -> Option<Qualified> {
    g.by_rank
        .iter()
        .find(|group| group.len() == 3)
        .map(|group| Qualified::new(HandCategory::ThreeOfAKind, group[0].value(), group.clone()))
}

fn two_pairs(g: &Grouped) -> Option<Qualified> {
    let mut pairs = g.by_rank.iter().filter(|group| group.len() == 2);
    let (high, low) = (pairs.next()?, pairs.next()?);

    let mut used = high.clone();
    used.extend_from_slice(low);
    Some(Qualified {
        category: HandCategory::TwoPairs,
        primary: high[0].value(),
        secondary: Some(low[0].value()),
        used,
    })
}

fn one_pair(g: &Grouped) -> Option<Qualified> {
    g.by_rank
        .iter()
        .find(|group| group.len() == 2)
        .map(|group| Qualified::new(HandCategory::OnePair, group[0].value(), group.clone()))
}

fn high_card(g: &Grouped) -> Option<Qualified> {
    g.sorted
        .first()
        .map(|top| Qualified::new(HandCategory::HighCard, top.value(), vec![*top]))
}

/// 评估公共牌 + 底牌能组成的牌力 (牌的顺序无关)
///
/// 踢脚牌规则：两张底牌都在成牌组合中为 0；只有一张在组合中时取另一张的点数；
/// 都不在组合中时取较大的一张。
pub fn evaluate_hand(community: &[Card], pocket: &[Card]) -> EvaluatedHand {
    let grouped = Grouped::new(community, pocket);
    let qualified = DETECTORS
        .iter()
        .find_map(|detect| detect(&grouped))
        .unwrap_or(Qualified::new(HandCategory::HighCard, 0, Vec::new()));

    let kicker = pocket
        .iter()
        .filter(|card| !qualified.used.contains(card))
        .map(Card::value)
        .max()
        .unwrap_or(0);

    EvaluatedHand {
        category: qualified.category,
        primary: qualified.primary,
        secondary: qualified.secondary,
        kicker,
    }
}

// --- 单元测试 ---
