//! Cross-stream merge: left-outer joins anchored on the chat aggregate, followed by zero-fill
//! into the final row types. The output rows have no optional numeric fields, so a missing
//! statistic can only ever surface as `0`.

use crate::aggregate::{ChatPeriodStats, PeriodKey, SuperchatPeriodStats};
use crate::period::YearMonth;
use serde::Serialize;
use std::collections::BTreeMap;

/// Left-outer join of `left` (order preserved, every row kept) against the keyed `right` index.
pub fn left_join<K: Ord, L, R: Clone>(left: Vec<(K, L)>, right: &BTreeMap<K, R>) -> Vec<(K, L, Option<R>)> {
    left.into_iter()
        .map(|(k, l)| {
            let r = right.get(&k).cloned();
            (k, l, r)
        })
        .collect()
}

pub const CHAT_STATS_COLUMNS: [&str; 8] = [
    "channelId",
    "period",
    "chats",
    "memberChats",
    "uniqueChatters",
    "uniqueMembers",
    "bannedChatters",
    "deletedChats",
];

pub const SUPERCHAT_STATS_COLUMNS: [&str; 10] = [
    "channelId",
    "period",
    "superChats",
    "uniqueSuperChatters",
    "totalSC",
    "averageSC",
    "totalMessageLength",
    "averageMessageLength",
    "mostFrequentCurrency",
    "mostFrequentColor",
];

/// Field order is the CSV column order (`CHAT_STATS_COLUMNS`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatStatsRow {
    pub channel_id: String,
    pub period: YearMonth,
    pub chats: i64,
    pub member_chats: i64,
    pub unique_chatters: i64,
    pub unique_members: i64,
    pub banned_chatters: i64,
    pub deleted_chats: i64,
}

/// Field order is the CSV column order (`SUPERCHAT_STATS_COLUMNS`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SuperchatStatsRow {
    #[serde(rename = "channelId")]
    pub channel_id: String,
    pub period: YearMonth,
    #[serde(rename = "superChats")]
    pub super_chats: i64,
    #[serde(rename = "uniqueSuperChatters")]
    pub unique_super_chatters: i64,
    #[serde(rename = "totalSC")]
    pub total_sc: i64,
    #[serde(rename = "averageSC")]
    pub average_sc: i64,
    #[serde(rename = "totalMessageLength")]
    pub total_message_length: i64,
    #[serde(rename = "averageMessageLength")]
    pub average_message_length: i64,
    #[serde(rename = "mostFrequentCurrency")]
    pub most_frequent_currency: Option<String>,
    #[serde(rename = "mostFrequentColor")]
    pub most_frequent_color: Option<String>,
}

/// Chat row after all joins, before zero-fill.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JoinedChatRow {
    pub key: PeriodKey,
    pub chats: u64,
    pub unique_chatters: u64,
    pub member_chats: Option<u64>,
    pub unique_members: Option<u64>,
    pub banned_chatters: Option<u64>,
    pub deleted_chats: Option<u64>,
}

fn to_int(v: Option<u64>) -> i64 {
    v.map_or(0, |n| i64::try_from(n).unwrap_or(i64::MAX))
}

/// Float statistics are truncated toward zero; NaN/None become 0.
fn float_to_int(v: Option<f64>) -> i64 {
    match v {
        Some(f) if f.is_finite() => f.trunc() as i64,
        _ => 0,
    }
}

impl JoinedChatRow {
    pub fn zero_fill(self) -> ChatStatsRow {
        ChatStatsRow {
            channel_id: self.key.channel_id,
            period: self.key.period,
            chats: to_int(Some(self.chats)),
            member_chats: to_int(self.member_chats),
            unique_chatters: to_int(Some(self.unique_chatters)),
            unique_members: to_int(self.unique_members),
            banned_chatters: to_int(self.banned_chatters),
            deleted_chats: to_int(self.deleted_chats),
        }
    }
}

/// `chat ⋈ ban ⋈ deletion` on (channelId, period), keeping every chat row.
/// `chat` must already be in output order (period, then channel).
pub fn join_chat_stats(
    chat: Vec<ChatPeriodStats>,
    bans: &BTreeMap<PeriodKey, u64>,
    deletions: &BTreeMap<PeriodKey, u64>,
) -> Vec<JoinedChatRow> {
    let base: Vec<(PeriodKey, ChatPeriodStats)> = chat.into_iter().map(|s| (s.key.clone(), s)).collect();
    let with_bans = left_join(base, bans);
    let keyed: Vec<(PeriodKey, (ChatPeriodStats, Option<u64>))> =
        with_bans.into_iter().map(|(k, s, b)| (k, (s, b))).collect();

    left_join(keyed, deletions)
        .into_iter()
        .map(|(key, (s, banned), deleted)| JoinedChatRow {
            key,
            chats: s.base.chats,
            unique_chatters: s.base.unique_chatters,
            member_chats: s.members.as_ref().map(|m| m.member_chats),
            unique_members: s.members.as_ref().map(|m| m.unique_members),
            banned_chatters: banned,
            deleted_chats: deleted,
        })
        .collect()
}

pub fn merge_chat_stats(
    chat: Vec<ChatPeriodStats>,
    bans: &BTreeMap<PeriodKey, u64>,
    deletions: &BTreeMap<PeriodKey, u64>,
) -> Vec<ChatStatsRow> {
    join_chat_stats(chat, bans, deletions).into_iter().map(JoinedChatRow::zero_fill).collect()
}

/// Superchat stats are not joined with other streams; they only get the same fill/coercion.
pub fn superchat_rows(stats: Vec<SuperchatPeriodStats>) -> Vec<SuperchatStatsRow> {
    stats
        .into_iter()
        .map(|s| SuperchatStatsRow {
            channel_id: s.key.channel_id,
            period: s.key.period,
            super_chats: to_int(Some(s.super_chats)),
            unique_super_chatters: to_int(Some(s.unique_super_chatters)),
            total_sc: float_to_int(Some(s.total_amount)),
            average_sc: float_to_int(s.average_amount),
            total_message_length: to_int(Some(s.total_message_length)),
            average_message_length: float_to_int(s.average_message_length),
            most_frequent_currency: s.most_frequent_currency,
            most_frequent_color: s.most_frequent_color,
        })
        .collect()
}
