//! Today's figures, shared by every read endpoint and the bot

use serde::Serialize;
use std::fmt;

use crate::state::DailyAggregate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailySummary {
    pub date: String,
    pub unique: u64,
    pub total: u64,
}

impl DailySummary {
    /// Anonymous-only traffic reports `total` as the unique count
    pub fn from_aggregate(date: String, aggregate: &DailyAggregate) -> Self {
        let identified = aggregate.unique_visitors.len() as u64;
        Self {
            date,
            unique: if identified > 0 {
                identified
            } else {
                aggregate.total
            },
            total: aggregate.total,
        }
    }

    pub fn empty(date: String) -> Self {
        Self {
            date,
            unique: 0,
            total: 0,
        }
    }
}

/// Plain-text form used by GET /stats and the bot `/stats` reply
impl fmt::Display for DailySummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "📅 Сегодня ({})\n👤 Уникальных посетителей: {}\n↻ Всего открытий: {}",
            self.date, self.unique, self.total
        )
    }
}
