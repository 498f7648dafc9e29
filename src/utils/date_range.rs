use crate::error::{AppError, AppResult};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// 闭区间日期 [start, end]，任一端缺省表示该侧无界
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
pub struct DateWindow {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateWindow {
    /// 构造并校验 start <= end
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> AppResult<Self> {
        if let (Some(s), Some(e)) = (start, end)
            && s > e
        {
            return Err(AppError::InvalidRange(format!(
                "Start date {s} is after end date {e}"
            )));
        }
        Ok(Self { start, end })
    }

    /// 有界区间
    pub fn bounded(start: NaiveDate, end: NaiveDate) -> AppResult<Self> {
        Self::new(Some(start), Some(end))
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    /// [a,b] 与 [c,d] 重叠当且仅当 a <= d && c <= b
    pub fn overlaps(&self, start: NaiveDate, end: NaiveDate) -> bool {
        let starts_before_end = self.end.is_none_or(|e| start <= e);
        let ends_after_start = self.start.is_none_or(|s| end >= s);
        starts_before_end && ends_after_start
    }
}
