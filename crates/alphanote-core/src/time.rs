//! 시간대 기반 날짜 변환.
//!
//! 콘텐츠 타임스탬프(epoch 초)와 거래일 날짜는 모두 시장 시간대
//! (기본 `Asia/Shanghai`) 기준으로 변환합니다.

use chrono::{NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;

use crate::{CoreError, CoreResult};

/// 기본 시장 시간대.
pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Asia::Shanghai;

const SECONDS_PER_DAY: i64 = 86_400;

/// epoch 초를 시장 시간대의 날짜로 변환합니다.
///
/// 0 이하(미설정) 타임스탬프는 `None`을 반환합니다.
pub fn timestamp_to_date(timestamp: i64, tz: Tz) -> Option<NaiveDate> {
    if timestamp <= 0 {
        return None;
    }
    tz.timestamp_opt(timestamp, 0)
        .single()
        .map(|dt| dt.date_naive())
}

/// 시장 시간대 기준 오늘 날짜.
pub fn today(tz: Tz) -> NaiveDate {
    Utc::now().with_timezone(&tz).date_naive()
}

/// 해당 날짜 00:00(시장 시간대)의 epoch 초.
pub fn date_start_timestamp(date: NaiveDate, tz: Tz) -> i64 {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    match tz.from_local_datetime(&midnight).earliest() {
        Some(dt) => dt.timestamp(),
        None => midnight.and_utc().timestamp(),
    }
}

/// 해당 날짜를 포함하는 배타적 상한 (다음 날 00:00)의 epoch 초.
pub fn date_end_exclusive_timestamp(date: NaiveDate, tz: Tz) -> i64 {
    date_start_timestamp(date, tz) + SECONDS_PER_DAY
}

/// "YYYY-MM-DD" 또는 "YYYYMMDD" 형식의 날짜를 파싱합니다.
pub fn parse_date(input: &str) -> CoreResult<NaiveDate> {
    let trimmed = input.trim();
    NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(trimmed, "%Y%m%d"))
        .map_err(|_| CoreError::Parse(format!("날짜 형식이 아닙니다: {}", input)))
}

/// 시간대 이름을 파싱합니다 (예: "Asia/Shanghai").
pub fn parse_timezone(name: &str) -> CoreResult<Tz> {
    name.parse::<Tz>()
        .map_err(|_| CoreError::InvalidInput(format!("알 수 없는 시간대: {}", name)))
}
