// ==========================================
// 专家评审阶段管理系统 - 仓储层 SQL 工具
// ==========================================
// 职责: 时间戳格式化/解析、枚举列解析、IN 子句占位符
// 约束: 时间戳统一存 RFC3339 (UTC, 微秒, Z 结尾), 保证字典序即时间序
// ==========================================

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;

/// 格式化时间戳
pub fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// 解析时间戳列
pub fn parse_ts(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// 解析枚举列, 未知取值转为列转换错误
pub fn parse_enum<T>(
    idx: usize,
    raw: &str,
    what: &str,
    parse: fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    parse(raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("unknown {}: {}", what, raw).into(),
        )
    })
}

/// 生成 n 个 "?" 占位符
pub fn placeholders(n: usize) -> String {
    std::iter::repeat("?").take(n).collect::<Vec<_>>().join(", ")
}

/// 去重并保持首次出现顺序
pub fn dedup_ids(ids: &[i64]) -> Vec<i64> {
    let mut seen = std::collections::HashSet::new();
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_ts_roundtrip_and_order() {
        let a = Utc.with_ymd_and_hms(2025, 1, 2, 3, 4, 5).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 11, 2, 3, 4, 5).unwrap();
        assert_eq!(parse_ts(0, &format_ts(&a)).unwrap(), a);
        assert!(format_ts(&a) < format_ts(&b));
    }

    #[test]
    fn test_parse_enum_unknown() {
        let err = parse_enum(3, "weird", "status", crate::domain::PhaseStatus::parse).unwrap_err();
        assert!(matches!(err, rusqlite::Error::FromSqlConversionFailure(3, _, _)));
    }

    #[test]
    fn test_placeholders_and_dedup() {
        assert_eq!(placeholders(3), "?, ?, ?");
        assert_eq!(dedup_ids(&[3, 1, 3, 2, 1]), vec![3, 1, 2]);
    }
}
