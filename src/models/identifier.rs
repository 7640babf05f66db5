//! 学号（USN）及学号序列生成

use std::collections::HashSet;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 学号
///
/// 既是提交到门户的查询键，也是输出记录的关联键。生成后不可变。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// 用于比对“是否已抓取”的规范形式（大写）
    pub fn normalized(&self) -> String {
        self.0.to_ascii_uppercase()
    }
}

impl Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Identifier {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// 学号范围错误（由调用方负责校验）
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierRangeError {
    #[error("起始编号 {start} 大于结束编号 {end}")]
    Inverted { start: u32, end: u32 },
}

/// 按前缀和编号范围生成学号序列
///
/// 编号补零到 3 位，闭区间、升序。
///
/// ```
/// use vtu_results::models::generate_identifiers;
/// let ids = generate_identifiers("X", 1, 3).unwrap();
/// assert_eq!(ids[2].as_str(), "X003");
/// ```
pub fn generate_identifiers(
    base: &str,
    start: u32,
    end: u32,
) -> Result<Vec<Identifier>, IdentifierRangeError> {
    if start > end {
        return Err(IdentifierRangeError::Inverted { start, end });
    }
    Ok((start..=end)
        .map(|n| Identifier(format!("{base}{n:03}")))
        .collect())
}

/// 解析手工编辑的学号列表（逗号或换行分隔）
pub fn parse_identifier_list(text: &str) -> Vec<Identifier> {
    let ids = text
        .split(|c| c == ',' || c == '\n' || c == '\r')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Identifier(s.to_ascii_uppercase()))
        .collect();
    dedupe_preserving_order(ids)
}

/// 去重并保持原有顺序
pub fn dedupe_preserving_order(ids: Vec<Identifier>) -> Vec<Identifier> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.into_iter()
        .filter(|id| seen.insert(id.normalized()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_small_range() {
        let ids = generate_identifiers("X", 1, 3).unwrap();
        let ids: Vec<&str> = ids.iter().map(Identifier::as_str).collect();
        assert_eq!(ids, vec!["X001", "X002", "X003"]);
    }

    #[test]
    fn test_generate_single_and_wide_numbers() {
        let ids = generate_identifiers("1CR24BA", 7, 7).unwrap();
        assert_eq!(ids, vec![Identifier::from("1CR24BA007")]);

        let ids = generate_identifiers("1CR24BA", 999, 1000).unwrap();
        assert_eq!(ids[1].as_str(), "1CR24BA1000");
    }

    #[test]
    fn test_generate_rejects_inverted_range() {
        assert_eq!(
            generate_identifiers("X", 5, 2),
            Err(IdentifierRangeError::Inverted { start: 5, end: 2 })
        );
    }

    #[test]
    fn test_parse_identifier_list_mixed_separators() {
        let ids = parse_identifier_list("x001, x002\n\nX003,x001\r\n");
        let ids: Vec<&str> = ids.iter().map(Identifier::as_str).collect();
        assert_eq!(ids, vec!["X001", "X002", "X003"]);
    }
}
