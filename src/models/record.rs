//! 学生成绩记录（扁平结构，一行对应表格中的一行）

use indexmap::IndexMap;

/// 学号列名
pub const SEAT_NUMBER_COLUMN: &str = "University Seat Number";
/// 姓名列名
pub const STUDENT_NAME_COLUMN: &str = "Student Name";
/// 总分列名
pub const TOTAL_MARKS_COLUMN: &str = "Total_Full_Marks";

/// 学生成绩记录
///
/// 列顺序即插入顺序：先学生信息，再逐科目字段，最后总分。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StudentRecord {
    fields: IndexMap<String, String>,
}

impl StudentRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.fields.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn seat_number(&self) -> Option<&str> {
        self.get(SEAT_NUMBER_COLUMN)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, String)> for StudentRecord {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}
