//! 成绩页解析 - 业务能力层
//!
//! 把抓取到的结果容器 HTML 解析成一行扁平记录

use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::error::ParseError;
use crate::models::{StudentRecord, TOTAL_MARKS_COLUMN};

/// 科目表中每行至少的单元格数
const SUBJECT_CELLS: usize = 7;

/// 每个科目展开的列后缀（按单元格顺序，第 0 格是科目代码）
const SUBJECT_FIELDS: [&str; 6] = [
    "SubjectName",
    "InternalMarks",
    "ExternalMarks",
    "Total",
    "Result",
    "UpdatedOn",
];

fn selector(css: &str) -> Result<Selector, ParseError> {
    Selector::parse(css).map_err(|e| ParseError::Selector {
        selector: css.to_string(),
        reason: e.to_string(),
    })
}

/// 提取元素文本：合并空白并去掉首尾
fn cell_text(spaces: &Regex, element: ElementRef<'_>) -> String {
    let raw: String = element.text().collect();
    spaces.replace_all(raw.trim(), " ").into_owned()
}

/// 解析单个学生的成绩页
///
/// - `table.table-bordered` 中两列的行是学生信息（去掉冒号）
/// - `.divTableRow` 中除表头外、单元格数 ≥ 7 的行是科目成绩
/// - 最后追加 `Total_Full_Marks`：所有能解析成整数的科目总分之和
pub fn parse_student_result(html: &str) -> Result<StudentRecord, ParseError> {
    let document = Html::parse_fragment(html);
    let info_rows = selector("table.table-bordered tr")?;
    let td = selector("td")?;
    let subject_rows = selector(".divTableRow")?;
    let subject_cell = selector(".divTableCell")?;
    let spaces = Regex::new(r"\s+")?;

    let mut record = StudentRecord::new();

    for row in document.select(&info_rows) {
        let cells: Vec<ElementRef<'_>> = row.select(&td).collect();
        if let [key, value] = cells.as_slice() {
            let key = cell_text(&spaces, *key).replace(':', "").trim().to_string();
            let value = cell_text(&spaces, *value).replace(':', "").trim().to_string();
            if !key.is_empty() {
                record.insert(key, value);
            }
        }
    }

    if record.is_empty() {
        return Err(ParseError::MissingStudentInfo);
    }

    let mut total_full = 0i64;
    for row in document.select(&subject_rows).skip(1) {
        let cells: Vec<String> = row
            .select(&subject_cell)
            .map(|cell| cell_text(&spaces, cell))
            .collect();
        if cells.len() < SUBJECT_CELLS {
            continue;
        }
        let code = &cells[0];
        if code.eq_ignore_ascii_case("subject code") {
            continue;
        }

        for (suffix, value) in SUBJECT_FIELDS.iter().zip(&cells[1..]) {
            record.insert(format!("{}_{}", code, suffix), value.clone());
        }
        if let Ok(total) = cells[4].parse::<i64>() {
            total_full += total;
        }
    }

    record.insert(TOTAL_MARKS_COLUMN, total_full.to_string());
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SEAT_NUMBER_COLUMN;

    const SAMPLE: &str = r#"
    <div class="row">
      <table class="table table-bordered">
        <tr><td><b>University Seat Number</b></td><td><b>: 1CR24BA001</b></td></tr>
        <tr><td><b>Student Name</b></td><td><b>:  ASHA   RAO </b></td></tr>
        <tr><td colspan="2">Semester : 1</td></tr>
      </table>
      <div class="divTable">
        <div class="divTableRow">
          <div class="divTableCell">Subject Code</div><div class="divTableCell">Subject Name</div>
          <div class="divTableCell">Internal</div><div class="divTableCell">External</div>
          <div class="divTableCell">Total</div><div class="divTableCell">Result</div>
          <div class="divTableCell">Updated on</div>
        </div>
        <div class="divTableRow">
          <div class="divTableCell">BBA101</div><div class="divTableCell">Management</div>
          <div class="divTableCell">40</div><div class="divTableCell">45</div>
          <div class="divTableCell">85</div><div class="divTableCell">P</div>
          <div class="divTableCell">2025-02-01</div>
        </div>
        <div class="divTableRow">
          <div class="divTableCell">Subject Code</div><div class="divTableCell">x</div>
          <div class="divTableCell">x</div><div class="divTableCell">x</div>
          <div class="divTableCell">x</div><div class="divTableCell">x</div>
          <div class="divTableCell">x</div>
        </div>
        <div class="divTableRow">
          <div class="divTableCell">BBA102</div><div class="divTableCell">Accounts</div>
          <div class="divTableCell">20</div><div class="divTableCell">AB</div>
          <div class="divTableCell">-</div><div class="divTableCell">A</div>
          <div class="divTableCell">2025-02-01</div>
        </div>
        <div class="divTableRow"><div class="divTableCell">short</div></div>
      </div>
    </div>"#;

    #[test]
    fn test_parse_student_info_and_subjects() {
        let record = parse_student_result(SAMPLE).unwrap();

        assert_eq!(record.seat_number(), Some("1CR24BA001"));
        assert_eq!(record.get("Student Name"), Some("ASHA RAO"));
        assert_eq!(record.get("BBA101_SubjectName"), Some("Management"));
        assert_eq!(record.get("BBA101_Total"), Some("85"));
        assert_eq!(record.get("BBA102_ExternalMarks"), Some("AB"));
        assert_eq!(record.get("BBA102_Result"), Some("A"));
        assert_eq!(record.get(TOTAL_MARKS_COLUMN), Some("85"));
        assert!(record.get("Subject Code_SubjectName").is_none());
    }

    #[test]
    fn test_column_order_info_then_subjects_then_total() {
        let record = parse_student_result(SAMPLE).unwrap();
        let columns: Vec<&str> = record.columns().collect();
        assert_eq!(columns[0], SEAT_NUMBER_COLUMN);
        assert_eq!(columns[2], "BBA101_SubjectName");
        assert_eq!(columns.last().copied(), Some(TOTAL_MARKS_COLUMN));
    }

    #[test]
    fn test_markup_without_student_table_is_error() {
        assert!(matches!(
            parse_student_result("<div>nothing here</div>"),
            Err(ParseError::MissingStudentInfo)
        ));
    }
}
