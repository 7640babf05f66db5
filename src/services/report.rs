//! 成绩汇总报告 - 业务能力层
//!
//! 从结果表格生成 Markdown 报告：
//! 1. 科目代码与名称
//! 2. 及格/不及格汇总与不及格名单
//! 3. 各科成绩分布
//! 4. 总分前 N 名
//! 5. 各科最高分

use std::fmt::Write;

use chrono::Local;
use indexmap::IndexMap;
use phf::phf_set;
use tracing::debug;

use crate::error::ReportError;
use crate::models::{StudentRecord, SEAT_NUMBER_COLUMN, STUDENT_NAME_COLUMN};
use crate::services::result_store::MISSING_CELL;

/// 视为不及格的成绩标记（小写）
static FAILING_MARKERS: phf::Set<&'static str> = phf_set! {
    "f",
    "fail",
    "failed",
    "ab",
    "absent",
};

const NAME_SUFFIX: &str = "_SubjectName";
const RESULT_SUFFIX: &str = "_Result";
const TOTAL_SUFFIX: &str = "_Total";

fn is_missing(value: &str) -> bool {
    let value = value.trim();
    value.is_empty() || value == MISSING_CELL
}

fn cell<'a>(record: &'a StudentRecord, column: &str) -> Option<&'a str> {
    record.get(column).filter(|v| !is_missing(v)).map(str::trim)
}

fn numeric(record: &StudentRecord, column: &str) -> Option<f64> {
    cell(record, column).and_then(|v| v.parse::<f64>().ok())
}

fn format_marks(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

/// 渲染 Markdown 表格
fn table(out: &mut String, header: &[&str], rows: &[Vec<String>]) {
    let _ = writeln!(out, "| {} |", header.join(" | "));
    let _ = writeln!(
        out,
        "|{}|",
        header.iter().map(|_| "---").collect::<Vec<_>>().join("|")
    );
    for row in rows {
        let cells: Vec<String> = row.iter().map(|c| c.replace('|', "\\|")).collect();
        let _ = writeln!(out, "| {} |", cells.join(" | "));
    }
    out.push('\n');
}

/// 科目信息
#[derive(Debug, Clone, PartialEq)]
struct Subject {
    code: String,
    name: String,
}

/// 报告生成器
#[derive(Debug, Clone)]
pub struct ReportBuilder {
    /// 数值成绩低于该值视为不及格
    pub fail_threshold: f64,
    /// 总分排名展示人数
    pub top_n: usize,
}

impl Default for ReportBuilder {
    fn default() -> Self {
        Self {
            fail_threshold: 35.0,
            top_n: 10,
        }
    }
}

impl ReportBuilder {
    pub fn new(fail_threshold: f64, top_n: usize) -> Self {
        Self {
            fail_threshold,
            top_n,
        }
    }

    /// 单科成绩是否不及格
    pub fn is_failing(&self, result: &str) -> bool {
        let result = result.trim();
        if FAILING_MARKERS.contains(result.to_ascii_lowercase().as_str()) {
            return true;
        }
        result
            .parse::<f64>()
            .map(|score| score < self.fail_threshold)
            .unwrap_or(false)
    }

    /// 生成完整报告
    pub fn build(&self, records: &[StudentRecord]) -> Result<String, ReportError> {
        if records.is_empty() {
            return Err(ReportError::Empty);
        }
        let missing: Vec<&str> = [SEAT_NUMBER_COLUMN, STUDENT_NAME_COLUMN]
            .into_iter()
            .filter(|c| !records.iter().any(|r| r.get(c).is_some()))
            .collect();
        if !missing.is_empty() {
            return Err(ReportError::MissingColumns(missing.join(", ")));
        }

        let subjects = collect_subjects(records);
        if subjects.is_empty() {
            return Err(ReportError::NoSubjects);
        }
        debug!("报告: {} 名学生, {} 门科目", records.len(), subjects.len());

        let mut out = String::new();
        let _ = writeln!(out, "# Student Results Summary Report\n");
        let _ = writeln!(
            out,
            "_Generated on {}_\n",
            Local::now().format("%Y-%m-%d %H:%M:%S")
        );

        self.subject_section(&mut out, records, &subjects);
        self.failure_section(&mut out, records, &subjects);
        self.distribution_section(&mut out, records, &subjects);
        self.top_students_section(&mut out, records, &subjects);
        self.top_per_subject_section(&mut out, records, &subjects);
        Ok(out)
    }

    fn subject_section(&self, out: &mut String, records: &[StudentRecord], subjects: &[Subject]) {
        let _ = writeln!(out, "## Subject Code and Name Summary\n");
        let rows: Vec<Vec<String>> = subjects
            .iter()
            .enumerate()
            .map(|(i, s)| {
                let appeared = records
                    .iter()
                    .filter(|r| cell(r, &format!("{}{}", s.code, RESULT_SUFFIX)).is_some())
                    .count();
                vec![
                    (i + 1).to_string(),
                    s.name.clone(),
                    s.code.clone(),
                    appeared.to_string(),
                ]
            })
            .collect();
        table(
            out,
            &["S.No", "Subject Name", "Subject Code", "Total Appeared"],
            &rows,
        );
    }

    fn failure_section(&self, out: &mut String, records: &[StudentRecord], subjects: &[Subject]) {
        let failures: Vec<(&StudentRecord, usize)> = records
            .iter()
            .map(|r| {
                let failed = subjects
                    .iter()
                    .filter(|s| {
                        cell(r, &format!("{}{}", s.code, RESULT_SUFFIX))
                            .is_some_and(|v| self.is_failing(v))
                    })
                    .count();
                (r, failed)
            })
            .filter(|(_, failed)| *failed > 0)
            .collect();

        let total = records.len();
        let failed = failures.len();
        let passed = total - failed;
        let pass_rate = passed as f64 / total as f64 * 100.0;

        let _ = writeln!(out, "## Failed Students Summary\n");
        table(
            out,
            &["Total Students", "Passed", "Failed", "Pass Percentage"],
            &[vec![
                total.to_string(),
                passed.to_string(),
                failed.to_string(),
                format!("{:.2}%", pass_rate),
            ]],
        );

        if failures.is_empty() {
            let _ = writeln!(out, "No students failed.\n");
            return;
        }

        let _ = writeln!(out, "### Detailed List of Failed Students\n");
        let rows: Vec<Vec<String>> = failures
            .iter()
            .enumerate()
            .map(|(i, (r, count))| {
                vec![
                    (i + 1).to_string(),
                    r.get(STUDENT_NAME_COLUMN).unwrap_or_default().to_string(),
                    r.seat_number().unwrap_or_default().to_string(),
                    count.to_string(),
                ]
            })
            .collect();
        table(
            out,
            &["S.No", "Student Name", "USN", "Number of Subjects Failed"],
            &rows,
        );
    }

    fn distribution_section(
        &self,
        out: &mut String,
        records: &[StudentRecord],
        subjects: &[Subject],
    ) {
        let _ = writeln!(out, "## Summary of Results by Subject\n");
        for subject in subjects {
            let column = format!("{}{}", subject.code, RESULT_SUFFIX);
            let mut counts: IndexMap<String, usize> = IndexMap::new();
            for value in records.iter().filter_map(|r| cell(r, &column)) {
                *counts.entry(value.to_string()).or_default() += 1;
            }
            let appeared: usize = counts.values().sum();
            counts.sort_by(|ka, va, kb, vb| vb.cmp(va).then_with(|| ka.cmp(kb)));

            let _ = writeln!(out, "### {} ({})\n", subject.name, subject.code);
            let _ = writeln!(out, "Total Appeared: {}\n", appeared);
            let rows: Vec<Vec<String>> = counts
                .iter()
                .map(|(value, count)| {
                    vec![
                        value.clone(),
                        count.to_string(),
                        format!("{:.2}%", *count as f64 / appeared.max(1) as f64 * 100.0),
                    ]
                })
                .collect();
            table(out, &["Result", "Count", "Percentage"], &rows);
        }
    }

    fn top_students_section(
        &self,
        out: &mut String,
        records: &[StudentRecord],
        subjects: &[Subject],
    ) {
        let mut ranked: Vec<(&StudentRecord, f64)> = records
            .iter()
            .filter_map(|r| {
                let totals: Vec<f64> = subjects
                    .iter()
                    .filter_map(|s| numeric(r, &format!("{}{}", s.code, TOTAL_SUFFIX)))
                    .collect();
                (!totals.is_empty()).then(|| (r, totals.iter().sum()))
            })
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked.truncate(self.top_n);

        let _ = writeln!(out, "## Top {} Students by Total Marks\n", self.top_n);
        let rows: Vec<Vec<String>> = ranked
            .iter()
            .enumerate()
            .map(|(i, (r, total))| {
                vec![
                    (i + 1).to_string(),
                    r.seat_number().unwrap_or_default().to_string(),
                    r.get(STUDENT_NAME_COLUMN).unwrap_or_default().to_string(),
                    format_marks(*total),
                ]
            })
            .collect();
        table(out, &["Rank", "USN", "Student Name", "Total Marks"], &rows);
    }

    fn top_per_subject_section(
        &self,
        out: &mut String,
        records: &[StudentRecord],
        subjects: &[Subject],
    ) {
        let _ = writeln!(out, "## Top Performers in Each Subject\n");
        let overall: Vec<f64> = records
            .iter()
            .map(|r| {
                subjects
                    .iter()
                    .filter_map(|s| numeric(r, &format!("{}{}", s.code, TOTAL_SUFFIX)))
                    .sum()
            })
            .collect();

        let mut rows = Vec::new();
        for subject in subjects {
            let column = format!("{}{}", subject.code, TOTAL_SUFFIX);
            let scored: Vec<(usize, f64)> = records
                .iter()
                .enumerate()
                .filter_map(|(i, r)| numeric(r, &column).map(|v| (i, v)))
                .collect();
            let Some(best) = scored.iter().map(|(_, v)| *v).max_by(f64::total_cmp) else {
                continue;
            };
            for (i, marks) in scored.iter().filter(|(_, v)| *v == best) {
                let r = &records[*i];
                rows.push(vec![
                    subject.code.clone(),
                    subject.name.clone(),
                    r.get(STUDENT_NAME_COLUMN).unwrap_or_default().to_string(),
                    r.seat_number().unwrap_or_default().to_string(),
                    format_marks(*marks),
                    format_marks(overall[*i]),
                ]);
            }
        }
        table(
            out,
            &[
                "Subject Code",
                "Subject Name",
                "Student Name",
                "USN",
                "Marks",
                "Total Full Marks",
            ],
            &rows,
        );
    }
}

/// 按首次出现顺序收集科目（名称取第一个非空值）
fn collect_subjects(records: &[StudentRecord]) -> Vec<Subject> {
    let mut subjects: IndexMap<String, String> = IndexMap::new();
    for record in records {
        for (column, value) in record.iter() {
            let Some(code) = column.strip_suffix(NAME_SUFFIX) else {
                continue;
            };
            let name = subjects.entry(code.to_string()).or_default();
            if name.is_empty() && !is_missing(value) {
                *name = value.trim().to_string();
            }
        }
    }
    subjects
        .into_iter()
        .map(|(code, name)| Subject {
            name: if name.is_empty() { code.clone() } else { name },
            code,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(usn: &str, name: &str, subjects: &[(&str, &str, &str)]) -> StudentRecord {
        let mut record = StudentRecord::new();
        record.insert(SEAT_NUMBER_COLUMN, usn);
        record.insert(STUDENT_NAME_COLUMN, name);
        for (code, total, result) in subjects {
            record.insert(format!("{}_SubjectName", code), format!("Subject {}", code));
            record.insert(format!("{}_Total", code), *total);
            record.insert(format!("{}_Result", code), *result);
        }
        record
    }

    fn sample() -> Vec<StudentRecord> {
        vec![
            student("X001", "Asha", &[("S1", "80", "P"), ("S2", "60", "P")]),
            student("X002", "Ravi", &[("S1", "20", "F"), ("S2", "NA", "AB")]),
            student("X003", "Meera", &[("S1", "80", "P"), ("S2", "70", "P")]),
        ]
    }

    #[test]
    fn test_failing_markers_and_threshold_boundary() {
        let builder = ReportBuilder::default();
        assert!(builder.is_failing("F"));
        assert!(builder.is_failing(" Absent "));
        assert!(builder.is_failing("34.5"));
        assert!(!builder.is_failing("35"));
        assert!(!builder.is_failing("P"));
        assert!(ReportBuilder::new(40.0, 5).is_failing("35"));
    }

    #[test]
    fn test_report_sections() {
        let report = ReportBuilder::new(35.0, 2).build(&sample()).unwrap();

        assert!(report.contains("| 1 | Subject S1 | S1 | 3 |"));
        assert!(report.contains("| 3 | 2 | 1 | 66.67% |"));
        assert!(report.contains("| 1 | Ravi | X002 | 2 |"));
        assert!(report.contains("| P | 2 | 66.67% |"));
        assert!(report.contains("## Top 2 Students by Total Marks"));
        assert!(report.contains("| 1 | X003 | Meera | 150 |"));
        assert!(!report.contains("| 3 | X002"));
        // S1 最高分并列
        assert!(report.contains("| S1 | Subject S1 | Asha | X001 | 80 | 140 |"));
        assert!(report.contains("| S1 | Subject S1 | Meera | X003 | 80 | 150 |"));
    }

    #[test]
    fn test_empty_and_malformed_input() {
        let builder = ReportBuilder::default();
        assert!(matches!(builder.build(&[]), Err(ReportError::Empty)));

        let mut only_name = StudentRecord::new();
        only_name.insert(STUDENT_NAME_COLUMN, "A");
        assert!(matches!(
            builder.build(&[only_name]),
            Err(ReportError::MissingColumns(_))
        ));

        let bare = student("X001", "A", &[]);
        assert!(matches!(builder.build(&[bare]), Err(ReportError::NoSubjects)));
    }
}
