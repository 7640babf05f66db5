//! 成绩表存储 - 业务能力层
//!
//! 只负责"读写结果表格"：读取已有学号、合并新记录（追加 + 去重）、原子写回。
//! 表格为 CSV，缺失单元格写 `NA`。

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::mem::take;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::StoreError;
use crate::models::{StudentRecord, SEAT_NUMBER_COLUMN};

/// 缺失值占位
pub const MISSING_CELL: &str = "NA";

/// 内存中的表格
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sheet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Sheet {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// 每行转成一条记录（列顺序与表头一致）
    pub fn records(&self) -> Vec<StudentRecord> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned().chain(std::iter::repeat(String::new())))
                    .collect()
            })
            .collect()
    }

    /// 把新记录并入表格：列取并集（已有列在前），整行去重
    fn merge_records(&mut self, records: &[StudentRecord]) {
        for record in records {
            for column in record.columns() {
                if self.column_index(column).is_none() {
                    self.columns.push(column.to_string());
                }
            }
        }
        let width = self.columns.len();
        for row in &mut self.rows {
            row.resize(width, MISSING_CELL.to_string());
        }

        let mut seen: HashSet<Vec<String>> = self.rows.iter().cloned().collect();
        let mut kept = take(&mut self.rows);
        kept.retain({
            let mut unique = HashSet::new();
            move |row: &Vec<String>| unique.insert(row.clone())
        });

        for record in records {
            let row: Vec<String> = self
                .columns
                .iter()
                .map(|c| {
                    record
                        .get(c)
                        .filter(|v| !v.is_empty())
                        .unwrap_or(MISSING_CELL)
                        .to_string()
                })
                .collect();
            if seen.insert(row.clone()) {
                kept.push(row);
            }
        }
        self.rows = kept;
    }
}

/// 成绩表存储
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn display_path(&self) -> String {
        self.path.display().to_string()
    }

    /// 读取表格；文件不存在时返回空表
    pub fn load(&self) -> Result<Sheet, StoreError> {
        if !self.path.exists() {
            debug!("表格不存在，视为空表: {}", self.display_path());
            return Ok(Sheet::default());
        }
        let text = fs::read_to_string(&self.path)
            .map_err(|e| StoreError::read(self.display_path(), e))?;
        let mut rows = parse_rows(&text, ',');
        if rows.is_empty() {
            return Ok(Sheet::default());
        }
        let columns = rows.remove(0);
        Ok(Sheet { columns, rows })
    }

    /// 已成功抓取的学号（大写）
    pub fn known_identifiers(&self) -> Result<HashSet<String>, StoreError> {
        let sheet = self.load()?;
        if sheet.columns.is_empty() {
            return Ok(HashSet::new());
        }
        let index = sheet
            .column_index(SEAT_NUMBER_COLUMN)
            .ok_or_else(|| StoreError::MissingColumn {
                path: self.display_path(),
                column: SEAT_NUMBER_COLUMN.to_string(),
            })?;
        Ok(sheet
            .rows
            .iter()
            .filter_map(|row| row.get(index))
            .map(|id| id.trim().to_ascii_uppercase())
            .filter(|id| !id.is_empty() && id != MISSING_CELL)
            .collect())
    }

    /// 写入新记录
    ///
    /// `append` 为 true 时与已有表格合并，否则覆盖。返回写入后的总行数。
    pub fn merge(&self, records: &[StudentRecord], append: bool) -> Result<usize, StoreError> {
        let mut sheet = if append { self.load()? } else { Sheet::default() };
        sheet.merge_records(records);
        self.write(&sheet)?;
        info!(
            "💾 已写入 {} 行到 {}",
            sheet.rows.len(),
            self.display_path()
        );
        Ok(sheet.rows.len())
    }

    /// 先写临时文件再重命名
    fn write(&self, sheet: &Sheet) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| StoreError::write(self.display_path(), e))?;
            }
        }

        let tmp = self.path.with_extension("csv.tmp");
        let write_all = || -> io::Result<()> {
            let mut file = io::BufWriter::new(fs::File::create(&tmp)?);
            write_row(&mut file, &sheet.columns, ',')?;
            for row in &sheet.rows {
                write_row(&mut file, row, ',')?;
            }
            file.flush()
        };
        write_all().map_err(|e| StoreError::write(tmp.display().to_string(), e))?;
        fs::rename(&tmp, &self.path).map_err(|e| StoreError::write(self.display_path(), e))
    }
}

/* ---------------- CSV ---------------- */

fn needs_quotes(field: &str, sep: char) -> bool {
    field.contains(sep) || field.contains('"') || field.contains('\n') || field.contains('\r')
}

/// 写一行 CSV
fn write_row<W: Write>(mut w: W, row: &[String], sep: char) -> io::Result<()> {
    let mut first = true;
    for cell in row {
        if !first {
            write!(w, "{}", sep)?;
        }
        first = false;
        if needs_quotes(cell, sep) {
            write!(w, "\"{}\"", cell.replace('"', "\"\""))?;
        } else {
            write!(w, "{}", cell)?;
        }
    }
    writeln!(w)
}

/// 解析 CSV（支持引号与 CRLF）
fn parse_rows(text: &str, sep: char) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut field = String::new();
    let mut row = Vec::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '"' if in_quotes => {
                if matches!(chars.peek(), Some('"')) {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' => in_quotes = true,
            c if c == sep && !in_quotes => row.push(take(&mut field)),
            '\n' | '\r' if !in_quotes => {
                if ch == '\r' && matches!(chars.peek(), Some('\n')) {
                    chars.next();
                }
                row.push(take(&mut field));
                if !(row.len() == 1 && row[0].is_empty()) {
                    rows.push(take(&mut row));
                } else {
                    row.clear();
                }
            }
            _ => field.push(ch),
        }
    }

    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    rows
}
