// ==========================================
// 服务报价目录导入系统 - 文件解析器实现
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 输出: 原始行（表头 → 单元格），数值单元格保留为数值
// 约定:
// - 完全空白的行不输出，行号按非空数据行从 1 开始计
// - 表头重名时第一列生效，后续同名列忽略并告警
// ==========================================

use crate::domain::import::{RawCell, RawRow};
use crate::importer::catalog_importer_trait::FileParser;
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use std::collections::HashSet;
use std::fs::File;
use std::path::Path;
use tracing::warn;

/// 小写扩展名（无扩展名返回空串）
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}

fn check_exists(path: &Path) -> ImportResult<()> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    Ok(())
}

/// 重名表头只保留第一次出现的位置，其余置空（build_row 跳过空表头）
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(col_idx, header)| {
            if header.is_empty() || seen.insert(header.clone()) {
                header
            } else {
                warn!(header = %header, column = col_idx + 1, "表头重复，忽略该列");
                String::new()
            }
        })
        .collect()
}

/// 按表头组装一行；完全空白的行返回 None
fn build_row<I>(headers: &[String], cells: I) -> Option<RawRow>
where
    I: IntoIterator<Item = RawCell>,
{
    let mut row_map = RawRow::new();
    for (col_idx, cell) in cells.into_iter().enumerate() {
        match headers.get(col_idx) {
            Some(header) if !header.is_empty() => {
                row_map.insert(header.clone(), cell);
            }
            _ => {}
        }
    }

    if row_map.values().all(RawCell::is_blank) {
        None
    } else {
        Some(row_map)
    }
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<Vec<RawRow>> {
        check_exists(file_path)?;

        let ext = file_extension(file_path);
        if ext != "csv" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        let file = File::open(file_path)?;
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致
            .from_reader(file);

        // 读取表头（去掉 Excel 导出 CSV 常见的 BOM）
        let headers: Vec<String> = reader
            .headers()?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        let headers = dedupe_headers(headers);

        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::EmptyFile);
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            if let Some(row) = build_row(&headers, record.iter().map(RawCell::from)) {
                rows.push(row);
            }
        }

        Ok(rows)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser;

impl ExcelParser {
    /// calamine 单元格 → 原始单元格
    fn convert_cell(cell: &Data) -> RawCell {
        match cell {
            Data::Empty => RawCell::Empty,
            Data::Int(i) => RawCell::Number(*i as f64),
            Data::Float(f) => RawCell::Number(*f),
            Data::String(s) => RawCell::from(s.as_str()),
            Data::Error(_) => RawCell::Empty,
            other => RawCell::Text(other.to_string()),
        }
    }
}

impl FileParser for ExcelParser {
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<Vec<RawRow>> {
        check_exists(file_path)?;

        let ext = file_extension(file_path);
        if ext != "xlsx" && ext != "xls" {
            return Err(ImportError::UnsupportedFormat(ext));
        }

        // 按扩展名自动选择 xlsx / xls 读取器
        let mut workbook = open_workbook_auto(file_path)?;

        // 读取第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;

        let range = workbook.worksheet_range(&sheet_name)?;

        // 提取表头（第一行）
        let mut rows = range.rows();
        let header_row = rows.next().ok_or(ImportError::EmptyFile)?;

        let headers: Vec<String> = header_row
            .iter()
            .map(|cell| cell.to_string().trim().to_string())
            .collect();
        let headers = dedupe_headers(headers);

        if headers.iter().all(|h| h.is_empty()) {
            return Err(ImportError::EmptyFile);
        }

        let mut records = Vec::new();
        for data_row in rows {
            if let Some(row) = build_row(&headers, data_row.iter().map(Self::convert_cell)) {
                records.push(row);
            }
        }

        Ok(records)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser;

impl FileParser for UniversalFileParser {
    fn parse_to_raw_rows(&self, file_path: &Path) -> ImportResult<Vec<RawRow>> {
        match file_extension(file_path).as_str() {
            "csv" => CsvParser.parse_to_raw_rows(file_path),
            "xlsx" | "xls" => ExcelParser.parse_to_raw_rows(file_path),
            other => Err(ImportError::UnsupportedFormat(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn csv_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(temp_file, "{}", line).unwrap();
        }
        temp_file
    }

    #[test]
    fn test_csv_parser_valid_file() {
        let temp_file = csv_file(&[
            "Brand,Model,Product Name,After Price",
            "Toyota,Camry,Oil Change,69.99",
            "Honda,,Brake Pads,120",
        ]);

        let records = CsvParser.parse_to_raw_rows(temp_file.path()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0].get("Brand"),
            Some(&RawCell::Text("Toyota".to_string()))
        );
        assert_eq!(records[1].get("Model"), Some(&RawCell::Empty));
    }

    #[test]
    fn test_csv_parser_file_not_found() {
        let result = CsvParser.parse_to_raw_rows(Path::new("non_existent.csv"));
        assert!(matches!(result, Err(ImportError::FileNotFound(_))));
    }

    #[test]
    fn test_csv_parser_skip_empty_rows() {
        let temp_file = csv_file(&["Brand,Product Name", "Toyota,Oil Change", " , ", "Honda,Wash"]);

        let records = CsvParser.parse_to_raw_rows(temp_file.path()).unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_csv_parser_duplicate_header_keeps_first_column() {
        let temp_file = csv_file(&["Brand,Product Name,Brand", "Toyota,Oil Change,Honda"]);

        let records = CsvParser.parse_to_raw_rows(temp_file.path()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].len(), 2);
        assert_eq!(
            records[0].get("Brand"),
            Some(&RawCell::Text("Toyota".to_string()))
        );
    }

    #[test]
    fn test_dedupe_headers() {
        let headers = vec![
            "Brand".to_string(),
            String::new(),
            "Brand".to_string(),
            String::new(),
            "Link".to_string(),
        ];
        assert_eq!(dedupe_headers(headers), vec!["Brand", "", "", "", "Link"]);
    }

    #[test]
    fn test_csv_parser_strips_bom() {
        let temp_file = csv_file(&["\u{feff}Brand,Product Name", "Toyota,Oil Change"]);

        let records = CsvParser.parse_to_raw_rows(temp_file.path()).unwrap();
        assert!(records[0].contains_key("Brand"));
    }

    #[test]
    fn test_csv_parser_header_only() {
        let temp_file = csv_file(&["Brand,Product Name"]);
        let records = CsvParser.parse_to_raw_rows(temp_file.path()).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_csv_parser_empty_file() {
        let temp_file = Builder::new().suffix(".csv").tempfile().unwrap();
        let result = CsvParser.parse_to_raw_rows(temp_file.path());
        assert!(matches!(result, Err(ImportError::EmptyFile)));
    }

    #[test]
    fn test_universal_parser_rejects_unknown_extension() {
        let temp_file = Builder::new().suffix(".txt").tempfile().unwrap();
        let result = UniversalFileParser.parse_to_raw_rows(temp_file.path());
        assert!(matches!(result, Err(ImportError::UnsupportedFormat(ext)) if ext == "txt"));
    }

    #[test]
    fn test_convert_excel_cells() {
        assert_eq!(ExcelParser::convert_cell(&Data::Float(69.99)), RawCell::Number(69.99));
        assert_eq!(ExcelParser::convert_cell(&Data::Int(3)), RawCell::Number(3.0));
        assert_eq!(ExcelParser::convert_cell(&Data::String(String::new())), RawCell::Empty);
        assert_eq!(
            ExcelParser::convert_cell(&Data::Bool(true)),
            RawCell::Text("true".to_string())
        );
    }
}
