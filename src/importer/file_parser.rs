// ==========================================
// 销售管道 CRM - 文件解析器实现
// ==========================================
// 支持: CSV (.csv) / Excel (.xlsx/.xls) / JSON (.json)
// 顺序: 扩展名检查 → 大小检查 → 解析
// ==========================================

use crate::config::DEFAULT_MAX_FILE_BYTES;
use crate::domain::import::{FileType, ImportRow, ParseResult, RawValue};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::importer_trait::FileParser;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use csv::ReaderBuilder;
use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// 去掉 UTF-8 BOM 并解码
fn decode_utf8(bytes: &[u8]) -> ImportResult<&str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    std::str::from_utf8(bytes)
        .map_err(|e| ImportError::CsvParseError(format!("文件不是有效的 UTF-8 编码: {}", e)))
}

fn is_blank(data: &HashMap<String, RawValue>) -> bool {
    data.values().all(|v| match v {
        RawValue::Null => true,
        RawValue::Text(s) => s.trim().is_empty(),
        RawValue::Number(_) => false,
    })
}

/// 重名表头加序号后缀（notes, notes → notes, notes_1）；空表头保持为空
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::with_capacity(headers.len());
    headers
        .into_iter()
        .map(|header| {
            if header.is_empty() {
                return header;
            }
            let mut candidate = header.clone();
            let mut suffix = 0;
            while seen.contains(&candidate) {
                suffix += 1;
                candidate = format!("{}_{}", header, suffix);
            }
            seen.insert(candidate.clone());
            candidate
        })
        .collect()
}

/// 按表头收集一行；空表头列丢弃，完全空白的行返回 None
fn collect_row<I>(headers: &[String], cells: I) -> Option<HashMap<String, RawValue>>
where
    I: IntoIterator<Item = RawValue>,
{
    let mut cells = cells.into_iter();
    let mut data = HashMap::with_capacity(headers.len());
    for header in headers {
        let value = cells.next().unwrap_or(RawValue::Null);
        if header.is_empty() {
            continue;
        }
        data.insert(header.clone(), value);
    }

    if is_blank(&data) {
        None
    } else {
        Some(data)
    }
}

fn finish(file_type: FileType, headers: Vec<String>, rows: Vec<ImportRow>) -> ImportResult<ParseResult> {
    if rows.is_empty() {
        return Err(ImportError::EmptyFile);
    }
    debug!(file_type = %file_type, columns = headers.len(), rows = rows.len(), "文件解析完成");
    Ok(ParseResult {
        file_type,
        headers,
        rows,
    })
}

// ==========================================
// CSV Parser 实现
// ==========================================
pub struct CsvParser;

impl FileParser for CsvParser {
    fn file_type(&self) -> FileType {
        FileType::Csv
    }

    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<ParseResult> {
        let text = decode_utf8(bytes)?;
        // 统一换行符（CRLF / CR → LF）
        let normalized = text.replace("\r\n", "\n").replace('\r', "\n");

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true) // 允许行长度不一致，缺失单元格视为空
            .from_reader(normalized.as_bytes());

        let headers = dedupe_headers(
            reader
                .headers()?
                .iter()
                .map(|h| h.trim().to_string())
                .collect(),
        );
        let output_headers: Vec<String> = headers.iter().filter(|h| !h.is_empty()).cloned().collect();

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result?;
            let cells = record
                .iter()
                .map(|v| RawValue::Text(v.trim().to_string()));

            // 跳过完全空白的行
            if let Some(data) = collect_row(&headers, cells) {
                rows.push(ImportRow::new(rows.len() + 1, data));
            }
        }

        finish(FileType::Csv, output_headers, rows)
    }
}

// ==========================================
// Excel Parser 实现
// ==========================================
pub struct ExcelParser {
    file_type: FileType,
}

impl ExcelParser {
    pub fn new(file_type: FileType) -> Self {
        Self { file_type }
    }

    fn cell_to_raw(cell: &Data) -> RawValue {
        match cell {
            Data::Empty | Data::Error(_) => RawValue::Null,
            Data::Int(i) => RawValue::Number(*i as f64),
            Data::Float(f) => RawValue::Number(*f),
            Data::String(s) => RawValue::Text(s.trim().to_string()),
            other => RawValue::Text(other.to_string()),
        }
    }
}

impl FileParser for ExcelParser {
    fn file_type(&self) -> FileType {
        self.file_type
    }

    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<ParseResult> {
        // 自动识别 xlsx / xls
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

        // 仅读取第一个 sheet
        let sheet_name = workbook
            .sheet_names()
            .first()
            .cloned()
            .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?;
        let range = workbook.worksheet_range(&sheet_name)?;

        // 提取表头（第一行）
        let mut sheet_rows = range.rows();
        let header_row = sheet_rows.next().ok_or(ImportError::EmptyFile)?;
        let headers = dedupe_headers(
            header_row
                .iter()
                .map(|cell| cell.to_string().trim().to_string())
                .collect(),
        );
        let output_headers: Vec<String> = headers.iter().filter(|h| !h.is_empty()).cloned().collect();

        let mut rows = Vec::new();
        for data_row in sheet_rows {
            let cells = data_row.iter().map(Self::cell_to_raw);
            if let Some(data) = collect_row(&headers, cells) {
                rows.push(ImportRow::new(rows.len() + 1, data));
            }
        }

        finish(self.file_type, output_headers, rows)
    }
}

// ==========================================
// JSON Parser 实现
// ==========================================
// 接受单个对象或对象数组；表头取第一个对象的键（保持原顺序）
pub struct JsonParser;

impl JsonParser {
    fn json_to_raw(value: &serde_json::Value) -> RawValue {
        match value {
            serde_json::Value::Null => RawValue::Null,
            serde_json::Value::String(s) => RawValue::Text(s.clone()),
            serde_json::Value::Number(n) => match n.as_f64() {
                Some(f) => RawValue::Number(f),
                None => RawValue::Text(n.to_string()),
            },
            other => RawValue::Text(other.to_string()),
        }
    }
}

impl FileParser for JsonParser {
    fn file_type(&self) -> FileType {
        FileType::Json
    }

    fn parse_bytes(&self, bytes: &[u8]) -> ImportResult<ParseResult> {
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let value: serde_json::Value = serde_json::from_slice(bytes)?;

        let items = match value {
            serde_json::Value::Array(items) => items,
            obj @ serde_json::Value::Object(_) => vec![obj],
            _ => {
                return Err(ImportError::JsonParseError(
                    "顶层必须是对象或对象数组".to_string(),
                ))
            }
        };

        let headers: Vec<String> = match items.first() {
            Some(serde_json::Value::Object(first)) => first.keys().cloned().collect(),
            Some(_) => {
                return Err(ImportError::JsonParseError("第 1 项不是对象".to_string()));
            }
            None => return Err(ImportError::EmptyFile),
        };

        let mut rows = Vec::with_capacity(items.len());
        for (idx, item) in items.iter().enumerate() {
            let obj = item.as_object().ok_or_else(|| {
                ImportError::JsonParseError(format!("第 {} 项不是对象", idx + 1))
            })?;
            let data: HashMap<String, RawValue> = obj
                .iter()
                .map(|(k, v)| (k.clone(), Self::json_to_raw(v)))
                .collect();
            rows.push(ImportRow::new(idx + 1, data));
        }

        finish(FileType::Json, headers, rows)
    }
}

// ==========================================
// 通用文件解析器（根据扩展名自动选择）
// ==========================================
pub struct UniversalFileParser {
    max_file_bytes: u64,
    allowed_extensions: Vec<String>,
}

impl Default for UniversalFileParser {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_BYTES)
    }
}

impl UniversalFileParser {
    pub fn new(max_file_bytes: u64) -> Self {
        Self {
            max_file_bytes,
            allowed_extensions: ["csv", "xlsx", "xls", "json"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// 收窄允许的扩展名（只能在支持的四种格式内收窄）
    pub fn with_allowed_extensions(mut self, extensions: Vec<String>) -> Self {
        self.allowed_extensions = extensions
            .into_iter()
            .map(|e| e.trim().trim_start_matches('.').to_lowercase())
            .collect();
        self
    }

    pub fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    /// 按文件名识别类型（解析前拒绝不支持的格式）
    pub fn detect(&self, file_name: &str) -> ImportResult<FileType> {
        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_lowercase())
            .unwrap_or_default();

        match FileType::from_extension(&ext) {
            Some(ft) if self.allowed_extensions.iter().any(|a| a == ft.extension()) => Ok(ft),
            _ if ext.is_empty() => Err(ImportError::UnsupportedFormat(file_name.to_string())),
            _ => Err(ImportError::UnsupportedFormat(format!(".{}", ext))),
        }
    }

    fn check_size(&self, size: u64) -> ImportResult<()> {
        if size > self.max_file_bytes {
            return Err(ImportError::FileTooLarge {
                size,
                max: self.max_file_bytes,
            });
        }
        Ok(())
    }

    fn parser_for(file_type: FileType) -> Box<dyn FileParser> {
        match file_type {
            FileType::Csv => Box::new(CsvParser),
            FileType::Xlsx | FileType::Xls => Box::new(ExcelParser::new(file_type)),
            FileType::Json => Box::new(JsonParser),
        }
    }

    /// 解析内存中的文件内容
    pub fn parse_bytes(&self, file_name: &str, bytes: &[u8]) -> ImportResult<ParseResult> {
        let file_type = self.detect(file_name)?;
        self.check_size(bytes.len() as u64)?;
        Self::parser_for(file_type).parse_bytes(bytes)
    }

    /// 解析磁盘文件（超限时不读取内容）
    pub fn parse_file<P: AsRef<Path>>(&self, file_path: P) -> ImportResult<ParseResult> {
        let path = file_path.as_ref();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        let file_type = self.detect(&file_name)?;

        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }
        self.check_size(std::fs::metadata(path)?.len())?;

        let bytes = std::fs::read(path)?;
        Self::parser_for(file_type).parse_bytes(&bytes)
    }
}
