const MAX_COLUMN_WIDTH: usize = 40;
const COLUMN_GAP: &str = "  ";

/// 固定寬度的 console 表格，欄寬依內容決定並以 `MAX_COLUMN_WIDTH` 為上限
pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| cell_width(h)).collect();
    for row in rows {
        for (index, cell) in row.iter().enumerate() {
            if let Some(width) = widths.get_mut(index) {
                *width = (*width).max(cell_width(cell));
            }
        }
    }

    let mut out = String::new();
    push_line(&mut out, headers, &widths);
    let rule: Vec<String> = widths.iter().map(|w| "-".repeat(*w)).collect();
    push_line(&mut out, &rule, &widths);
    for row in rows {
        push_line(&mut out, row, &widths);
    }
    out
}

/// 兩欄的 key/value 表格 (metrics 之類的單筆資料)
pub fn render_key_values(pairs: &[(String, String)]) -> String {
    let key_width = pairs
        .iter()
        .map(|(k, _)| k.chars().count())
        .max()
        .unwrap_or(0);

    pairs
        .iter()
        .map(|(key, value)| format!("{:<width$}{}{}\n", key, COLUMN_GAP, value, width = key_width))
        .collect()
}

fn cell_width(text: &str) -> usize {
    text.chars().count().min(MAX_COLUMN_WIDTH)
}

fn fit(text: &str, width: usize) -> String {
    // 換行會破壞對齊
    let flat = text.replace(['\n', '\r', '\t'], " ");
    let length = flat.chars().count();
    if length <= width {
        return format!("{}{}", flat, " ".repeat(width - length));
    }
    let kept: String = flat.chars().take(width.saturating_sub(3)).collect();
    format!("{}...", kept)
}

fn push_line(out: &mut String, cells: &[String], widths: &[usize]) {
    let line: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(index, width)| fit(cells.get(index).map(String::as_str).unwrap_or(""), *width))
        .collect();
    out.push_str(line.join(COLUMN_GAP).trim_end());
    out.push('\n');
}
