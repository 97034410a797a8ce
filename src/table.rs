use std::collections::HashMap;

/// Logical spreadsheet grid decoupled from any file format. Built by the
/// xlsx parser, consumed by the HTML renderer.
#[derive(Debug, Clone, Default)]
pub struct TableModel {
    pub sheets: Vec<Sheet>,
}

#[derive(Debug, Clone, Default)]
pub struct Sheet {
    pub name: String,
    /// Rows in ascending row order; rows without any populated cell are
    /// absent.
    pub rows: Vec<TableRow>,
    pub merges: Vec<MergeRange>,
}

#[derive(Debug, Clone, Default)]
pub struct TableRow {
    /// 1-based row index.
    pub index: u32,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone)]
pub struct Cell {
    /// 1-based coordinates.
    pub row: u32,
    pub col: u32,
    pub value: CellValue,
    pub bold: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum CellValue {
    #[default]
    Empty,
    Text(String),
    Number(f64),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }
}

/// Inclusive rectangular run of cells rendered as one combined cell at its
/// top-left anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRange {
    pub start_row: u32,
    pub start_col: u32,
    pub end_row: u32,
    pub end_col: u32,
}

impl MergeRange {
    pub fn row_span(&self) -> u32 {
        self.end_row - self.start_row + 1
    }

    pub fn col_span(&self) -> u32 {
        self.end_col - self.start_col + 1
    }

    fn covers(&self, row: u32, col: u32) -> bool {
        row >= self.start_row && row <= self.end_row && col >= self.start_col && col <= self.end_col
    }

    fn is_anchor(&self, row: u32, col: u32) -> bool {
        row == self.start_row && col == self.start_col
    }
}

impl Sheet {
    pub fn column_count(&self) -> u32 {
        let widest = self
            .rows
            .iter()
            .flat_map(|r| r.cells.iter().map(|c| c.col))
            .max()
            .unwrap_or(0);
        let merged = self.merges.iter().map(|m| m.end_col).max().unwrap_or(0);
        widest.max(merged)
    }
}

/// Render the model as a paginated HTML document, one page-break unit per
/// sheet. Cells covered by a merge range contribute no output; the anchor
/// cell is emitted once with its true row/col spans.
pub fn render_html(model: &TableModel) -> String {
    let mut html = String::from(HTML_HEAD);

    for sheet in &model.sheets {
        html.push_str("<div class=\"worksheet\">\n");
        html.push_str(&format!(
            "<div class=\"worksheet-title\">{}</div>\n<table>\n",
            escape_html(&sheet.name)
        ));

        let column_count = sheet.column_count();

        for row in &sheet.rows {
            if row.cells.iter().all(|c| c.value.is_empty()) {
                continue;
            }
            let by_col: HashMap<u32, &Cell> = row.cells.iter().map(|c| (c.col, c)).collect();

            html.push_str("<tr>");
            for col in 1..=column_count {
                if let Some((merge, anchor)) = merge_at(&sheet.merges, row.index, col) {
                    if !anchor {
                        continue;
                    }
                    let cell = by_col.get(&col).copied();
                    html.push_str(&render_cell(cell, Some(merge)));
                } else {
                    html.push_str(&render_cell(by_col.get(&col).copied(), None));
                }
            }
            html.push_str("</tr>\n");
        }

        html.push_str("</table>\n</div>\n");
    }

    html.push_str("</body></html>");
    html
}

fn merge_at(merges: &[MergeRange], row: u32, col: u32) -> Option<(MergeRange, bool)> {
    merges
        .iter()
        .find(|m| m.covers(row, col))
        .map(|m| (*m, m.is_anchor(row, col)))
}

fn render_cell(cell: Option<&Cell>, merge: Option<MergeRange>) -> String {
    let mut classes: Vec<&str> = Vec::new();
    let text = match cell.map(|c| &c.value) {
        Some(CellValue::Number(n)) => {
            classes.push("number");
            format_number(*n)
        }
        Some(CellValue::Text(s)) => escape_html(s),
        Some(CellValue::Empty) | None => String::new(),
    };
    if cell.is_some_and(|c| c.bold) {
        classes.push("bold");
    }
    if merge.is_some() {
        classes.push("merged-cell");
    }

    let mut td = format!("<td class=\"{}\"", classes.join(" "));
    if let Some(m) = merge {
        if m.col_span() > 1 {
            td.push_str(&format!(" colspan=\"{}\"", m.col_span()));
        }
        if m.row_span() > 1 {
            td.push_str(&format!(" rowspan=\"{}\"", m.row_span()));
        }
    }
    td.push('>');
    td.push_str(&text);
    td.push_str("</td>");
    td
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Spreadsheet</title>
  <style>
    @page { size: A4; margin: 0.5in; }
    body {
      font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
      margin: 0; padding: 20px; background: white; color: #333;
    }
    .worksheet { page-break-after: always; margin-bottom: 30px; }
    .worksheet:last-child { page-break-after: auto; }
    .worksheet-title {
      font-size: 20px; font-weight: bold; margin-bottom: 15px;
      color: #2c3e50; border-bottom: 2px solid #3498db; padding-bottom: 5px;
    }
    table { border-collapse: collapse; width: 100%; font-size: 11px; margin-top: 10px; }
    td, th { border: 1px solid #ddd; padding: 6px; text-align: left; vertical-align: top; }
    tr:nth-child(even) { background-color: #f9f9f9; }
    .number { text-align: right; font-family: 'Consolas', 'Courier New', monospace; }
    .bold { font-weight: bold; }
    .merged-cell { text-align: center; font-weight: bold; background-color: #e8f4f8; }
  </style>
</head>
<body>
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: u32, col: u32, value: CellValue) -> Cell {
        Cell {
            row,
            col,
            value,
            bold: false,
        }
    }

    fn one_sheet(rows: Vec<TableRow>, merges: Vec<MergeRange>) -> TableModel {
        TableModel {
            sheets: vec![Sheet {
                name: "Sheet1".into(),
                rows,
                merges,
            }],
        }
    }

    #[test]
    fn merge_emits_one_anchor_and_no_covered_cells() {
        let model = one_sheet(
            vec![
                TableRow {
                    index: 1,
                    cells: vec![
                        cell(1, 1, CellValue::Text("Header".into())),
                        cell(1, 3, CellValue::Text("C".into())),
                    ],
                },
                TableRow {
                    index: 2,
                    cells: vec![cell(2, 3, CellValue::Text("D".into()))],
                },
            ],
            vec![MergeRange {
                start_row: 1,
                start_col: 1,
                end_row: 2,
                end_col: 2,
            }],
        );

        let html = render_html(&model);
        assert_eq!(html.matches("rowspan=\"2\"").count(), 1);
        assert_eq!(html.matches("colspan=\"2\"").count(), 1);
        assert_eq!(html.matches("merged-cell").count(), 2); // CSS class def + 1 cell
        // Row 1: anchor td + plain td for col 3. Row 2: covered cols skipped,
        // only col 3 renders.
        let row2 = html.split("<tr>").nth(2).unwrap();
        assert_eq!(row2.matches("<td").count(), 1);
    }

    #[test]
    fn unsafe_characters_are_escaped() {
        let model = one_sheet(
            vec![TableRow {
                index: 1,
                cells: vec![cell(1, 1, CellValue::Text("<b>&\"'</b>".into()))],
            }],
            vec![],
        );
        let html = render_html(&model);
        assert!(html.contains("&lt;b&gt;&amp;&quot;&#39;&lt;/b&gt;"));
        assert!(!html.contains("<b>&\"'</b>"));
    }

    #[test]
    fn numbers_get_number_class_and_bold_gets_bold_class() {
        let model = one_sheet(
            vec![TableRow {
                index: 1,
                cells: vec![
                    cell(1, 1, CellValue::Number(42.0)),
                    Cell {
                        row: 1,
                        col: 2,
                        value: CellValue::Text("t".into()),
                        bold: true,
                    },
                ],
            }],
            vec![],
        );
        let html = render_html(&model);
        assert!(html.contains("<td class=\"number\">42</td>"));
        assert!(html.contains("<td class=\"bold\">t</td>"));
    }

    #[test]
    fn empty_rows_are_skipped() {
        let model = one_sheet(
            vec![
                TableRow {
                    index: 1,
                    cells: vec![cell(1, 1, CellValue::Empty)],
                },
                TableRow {
                    index: 2,
                    cells: vec![cell(2, 1, CellValue::Text("x".into()))],
                },
            ],
            vec![],
        );
        let html = render_html(&model);
        assert_eq!(html.matches("<tr>").count(), 1);
    }

    #[test]
    fn one_sheet_per_page_break_unit() {
        let model = TableModel {
            sheets: vec![
                Sheet {
                    name: "A".into(),
                    ..Default::default()
                },
                Sheet {
                    name: "B".into(),
                    ..Default::default()
                },
            ],
        };
        let html = render_html(&model);
        assert_eq!(html.matches("class=\"worksheet\"").count(), 2);
    }
}
