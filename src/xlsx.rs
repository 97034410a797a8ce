//! Minimal xlsx reader: just enough of the OOXML spreadsheet format to build
//! a `TableModel` (values, bold runs, merged ranges). Formatting beyond bold
//! is ignored.

use std::collections::HashMap;
use std::io::{Cursor, Read};

use roxmltree::Document;
use zip::ZipArchive;

use crate::error::{ConvertError, Result};
use crate::table::{Cell, CellValue, MergeRange, Sheet, TableModel, TableRow};

/// Local-name element match; OOXML parts live in a default namespace.
fn is_elem(n: &roxmltree::Node, name: &str) -> bool {
    n.is_element() && n.tag_name().name() == name
}

pub fn parse(data: &[u8]) -> Result<TableModel> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| ConvertError::Validation(format!("not a valid xlsx archive: {e}")))?;

    let shared_strings = read_entry(&mut archive, "xl/sharedStrings.xml")?
        .map(|xml| parse_shared_strings(&xml))
        .transpose()?
        .unwrap_or_default();

    let bold_xfs = read_entry(&mut archive, "xl/styles.xml")?
        .map(|xml| parse_bold_xfs(&xml))
        .transpose()?
        .unwrap_or_default();

    let workbook = read_entry(&mut archive, "xl/workbook.xml")?
        .ok_or_else(|| ConvertError::Validation("xlsx has no workbook.xml".into()))?;
    let rels = read_entry(&mut archive, "xl/_rels/workbook.xml.rels")?.unwrap_or_default();
    let sheet_refs = parse_sheet_refs(&workbook, &rels)?;

    let mut sheets = Vec::new();
    for (name, path) in sheet_refs {
        let Some(xml) = read_entry(&mut archive, &path)? else {
            continue;
        };
        sheets.push(parse_sheet(&name, &xml, &shared_strings, &bold_xfs)?);
    }

    if sheets.is_empty() {
        return Err(ConvertError::Validation(
            "xlsx contains no worksheets".into(),
        ));
    }

    Ok(TableModel { sheets })
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Result<Option<String>> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut xml = String::new();
            entry.read_to_string(&mut xml)?;
            Ok(Some(xml))
        }
        Err(zip::result::ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(ConvertError::Validation(format!(
            "corrupt xlsx entry {name}: {e}"
        ))),
    }
}

fn parse_xml(xml: &str) -> Result<Document<'_>> {
    Document::parse(xml).map_err(|e| ConvertError::Validation(format!("malformed xlsx xml: {e}")))
}

/// Shared string table: each `<si>` is either a plain `<t>` or a sequence of
/// rich-text runs whose `<t>` contents concatenate.
fn parse_shared_strings(xml: &str) -> Result<Vec<String>> {
    let doc = parse_xml(xml)?;
    let mut strings = Vec::new();
    for si in doc
        .root_element()
        .children()
        .filter(|n| is_elem(n, "si"))
    {
        let text: String = si
            .descendants()
            .filter(|n| is_elem(n, "t"))
            .filter_map(|n| n.text())
            .collect();
        strings.push(text);
    }
    Ok(strings)
}

/// Map cell format indices (`s` attribute) to "is the font bold".
fn parse_bold_xfs(xml: &str) -> Result<Vec<bool>> {
    let doc = parse_xml(xml)?;
    let root = doc.root_element();

    let bold_fonts: Vec<bool> = root
        .children()
        .find(|n| is_elem(n, "fonts"))
        .map(|fonts| {
            fonts
                .children()
                .filter(|n| is_elem(n, "font"))
                .map(|f| f.children().any(|c| is_elem(&c, "b")))
                .collect()
        })
        .unwrap_or_default();

    let xfs = root
        .children()
        .find(|n| is_elem(n, "cellXfs"))
        .map(|cell_xfs| {
            cell_xfs
                .children()
                .filter(|n| is_elem(n, "xf"))
                .map(|xf| {
                    xf.attribute("fontId")
                        .and_then(|id| id.parse::<usize>().ok())
                        .and_then(|id| bold_fonts.get(id).copied())
                        .unwrap_or(false)
                })
                .collect()
        })
        .unwrap_or_default();

    Ok(xfs)
}

/// Sheet names in workbook order resolved to worksheet part paths through the
/// relationship table; sheets without a resolvable part fall back to the
/// conventional sheetN.xml path.
fn parse_sheet_refs(workbook: &str, rels: &str) -> Result<Vec<(String, String)>> {
    let rel_targets: HashMap<String, String> = if rels.is_empty() {
        HashMap::new()
    } else {
        let doc = parse_xml(rels)?;
        doc.root_element()
            .children()
            .filter(|n| is_elem(n, "Relationship"))
            .filter_map(|n| {
                let id = n.attribute("Id")?.to_string();
                let target = n.attribute("Target")?.trim_start_matches('/').to_string();
                let target = if target.starts_with("xl/") {
                    target
                } else {
                    format!("xl/{target}")
                };
                Some((id, target))
            })
            .collect()
    };

    let doc = parse_xml(workbook)?;
    let mut refs = Vec::new();
    let sheets = doc
        .root_element()
        .children()
        .find(|n| is_elem(n, "sheets"));
    if let Some(sheets) = sheets {
        for (idx, sheet) in sheets
            .children()
            .filter(|n| is_elem(n, "sheet"))
            .enumerate()
        {
            let name = sheet.attribute("name").unwrap_or("Sheet").to_string();
            let rid = sheet.attributes().find(|a| a.name() == "id");
            let path = rid
                .and_then(|a| rel_targets.get(a.value()).cloned())
                .unwrap_or_else(|| format!("xl/worksheets/sheet{}.xml", idx + 1));
            refs.push((name, path));
        }
    }
    Ok(refs)
}

fn parse_sheet(
    name: &str,
    xml: &str,
    shared_strings: &[String],
    bold_xfs: &[bool],
) -> Result<Sheet> {
    let doc = parse_xml(xml)?;
    let root = doc.root_element();

    let mut rows = Vec::new();
    if let Some(sheet_data) = root.children().find(|n| is_elem(n, "sheetData")) {
        for row_node in sheet_data.children().filter(|n| is_elem(n, "row")) {
            let row_index: u32 = row_node
                .attribute("r")
                .and_then(|r| r.parse().ok())
                .unwrap_or(rows.len() as u32 + 1);

            let mut cells = Vec::new();
            for c in row_node.children().filter(|n| is_elem(n, "c")) {
                let Some((_, col)) = c.attribute("r").and_then(parse_cell_ref) else {
                    continue;
                };
                let bold = c
                    .attribute("s")
                    .and_then(|s| s.parse::<usize>().ok())
                    .and_then(|s| bold_xfs.get(s).copied())
                    .unwrap_or(false);
                let value = parse_cell_value(&c, shared_strings);
                cells.push(Cell {
                    row: row_index,
                    col,
                    value,
                    bold,
                });
            }
            rows.push(TableRow {
                index: row_index,
                cells,
            });
        }
    }

    let merges = root
        .children()
        .find(|n| is_elem(n, "mergeCells"))
        .map(|mc| {
            mc.children()
                .filter(|n| is_elem(n, "mergeCell"))
                .filter_map(|n| n.attribute("ref").and_then(parse_merge_ref))
                .collect()
        })
        .unwrap_or_default();

    Ok(Sheet {
        name: name.to_string(),
        rows,
        merges,
    })
}

fn parse_cell_value(c: &roxmltree::Node, shared_strings: &[String]) -> CellValue {
    let v_text = || {
        c.children()
            .find(|n| is_elem(n, "v"))
            .and_then(|n| n.text())
            .map(str::to_string)
    };

    match c.attribute("t") {
        Some("s") => v_text()
            .and_then(|v| v.parse::<usize>().ok())
            .and_then(|i| shared_strings.get(i).cloned())
            .map(CellValue::Text)
            .unwrap_or_default(),
        Some("inlineStr") => {
            let text: String = c
                .descendants()
                .filter(|n| is_elem(n, "t"))
                .filter_map(|n| n.text())
                .collect();
            if text.is_empty() {
                CellValue::Empty
            } else {
                CellValue::Text(text)
            }
        }
        Some("str") => v_text().map(CellValue::Text).unwrap_or_default(),
        Some("b") => v_text()
            .map(|v| CellValue::Text(if v == "1" { "TRUE" } else { "FALSE" }.into()))
            .unwrap_or_default(),
        // Default cell type is numeric.
        _ => match v_text() {
            Some(v) => v
                .parse::<f64>()
                .map(CellValue::Number)
                .unwrap_or(CellValue::Text(v)),
            None => CellValue::Empty,
        },
    }
}

/// "BC12" -> (12, 55). Column letters are base-26 with A=1.
fn parse_cell_ref(r: &str) -> Option<(u32, u32)> {
    let split = r.find(|ch: char| ch.is_ascii_digit())?;
    let (letters, digits) = r.split_at(split);
    let row: u32 = digits.parse().ok()?;
    let mut col: u32 = 0;
    for ch in letters.chars() {
        let v = (ch.to_ascii_uppercase() as u32).checked_sub('A' as u32)?;
        if v > 25 {
            return None;
        }
        col = col * 26 + v + 1;
    }
    if col == 0 {
        return None;
    }
    Some((row, col))
}

/// "A1:B2" -> inclusive merge range.
fn parse_merge_ref(r: &str) -> Option<MergeRange> {
    let (start, end) = r.split_once(':')?;
    let (start_row, start_col) = parse_cell_ref(start)?;
    let (end_row, end_col) = parse_cell_ref(end)?;
    Some(MergeRange {
        start_row: start_row.min(end_row),
        start_col: start_col.min(end_col),
        end_row: start_row.max(end_row),
        end_col: start_col.max(end_col),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    fn build_xlsx(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            for (name, content) in entries {
                writer
                    .start_file(name.to_string(), SimpleFileOptions::default())
                    .unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
            writer.finish().unwrap();
        }
        buf.into_inner()
    }

    const WORKBOOK: &str = r#"<?xml version="1.0"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheets><sheet name="Datos" sheetId="1" r:id="rId1"
    xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"/></sheets>
</workbook>"#;

    const RELS: &str = r#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
  <Relationship Id="rId1" Type="t" Target="worksheets/sheet1.xml"/>
</Relationships>"#;

    #[test]
    fn parses_values_merges_and_bold() {
        let sheet = r#"<?xml version="1.0"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <sheetData>
    <row r="1">
      <c r="A1" t="s" s="1"><v>0</v></c>
      <c r="C1"><v>12.5</v></c>
    </row>
    <row r="2"><c r="A2" t="str"><v>plain</v></c></row>
  </sheetData>
  <mergeCells count="1"><mergeCell ref="A1:B2"/></mergeCells>
</worksheet>"#;
        let shared = r#"<?xml version="1.0"?>
<sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><si><t>Titulo</t></si></sst>"#;
        let styles = r#"<?xml version="1.0"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
  <fonts><font/><font><b/></font></fonts>
  <cellXfs><xf fontId="0"/><xf fontId="1"/></cellXfs>
</styleSheet>"#;

        let data = build_xlsx(&[
            ("xl/workbook.xml", WORKBOOK),
            ("xl/_rels/workbook.xml.rels", RELS),
            ("xl/sharedStrings.xml", shared),
            ("xl/styles.xml", styles),
            ("xl/worksheets/sheet1.xml", sheet),
        ]);

        let model = parse(&data).unwrap();
        assert_eq!(model.sheets.len(), 1);
        let s = &model.sheets[0];
        assert_eq!(s.name, "Datos");
        assert_eq!(
            s.merges,
            vec![MergeRange {
                start_row: 1,
                start_col: 1,
                end_row: 2,
                end_col: 2
            }]
        );
        let a1 = &s.rows[0].cells[0];
        assert_eq!(a1.value, CellValue::Text("Titulo".into()));
        assert!(a1.bold);
        assert_eq!(s.rows[0].cells[1].value, CellValue::Number(12.5));
        assert_eq!(s.rows[1].cells[0].value, CellValue::Text("plain".into()));
    }

    #[test]
    fn rejects_non_zip_payload() {
        let err = parse(b"definitely not a zip").unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }

    #[test]
    fn cell_refs_decode_columns() {
        assert_eq!(parse_cell_ref("A1"), Some((1, 1)));
        assert_eq!(parse_cell_ref("Z9"), Some((9, 26)));
        assert_eq!(parse_cell_ref("AA10"), Some((10, 27)));
        assert_eq!(parse_cell_ref("BC12"), Some((12, 55)));
        assert_eq!(parse_cell_ref("12"), None);
    }
}
