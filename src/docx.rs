//! Minimal docx reader: extracts body paragraphs (heading levels, bold and
//! italic runs, line breaks) from `word/document.xml` and renders them as a
//! printable HTML document for the browser strategy.

use std::io::{Cursor, Read};

use roxmltree::{Document, Node};
use zip::ZipArchive;

use crate::error::{ConvertError, Result};
use crate::table::escape_html;

fn is_elem(n: &Node, name: &str) -> bool {
    n.is_element() && n.tag_name().name() == name
}

pub fn to_html(data: &[u8]) -> Result<String> {
    let mut archive = ZipArchive::new(Cursor::new(data))
        .map_err(|e| ConvertError::Validation(format!("not a valid docx archive: {e}")))?;

    let mut xml = String::new();
    archive
        .by_name("word/document.xml")
        .map_err(|_| ConvertError::Validation("docx has no word/document.xml".into()))?
        .read_to_string(&mut xml)?;

    let doc = Document::parse(&xml)
        .map_err(|e| ConvertError::Validation(format!("malformed docx xml: {e}")))?;

    let body = doc
        .root_element()
        .children()
        .find(|n| is_elem(n, "body"))
        .ok_or_else(|| ConvertError::Validation("docx document has no body".into()))?;

    let mut out = String::from(HTML_HEAD);
    for node in body.children() {
        if is_elem(&node, "p") {
            out.push_str(&render_paragraph(&node));
        }
    }
    out.push_str("</body></html>");
    Ok(out)
}

fn render_paragraph(p: &Node) -> String {
    let tag = heading_tag(p).unwrap_or("p");

    let mut inner = String::new();
    for run in p.descendants().filter(|n| is_elem(n, "r")) {
        inner.push_str(&render_run(&run));
    }

    if inner.is_empty() {
        // Keep empty paragraphs as vertical whitespace.
        return "<p>&nbsp;</p>\n".to_string();
    }
    format!("<{tag}>{inner}</{tag}>\n")
}

fn heading_tag(p: &Node) -> Option<&'static str> {
    let style = p
        .children()
        .find(|n| is_elem(n, "pPr"))?
        .children()
        .find(|n| is_elem(n, "pStyle"))?
        .attributes()
        .find(|a| a.name() == "val")?
        .value()
        .to_lowercase();

    match style.as_str() {
        "heading1" | "title" => Some("h1"),
        "heading2" => Some("h2"),
        "heading3" => Some("h3"),
        _ => None,
    }
}

fn render_run(run: &Node) -> String {
    let props = run.children().find(|n| is_elem(n, "rPr"));
    let has_prop = |name: &str| {
        props.is_some_and(|p| {
            p.children().any(|n| {
                is_elem(&n, name)
                    && n.attributes()
                        .find(|a| a.name() == "val")
                        .map_or(true, |a| a.value() != "false" && a.value() != "0")
            })
        })
    };
    let bold = has_prop("b");
    let italic = has_prop("i");

    let mut text = String::new();
    for child in run.children() {
        if is_elem(&child, "t") {
            text.push_str(&escape_html(child.text().unwrap_or("")));
        } else if is_elem(&child, "br") {
            text.push_str("<br>");
        } else if is_elem(&child, "tab") {
            text.push_str("&emsp;");
        }
    }

    if bold {
        text = format!("<strong>{text}</strong>");
    }
    if italic {
        text = format!("<em>{text}</em>");
    }
    text
}

const HTML_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
  <meta charset="utf-8">
  <title>Document</title>
  <style>
    @page { size: A4; margin: 1in; }
    body {
      font-family: 'Segoe UI', Tahoma, Geneva, Verdana, sans-serif;
      margin: 0; padding: 20px; line-height: 1.5; color: #333;
    }
    h1, h2, h3 { color: #2c3e50; }
    p { margin: 0 0 10px 0; }
  </style>
</head>
<body>
"#;
