//! Parse and render the `dataentry` block of a wiki page.
//!
//! ```text
//! ---- dataentry device ----
//! Name            : MacBook Pro 13"
//! Typ_devicetypes : Laptop, PC
//! Von_dt          : 2024-01-15
//! Anmerkungen     : Ladegerät \# 2 fehlt   # unescaped hash starts a comment
//! ----
//! ```
//!
//! Columns whose type suffix ends in `s` (`Typ_devicetypes`) are multi-valued
//! and come back as [`RawValue::List`]; everything else is a scalar.
//! Every `key : value` pair occupies exactly one line, so values containing
//! line breaks are refused on write.

use crate::model::{RawRecord, RawValue};

const HEADER_PREFIX: &str = "---- dataentry";
const FOOTER: &str = "----";

/// A parsed dataentry block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataentry {
    /// Class name from the header line (`device` in `---- dataentry device ----`).
    pub class: String,
    pub record: RawRecord,
}

/// Reasons a record cannot be written into a page.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DataentryError {
    #[error("page has no dataentry block")]
    NoBlock,

    #[error("value of {key} spans more than one line")]
    LineBreak { key: String },
}

/// Whether values of `key` are comma-separated lists.
#[must_use]
pub fn is_multi_valued(key: &str) -> bool {
    key.rsplit_once('_')
        .is_some_and(|(_, ty)| ty.len() > 1 && ty.ends_with('s'))
}

/// Parse the first dataentry block in `page_text`.
///
/// Returns `None` when the page carries no block at all.
#[must_use]
pub fn parse(page_text: &str) -> Option<Dataentry> {
    let (start, end) = locate(page_text)?;
    let lines: Vec<&str> = page_text.lines().collect();
    let class = header_class(lines[start]);

    let mut record = RawRecord::new();
    for line in &lines[start + 1..end] {
        if let Some((key, value)) = parse_line(line) {
            record.insert(key, value);
        }
    }

    Some(Dataentry { class, record })
}

/// Render a complete block for `record`, keys in record order.
///
/// # Errors
///
/// [`DataentryError::LineBreak`] if a key or value contains a line break.
pub fn render(class: &str, record: &RawRecord) -> Result<String, DataentryError> {
    let width = record.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    let mut out = format!("{HEADER_PREFIX} {class} ----\n");
    for (key, value) in record {
        out.push_str(&render_line(key, value, width)?);
        out.push('\n');
    }
    out.push_str(FOOTER);
    out.push('\n');
    Ok(out)
}

/// Rewrite the first dataentry block of `page_text` with `record`.
///
/// Existing lines keep their position. Keys listed in `managed` but missing
/// from `record` are written empty; other existing keys are left alone.
/// Keys new to the page are appended before the footer.
///
/// # Errors
///
/// [`DataentryError::NoBlock`] if the page has no block to rewrite and
/// [`DataentryError::LineBreak`] if a written value spans several lines.
pub fn replace_block(
    page_text: &str,
    record: &RawRecord,
    managed: &[&str],
) -> Result<String, DataentryError> {
    let (start, end) = locate(page_text).ok_or(DataentryError::NoBlock)?;
    let lines: Vec<&str> = page_text.lines().collect();

    let mut body: Vec<(String, Option<RawValue>, &str)> = Vec::new();
    for &line in &lines[start + 1..end] {
        match parse_line(line) {
            Some((key, old)) => {
                let value = match record.get(&key) {
                    Some(new) => Some(new.clone()),
                    None if managed.contains(&key.as_str()) => Some(RawValue::Scalar(String::new())),
                    None => Some(old),
                };
                body.push((key, value, line));
            }
            None => body.push((String::new(), None, line)),
        }
    }
    for (key, value) in record {
        if !body.iter().any(|(k, _, _)| k == key) {
            body.push((key.clone(), Some(value.clone()), ""));
        }
    }

    let width = body
        .iter()
        .filter(|(_, v, _)| v.is_some())
        .map(|(k, _, _)| k.chars().count())
        .max()
        .unwrap_or(0);

    let mut out: Vec<String> = lines[..=start].iter().map(|l| (*l).to_string()).collect();
    for (key, value, original) in body {
        match value {
            Some(value) => out.push(render_line(&key, &value, width)?),
            None => out.push(original.to_string()),
        }
    }
    out.extend(lines[end..].iter().map(|l| (*l).to_string()));

    let mut text = out.join("\n");
    if page_text.ends_with('\n') {
        text.push('\n');
    }
    Ok(text)
}

/// Line indices of the header and footer of the first block.
fn locate(page_text: &str) -> Option<(usize, usize)> {
    let lines: Vec<&str> = page_text.lines().collect();
    let start = lines
        .iter()
        .position(|l| l.trim_start().starts_with(HEADER_PREFIX))?;
    let end = lines[start + 1..]
        .iter()
        .position(|l| l.trim() == FOOTER)
        .map_or(lines.len(), |offset| start + 1 + offset);
    Some((start, end))
}

fn header_class(header: &str) -> String {
    header
        .trim()
        .trim_start_matches(HEADER_PREFIX)
        .trim_end_matches('-')
        .trim()
        .to_string()
}

fn parse_line(line: &str) -> Option<(String, RawValue)> {
    let content = strip_comment(line);
    let (key, value) = content.split_once(':')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = value.trim();

    let value = if is_multi_valued(key) {
        if value.is_empty() {
            RawValue::Scalar(String::new())
        } else {
            RawValue::List(value.split(',').map(|v| v.trim().to_string()).collect())
        }
    } else {
        RawValue::Scalar(value.to_string())
    };
    Some((key.to_string(), value))
}

/// Drop everything after an unescaped `#` and unescape `\#`.
fn strip_comment(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\\' if chars.peek() == Some(&'#') => {
                out.push('#');
                chars.next();
            }
            '#' => break,
            _ => out.push(c),
        }
    }
    out
}

fn render_line(key: &str, value: &RawValue, width: usize) -> Result<String, DataentryError> {
    let text = value.to_string();
    if [key, text.as_str()].iter().any(|s| s.contains(['\n', '\r'])) {
        return Err(DataentryError::LineBreak {
            key: key.to_string(),
        });
    }
    let text = text.replace('#', "\\#");
    let line = format!("{key:<width$} : {text}");
    Ok(line.trim_end().to_string())
}
