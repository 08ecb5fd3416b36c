//! Minimal reader for `citations.bib` sidecars.
//!
//! Only what citation aggregation needs: the entry key, its type, its
//! fields, and the raw entry text so it can be written back unchanged.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibEntry {
    pub key: String,
    pub entry_type: String,
    /// Field names lowercased, values with outer braces/quotes removed.
    pub fields: BTreeMap<String, String>,
    pub raw: String,
}

impl BibEntry {
    pub fn doi(&self) -> Option<&str> {
        self.fields
            .get("doi")
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
    }
}

/// Parse every entry in a BibTeX document. Malformed entries are skipped and
/// their error text returned alongside the entries that did parse.
pub fn parse_bibtex(text: &str) -> (Vec<BibEntry>, Vec<String>) {
    let bytes = text.as_bytes();
    let mut entries = Vec::new();
    let mut errors = Vec::new();
    let mut pos = 0;

    while let Some(offset) = text[pos..].find('@') {
        let start = pos + offset;
        match parse_entry(text, start) {
            Ok((entry, end)) => {
                if let Some(entry) = entry {
                    entries.push(entry);
                }
                pos = end;
            }
            Err(err) => {
                errors.push(err);
                pos = start + 1;
            }
        }
        if pos >= bytes.len() {
            break;
        }
    }
    (entries, errors)
}

fn parse_entry(text: &str, start: usize) -> Result<(Option<BibEntry>, usize), String> {
    let rest = &text[start + 1..];
    let open = rest
        .find(['{', '('])
        .ok_or_else(|| format!("entry at offset {} has no body", start))?;
    let entry_type = rest[..open].trim().to_ascii_lowercase();
    if entry_type.is_empty() || !entry_type.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(format!("entry at offset {} has no type", start));
    }

    let body_start = start + 1 + open + 1;
    let close_char = if rest.as_bytes()[open] == b'(' { ')' } else { '}' };
    let body_end = matching_close(text, body_start, close_char)
        .ok_or_else(|| format!("entry at offset {} is unterminated", start))?;
    let end = body_end + 1;

    if matches!(entry_type.as_str(), "comment" | "preamble" | "string") {
        return Ok((None, end));
    }

    let body = &text[body_start..body_end];
    let (key, fields_text) = match body.find(',') {
        Some(comma) => (body[..comma].trim(), &body[comma + 1..]),
        None => (body.trim(), ""),
    };
    if key.is_empty() {
        return Err(format!("{} entry at offset {} has no key", entry_type, start));
    }

    Ok((
        Some(BibEntry {
            key: key.to_string(),
            entry_type,
            fields: parse_fields(fields_text),
            raw: text[start..end].to_string(),
        }),
        end,
    ))
}

/// Index of the delimiter closing a body that opened just before `from`.
fn matching_close(text: &str, from: usize, close: char) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_quotes = false;
    for (idx, ch) in text[from..].char_indices() {
        match ch {
            '"' if depth == 0 && close == '}' => in_quotes = !in_quotes,
            '{' => depth += 1,
            '}' if depth > 0 => depth -= 1,
            c if c == close && depth == 0 && !in_quotes => return Some(from + idx),
            _ => {}
        }
    }
    None
}

fn parse_fields(text: &str) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    let chars: Vec<char> = text.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        while i < chars.len() && (chars[i].is_whitespace() || chars[i] == ',') {
            i += 1;
        }
        let name_start = i;
        while i < chars.len() && chars[i] != '=' {
            i += 1;
        }
        if i >= chars.len() {
            break;
        }
        let name: String = chars[name_start..i].iter().collect::<String>().trim().to_ascii_lowercase();
        i += 1;
        while i < chars.len() && chars[i].is_whitespace() {
            i += 1;
        }

        let mut value = String::new();
        if i < chars.len() && chars[i] == '{' {
            let mut depth = 0usize;
            while i < chars.len() {
                let c = chars[i];
                if c == '{' {
                    depth += 1;
                    if depth > 1 {
                        value.push(c);
                    }
                } else if c == '}' {
                    depth -= 1;
                    if depth == 0 {
                        i += 1;
                        break;
                    }
                    value.push(c);
                } else {
                    value.push(c);
                }
                i += 1;
            }
        } else if i < chars.len() && chars[i] == '"' {
            i += 1;
            while i < chars.len() && chars[i] != '"' {
                value.push(chars[i]);
                i += 1;
            }
            i += 1;
        } else {
            while i < chars.len() && chars[i] != ',' {
                value.push(chars[i]);
                i += 1;
            }
        }

        if !name.is_empty() {
            fields.insert(name, value.trim().to_string());
        }
    }
    fields
}
