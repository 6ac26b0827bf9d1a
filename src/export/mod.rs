//! Transcript export. TXT is the exact transcript bytes and therefore
//! byte-identical across runs; DOCX is a simple one-paragraph-per-line
//! document built with docx-rs. Summaries arrive as markdown and get a
//! markdown-aware DOCX rendering (headings, bold, italics, bullet lists).

use docx_rs::{Docx, Paragraph, Run};
use std::path::Path;

use crate::{Result, ScribeError};

/// Write the transcript as UTF-8 plain text
pub fn write_txt(text: &str, path: &Path) -> Result<()> {
    fs_err::write(path, text.as_bytes())
        .map_err(|e| ScribeError::Export(format!("{}: {}", path.display(), e)))?;
    Ok(())
}

/// Write the transcript as a DOCX document, one paragraph per non-empty line
pub fn write_docx(text: &str, path: &Path) -> Result<()> {
    let mut docx = Docx::new();

    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }
        docx = docx.add_paragraph(Paragraph::new().add_run(Run::new().add_text(line)));
    }

    let file = fs_err::File::create(path)
        .map_err(|e| ScribeError::Export(format!("{}: {}", path.display(), e)))?;

    docx.build()
        .pack(file)
        .map_err(|e| ScribeError::Export(format!("{}: {}", path.display(), e)))?;

    Ok(())
}

/// Write markdown text as a DOCX document with rendered formatting:
/// `#`/`##`/`###` headings, `**bold**`, `*italic*` and `-`/`*` bullet lists
pub fn write_docx_markdown(text: &str, path: &Path) -> Result<()> {
    let mut docx = Docx::new();

    for line in text.lines() {
        let line = line.trim_end();
        if line.trim().is_empty() {
            continue;
        }

        let paragraph = if let Some(title) = line.strip_prefix("### ") {
            Paragraph::new().add_run(Run::new().add_text(title).bold().size(26))
        } else if let Some(title) = line.strip_prefix("## ") {
            Paragraph::new().add_run(Run::new().add_text(title).bold().size(28))
        } else if let Some(title) = line.strip_prefix("# ") {
            Paragraph::new().add_run(Run::new().add_text(title).bold().size(32))
        } else if let Some(item) = line.strip_prefix("- ").or_else(|| line.strip_prefix("* ")) {
            let mut p = Paragraph::new().add_run(Run::new().add_text("\u{2022} "));
            for run in inline_runs(item) {
                p = p.add_run(run);
            }
            p
        } else {
            let mut p = Paragraph::new();
            for run in inline_runs(line) {
                p = p.add_run(run);
            }
            p
        };

        docx = docx.add_paragraph(paragraph);
    }

    let file = fs_err::File::create(path)
        .map_err(|e| ScribeError::Export(format!("{}: {}", path.display(), e)))?;

    docx.build()
        .pack(file)
        .map_err(|e| ScribeError::Export(format!("{}: {}", path.display(), e)))?;

    Ok(())
}

#[derive(Debug, PartialEq)]
enum Span {
    Plain(String),
    Bold(String),
    Italic(String),
}

/// Turn one markdown line into styled runs
fn inline_runs(line: &str) -> Vec<Run> {
    parse_spans(line)
        .into_iter()
        .map(|span| match span {
            Span::Plain(t) => Run::new().add_text(t),
            Span::Bold(t) => Run::new().add_text(t).bold(),
            Span::Italic(t) => Run::new().add_text(t).italic(),
        })
        .collect()
}

/// Split a line into plain, `**bold**` and `*italic*` spans.
///
/// Unbalanced markers are left in the text as-is.
fn parse_spans(line: &str) -> Vec<Span> {
    let mut spans = Vec::new();
    let mut rest = line;

    loop {
        match rest.find("**").and_then(|start| {
            rest[start + 2..].find("**").map(|len| (start, len))
        }) {
            Some((start, len)) => {
                if start > 0 {
                    parse_italics(&rest[..start], &mut spans);
                }
                let inner = &rest[start + 2..start + 2 + len];
                if !inner.is_empty() {
                    spans.push(Span::Bold(inner.to_string()));
                }
                rest = &rest[start + 2 + len + 2..];
            }
            None => {
                parse_italics(rest, &mut spans);
                break;
            }
        }
    }

    spans
}

fn parse_italics(text: &str, spans: &mut Vec<Span>) {
    let mut rest = text;

    loop {
        match rest.find('*').and_then(|start| {
            rest[start + 1..].find('*').map(|len| (start, len))
        }) {
            Some((start, len)) => {
                if start > 0 {
                    spans.push(Span::Plain(rest[..start].to_string()));
                }
                let inner = &rest[start + 1..start + 1 + len];
                if !inner.is_empty() {
                    spans.push(Span::Italic(inner.to_string()));
                }
                rest = &rest[start + 1 + len + 1..];
            }
            None => {
                if !rest.is_empty() {
                    spans.push(Span::Plain(rest.to_string()));
                }
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn txt_export_is_byte_identical() {
        let tmp = tempfile::tempdir().unwrap();
        let first = tmp.path().join("a.txt");
        let second = tmp.path().join("b.txt");

        let transcript = "Первый абзац.\n\nSecond paragraph.";
        write_txt(transcript, &first).unwrap();
        write_txt(transcript, &second).unwrap();

        assert_eq!(
            fs_err::read(&first).unwrap(),
            fs_err::read(&second).unwrap()
        );
        assert_eq!(
            fs_err::read_to_string(&first).unwrap(),
            transcript
        );
    }

    #[test]
    fn docx_export_is_a_zip_package() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out.docx");

        write_docx("First paragraph.\n\nSecond paragraph.", &path).unwrap();

        let bytes = fs_err::read(&path).unwrap();
        // DOCX is an OOXML zip package
        assert!(bytes.len() > 4);
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn markdown_spans_split_bold_and_italic() {
        assert_eq!(
            parse_spans("a **key fact** and a *term* here"),
            vec![
                Span::Plain("a ".to_string()),
                Span::Bold("key fact".to_string()),
                Span::Plain(" and a ".to_string()),
                Span::Italic("term".to_string()),
                Span::Plain(" here".to_string()),
            ]
        );
    }

    #[test]
    fn unbalanced_markers_stay_plain() {
        assert_eq!(
            parse_spans("2 * 3 equals 6"),
            vec![Span::Plain("2 * 3 equals 6".to_string())]
        );
        assert_eq!(
            parse_spans("no markers at all"),
            vec![Span::Plain("no markers at all".to_string())]
        );
    }

    #[test]
    fn markdown_docx_is_a_zip_package() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("summary.docx");

        write_docx_markdown(
            "## Раздел\nКлючевой **факт** и *термин*.\n- первый пункт\n- второй пункт",
            &path,
        )
        .unwrap();

        let bytes = fs_err::read(&path).unwrap();
        assert!(bytes.len() > 4);
        assert_eq!(&bytes[..2], b"PK");
    }

    #[test]
    fn docx_export_of_empty_text_still_builds() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("empty.docx");
        write_docx("", &path).unwrap();
        assert!(path.exists());
    }
}
