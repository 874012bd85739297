//! Summary index linking every converted document

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};

/// Render the index document
///
/// Pure: the same title, outputs and timestamp always yield the same bytes.
/// Links are file names relative to the index, in the order given.
pub fn build_index(title: &str, outputs: &[PathBuf], generated_at: DateTime<Utc>) -> String {
    let title = escape(title);
    let timestamp = generated_at.to_rfc3339_opts(SecondsFormat::Secs, true);

    let mut html = String::new();
    html.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n");
    html.push_str("<meta charset=\"utf-8\">\n");
    let _ = writeln!(html, "<title>{}</title>", title);
    html.push_str("</head>\n<body>\n");
    let _ = writeln!(html, "<h1>{}</h1>", title);
    let _ = writeln!(
        html,
        "<p>Generated <time datetime=\"{ts}\">{ts}</time> &middot; {} document{}</p>",
        outputs.len(),
        if outputs.len() == 1 { "" } else { "s" },
        ts = timestamp,
    );

    html.push_str("<ul>\n");
    for output in outputs {
        let name = output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| output.display().to_string());
        let name = escape(&name);
        let _ = writeln!(html, "  <li><a href=\"{0}\">{0}</a></li>", name);
    }
    html.push_str("</ul>\n</body>\n</html>\n");
    html
}

/// Build the index and write it to `dest_dir/file_name`
pub fn write_index(
    dest_dir: &Path,
    file_name: &str,
    title: &str,
    outputs: &[PathBuf],
    generated_at: DateTime<Utc>,
) -> io::Result<PathBuf> {
    let path = dest_dir.join(file_name);
    fs::write(&path, build_index(title, outputs, generated_at))?;
    Ok(path)
}

fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn links_every_output_in_order() {
        let outputs = vec![
            PathBuf::from("/out/b_converted.html"),
            PathBuf::from("/out/a_converted.html"),
        ];
        let html = build_index("Decks", &outputs, at());

        let b = html.find("href=\"b_converted.html\"").unwrap();
        let a = html.find("href=\"a_converted.html\"").unwrap();
        assert!(b < a);
        assert!(html.contains("<title>Decks</title>"));
        assert!(html.contains("2024-03-01T09:30:00Z"));
        assert!(html.contains("2 documents"));
    }

    #[test]
    fn is_deterministic() {
        let outputs = vec![PathBuf::from("x_converted.html")];
        assert_eq!(
            build_index("T", &outputs, at()),
            build_index("T", &outputs, at())
        );
    }

    #[test]
    fn escapes_names_and_title() {
        let outputs = vec![PathBuf::from("a&b\"<x>_converted.html")];
        let html = build_index("Q&A <draft>", &outputs, at());

        assert!(html.contains("<h1>Q&amp;A &lt;draft&gt;</h1>"));
        assert!(html.contains("href=\"a&amp;b&quot;&lt;x&gt;_converted.html\""));
    }

    #[test]
    fn empty_list_still_renders() {
        let html = build_index("Empty", &[], at());
        assert!(html.contains("0 documents"));
        assert!(html.contains("<ul>\n</ul>"));
    }

    #[test]
    fn write_index_lands_in_dest() {
        let dir = TempDir::new().unwrap();
        let path = write_index(
            dir.path(),
            "index.html",
            "T",
            &[dir.path().join("a_converted.html")],
            at(),
        )
        .unwrap();

        assert_eq!(path, dir.path().join("index.html"));
        assert!(fs::read_to_string(path).unwrap().contains("1 document<"));
    }
}
