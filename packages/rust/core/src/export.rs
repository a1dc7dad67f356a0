//! Export seam: turn an [`ExportDocument`] into downloadable bytes.
//!
//! The core knows nothing about binary formats; PDF/Word encoders plug in
//! behind [`DocumentExporter`]. The two built-in exporters produce text
//! artifacts (markdown, JSON).

use articleforge_shared::{ArticleForgeError, ExportDocument, Result};

/// Produces a downloadable byte stream from an assembled document.
pub trait DocumentExporter {
    /// Render the document.
    fn export(&self, document: &ExportDocument) -> Result<Vec<u8>>;
    /// File extension for the rendered format, without the dot.
    fn extension(&self) -> &'static str;
}

/// Renders the document as a single markdown file.
pub struct MarkdownExporter;

impl DocumentExporter for MarkdownExporter {
    fn export(&self, document: &ExportDocument) -> Result<Vec<u8>> {
        let mut out = String::new();
        out.push_str(&format!("# {}\n", document.title));
        out.push_str(&format!(
            "\n_Generated {}_\n",
            document.generated_at.format("%Y-%m-%d %H:%M UTC")
        ));

        for section in &document.sections {
            out.push_str(&format!("\n## {}\n\n{}\n", section.heading, section.body));
        }

        Ok(out.into_bytes())
    }

    fn extension(&self) -> &'static str {
        "md"
    }
}

/// Renders the document as pretty-printed JSON.
pub struct JsonExporter;

impl DocumentExporter for JsonExporter {
    fn export(&self, document: &ExportDocument) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(document)
            .map_err(|e| ArticleForgeError::validation(format!("serialize document: {e}")))
    }

    fn extension(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use articleforge_shared::DocumentSection;
    use chrono::Utc;

    fn sample_document() -> ExportDocument {
        ExportDocument {
            title: "Travel".into(),
            generated_at: Utc::now(),
            sections: vec![
                DocumentSection {
                    heading: "First".into(),
                    body: "alpha".into(),
                },
                DocumentSection {
                    heading: "Second".into(),
                    body: "beta".into(),
                },
            ],
        }
    }

    #[test]
    fn markdown_export_contains_headings_in_order() {
        let bytes = MarkdownExporter.export(&sample_document()).expect("export");
        let text = String::from_utf8(bytes).expect("utf8");

        assert!(text.starts_with("# Travel\n"));
        let first = text.find("## First").expect("first heading");
        let second = text.find("## Second").expect("second heading");
        assert!(first < second);
    }

    #[test]
    fn json_export_roundtrips() {
        let doc = sample_document();
        let bytes = JsonExporter.export(&doc).expect("export");
        let parsed: ExportDocument = serde_json::from_slice(&bytes).expect("parse");
        assert_eq!(parsed.sections, doc.sections);
        assert_eq!(JsonExporter.extension(), "json");
    }
}
