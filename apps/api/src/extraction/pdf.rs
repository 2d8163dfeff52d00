//! Resume text retrieval from uploaded PDF files.
//!
//! The extractor is total: malformed input degrades to an empty string, and a
//! page that cannot be decoded contributes nothing without aborting the rest
//! of the document. Deciding what to do about empty output belongs to the
//! caller, not to this module.

use std::path::Path;

use lopdf::Document;
use tracing::{debug, warn};

/// Extracts all text from the PDF at `path`, concatenating pages in page
/// order with no inserted separator.
///
/// Returns the empty string when the file cannot be parsed as a PDF. Never
/// returns an error.
pub fn extract_text(path: &Path) -> String {
    let doc = match Document::load(path) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Failed to open {} as a PDF: {e}", path.display());
            return String::new();
        }
    };

    let mut text = String::new();
    for (&page_number, _) in doc.get_pages().iter() {
        match doc.extract_text(&[page_number]) {
            Ok(page_text) => text.push_str(&page_text),
            // A broken page yields nothing; keep going with the rest.
            Err(e) => debug!("Skipping page {page_number} of {}: {e}", path.display()),
        }
    }

    text
}

/// Builds an in-memory PDF with one page per entry in `pages`, each page
/// showing its text with a standard font. Used by tests across this module
/// family; kept here so the fixtures match what the extractor reads.
#[cfg(test)]
pub(crate) fn build_pdf(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for text in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 720.into()]),
                Operation::new("Tj", vec![Object::string_literal(*text)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode page content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("serialize test PDF");
    bytes
}
