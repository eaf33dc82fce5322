//! Conversion dictionary: which output formats each template type supports.

use std::collections::BTreeMap;

const DOCUMENT_OUTPUTS: &[&str] = &["doc", "docx", "html", "odt", "pdf", "rtf", "txt"];
const SPREADSHEET_OUTPUTS: &[&str] = &["csv", "html", "ods", "pdf", "txt", "xls", "xlsx"];
const PRESENTATION_OUTPUTS: &[&str] = &["odp", "pdf", "ppt", "pptx"];
const MARKUP_OUTPUTS: &[&str] = &["html", "odt", "pdf"];

const TEMPLATE_TYPES: &[(&str, &[&str])] = &[
    ("csv", SPREADSHEET_OUTPUTS),
    ("doc", DOCUMENT_OUTPUTS),
    ("docx", DOCUMENT_OUTPUTS),
    ("html", MARKUP_OUTPUTS),
    ("md", MARKUP_OUTPUTS),
    ("odp", PRESENTATION_OUTPUTS),
    ("ods", SPREADSHEET_OUTPUTS),
    ("odt", DOCUMENT_OUTPUTS),
    ("ppt", PRESENTATION_OUTPUTS),
    ("pptx", PRESENTATION_OUTPUTS),
    ("rtf", DOCUMENT_OUTPUTS),
    ("txt", DOCUMENT_OUTPUTS),
    ("xls", SPREADSHEET_OUTPUTS),
    ("xlsx", SPREADSHEET_OUTPUTS),
    ("xml", &["xml"]),
];

/// Template extension → supported output formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTypes(BTreeMap<String, Vec<String>>);

impl FileTypes {
    pub fn new(dictionary: BTreeMap<String, Vec<String>>) -> Self {
        Self(dictionary)
    }

    /// Dictionary of the formats office-style engines convert between.
    pub fn builtin() -> Self {
        let dictionary = TEMPLATE_TYPES
            .iter()
            .map(|(input, outputs)| {
                let outputs = outputs.iter().map(|value| value.to_string()).collect();
                (input.to_string(), outputs)
            })
            .collect();
        Self(dictionary)
    }

    pub fn supports(&self, input: &str, output: &str) -> bool {
        self.0
            .get(&input.to_ascii_lowercase())
            .is_some_and(|outputs| outputs.iter().any(|value| value.eq_ignore_ascii_case(output)))
    }

    pub fn dictionary(&self) -> &BTreeMap<String, Vec<String>> {
        &self.0
    }

    pub fn into_dictionary(self) -> BTreeMap<String, Vec<String>> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_dictionary_converts_documents_to_pdf() {
        let types = FileTypes::builtin();
        assert!(types.supports("docx", "pdf"));
        assert!(types.supports("DOCX", "PDF"));
        assert!(!types.supports("docx", "xlsx"));
        assert!(!types.supports("exe", "pdf"));
    }

    #[test]
    fn every_template_type_can_render_to_itself_or_pdf() {
        for (input, outputs) in FileTypes::builtin().dictionary() {
            assert!(
                outputs.contains(input) || outputs.iter().any(|o| o == "pdf"),
                "{input} has no natural output"
            );
        }
    }
}
