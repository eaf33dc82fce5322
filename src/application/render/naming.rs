//! Default naming for rendered reports.

use crate::cache::{CacheError, CacheResult};
use crate::domain::entries::{CacheEntry, extension_of, file_stem, normalize_display_name};

use super::types::{RenderOptions, RenderTarget};

/// Resolve the output format and report file name for rendering `template`.
///
/// `convert_to` falls back to the template's own extension. The report name
/// falls back to `<template stem>.<convert_to>`; a supplied name keeps its
/// stem but always carries the `convert_to` extension.
pub fn resolve_target(template: &CacheEntry, options: &RenderOptions) -> CacheResult<RenderTarget> {
    let convert_to = options
        .convert_to
        .as_deref()
        .map(|value| value.trim().trim_start_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty())
        .or_else(|| template.extension.clone())
        .ok_or_else(|| {
            CacheError::invalid_input(
                "Output format not provided and the template has no file extension.",
            )
        })?;

    if !convert_to.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(CacheError::invalid_input(format!(
            "Output format `{convert_to}` is not a file extension."
        )));
    }

    let report_name = match options.report_name.as_deref().and_then(normalize_display_name) {
        Some(name) if extension_of(&name).as_deref() == Some(convert_to.as_str()) => name,
        Some(name) => format!("{}.{convert_to}", file_stem(&name)),
        None => format!("{}.{convert_to}", template.stem()),
    };

    Ok(RenderTarget {
        convert_to,
        report_name,
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use time::OffsetDateTime;

    use super::*;
    use crate::cache::{CacheErrorKind, hash};

    fn template(display_name: &str) -> CacheEntry {
        CacheEntry {
            identifier: hash(display_name.as_bytes()),
            display_name: display_name.to_string(),
            extension: extension_of(display_name),
            storage_path: PathBuf::from("/dev/null"),
            size: 0,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn options(convert_to: Option<&str>, report_name: Option<&str>) -> RenderOptions {
        RenderOptions {
            convert_to: convert_to.map(str::to_string),
            report_name: report_name.map(str::to_string),
            ..RenderOptions::default()
        }
    }

    #[test]
    fn defaults_to_template_extension_and_stem() {
        let target = resolve_target(&template("invoice.docx"), &options(None, None)).unwrap();
        assert_eq!(target.convert_to, "docx");
        assert_eq!(target.report_name, "invoice.docx");
    }

    #[test]
    fn convert_to_strips_leading_dot() {
        let target = resolve_target(&template("invoice.docx"), &options(Some(".PDF"), None)).unwrap();
        assert_eq!(target.convert_to, "pdf");
        assert_eq!(target.report_name, "invoice.pdf");
    }

    #[test]
    fn report_name_extension_follows_convert_to() {
        let entry = template("invoice.docx");

        let kept = resolve_target(&entry, &options(Some("pdf"), Some("march.pdf"))).unwrap();
        assert_eq!(kept.report_name, "march.pdf");

        let rewritten = resolve_target(&entry, &options(Some("pdf"), Some("march.docx"))).unwrap();
        assert_eq!(rewritten.report_name, "march.pdf");

        let appended = resolve_target(&entry, &options(Some("pdf"), Some("march"))).unwrap();
        assert_eq!(appended.report_name, "march.pdf");
    }

    #[test]
    fn report_name_is_reduced_to_a_file_name() {
        let target = resolve_target(
            &template("invoice.docx"),
            &options(Some("pdf"), Some("../../etc/report.pdf")),
        )
        .unwrap();
        assert_eq!(target.report_name, "report.pdf");
    }

    #[test]
    fn missing_format_is_invalid_input() {
        let err = resolve_target(&template("README"), &options(None, None)).unwrap_err();
        assert_eq!(err.kind(), CacheErrorKind::InvalidInput);

        let err = resolve_target(&template("a.docx"), &options(Some("p/df"), None)).unwrap_err();
        assert_eq!(err.kind(), CacheErrorKind::InvalidInput);
    }
}
