//! Template and report storage on top of the file cache.

use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;
use serde::Deserialize;

use crate::cache::{
    CacheError, CacheResult, CacheStats, ContentEncoding, FileCache, Removal, WriteOptions,
};
use crate::domain::entries::{CacheEntry, normalize_display_name};

/// Template supplied inline in a request body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineTemplate {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub encoding_type: String,
    #[serde(default)]
    pub file_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct TemplateService {
    cache: Arc<FileCache>,
}

impl TemplateService {
    pub fn new(cache: Arc<FileCache>) -> Self {
        Self { cache }
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    /// Adopt a fully received upload; the staged file is consumed either way.
    pub async fn adopt_upload(&self, path: &Path, original_name: &str) -> CacheResult<CacheEntry> {
        self.cache.move_file(path, original_name).await
    }

    pub async fn store_inline(
        &self,
        template: &InlineTemplate,
        overwrite: bool,
    ) -> CacheResult<CacheEntry> {
        if template.content.is_empty() {
            return Err(CacheError::invalid_input("Template content not provided."));
        }
        let file_type = template.file_type.trim().trim_start_matches('.');
        if file_type.is_empty() {
            return Err(CacheError::invalid_input("Template file type not provided."));
        }
        if template.encoding_type.trim().is_empty() {
            return Err(CacheError::invalid_input(
                "Template encoding type not provided.",
            ));
        }
        let encoding: ContentEncoding = template.encoding_type.parse()?;

        let display_name = template
            .file_name
            .as_deref()
            .and_then(normalize_display_name)
            .unwrap_or_else(|| format!("template.{file_type}"));

        self.cache
            .write(
                template.content.as_bytes(),
                &display_name,
                encoding,
                WriteOptions { overwrite },
            )
            .await
    }

    pub fn find(&self, identifier: &str) -> CacheResult<CacheEntry> {
        self.cache.find(identifier)
    }

    pub async fn read(&self, identifier: &str) -> CacheResult<Bytes> {
        self.cache.read(identifier).await
    }

    pub async fn remove(&self, identifier: &str) -> CacheResult<Removal> {
        self.cache.remove(identifier).await
    }

    /// Keep a rendered report so it can be fetched again by identifier.
    pub async fn cache_rendered(&self, report: &[u8], report_name: &str) -> CacheResult<CacheEntry> {
        self.cache
            .write(
                report,
                report_name,
                ContentEncoding::Binary,
                WriteOptions::default(),
            )
            .await
    }

    pub fn stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;
    use crate::cache::{CacheErrorKind, hash};

    async fn service() -> (TempDir, TemplateService) {
        let dir = TempDir::new().expect("temp dir");
        let cache = FileCache::open(dir.path().join("cache")).await.expect("open cache");
        (dir, TemplateService::new(Arc::new(cache)))
    }

    fn inline(content: &str, file_type: &str, encoding_type: &str) -> InlineTemplate {
        InlineTemplate {
            content: content.to_string(),
            file_type: file_type.to_string(),
            encoding_type: encoding_type.to_string(),
            file_name: None,
        }
    }

    #[tokio::test]
    async fn inline_template_gets_synthesized_name() {
        let (_dir, templates) = service().await;
        let entry = templates
            .store_inline(&inline("aGVsbG8=", "txt", "base64"), false)
            .await
            .expect("stored");

        assert_eq!(entry.identifier, hash(b"hello"));
        assert_eq!(entry.display_name, "template.txt");
        assert_eq!(templates.read(entry.identifier.as_str()).await.unwrap(), "hello");
    }

    #[tokio::test]
    async fn inline_template_keeps_supplied_name() {
        let (_dir, templates) = service().await;
        let mut template = inline("<p>{d.name}</p>", "html", "utf8");
        template.file_name = Some("letters/welcome.html".to_string());

        let entry = templates.store_inline(&template, false).await.expect("stored");
        assert_eq!(entry.display_name, "welcome.html");
    }

    #[tokio::test]
    async fn inline_template_requires_all_fields() {
        let (_dir, templates) = service().await;

        for template in [
            inline("", "txt", "utf8"),
            inline("hello", "", "utf8"),
            inline("hello", "txt", " "),
        ] {
            let err = templates.store_inline(&template, false).await.unwrap_err();
            assert_eq!(err.kind(), CacheErrorKind::InvalidInput, "{template:?}");
        }

        let err = templates
            .store_inline(&inline("hello", "txt", "rot13"), false)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), CacheErrorKind::InvalidEncoding);
    }

    #[tokio::test]
    async fn rendered_reports_share_the_store() {
        let (_dir, templates) = service().await;
        let entry = templates
            .cache_rendered(b"%PDF-1.7", "greeting.pdf")
            .await
            .expect("cached");

        assert_eq!(entry.display_name, "greeting.pdf");
        assert_eq!(templates.stats().entries, 1);

        let removal = templates.remove(entry.identifier.as_str()).await.expect("removed");
        assert!(removal.storage_warning.is_none());
        assert_eq!(templates.stats().entries, 0);
    }
}
