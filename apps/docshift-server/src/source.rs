//! Input normalization
//!
//! Every request kind becomes a file inside the request workspace. After
//! that, invoke/send/cleanup is the same code for all of them.

use std::path::PathBuf;

use async_trait::async_trait;
use docshift_core::InputSource;
use reqwest::Url;

use crate::error::ServerError;
use crate::fetch::RemoteFetcher;
use crate::workspace::RequestWorkspace;

const DEFAULT_STEM: &str = "document";

#[async_trait]
pub trait Materialize: Send + Sync {
    fn source(&self) -> InputSource;

    /// Stem used to name the converted document in the response
    fn stem(&self) -> String;

    /// Write the input document into the workspace and return its path
    async fn materialize(&self, workspace: &RequestWorkspace) -> Result<PathBuf, ServerError>;
}

/// HTML sent inline in a JSON body
pub struct InlineHtml {
    html: String,
}

impl InlineHtml {
    pub fn new(html: String) -> Self {
        Self { html }
    }
}

#[async_trait]
impl Materialize for InlineHtml {
    fn source(&self) -> InputSource {
        InputSource::Inline
    }

    fn stem(&self) -> String {
        DEFAULT_STEM.to_string()
    }

    async fn materialize(&self, workspace: &RequestWorkspace) -> Result<PathBuf, ServerError> {
        let path = workspace.input_path();
        tokio::fs::write(&path, self.html.as_bytes()).await?;
        Ok(path)
    }
}

/// A multipart file part
///
/// The client's file name only feeds the response name; it is never used
/// as a path.
pub struct UploadedFile {
    file_name: String,
    bytes: Vec<u8>,
}

impl UploadedFile {
    pub fn new(file_name: String, bytes: Vec<u8>) -> Self {
        Self { file_name, bytes }
    }
}

#[async_trait]
impl Materialize for UploadedFile {
    fn source(&self) -> InputSource {
        InputSource::Upload
    }

    fn stem(&self) -> String {
        stem_of(&self.file_name)
    }

    async fn materialize(&self, workspace: &RequestWorkspace) -> Result<PathBuf, ServerError> {
        let path = workspace.input_path();
        tokio::fs::write(&path, &self.bytes).await?;
        Ok(path)
    }
}

/// A document fetched from a URL at materialization time
pub struct RemoteDocument {
    url: Url,
    fetcher: RemoteFetcher,
}

impl RemoteDocument {
    pub fn new(url: Url, fetcher: RemoteFetcher) -> Self {
        Self { url, fetcher }
    }
}

#[async_trait]
impl Materialize for RemoteDocument {
    fn source(&self) -> InputSource {
        InputSource::RemoteUrl
    }

    fn stem(&self) -> String {
        self.url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .map(stem_of)
            .unwrap_or_else(|| DEFAULT_STEM.to_string())
    }

    async fn materialize(&self, workspace: &RequestWorkspace) -> Result<PathBuf, ServerError> {
        let body = self.fetcher.fetch(&self.url).await?;
        let path = workspace.input_path();
        tokio::fs::write(&path, body).await?;
        Ok(path)
    }
}

/// Header-safe stem of a client-supplied file name
fn stem_of(file_name: &str) -> String {
    // Browsers on Windows may send a full path
    let base = file_name.rsplit(['/', '\\']).next().unwrap_or(file_name);
    let stem = match base.rfind('.') {
        Some(dot) => &base[..dot],
        None => base,
    };
    let cleaned: String = stem
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if cleaned.trim_matches(['_', '.']).is_empty() {
        DEFAULT_STEM.to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn stems_are_header_safe() {
        assert_eq!(stem_of("deck.html"), "deck");
        assert_eq!(stem_of("C:\\Users\\me\\q3 plan.html"), "q3_plan");
        assert_eq!(stem_of("../../etc/passwd"), "passwd");
        assert_eq!(stem_of("\"quoted\".html"), "_quoted_");
        assert_eq!(stem_of(".html"), "document");
        assert_eq!(stem_of(""), "document");
    }

    #[test]
    fn remote_stem_comes_from_last_segment() {
        let fetcher = RemoteFetcher::new(Duration::from_secs(1), 0, 1024).unwrap();
        let doc = RemoteDocument::new(
            Url::parse("https://example.com/talks/deck.html").unwrap(),
            fetcher.clone(),
        );
        assert_eq!(doc.stem(), "deck");

        let root = RemoteDocument::new(Url::parse("https://example.com/").unwrap(), fetcher);
        assert_eq!(root.stem(), "document");
    }

    #[tokio::test]
    async fn upload_lands_in_workspace_not_at_client_path() {
        let root = TempDir::new().unwrap();
        let workspace = RequestWorkspace::create(root.path()).unwrap();
        let upload = UploadedFile::new("../../evil.html".to_string(), b"<p>x</p>".to_vec());

        let path = upload.materialize(&workspace).await.unwrap();

        assert_eq!(path, workspace.input_path());
        assert_eq!(std::fs::read(&path).unwrap(), b"<p>x</p>");
        assert_eq!(upload.source(), InputSource::Upload);
    }
}
