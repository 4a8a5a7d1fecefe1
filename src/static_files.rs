//! Serving files from a directory.

use crate::handler::Handler;
use crate::http::{header, Method, StatusCode};
use crate::{Context, Result};

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

/// Options for [`App::static_files`](crate::App::static_files).
#[derive(Clone, Debug)]
pub struct StaticConfig {
    /// File served for requests to a directory.
    pub index: String,
    /// Answer `Range` requests with partial content.
    pub byte_range: bool,
    /// Send files as attachments.
    pub download: bool,
    /// `max-age` of the `Cache-Control` header, in seconds. Zero omits the header.
    pub max_age: u64,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            index: String::from("index.html"),
            byte_range: false,
            download: false,
            max_age: 0,
        }
    }
}

/// Serves `GET` and `HEAD` requests below a prefix from a directory.
///
/// The file is looked up relative to the path of the matched route, so
/// the handler keeps working when its application is mounted. Requests
/// for files that don't exist are passed down the chain.
pub(crate) struct StaticHandler {
    root: PathBuf,
    config: StaticConfig,
}

impl StaticHandler {
    pub(crate) fn new(root: PathBuf, config: StaticConfig) -> Self {
        Self {
            root,
            config,
        }
    }

    // The file a request path refers to, or `None` if the path escapes the root.
    fn resolve(&self, prefix: &str, path: &str) -> Option<PathBuf> {
        let prefix = prefix.trim_end_matches('/');
        let relative = path.get(prefix.len()..).unwrap_or_default();
        let relative = relative.trim_start_matches('/');

        let mut file = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => file.push(part),
                Component::CurDir => {}
                _ => return None,
            }
        }

        Some(file)
    }
}

#[async_trait]
impl Handler for StaticHandler {
    async fn call(&self, c: &mut Context) -> Result {
        if c.method() != Method::GET && c.method() != Method::HEAD {
            return c.next().await;
        }

        let prefix = c.route().map(|route| route.path().to_owned()).unwrap_or_default();
        let mut file = match self.resolve(&prefix, c.path()) {
            Some(file) => file,
            None => return c.next().await,
        };

        if tokio::fs::metadata(&file).await.map_or(false, |meta| meta.is_dir()) {
            file.push(&self.config.index);
        }

        if !tokio::fs::metadata(&file).await.map_or(false, |meta| meta.is_file()) {
            return c.next().await;
        }

        if self.config.download {
            let name = file
                .file_name()
                .map(|name| name.to_string_lossy().into_owned());
            c.attachment(name.as_deref());
        }

        if self.config.max_age > 0 {
            c.set(
                header::CACHE_CONTROL,
                format!("public, max-age={}", self.config.max_age),
            );
        }

        match c.serve_file(&file, self.config.byte_range).await {
            Err(err) if err.status() == StatusCode::NOT_FOUND => c.next().await,
            result => result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_rejects_parent_components() {
        let handler = StaticHandler::new(PathBuf::from("public"), StaticConfig::default());

        assert_eq!(
            handler.resolve("/assets", "/assets/css/site.css"),
            Some(PathBuf::from("public/css/site.css"))
        );
        assert_eq!(handler.resolve("/assets", "/assets"), Some(PathBuf::from("public")));
        assert_eq!(handler.resolve("/assets", "/assets/../secret"), None);
        assert_eq!(handler.resolve("/", "/a.txt"), Some(PathBuf::from("public/a.txt")));
    }
}
