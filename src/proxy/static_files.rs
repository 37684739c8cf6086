//! Static file lookup and serving.
//!
//! A request path resolves to, in order: the file itself,
//! `<path>/index.html`, then `<path>.html`. Paths escaping the root never
//! resolve.

use axum::{
    body::Body,
    http::{header, HeaderValue, Response, StatusCode},
};
use percent_encoding::percent_decode_str;
use std::path::{Component, Path, PathBuf};
use tokio::fs;

const INDEX_FILE: &str = "index.html";

#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Find the file serving `path`, if any.
    pub fn locate(&self, path: &str) -> Option<PathBuf> {
        let relative = sanitize_path(path)?;
        let base = self.root.join(&relative);

        let mut candidates = vec![base.clone(), base.join(INDEX_FILE)];
        if let Some(name) = relative.file_name() {
            let mut html = name.to_os_string();
            html.push(".html");
            candidates.push(base.with_file_name(html));
        }

        let file = candidates.into_iter().find(|p| p.is_file())?;
        self.contains(&file).then_some(file)
    }

    /// Serve a located file with `status`. HEAD requests get headers only.
    pub async fn serve(&self, file: &Path, status: StatusCode, head: bool) -> std::io::Result<Response<Body>> {
        let content = fs::read(file).await?;
        let mime = mime_guess::from_path(file).first_or_octet_stream();

        tracing::debug!(path = ?file, mime = %mime, "Serving static file");

        let length = content.len();
        let body = if head { Body::empty() } else { Body::from(content) };
        let mut response = Response::new(body);
        *response.status_mut() = status;

        let headers = response.headers_mut();
        if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
            headers.insert(header::CONTENT_TYPE, value);
        }
        headers.insert(header::CONTENT_LENGTH, HeaderValue::from(length));
        Ok(response)
    }

    // Symlinks may still point outside the root.
    fn contains(&self, file: &Path) -> bool {
        match (self.root.canonicalize(), file.canonicalize()) {
            (Ok(root), Ok(file)) => file.starts_with(root),
            _ => false,
        }
    }
}

/// Relative file path for a URL path; `None` if it tries to leave the root.
fn sanitize_path(path: &str) -> Option<PathBuf> {
    let mut relative = PathBuf::new();
    for segment in path.split('/').filter(|s| !s.is_empty()) {
        let decoded = percent_decode(segment)?;
        let component = Path::new(&decoded).components().collect::<Vec<_>>();
        match component.as_slice() {
            [Component::Normal(part)] => relative.push(part),
            [Component::CurDir] => {}
            _ => return None,
        }
    }
    Some(relative)
}

// Escapes that are not valid UTF-8 never name a file.
fn percent_decode(segment: &str) -> Option<String> {
    percent_decode_str(segment)
        .decode_utf8()
        .ok()
        .map(|decoded| decoded.into_owned())
}
