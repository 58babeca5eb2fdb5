//! Page fetching and writing.
//!
//! For every normalized route, one HTTP GET against the render server and
//! one file write into the output directory. All fetches run concurrently;
//! each completion triggers its own write. Failures are isolated per route:
//! every route settles with its own [`PageResult`], and the fan-in only
//! completes once all of them have, so one broken route can neither cancel
//! nor hide its siblings.

use crate::{
    debug, log,
    logger::ProgressLine,
    routes::PageRoute,
};
use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::task::JoinSet;
use url::Url;

/// Per-route generation errors.
#[derive(Debug, Error)]
pub enum PageError {
    #[error("invalid page url: {0}")]
    Url(#[from] url::ParseError),

    #[error("request failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("server answered {status}")]
    Status { status: StatusCode },

    #[error("failed to write `{path}`: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The settled outcome of one route's fetch-then-write pair.
pub struct PageResult {
    pub route: PageRoute,
    pub outcome: Result<usize, PageError>,
}

/// All settled outcomes of a generation run.
pub struct PageReport {
    pub results: Vec<PageResult>,
}

impl PageReport {
    pub fn written(&self) -> usize {
        self.results.iter().filter(|r| r.outcome.is_ok()).count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &PageResult> {
        self.results.iter().filter(|r| r.outcome.is_err())
    }

    pub fn has_failures(&self) -> bool {
        self.results.iter().any(|r| r.outcome.is_err())
    }
}

/// Fetch every route from the render server and write it under `out_dir`.
///
/// Existing files are overwritten; regeneration is idempotent. Returns only
/// once every route has settled, successfully or not.
pub async fn generate_pages(
    base: &Url,
    routes: Vec<PageRoute>,
    out_dir: &Path,
    quiet: bool,
) -> Result<PageReport> {
    let client = Client::builder()
        .build()
        .context("Failed to create HTTP client")?;

    let progress = (!quiet).then(|| ProgressLine::new(&[("pages", routes.len())]));

    let mut tasks = JoinSet::new();
    for route in routes {
        let client = client.clone();
        let base = base.clone();
        let file = out_dir.join(&route.file);
        tasks.spawn(async move {
            let outcome = fetch_and_write(&client, &base, &route.path, &file).await;
            PageResult { route, outcome }
        });
    }

    let mut results = Vec::with_capacity(tasks.len());
    while let Some(joined) = tasks.join_next().await {
        let result = joined.expect("page task panicked");
        match &result.outcome {
            Ok(bytes) => {
                debug!("pages"; "wrote {} ({} bytes)", result.route.file.display(), bytes);
            }
            Err(e) => log!("error"; "{}: {e}", result.route.path),
        }
        if let Some(p) = &progress {
            p.inc("pages");
        }
        results.push(result);
    }

    if let Some(p) = progress {
        p.finish();
    }

    Ok(PageReport { results })
}

/// One route: GET the rendered document, then persist it.
async fn fetch_and_write(
    client: &Client,
    base: &Url,
    path: &str,
    file: &Path,
) -> Result<usize, PageError> {
    let url = base.join(path)?;
    let response = client.get(url).send().await?;

    let status = response.status();
    if !status.is_success() {
        return Err(PageError::Status { status });
    }

    let body = response.bytes().await?;

    if let Some(parent) = file.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| PageError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
    }
    tokio::fs::write(file, &body)
        .await
        .map_err(|source| PageError::Write {
            path: file.to_path_buf(),
            source,
        })?;

    Ok(body.len())
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    /// Mock render server: answers each known path with a fixed status and
    /// body, everything else with 404.
    fn mock_server(pages: &[(&str, u16, &str)]) -> (Url, Arc<tiny_http::Server>) {
        let server = Arc::new(tiny_http::Server::http("127.0.0.1:0").unwrap());
        let addr = server.server_addr().to_ip().unwrap();
        let table: HashMap<String, (u16, String)> = pages
            .iter()
            .map(|(path, status, body)| ((*path).to_owned(), (*status, (*body).to_owned())))
            .collect();

        let worker = Arc::clone(&server);
        std::thread::spawn(move || {
            for request in worker.incoming_requests() {
                let (status, body) = table
                    .get(request.url())
                    .cloned()
                    .unwrap_or((404, String::from("not found")));
                let response =
                    tiny_http::Response::from_string(body).with_status_code(status);
                let _ = request.respond(response);
            }
        });

        let base = Url::parse(&format!("http://{addr}")).unwrap();
        (base, server)
    }

    fn route(path: &str, file: &str) -> PageRoute {
        PageRoute {
            path: path.to_owned(),
            file: PathBuf::from(file),
        }
    }

    #[tokio::test]
    async fn test_writes_all_routes() {
        let (base, server) = mock_server(&[
            ("/", 200, "<html>Home</html>"),
            ("/about", 200, "<html>About</html>"),
            ("/blog/post-1", 200, "<html>Post</html>"),
        ]);
        let out = tempfile::tempdir().unwrap();

        let routes = vec![
            route("/", "main.html"),
            route("/about", "about.html"),
            route("/blog/post-1", "blog/post-1.html"),
        ];
        let report = generate_pages(&base, routes, out.path(), true).await.unwrap();

        assert_eq!(report.results.len(), 3);
        assert!(!report.has_failures());
        assert_eq!(
            std::fs::read_to_string(out.path().join("main.html")).unwrap(),
            "<html>Home</html>"
        );
        assert_eq!(
            std::fs::read_to_string(out.path().join("about.html")).unwrap(),
            "<html>About</html>"
        );
        // nested directories are created on demand
        assert_eq!(
            std::fs::read_to_string(out.path().join("blog/post-1.html")).unwrap(),
            "<html>Post</html>"
        );

        server.unblock();
    }

    #[tokio::test]
    async fn test_failure_does_not_mask_siblings() {
        let (base, server) = mock_server(&[
            ("/", 200, "<html>Home</html>"),
            ("/broken", 500, "boom"),
        ]);
        let out = tempfile::tempdir().unwrap();

        let routes = vec![route("/", "main.html"), route("/broken", "broken.html")];
        let report = generate_pages(&base, routes, out.path(), true).await.unwrap();

        // every route settled, the good one was written
        assert_eq!(report.results.len(), 2);
        assert_eq!(report.written(), 1);
        assert!(out.path().join("main.html").exists());
        assert!(!out.path().join("broken.html").exists());

        let failed: Vec<_> = report.failures().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].route.path, "/broken");
        assert!(matches!(
            failed[0].outcome,
            Err(PageError::Status { status }) if status.as_u16() == 500
        ));

        server.unblock();
    }

    #[tokio::test]
    async fn test_all_routes_settle_with_dead_server() {
        // Bind then drop to get a port that refuses connections.
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let base = Url::parse(&format!("http://{addr}")).unwrap();
        let out = tempfile::tempdir().unwrap();

        let routes = vec![route("/", "main.html"), route("/about", "about.html")];
        let report = generate_pages(&base, routes, out.path(), true).await.unwrap();

        assert_eq!(report.results.len(), 2);
        assert_eq!(report.written(), 0);
        assert!(report
            .failures()
            .all(|r| matches!(r.outcome, Err(PageError::Fetch(_)))));
    }

    #[tokio::test]
    async fn test_regeneration_is_idempotent() {
        let (base, server) = mock_server(&[("/", 200, "<html>Home</html>")]);
        let out = tempfile::tempdir().unwrap();
        let target = out.path().join("main.html");

        let routes = || vec![route("/", "main.html")];
        generate_pages(&base, routes(), out.path(), true).await.unwrap();
        let first = std::fs::read(&target).unwrap();

        generate_pages(&base, routes(), out.path(), true).await.unwrap();
        let second = std::fs::read(&target).unwrap();

        assert_eq!(first, second);
        server.unblock();
    }
}
