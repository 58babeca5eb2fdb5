//! `routes` subcommand: inspect the normalized route table.
//!
//! Prints what `generate` would fetch and where each page would land,
//! without building or starting anything.

use crate::{config::PrerenderConfig, log};
use anyhow::Result;
use serde::Serialize;

#[derive(Serialize)]
struct RouteRow<'a> {
    path: &'a str,
    file: String,
}

/// Print the normalized route table as text or JSON.
pub fn print_routes(config: &PrerenderConfig, json: bool) -> Result<()> {
    let pages = config.page_routes()?;

    if json {
        let rows: Vec<_> = pages
            .iter()
            .map(|p| RouteRow {
                path: &p.path,
                file: p.file.display().to_string(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    for page in &pages {
        println!("{} -> {}", page.path, page.file.display());
    }
    log!("routes"; "{} page(s)", pages.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::PageRoute;
    use std::path::PathBuf;

    #[test]
    fn test_route_row_json_shape() {
        let page = PageRoute {
            path: "/about".into(),
            file: PathBuf::from("about.html"),
        };
        let row = RouteRow {
            path: &page.path,
            file: page.file.display().to_string(),
        };
        let json = serde_json::to_string(&row).unwrap();
        assert_eq!(json, r#"{"path":"/about","file":"about.html"}"#);
    }
}
