//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI document of the REST API to disk. The output path is
//! the first argument, `openapi.json` when none is given.

use api_lib::web::rest::ApiDoc;
use std::path::PathBuf;
use utoipa::OpenApi;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("openapi.json"));

    let document = ApiDoc::openapi();
    let endpoints = document.paths.paths.len();
    std::fs::write(&path, document.to_pretty_json()?)?;
    println!(
        "Wrote OpenAPI document with {} paths to {}",
        endpoints,
        path.display()
    );
    Ok(())
}
