//! services/api/src/bin/openapi.rs
//!
//! Writes the OpenAPI 3.0 document for the debug assistant's REST API.
//! Usage: `openapi [OUTPUT]` (defaults to `openapi.json`).

use api_lib::web::rest::ApiDoc;
use std::path::PathBuf;
use utoipa::OpenApi;

const DEFAULT_OUTPUT: &str = "openapi.json";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT));

    let spec_json = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(&output, spec_json)?;
    println!("OpenAPI specification generated at {}", output.display());
    Ok(())
}
