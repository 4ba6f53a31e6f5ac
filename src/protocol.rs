//! Public HTTP response bodies (serde ready).
//! The two generate endpoints deliberately use different link keys (`url` vs `pdf_url`).

use serde::{Deserialize, Serialize};

/// `POST /generate-html` success body.
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateHtmlOut {
    pub success: bool,
    pub url: String,
}

/// `POST /generate-pdf` success body.
#[derive(Debug, Serialize, Deserialize)]
pub struct GeneratePdfOut {
    pub success: bool,
    pub pdf_url: String,
}

/// Body of every error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorOut {
    pub error: String,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub ok: bool,
}
