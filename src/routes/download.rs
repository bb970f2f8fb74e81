use axum::{
    extract::{Query, State},
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::path::Path;

use crate::{
    auth::CurrentUser,
    error::{AppError, AppResult},
    middleware::ClientIp,
    shopping::{build_shopping_list, render_pdf, render_text, RenderOptions},
    state::AppState,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadFormat {
    #[default]
    Pdf,
    Txt,
    Json,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadQuery {
    pub format: Option<String>,
}

impl DownloadQuery {
    fn format(&self) -> AppResult<DownloadFormat> {
        match self.format.as_deref().map(str::to_ascii_lowercase).as_deref() {
            None | Some("") | Some("pdf") => Ok(DownloadFormat::Pdf),
            Some("txt") => Ok(DownloadFormat::Txt),
            Some("json") => Ok(DownloadFormat::Json),
            Some(_) => Err(AppError::BadRequest("Invalid format. Use 'pdf', 'txt' or 'json'".to_string())),
        }
    }
}

/// `recipe.pdf` becomes `recipe.txt` for the text rendering, and so on.
fn filename_for(configured: &str, format: DownloadFormat) -> String {
    let ext = match format {
        DownloadFormat::Pdf => return configured.to_string(),
        DownloadFormat::Txt => "txt",
        DownloadFormat::Json => "json",
    };
    Path::new(configured).with_extension(ext).to_string_lossy().into_owned()
}

fn attachment(body: impl IntoResponse, content_type: &'static str, filename: &str) -> Response {
    let mut response = body.into_response();
    response.headers_mut().insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    if let Ok(val) = HeaderValue::from_str(&format!("attachment; filename=\"{}\"", filename)) {
        response.headers_mut().insert(header::CONTENT_DISPOSITION, val);
    }
    response
}

pub async fn download_shopping_cart(
    State(state): State<AppState>,
    ClientIp(ip): ClientIp,
    user: CurrentUser,
    Query(query): Query<DownloadQuery>,
) -> AppResult<Response> {
    state.rate_limiter.check_endpoint_limit("/api/recipes/download_shopping_cart/", ip).await?;
    let format = query.format()?;

    let list = build_shopping_list(&state.db, user.id).await?;
    let export = &state.config.export;
    let filename = filename_for(&export.filename, format);

    let response = match format {
        DownloadFormat::Pdf => {
            let cfg = export.clone();
            let rendered = tokio::task::spawn_blocking(move || {
                RenderOptions::from_config(&cfg).and_then(|opts| render_pdf(&list, &opts))
            })
            .await
            .map_err(|e| AppError::Internal(e.into()))?;
            let doc = match rendered {
                Ok(doc) => doc,
                Err(e) => {
                    state.metrics.inc_export_failures();
                    return Err(e.into());
                }
            };
            tracing::info!(user_id = user.id, pages = doc.page_count, "shopping list exported as pdf");
            attachment(doc.bytes, "application/pdf", &filename)
        }
        DownloadFormat::Txt => {
            let opts = RenderOptions {
                title: export.title.clone(),
                footer: export.footer.clone(),
                ..RenderOptions::default()
            };
            tracing::info!(user_id = user.id, "shopping list exported as text");
            attachment(render_text(&list, &opts), "text/plain; charset=utf-8", &filename)
        }
        DownloadFormat::Json => {
            tracing::info!(user_id = user.id, "shopping list exported as json");
            attachment(axum::Json(list), "application/json", &filename)
        }
    };

    state.metrics.inc_exports();
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filename_for() {
        assert_eq!(filename_for("recipe.pdf", DownloadFormat::Pdf), "recipe.pdf");
        assert_eq!(filename_for("recipe.pdf", DownloadFormat::Txt), "recipe.txt");
        assert_eq!(filename_for("list", DownloadFormat::Json), "list.json");
    }

    #[test]
    fn test_format_parsing() {
        let q = |f: Option<&str>| DownloadQuery { format: f.map(str::to_string) };
        assert_eq!(q(None).format().unwrap(), DownloadFormat::Pdf);
        assert_eq!(q(Some("TXT")).format().unwrap(), DownloadFormat::Txt);
        assert_eq!(q(Some("json")).format().unwrap(), DownloadFormat::Json);
        assert!(q(Some("csv")).format().is_err());
    }
}
