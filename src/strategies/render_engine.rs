use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use futures::StreamExt;
use tracing::{debug, info};

use super::{
    sanitize_file_name, Conversion, ConversionRequest, ConvertOptions, ConvertStrategy,
    DocumentClass, StrategyKind,
};
use crate::error::{ConvertError, Result};
use crate::geometry::{page_dimensions, Orientation};
use crate::pdf::page_count;
use crate::{docx, table, xlsx};

/// Renders the document as HTML and prints it through a headless browser.
/// The browser is launched for one conversion and always terminated before
/// the call returns.
pub struct RenderEngineStrategy {
    browser_path: Option<String>,
}

impl RenderEngineStrategy {
    pub fn new(browser_path: Option<String>) -> Self {
        Self { browser_path }
    }

    fn executable(&self) -> String {
        if let Some(path) = &self.browser_path {
            return path.clone();
        }
        if cfg!(target_os = "macos") {
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome".to_string()
        } else if cfg!(target_os = "windows") {
            r"C:\Program Files\Google\Chrome\Application\chrome.exe".to_string()
        } else {
            for path in &[
                "/usr/bin/chromium",
                "/usr/bin/chromium-browser",
                "/usr/bin/google-chrome",
            ] {
                if std::path::Path::new(path).exists() {
                    return path.to_string();
                }
            }
            "chromium".to_string()
        }
    }

    fn to_html(request: &ConversionRequest) -> Result<String> {
        let data = request.payload.single()?;
        match request.class {
            DocumentClass::Spreadsheet => {
                let model = xlsx::parse(data)?;
                Ok(table::render_html(&model))
            }
            DocumentClass::WordDoc => docx::to_html(data),
            DocumentClass::Image => Err(ConvertError::Validation(
                "render engine does not handle images".into(),
            )),
        }
    }

    async fn print_pdf(browser: &Browser, url: &str, options: &ConvertOptions) -> Result<Vec<u8>> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| ConvertError::StrategyExecution(format!("cannot open tab: {e}")))?;

        page.goto(url)
            .await
            .map_err(|e| ConvertError::StrategyExecution(format!("navigation failed: {e}")))?;

        let geometry = page_dimensions(options.page_size, Orientation::Portrait);
        let margin_in = (options.margin_pt / 72.0) as f64;
        let mut params = PrintToPdfParams::default();
        params.landscape = Some(options.orientation == Orientation::Landscape);
        params.print_background = Some(true);
        params.paper_width = Some((geometry.width_pt / 72.0) as f64);
        params.paper_height = Some((geometry.height_pt / 72.0) as f64);
        params.margin_top = Some(margin_in);
        params.margin_bottom = Some(margin_in);
        params.margin_left = Some(margin_in);
        params.margin_right = Some(margin_in);

        page.pdf(params)
            .await
            .map_err(|e| ConvertError::StrategyExecution(format!("PDF generation failed: {e}")))
    }
}

#[async_trait]
impl ConvertStrategy for RenderEngineStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::RenderEngine
    }

    fn supports(&self, class: DocumentClass) -> bool {
        matches!(class, DocumentClass::Spreadsheet | DocumentClass::WordDoc)
    }

    async fn convert(&self, request: &ConversionRequest) -> Result<Conversion> {
        let html = Self::to_html(request)?;

        // Scoped: the directory and the generated HTML disappear when this
        // function returns, success or not.
        let temp_dir = tempfile::tempdir()?;
        let html_path = temp_dir.path().join("input.html");
        tokio::fs::write(&html_path, &html).await?;
        let url = format!("file://{}", html_path.display());

        let config = BrowserConfig::builder()
            .chrome_executable(self.executable())
            .no_sandbox()
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-background-networking")
            .arg("--headless")
            .build()
            .map_err(|e| ConvertError::StrategyExecution(format!("browser config: {e}")))?;

        let (mut browser, mut handler) = Browser::launch(config).await.map_err(|e| {
            ConvertError::Configuration(format!("cannot launch browser process: {e}"))
        })?;
        let event_loop = tokio::spawn(async move { while handler.next().await.is_some() {} });

        debug!("browser launched for {}", url);
        let printed = Self::print_pdf(&browser, &url, &request.options).await;

        // Tear the process down on every path before surfacing the result.
        let _ = browser.close().await;
        let _ = browser.wait().await;
        event_loop.abort();

        let bytes = printed?;
        let pages = page_count(&bytes);
        let stem = sanitize_file_name(&request.options.file_name_stem);
        info!("rendered {stem}.pdf ({pages} page(s)) via browser engine");

        Ok(Conversion {
            bytes,
            file_name: format!("{stem}.pdf"),
            mime_type: mime::APPLICATION_PDF.to_string(),
            page_count: pages,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::Payload;
    use bytes::Bytes;

    #[test]
    fn supports_office_classes_only() {
        let strategy = RenderEngineStrategy::new(None);
        assert!(strategy.supports(DocumentClass::Spreadsheet));
        assert!(strategy.supports(DocumentClass::WordDoc));
        assert!(!strategy.supports(DocumentClass::Image));
    }

    #[tokio::test]
    async fn invalid_spreadsheet_fails_validation_before_browser_launch() {
        let strategy = RenderEngineStrategy::new(None);
        let request = ConversionRequest {
            class: DocumentClass::Spreadsheet,
            payload: Payload::Single(Bytes::from_static(b"not an xlsx")),
            options: ConvertOptions::default(),
        };
        let err = strategy.convert(&request).await.unwrap_err();
        assert_eq!(err.kind(), "ValidationError");
    }
}
