//! Browser-driven docket search scraper
//!
//! Drives the public search form end to end for one item: select district,
//! court, and specialty, enter the year and document number, solve the image
//! CAPTCHA (re-solving until the site accepts it), then walk every result's
//! detail page and append the parsed record to the sink.
//!
//! The whole interaction runs under the per-item deadline; elapsing it is the
//! recoverable-failure signal the rotation decision feeds on. Every other
//! error is classified unknown and carried in full.

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, trace};

use super::browser::BrowserSession;
use super::{Scraper, record};
use crate::captcha::CaptchaSolver;
use crate::config::Config;
use crate::error::{Result, ScrapeError};
use crate::sink::RecordSink;
use crate::types::WorkItem;

const DETAIL_BUTTON_TITLE: &str = "Ver detalle de expediente";
const CAPTCHA_REJECTED_TEXT: &str = "Ingrese el Codigo de Captcha Correcto";

/// Scraper for the judicial docket search site
pub struct DocketScraper {
    config: Arc<Config>,
    captcha: Arc<dyn CaptchaSolver>,
    sink: Arc<dyn RecordSink>,
}

impl DocketScraper {
    /// Create a scraper from its collaborators
    pub fn new(
        config: Arc<Config>,
        captcha: Arc<dyn CaptchaSolver>,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            config,
            captcha,
            sink,
        }
    }

    /// Run the full search interaction on an open page
    async fn drive(&self, page: &Page, item: &WorkItem) -> std::result::Result<(), ScrapeError> {
        let scrape = &self.config.scrape;

        page.goto(scrape.url.as_str()).await?;

        select_option(page, "#distritoJudicial", &scrape.district).await?;

        wait_for_option(page, "#organoJurisdiccional", &scrape.court).await?;
        select_option(page, "#organoJurisdiccional", &scrape.court).await?;

        wait_for_option(page, "#especialidad", &scrape.specialty).await?;
        select_option(page, "#especialidad", &scrape.specialty).await?;

        select_option(page, "#anio", &item.year).await?;
        fill_field(page, "#numeroExpediente", &item.document_id).await?;

        wait_for(page, "!!document.querySelector('#captcha_image')").await?;
        self.pass_captcha(page).await?;

        tokio::time::sleep(scrape.action_delay).await;
        self.walk_details(page, item).await
    }

    /// Solve and submit the CAPTCHA until the site accepts it
    async fn pass_captcha(&self, page: &Page) -> std::result::Result<(), ScrapeError> {
        loop {
            let image = page
                .find_element("#captcha_image")
                .await?
                .screenshot(CaptureScreenshotFormat::Png)
                .await?;

            let text = self
                .captcha
                .solve_image(&image)
                .await
                .map_err(|e| ScrapeError::Unknown(format!("captcha solving failed: {}", e)))?;

            fill_field(page, "#codigoCaptcha", &text).await?;
            page.find_element("#consultarExpedientes").await?.click().await?;

            tokio::time::sleep(self.config.scrape.action_delay).await;

            let rejected = evaluate_bool(
                page,
                &format!(
                    "document.body.innerText.includes({})",
                    js_string(CAPTCHA_REJECTED_TEXT)
                ),
            )
            .await?;

            if !rejected {
                return Ok(());
            }
            debug!("captcha rejected by the site, solving a fresh challenge");
        }
    }

    /// Visit every result detail page and persist its record
    async fn walk_details(
        &self,
        page: &Page,
        item: &WorkItem,
    ) -> std::result::Result<(), ScrapeError> {
        let delay = self.config.scrape.action_delay;
        let mut index = 0;

        loop {
            let buttons = page.find_elements("div#divDetalles button").await?;
            if index >= buttons.len() {
                break;
            }

            let title = buttons[index].attribute("title").await?;
            if title.as_deref() != Some(DETAIL_BUTTON_TITLE) {
                index += 1;
                continue;
            }

            buttons[index].click().await?;
            tokio::time::sleep(delay).await;

            let header = inner_text(page, "div#gridRE").await?;
            let parties = inner_text(page, "div#collapseTwo").await?;

            if let (Some(header), Some(parties)) = (header, parties) {
                let record = record::parse_record(&header, &parties).ok_or_else(|| {
                    ScrapeError::Unknown(format!("detail page for {} had an unexpected layout", item))
                })?;
                self.sink
                    .append(&record)
                    .await
                    .map_err(|e| ScrapeError::Unknown(format!("failed to persist record: {}", e)))?;
                trace!(item = %item, "record persisted");
            }

            // Back to the result list via its first link
            let anchors = page.find_elements("div#divCuerpo a").await?;
            anchors
                .first()
                .ok_or_else(|| ScrapeError::Unknown("result list back link not found".to_string()))?
                .click()
                .await?;
            tokio::time::sleep(delay).await;

            index += 1;
        }

        Ok(())
    }
}

#[async_trait]
impl Scraper for DocketScraper {
    type Session = BrowserSession;

    async fn open_session(&self) -> Result<Self::Session> {
        BrowserSession::launch(self.config.scrape.headless, self.config.scrape.item_timeout).await
    }

    async fn scrape(
        &self,
        session: &mut Self::Session,
        item: &WorkItem,
    ) -> std::result::Result<(), ScrapeError> {
        let page = session.browser.new_page("about:blank").await?;

        let deadline = self.config.scrape.item_timeout;
        let result = match tokio::time::timeout(deadline, self.drive(&page, item)).await {
            Ok(result) => result,
            Err(_) => Err(ScrapeError::Recoverable(format!(
                "item {} exceeded the {}s deadline",
                item,
                deadline.as_secs()
            ))),
        };

        // The page is per-item; the browser process is not
        if let Err(e) = page.close().await {
            debug!(error = %e, "failed to close page after item");
        }

        result
    }

    async fn close_session(&self, session: Self::Session) {
        session.close().await;
    }
}

/// Evaluate a JS expression into a bool, defaulting to false on odd values
async fn evaluate_bool(page: &Page, expr: &str) -> std::result::Result<bool, ScrapeError> {
    let evaluation = page.evaluate(expr).await?;
    Ok(evaluation.into_value::<bool>().unwrap_or(false))
}

/// Poll until a JS expression is truthy
///
/// Unbounded here; the per-item deadline wrapping the interaction bounds it.
async fn wait_for(page: &Page, expr: &str) -> std::result::Result<(), ScrapeError> {
    loop {
        if evaluate_bool(page, expr).await? {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

/// Poll until a select carries an option with the given visible text
async fn wait_for_option(
    page: &Page,
    selector: &str,
    text: &str,
) -> std::result::Result<(), ScrapeError> {
    let expr = format!(
        "Array.from(document.querySelectorAll({} + ' option')).some(o => o.text.trim() === {})",
        js_string(selector),
        js_string(text)
    );
    wait_for(page, &expr).await
}

/// Select a dropdown option by value or visible text and fire its change event
async fn select_option(
    page: &Page,
    selector: &str,
    value: &str,
) -> std::result::Result<(), ScrapeError> {
    let js = format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            if (!el) return false;
            const opt = Array.from(el.options)
                .find(o => o.value === {val} || o.text.trim() === {val});
            if (!opt) return false;
            el.value = opt.value;
            el.dispatchEvent(new Event('change', {{ bubbles: true }}));
            return true;
        }})()"#,
        sel = js_string(selector),
        val = js_string(value),
    );

    if evaluate_bool(page, &js).await? {
        Ok(())
    } else {
        Err(ScrapeError::Unknown(format!(
            "option '{}' not available in {}",
            value, selector
        )))
    }
}

/// Replace a text input's value and fire its input event
async fn fill_field(
    page: &Page,
    selector: &str,
    value: &str,
) -> std::result::Result<(), ScrapeError> {
    let js = format!(
        r#"(() => {{
            const el = document.querySelector({sel});
            if (!el) return false;
            el.value = {val};
            el.dispatchEvent(new Event('input', {{ bubbles: true }}));
            return true;
        }})()"#,
        sel = js_string(selector),
        val = js_string(value),
    );

    if evaluate_bool(page, &js).await? {
        Ok(())
    } else {
        Err(ScrapeError::Unknown(format!("element {} not found", selector)))
    }
}

/// Read an element's rendered text, if the element exists
async fn inner_text(
    page: &Page,
    selector: &str,
) -> std::result::Result<Option<String>, ScrapeError> {
    match page.find_element(selector).await {
        Ok(element) => Ok(element.inner_text().await?),
        Err(_) => Ok(None),
    }
}

/// Quote a Rust string as a JS string literal
fn js_string(s: &str) -> String {
    serde_json::Value::String(s.to_string()).to_string()
}
