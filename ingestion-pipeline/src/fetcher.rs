use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use common::error::AppError;
use headless_chrome::{Browser, Tab};
use tracing::{debug, info, warn};

/// Raw field values scraped from a detail page, named as the source site
/// names them. Everything is optional at this stage; the normalizer
/// decides what is required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawDecision {
    pub rol: Option<String>,
    pub fecha: Option<String>,
    pub tribunal: Option<String>,
    pub caratulado: Option<String>,
    pub resultado: Option<String>,
    pub materia: Option<String>,
    pub enlace: Option<String>,
    pub texto_completo: Option<String>,
    pub considerandos: Option<String>,
    pub resolucion: Option<String>,
    pub disidencia: Option<String>,
}

/// One row of the search result listing: enough to run the dedup gate
/// before paying for the detail fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    pub rol: String,
    pub detail_url: String,
}

#[async_trait]
pub trait DecisionFetcher: Send + Sync {
    async fn fetch_listing(&self, search_url: &str) -> Result<Vec<ListingEntry>, AppError>;
    async fn fetch_detail(&self, entry: &ListingEntry) -> Result<RawDecision, AppError>;
}

const LISTING_ROW_SELECTOR: &str = "table.tabla-resultados tbody tr";
const LISTING_ROL_SELECTOR: &str = "td.rol";
const LISTING_LINK_SELECTOR: &str = "td.rol a";

const DETAIL_PANE_SELECTOR: &str = "div.detalle-causa";
const ROL_SELECTOR: &str = "div.detalle-causa span.rol";
const FECHA_SELECTOR: &str = "div.detalle-causa span.fecha";
const TRIBUNAL_SELECTOR: &str = "div.detalle-causa span.tribunal";
const CARATULADO_SELECTOR: &str = "div.detalle-causa span.caratulado";
const RESULTADO_SELECTOR: &str = "div.detalle-causa span.resultado";
const MATERIA_SELECTOR: &str = "div.detalle-causa span.materia";
const TEXTO_SELECTOR: &str = "div.texto-sentencia";
const CONSIDERANDOS_SELECTOR: &str = "div.texto-sentencia div.considerandos";
const RESOLUCION_SELECTOR: &str = "div.texto-sentencia div.resolucion";
const DISIDENCIA_SELECTOR: &str = "div.texto-sentencia div.disidencia";

/// Fetcher backed by a headless Chrome instance. The court site renders
/// its results client-side, so a plain HTTP client sees an empty shell.
pub struct ChromeFetcher {
    navigation_timeout: Duration,
}

impl ChromeFetcher {
    pub fn new(navigation_timeout: Duration) -> Self {
        Self { navigation_timeout }
    }

    /// The browser is returned alongside the tab: dropping it would shut
    /// the Chrome process down underneath the tab.
    fn open_tab(&self, url: &str) -> Result<(Browser, Arc<Tab>), AppError> {
        let browser = Browser::default().map_err(|e| AppError::Fetch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| AppError::Fetch(e.to_string()))?;
        tab.set_default_timeout(self.navigation_timeout);
        tab.navigate_to(url)
            .and_then(|t| t.wait_until_navigated())
            .map_err(|e| AppError::Fetch(format!("navigation to {url} failed: {e}")))?;
        Ok((browser, tab))
    }
}

#[async_trait]
impl DecisionFetcher for ChromeFetcher {
    async fn fetch_listing(&self, search_url: &str) -> Result<Vec<ListingEntry>, AppError> {
        ensure_fetch_url_allowed(search_url)?;
        info!(url = %search_url, "fetching search listing");

        let (_browser, tab) = self.open_tab(search_url)?;
        tab.wait_for_element(LISTING_ROW_SELECTOR)
            .map_err(|e| AppError::Fetch(format!("result listing never appeared: {e}")))?;

        let rows = tab
            .find_elements(LISTING_ROW_SELECTOR)
            .map_err(|e| AppError::Fetch(e.to_string()))?;

        let mut entries = Vec::new();
        for row in rows {
            let rol = row
                .find_element(LISTING_ROL_SELECTOR)
                .ok()
                .and_then(|el| el.get_inner_text().ok())
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty());

            let href = row
                .find_element(LISTING_LINK_SELECTOR)
                .ok()
                .and_then(|el| el.get_attributes().ok().flatten())
                .and_then(|attrs| attribute_value(&attrs, "href"));

            match (rol, href) {
                (Some(rol), Some(detail_url)) => entries.push(ListingEntry { rol, detail_url }),
                (rol, _) => {
                    warn!(rol = ?rol, "skipping malformed listing row");
                }
            }
        }

        debug!(result_count = entries.len(), "search listing parsed");
        Ok(entries)
    }

    async fn fetch_detail(&self, entry: &ListingEntry) -> Result<RawDecision, AppError> {
        ensure_fetch_url_allowed(&entry.detail_url)?;
        debug!(rol = %entry.rol, url = %entry.detail_url, "fetching decision detail");

        let (_browser, tab) = self.open_tab(&entry.detail_url)?;
        tab.wait_for_element(DETAIL_PANE_SELECTOR)
            .map_err(|e| AppError::Fetch(format!("detail pane never appeared: {e}")))?;

        Ok(RawDecision {
            rol: text_of(&tab, ROL_SELECTOR).or_else(|| Some(entry.rol.clone())),
            fecha: text_of(&tab, FECHA_SELECTOR),
            tribunal: text_of(&tab, TRIBUNAL_SELECTOR),
            caratulado: text_of(&tab, CARATULADO_SELECTOR),
            resultado: text_of(&tab, RESULTADO_SELECTOR),
            materia: text_of(&tab, MATERIA_SELECTOR),
            enlace: Some(entry.detail_url.clone()),
            texto_completo: text_of(&tab, TEXTO_SELECTOR),
            considerandos: text_of(&tab, CONSIDERANDOS_SELECTOR),
            resolucion: text_of(&tab, RESOLUCION_SELECTOR),
            disidencia: text_of(&tab, DISIDENCIA_SELECTOR),
        })
    }
}

fn text_of(tab: &Tab, selector: &str) -> Option<String> {
    tab.find_element(selector)
        .ok()
        .and_then(|el| el.get_inner_text().ok())
}

/// Chrome reports attributes as a flat name/value list.
fn attribute_value(attributes: &[String], name: &str) -> Option<String> {
    attributes
        .chunks_exact(2)
        .find(|pair| pair.first().is_some_and(|n| n == name))
        .and_then(|pair| pair.get(1).cloned())
}

fn ensure_fetch_url_allowed(url: &str) -> Result<(), AppError> {
    let parsed =
        url::Url::parse(url).map_err(|_| AppError::Validation(format!("Invalid URL: {url}")))?;

    match parsed.scheme() {
        "http" | "https" => {}
        scheme => {
            warn!(%url, %scheme, "Rejected fetch URL due to unsupported scheme");
            return Err(AppError::Validation(
                "Unsupported URL scheme for fetching".to_string(),
            ));
        }
    }

    if parsed.host_str().is_none() {
        warn!(%url, "Rejected fetch URL missing host");
        return Err(AppError::Validation(
            "URL is missing a host component".to_string(),
        ));
    }

    Ok(())
}

/// Plain HTTP reachability check before a run starts. Failing here is a
/// startup condition, not a per-record one.
pub async fn probe_source(url: &str) -> Result<(), AppError> {
    ensure_fetch_url_allowed(url)?;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .map_err(|e| AppError::Fetch(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| AppError::Fetch(format!("source unreachable: {e}")))?;

    if response.status().is_server_error() {
        return Err(AppError::Fetch(format!(
            "source responded with {}",
            response.status()
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_unsupported_scheme() {
        assert!(ensure_fetch_url_allowed("ftp://juris.pjud.cl").is_err());
    }

    #[test]
    fn rejects_url_without_host() {
        assert!(ensure_fetch_url_allowed("https:///busqueda").is_err());
    }

    #[test]
    fn allows_public_https_url() {
        assert!(ensure_fetch_url_allowed("https://juris.pjud.cl/busqueda").is_ok());
    }

    #[test]
    fn attribute_value_reads_flat_pairs() {
        let attrs = vec![
            "class".to_string(),
            "rol".to_string(),
            "href".to_string(),
            "/fallos/C-1-2024".to_string(),
        ];
        assert_eq!(
            attribute_value(&attrs, "href").as_deref(),
            Some("/fallos/C-1-2024")
        );
        assert_eq!(attribute_value(&attrs, "id"), None);
    }
}
