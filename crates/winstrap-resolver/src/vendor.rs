use anyhow::{anyhow, Context, Result};
use serde_json::Value;

use crate::HttpFetch;

/// Resolves against a vendor release API whose response is keyed by product
/// code: `{ "<code>": [ { "downloads": { "windows": { "link": … } } } ] }`.
/// The product code is carried in the template URL's query string.
pub(crate) fn resolve_vendor_api(http: &dyn HttpFetch, url_template: &str) -> Result<String> {
    let product_code = product_code_from_query(url_template)?;
    let body = http.get_text(url_template)?;
    let response: Value = serde_json::from_str(&body)
        .with_context(|| format!("failed parsing vendor api response: {url_template}"))?;

    response
        .get(&product_code)
        .and_then(|releases| releases.get(0))
        .and_then(|release| release.pointer("/downloads/windows/link"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .ok_or_else(|| {
            anyhow!("vendor api response has no windows download link for product '{product_code}'")
        })
}

fn product_code_from_query(url_template: &str) -> Result<String> {
    let query = url_template
        .split_once('?')
        .map(|(_, query)| query)
        .ok_or_else(|| anyhow!("vendor api url has no query string: {url_template}"))?;

    let mut first_value = None;
    for pair in query.split('&') {
        let Some((key, value)) = pair.split_once('=') else {
            continue;
        };
        if value.is_empty() {
            continue;
        }
        if key == "code" {
            return Ok(value.to_string());
        }
        if first_value.is_none() {
            first_value = Some(value.to_string());
        }
    }

    first_value
        .ok_or_else(|| anyhow!("vendor api url has no product code parameter: {url_template}"))
}
