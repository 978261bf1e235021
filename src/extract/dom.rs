use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use super::{Extraction, Extractor, NextPage, control_is_disabled, normalize_text};
use crate::config::{ExtractSchema, FieldRule};
use crate::errors::ExtractError;
use crate::fetchers::FetchResult;
use crate::records::{FieldValue, Record};

/// Extractor over statically parsed markup
#[derive(Debug, Default)]
pub struct DomExtractor;

impl DomExtractor {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Extractor for DomExtractor {
    async fn extract(
        &mut self,
        page: &FetchResult,
        schema: &ExtractSchema,
    ) -> Result<Extraction, ExtractError> {
        let doc = Html::parse_document(&page.body);
        let container = parse_selector(&schema.container)?;

        let mut records = Vec::new();
        for element in doc.select(&container) {
            if let Some(record) = extract_record(element, schema)? {
                records.push(record);
            }
        }
        ::log::info!("Extracted {} records from {}", records.len(), page.url);

        let next = next_page(&doc, schema, &page.url)?;
        Ok(Extraction { records, next })
    }
}

/// Extract one candidate element; `None` when a required field is missing
fn extract_record(
    element: ElementRef,
    schema: &ExtractSchema,
) -> Result<Option<Record>, ExtractError> {
    let mut record = Record::new();

    for rule in &schema.fields {
        let value = field_value(element, rule)?;
        if rule.required && value.is_empty() {
            ::log::debug!("Skipping element missing required field `{}`", rule.name);
            return Ok(None);
        }
        record.push(rule.name.clone(), value);
    }

    Ok(Some(record))
}

fn field_value(element: ElementRef, rule: &FieldRule) -> Result<FieldValue, ExtractError> {
    let selector = parse_selector(&rule.selector)?;

    if rule.multi {
        let values: Vec<String> = element.select(&selector).map(element_text).collect();
        Ok(FieldValue::Many(values))
    } else {
        let value = element
            .select(&selector)
            .next()
            .map(element_text)
            .unwrap_or_default();
        Ok(FieldValue::Single(value))
    }
}

/// Locates the next control and resolves its href against the page URL
fn next_page(doc: &Html, schema: &ExtractSchema, base_url: &str) -> Result<NextPage, ExtractError> {
    let selector = parse_selector(&schema.next_control)?;

    let Some(control) = doc.select(&selector).next() else {
        return Ok(NextPage::None);
    };
    if control_is_disabled(control.value().attr("disabled"), control.value().attr("class")) {
        return Ok(NextPage::None);
    }
    let Some(href) = control.value().attr("href") else {
        return Ok(NextPage::None);
    };

    match Url::parse(base_url).and_then(|base| base.join(href)) {
        Ok(resolved) => Ok(NextPage::Url(resolved.to_string())),
        Err(e) => {
            ::log::warn!("Could not resolve next href `{}` against {}: {}", href, base_url, e);
            Ok(NextPage::None)
        }
    }
}

fn element_text(element: ElementRef) -> String {
    normalize_text(&element.text().collect::<Vec<_>>().join(" "))
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractError> {
    Selector::parse(selector).map_err(|_| ExtractError::InvalidSelector(selector.to_string()))
}
