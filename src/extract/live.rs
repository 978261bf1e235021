use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::{Client, Locator};

use super::{Extraction, Extractor, NextPage, control_is_disabled, normalize_text};
use crate::config::{ExtractSchema, FieldRule};
use crate::errors::ExtractError;
use crate::fetchers::FetchResult;
use crate::records::{FieldValue, Record};

/// Extractor over the live rendered document.
///
/// Queries elements through the WebDriver session the rendered fetcher
/// keeps open; the snapshot in `FetchResult` is not consulted, it only
/// identifies the page for logging.
pub struct LiveExtractor {
    client: Client,
}

impl LiveExtractor {
    /// Wrap a handle to an open WebDriver session
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Checks for an enabled next control on the live page
    async fn next_page(&self, schema: &ExtractSchema) -> Result<NextPage, ExtractError> {
        let controls = self
            .client
            .find_all(Locator::Css(&schema.next_control))
            .await
            .map_err(map_cmd_error)?;

        let Some(control) = controls.into_iter().next() else {
            return Ok(NextPage::None);
        };

        let disabled = control.attr("disabled").await.map_err(map_cmd_error)?;
        let class = control.attr("class").await.map_err(map_cmd_error)?;
        if control_is_disabled(disabled.as_deref(), class.as_deref()) {
            return Ok(NextPage::None);
        }

        Ok(NextPage::Click)
    }
}

#[async_trait]
impl Extractor for LiveExtractor {
    async fn extract(
        &mut self,
        page: &FetchResult,
        schema: &ExtractSchema,
    ) -> Result<Extraction, ExtractError> {
        let containers = self
            .client
            .find_all(Locator::Css(&schema.container))
            .await
            .map_err(map_cmd_error)?;

        let mut records = Vec::new();
        for element in &containers {
            if let Some(record) = extract_record(element, schema).await? {
                records.push(record);
            }
        }
        ::log::info!("Extracted {} records from {}", records.len(), page.url);

        let next = self.next_page(schema).await?;
        Ok(Extraction { records, next })
    }
}

/// Extract one candidate element; `None` when a required field is missing
async fn extract_record(
    element: &Element,
    schema: &ExtractSchema,
) -> Result<Option<Record>, ExtractError> {
    let mut record = Record::new();

    for rule in &schema.fields {
        let value = field_value(element, rule).await?;
        if rule.required && value.is_empty() {
            ::log::debug!("Skipping element missing required field `{}`", rule.name);
            return Ok(None);
        }
        record.push(rule.name.clone(), value);
    }

    Ok(Some(record))
}

async fn field_value(element: &Element, rule: &FieldRule) -> Result<FieldValue, ExtractError> {
    let matches = element
        .find_all(Locator::Css(&rule.selector))
        .await
        .map_err(map_cmd_error)?;

    if rule.multi {
        let mut values = Vec::with_capacity(matches.len());
        for matched in &matches {
            let text = matched.text().await.map_err(map_cmd_error)?;
            values.push(normalize_text(&text));
        }
        Ok(FieldValue::Many(values))
    } else {
        match matches.first() {
            Some(matched) => {
                let text = matched.text().await.map_err(map_cmd_error)?;
                Ok(FieldValue::Single(normalize_text(&text)))
            }
            None => Ok(FieldValue::Single(String::new())),
        }
    }
}

/// Classifies WebDriver failures; a bad schema selector is reported as
/// such instead of a lost session
fn map_cmd_error(error: fantoccini::error::CmdError) -> ExtractError {
    let text = error.to_string();
    if text.contains("invalid selector") {
        return ExtractError::InvalidSelector(text);
    }
    ExtractError::Session(text)
}
