pub mod dom;
pub mod live;

#[cfg(test)]
mod tests;

use async_trait::async_trait;

use crate::config::ExtractSchema;
use crate::errors::ExtractError;
use crate::fetchers::FetchResult;
use crate::records::Record;

/// Where the next page is, according to the extractor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// No enabled next control - the pagination chain ends here
    None,

    /// Static variant: the next control's href, resolved against the
    /// page's final URL
    Url(String),

    /// Rendered variant: an enabled next control exists on the live page
    /// and can be clicked
    Click,
}

/// Result of extracting one page
#[derive(Debug, Clone)]
pub struct Extraction {
    /// Records in document order
    pub records: Vec<Record>,

    /// The next-page affordance
    pub next: NextPage,
}

/// Capability that turns one fetched page into records plus the next-page
/// affordance.
///
/// Implementations are polymorphic over the page representation -
/// statically parsed markup or the live rendered document - and the
/// controller never knows which variant is active. Elements missing a
/// required field are skipped and logged, never failing the page.
#[async_trait]
pub trait Extractor: Send {
    async fn extract(
        &mut self,
        page: &FetchResult,
        schema: &ExtractSchema,
    ) -> Result<Extraction, ExtractError>;
}

/// Shared convention for both variants: a next control carrying a
/// `disabled` attribute or a `disabled` class is treated as absent.
fn control_is_disabled(disabled_attr: Option<&str>, class_attr: Option<&str>) -> bool {
    if disabled_attr.is_some() {
        return true;
    }
    class_attr
        .map(|classes| classes.split_whitespace().any(|class| class == "disabled"))
        .unwrap_or(false)
}

/// Collapses runs of whitespace in extracted text
fn normalize_text(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}
