use crate::config::{ExtractSchema, FieldRule};
use crate::errors::ExtractError;
use crate::extract::dom::DomExtractor;
use crate::extract::{Extractor, NextPage};
use crate::fetchers::FetchResult;
use crate::records::FieldValue;

fn page(body: &str, url: &str) -> FetchResult {
    FetchResult {
        body: body.to_string(),
        url: url.to_string(),
        status: 200,
        content_encoding: None,
    }
}

const TWO_QUOTES_WITH_NEXT: &str = r#"<html><body>
<div class="quote">
  <span class="text">Quote one.</span>
  <small class="author">Author One</small>
  <div class="tags"><a class="tag">life</a><a class="tag">truth</a></div>
</div>
<div class="quote">
  <span class="text">Quote two.</span>
  <small class="author">Author Two</small>
  <div class="tags"></div>
</div>
<ul class="pager"><li class="next"><a href="/page/2/">Next</a></li></ul>
</body></html>"#;

#[cfg(test)]
mod extraction_tests {
    use super::*;

    #[tokio::test]
    async fn test_extracts_all_well_formed_elements() {
        let mut extractor = DomExtractor::new();
        let result = extractor
            .extract(
                &page(TWO_QUOTES_WITH_NEXT, "https://quotes.toscrape.com/page/1/"),
                &ExtractSchema::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.records.len(), 2);
        assert_eq!(
            result.records[0].get("text"),
            Some(&FieldValue::Single("Quote one.".to_string()))
        );
        assert_eq!(
            result.records[1].get("author"),
            Some(&FieldValue::Single("Author Two".to_string()))
        );
    }

    #[tokio::test]
    async fn test_multi_valued_field_collects_every_match() {
        let mut extractor = DomExtractor::new();
        let result = extractor
            .extract(
                &page(TWO_QUOTES_WITH_NEXT, "https://quotes.toscrape.com/page/1/"),
                &ExtractSchema::default(),
            )
            .await
            .unwrap();

        assert_eq!(
            result.records[0].get("tags"),
            Some(&FieldValue::Many(vec![
                "life".to_string(),
                "truth".to_string()
            ]))
        );
        assert_eq!(result.records[1].get("tags"), Some(&FieldValue::Many(vec![])));
    }

    #[tokio::test]
    async fn test_element_missing_required_field_is_skipped() {
        let body = r#"<html><body>
<div class="quote"><span class="text">Kept.</span><small class="author">Someone</small></div>
<div class="quote"><small class="author">No text here</small></div>
</body></html>"#;

        let mut extractor = DomExtractor::new();
        let result = extractor
            .extract(
                &page(body, "https://quotes.toscrape.com/"),
                &ExtractSchema::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.records.len(), 1);
        assert_eq!(
            result.records[0].get("text"),
            Some(&FieldValue::Single("Kept.".to_string()))
        );
    }

    #[tokio::test]
    async fn test_missing_optional_field_yields_empty_value() {
        let body = r#"<html><body>
<div class="quote"><span class="text">Tagless.</span><small class="author">Someone</small></div>
</body></html>"#;

        let mut extractor = DomExtractor::new();
        let result = extractor
            .extract(
                &page(body, "https://quotes.toscrape.com/"),
                &ExtractSchema::default(),
            )
            .await
            .unwrap();

        assert_eq!(result.records.len(), 1);
        assert_eq!(result.records[0].get("tags"), Some(&FieldValue::Many(vec![])));
    }

    #[tokio::test]
    async fn test_invalid_container_selector_is_an_error() {
        let schema = ExtractSchema {
            container: ":::not-a-selector".to_string(),
            ..ExtractSchema::default()
        };

        let mut extractor = DomExtractor::new();
        let result = extractor
            .extract(&page("<html></html>", "https://quotes.toscrape.com/"), &schema)
            .await;

        assert!(matches!(result, Err(ExtractError::InvalidSelector(_))));
    }

    #[tokio::test]
    async fn test_whitespace_in_field_text_is_normalized() {
        let body = r#"<html><body>
<div class="quote"><span class="text">  spread
   over   lines </span><small class="author">A</small></div>
</body></html>"#;

        let mut extractor = DomExtractor::new();
        let result = extractor
            .extract(
                &page(body, "https://quotes.toscrape.com/"),
                &ExtractSchema::default(),
            )
            .await
            .unwrap();

        assert_eq!(
            result.records[0].get("text"),
            Some(&FieldValue::Single("spread over lines".to_string()))
        );
    }
}

#[cfg(test)]
mod next_control_tests {
    use super::*;

    async fn next_for(body: &str) -> NextPage {
        let mut extractor = DomExtractor::new();
        extractor
            .extract(
                &page(body, "https://quotes.toscrape.com/page/1/"),
                &ExtractSchema::default(),
            )
            .await
            .unwrap()
            .next
    }

    #[tokio::test]
    async fn test_next_href_is_resolved_against_the_page_url() {
        let next = next_for(TWO_QUOTES_WITH_NEXT).await;
        assert_eq!(
            next,
            NextPage::Url("https://quotes.toscrape.com/page/2/".to_string())
        );
    }

    #[tokio::test]
    async fn test_absent_next_control_ends_the_chain() {
        let body = r#"<html><body><div class="quote">
<span class="text">Last.</span><small class="author">A</small>
</div></body></html>"#;
        assert_eq!(next_for(body).await, NextPage::None);
    }

    #[tokio::test]
    async fn test_disabled_attribute_ends_the_chain() {
        let body = r#"<html><body>
<ul class="pager"><li class="next"><a disabled href="/page/2/">Next</a></li></ul>
</body></html>"#;
        assert_eq!(next_for(body).await, NextPage::None);
    }

    #[tokio::test]
    async fn test_disabled_class_ends_the_chain() {
        let body = r#"<html><body>
<ul class="pager"><li class="next"><a class="nav disabled" href="/page/2/">Next</a></li></ul>
</body></html>"#;
        assert_eq!(next_for(body).await, NextPage::None);
    }

    #[tokio::test]
    async fn test_next_control_without_href_ends_the_chain() {
        let body = r#"<html><body>
<ul class="pager"><li class="next"><a>Next</a></li></ul>
</body></html>"#;
        assert_eq!(next_for(body).await, NextPage::None);
    }

    #[tokio::test]
    async fn test_custom_schema_next_control() {
        let schema = ExtractSchema {
            container: ".product".to_string(),
            fields: vec![FieldRule {
                name: "title".to_string(),
                selector: ".title".to_string(),
                required: true,
                multi: false,
            }],
            next_control: "a.load-more".to_string(),
        };
        let body = r#"<html><body>
<div class="product"><span class="title">Widget</span></div>
<a class="load-more" href="?page=2">More</a>
</body></html>"#;

        let mut extractor = DomExtractor::new();
        let result = extractor
            .extract(&page(body, "https://shop.example.com/list"), &schema)
            .await
            .unwrap();

        assert_eq!(result.records.len(), 1);
        assert_eq!(
            result.next,
            NextPage::Url("https://shop.example.com/list?page=2".to_string())
        );
    }
}
