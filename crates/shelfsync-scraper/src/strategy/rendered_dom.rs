//! Strategy: product cards in the rendered DOM.
//!
//! Reads the HTML returned by a [`crate::PageRenderer`]. Selectors come from
//! configuration because the vendor's Vuetify class names shift between
//! releases.

use scraper::{ElementRef, Html, Selector};
use shelfsync_core::DomSelectors;

use crate::error::ExtractionError;
use crate::types::RawItem;

/// Extract one raw item per product card.
///
/// # Errors
///
/// Returns [`ExtractionError::ElementNotFound`] when a selector does not parse
/// or no card matches the card selector.
pub fn extract_dom_items(
    html: &str,
    selectors: &DomSelectors,
) -> Result<Vec<RawItem>, ExtractionError> {
    let card_sel = parse_selector(&selectors.card)?;
    let title_sel = parse_selector(&selectors.title)?;
    let description_sel = parse_selector(&selectors.description)?;
    let price_sel = parse_selector(&selectors.price)?;
    let image_sel = parse_selector(&selectors.image)?;

    let document = Html::parse_document(html);
    let items: Vec<RawItem> = document
        .select(&card_sel)
        .map(|card| RawItem {
            title: first_text(card, &title_sel),
            description: first_text(card, &description_sel),
            price: first_text(card, &price_sel)
                .map(|text| clean_price_text(&text))
                .filter(|p| !p.is_empty()),
            currency: None,
            image_url: card.select(&image_sel).next().and_then(image_source),
        })
        .collect();

    if items.is_empty() {
        return Err(ExtractionError::ElementNotFound {
            selector: selectors.card.clone(),
        });
    }
    Ok(items)
}

/// Keeps only digits and the decimal point: `"$ 1,250.00"` becomes `"1250.00"`.
#[must_use]
pub fn clean_price_text(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect()
}

fn parse_selector(selector: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(selector).map_err(|_| ExtractionError::ElementNotFound {
        selector: selector.to_owned(),
    })
}

fn first_text(card: ElementRef<'_>, selector: &Selector) -> Option<String> {
    card.select(selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .filter(|text| !text.is_empty())
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// `<img src>`/`data-src`, or the `background-image: url(...)` Vuetify uses
/// for `v-image` covers.
fn image_source(el: ElementRef<'_>) -> Option<String> {
    let attrs = el.value();
    if let Some(src) = attrs
        .attr("src")
        .or_else(|| attrs.attr("data-src"))
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return Some(src.to_owned());
    }

    let style = attrs.attr("style")?;
    let start = style.find("url(")? + "url(".len();
    let end = style[start..].find(')')? + start;
    let url = style[start..end]
        .trim()
        .trim_matches(|c| c == '"' || c == '\'')
        .trim();
    (!url.is_empty()).then(|| url.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"
        <html><body><div class="v-container">
          <div class="product-view-handler">
            <div class="product-card__title">  Samsung
                Galaxy A15 </div>
            <div class="product-card__description">128GB, negro</div>
            <span class="product__price">$ 1,250.00</span>
            <div class="v-image__image v-image__image--cover"
                 style="background-image: url(&quot;https://cdn.example.com/a15.webp&quot;); background-position: center center;"></div>
          </div>
          <div class="product-view-handler">
            <div class="product-card__title">Cargador</div>
            <span class="product__price">Consultar</span>
            <img class="v-image__image--cover" data-src="https://cdn.example.com/charger.jpg">
          </div>
        </div></body></html>
    "#;

    #[test]
    fn reads_every_card() {
        let items = extract_dom_items(PAGE, &DomSelectors::default()).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.title.as_deref(), Some("Samsung Galaxy A15"));
        assert_eq!(first.description.as_deref(), Some("128GB, negro"));
        assert_eq!(first.price.as_deref(), Some("1250.00"));
        assert_eq!(
            first.image_url.as_deref(),
            Some("https://cdn.example.com/a15.webp")
        );

        let second = &items[1];
        assert_eq!(second.description, None);
        assert_eq!(second.price, None);
        assert_eq!(
            second.image_url.as_deref(),
            Some("https://cdn.example.com/charger.jpg")
        );
    }

    #[test]
    fn no_cards_is_element_not_found() {
        let err = extract_dom_items("<html><body></body></html>", &DomSelectors::default())
            .unwrap_err();
        assert!(
            matches!(&err, ExtractionError::ElementNotFound { selector } if selector == ".product-view-handler"),
            "{err:?}"
        );
    }

    #[test]
    fn invalid_selector_is_element_not_found() {
        let selectors = DomSelectors {
            card: "div[".to_owned(),
            ..DomSelectors::default()
        };
        let err = extract_dom_items(PAGE, &selectors).unwrap_err();
        assert!(matches!(err, ExtractionError::ElementNotFound { .. }), "{err:?}");
    }

    #[test]
    fn price_text_keeps_digits_and_point() {
        assert_eq!(clean_price_text("US$ 1,099.90 c/u"), "1099.90");
        assert_eq!(clean_price_text("gratis"), "");
    }
}
