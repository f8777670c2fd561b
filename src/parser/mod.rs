//! Review-page extraction
//!
//! Turns rendered page content into typed records: product attributes
//! from the detail page, one [`Review`] per review element. Markup shape
//! varies between page revisions, so every field is extracted through a
//! chain of selector fallbacks; a field no selector matches gets an
//! explicit unknown marker rather than dropping the record.

use chrono::Utc;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};

use crate::crawler::navigator::RenderedPage;
use crate::error::{ExtractError, Result};
use crate::models::{Product, Review, NOT_SPECIFIED, UNKNOWN};

/// Everything extracted from one rendered page
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    /// Product fields, populated from page 1 only
    pub product: Option<Product>,
    pub reviews: Vec<Review>,
    /// Page signaled itself as the last review page
    pub is_last_page: bool,
    /// Review elements skipped as malformed
    pub skipped: u32,
}

/// Compiled selector chain; tried in order until one matches
struct FieldSelectors(Vec<Selector>);

impl FieldSelectors {
    fn parse(selectors: &[&str]) -> Result<Self> {
        let compiled = selectors
            .iter()
            .map(|s| {
                Selector::parse(s)
                    .map_err(|e| ExtractError::InvalidSelector(format!("{s}: {e}")).into())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self(compiled))
    }

    /// First non-empty text match in document scope
    fn text_in(&self, html: &Html, default: &str) -> String {
        for selector in &self.0 {
            if let Some(element) = html.select(selector).next() {
                let text = element_text(&element);
                if !text.is_empty() && text != "$" {
                    return text;
                }
            }
        }
        default.to_string()
    }

    /// First non-empty text match below the given element
    fn text_under(&self, element: &ElementRef, default: &str) -> String {
        for selector in &self.0 {
            if let Some(found) = element.select(selector).next() {
                let text = element_text(&found);
                if !text.is_empty() {
                    return text;
                }
            }
        }
        default.to_string()
    }

    fn first_under<'a>(&self, element: &ElementRef<'a>) -> Option<ElementRef<'a>> {
        self.0
            .iter()
            .find_map(|selector| element.select(selector).next())
    }
}

/// Collapse an element's text nodes into one trimmed string
fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join(" ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extractor for product-detail and review pages
pub struct ReviewExtractor {
    product_title: FieldSelectors,
    product_brand: FieldSelectors,
    product_price: FieldSelectors,
    product_rating: FieldSelectors,
    product_reviews_count: FieldSelectors,
    product_description: FieldSelectors,

    review_cell: Selector,
    review_title: FieldSelectors,
    review_content: FieldSelectors,
    review_author: FieldSelectors,
    review_meta: FieldSelectors,
    review_rating: FieldSelectors,
    review_verified: Selector,

    pagination_next: Selector,
    pagination_next_disabled: Selector,

    item_number_re: Regex,
    rating_class_re: Regex,
    date_re: Regex,
}

impl ReviewExtractor {
    pub fn new() -> Result<Self> {
        Ok(Self {
            product_title: FieldSelectors::parse(&[
                "h1.product-title",
                ".product-title",
                "h1",
            ])?,
            product_brand: FieldSelectors::parse(&[
                "div.product-breadcrumb a",
                ".seller-store-link a",
            ])?,
            product_price: FieldSelectors::parse(&[
                "li.price-current strong",
                ".price-current strong",
                ".price-current",
            ])?,
            product_rating: FieldSelectors::parse(&["i.rating", "span.rating"])?,
            product_reviews_count: FieldSelectors::parse(&[
                "span.item-rating-num",
                ".product-reviews span",
            ])?,
            product_description: FieldSelectors::parse(&[
                "div.product-bullets ul",
                ".product-bullets",
            ])?,

            review_cell: Selector::parse("div.comments-cell")
                .map_err(|e| ExtractError::InvalidSelector(e.to_string()))?,
            review_title: FieldSelectors::parse(&[
                ".comments-title-content",
                ".review-title",
                "h3",
                "h4",
            ])?,
            review_content: FieldSelectors::parse(&[
                ".comments-content",
                ".review-content",
                ".review-text",
                "p",
            ])?,
            review_author: FieldSelectors::parse(&[
                ".comments-name",
                ".review-author",
                ".author",
            ])?,
            review_meta: FieldSelectors::parse(&[".comments-text"])?,
            review_rating: FieldSelectors::parse(&[".rating"])?,
            review_verified: Selector::parse(".comments-verified-owner")
                .map_err(|e| ExtractError::InvalidSelector(e.to_string()))?,

            pagination_next: Selector::parse(".paginations-next")
                .map_err(|e| ExtractError::InvalidSelector(e.to_string()))?,
            pagination_next_disabled: Selector::parse(".paginations-next.is-disabled")
                .map_err(|e| ExtractError::InvalidSelector(e.to_string()))?,

            item_number_re: Regex::new(r"/p/([A-Za-z0-9]+)")
                .map_err(|e| ExtractError::InvalidSelector(e.to_string()))?,
            rating_class_re: Regex::new(r"rating-(\d)")
                .map_err(|e| ExtractError::InvalidSelector(e.to_string()))?,
            date_re: Regex::new(r"(\d{1,2}/\d{1,2}/\d{4})")
                .map_err(|e| ExtractError::InvalidSelector(e.to_string()))?,
        })
    }

    /// Derive the product natural key from its URL
    pub fn extract_item_number(&self, url: &str) -> Result<String> {
        self.item_number_re
            .captures(url)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .ok_or_else(|| ExtractError::ItemNumberNotFound(url.to_string()).into())
    }

    /// Extract records from one rendered page.
    ///
    /// Product fields come from page 1 only; later pages yield review
    /// records alone. Individual malformed review elements are skipped
    /// and logged, never fatal to the page.
    pub fn extract(&self, page: &RenderedPage, page_number: u32, item_number: &str) -> ExtractedPage {
        let html = Html::parse_document(&page.html);

        let product = if page_number == 1 {
            Some(self.extract_product(&html, &page.url, item_number))
        } else {
            None
        };

        let mut reviews = Vec::new();
        let mut skipped = 0u32;
        for (i, cell) in html.select(&self.review_cell).enumerate() {
            let index = (i + 1) as u32;
            match self.extract_review(&cell, item_number, page_number, index) {
                Ok(review) => reviews.push(review),
                Err(e) => {
                    skipped += 1;
                    tracing::warn!(
                        page = page_number,
                        index,
                        error = %e,
                        "Skipping malformed review element"
                    );
                }
            }
        }

        let is_last_page = self.detect_last_page(&html);

        ExtractedPage {
            product,
            reviews,
            is_last_page,
            skipped,
        }
    }

    fn extract_product(&self, html: &Html, url: &str, item_number: &str) -> Product {
        Product {
            item_number: item_number.to_string(),
            title: self.product_title.text_in(html, "Title not found"),
            brand: self.product_brand.text_in(html, "Brand not found"),
            price: self.product_price.text_in(html, "Price not found"),
            rating: self.product_rating.text_in(html, "No rating"),
            reviews_count: self.product_reviews_count.text_in(html, "0"),
            description: self
                .product_description
                .text_in(html, "Description not found"),
            product_url: url.to_string(),
            scraped_at: Utc::now(),
        }
    }

    fn extract_review(
        &self,
        cell: &ElementRef,
        item_number: &str,
        page_number: u32,
        review_index: u32,
    ) -> std::result::Result<Review, ExtractError> {
        let title = self.review_title.text_under(cell, "");
        let full_content = self.review_content.text_under(cell, "");

        // A cell with neither title nor body carries nothing worth keeping
        if title.is_empty() && full_content.is_empty() {
            return Err(ExtractError::MalformedReview {
                page: page_number,
                index: review_index,
                reason: String::from("no title and no content"),
            });
        }

        let rating = self
            .review_rating
            .first_under(cell)
            .and_then(|el| el.value().attr("class"))
            .and_then(|class| self.rating_class_re.captures(class))
            .and_then(|c| c.get(1))
            .map(|m| format!("{}/5", m.as_str()))
            .unwrap_or_else(|| UNKNOWN.to_string());

        let author = self.review_author.text_under(cell, "Anonymous");

        let meta_text = self.review_meta.text_under(cell, "");
        let date = self
            .date_re
            .captures(&meta_text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| UNKNOWN.to_string());

        let ownership = meta_text
            .split_once("Ownership:")
            .map(|(_, rest)| rest.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN.to_string());

        let is_verified = cell.select(&self.review_verified).next().is_some();

        // Native review IDs are preferred when the markup carries one
        let review_id = cell
            .value()
            .attr("data-review-id")
            .map(|id| id.to_string())
            .unwrap_or_else(|| Review::synthetic_id(item_number, page_number, review_index));

        let (pros, cons, overall_review) = parse_review_sections(&full_content);

        Ok(Review {
            review_id,
            product_item_number: item_number.to_string(),
            page_number,
            review_index,
            title: if title.is_empty() {
                format!("Review {review_index}")
            } else {
                title
            },
            rating,
            author,
            date,
            is_verified,
            ownership,
            pros,
            cons,
            overall_review,
            full_content,
            timestamp: Utc::now(),
        })
    }

    /// A page is last when its next control is disabled, or when the
    /// pagination block exists without any next control at all.
    fn detect_last_page(&self, html: &Html) -> bool {
        if html.select(&self.pagination_next_disabled).next().is_some() {
            return true;
        }
        html.select(&self.pagination_next).next().is_none()
    }
}

/// Case-insensitive section-header match; returns the rest of the line.
///
/// Headers are plain ASCII, so the prefix is compared byte-for-byte on
/// the original string. Slicing stays on the original text and never
/// goes through a case-folded copy whose byte lengths can differ.
fn strip_section_header<'a>(line: &'a str, header: &str) -> Option<&'a str> {
    let head = line.get(..header.len())?;
    if head.eq_ignore_ascii_case(header) {
        Some(line[header.len()..].trim())
    } else {
        None
    }
}

/// Split a review body into pros, cons and overall sections.
///
/// Section headers are "Pros:", "Cons:" and "Overall Review:"/"Overall:"
/// line prefixes; continuation lines attach to the current section.
/// Missing sections come back as the not-specified marker.
pub fn parse_review_sections(content: &str) -> (String, String, String) {
    if content.is_empty() {
        return (
            NOT_SPECIFIED.to_string(),
            NOT_SPECIFIED.to_string(),
            NOT_SPECIFIED.to_string(),
        );
    }

    #[derive(PartialEq)]
    enum Section {
        None,
        Pros,
        Cons,
        Overall,
    }

    let mut pros = String::new();
    let mut cons = String::new();
    let mut overall = String::new();
    let mut current = Section::None;

    for line in content.lines() {
        let trimmed = line.trim();

        if let Some(rest) = strip_section_header(trimmed, "pros:") {
            current = Section::Pros;
            pros = rest.to_string();
        } else if let Some(rest) = strip_section_header(trimmed, "cons:") {
            current = Section::Cons;
            cons = rest.to_string();
        } else if let Some(rest) = strip_section_header(trimmed, "overall review:")
            .or_else(|| strip_section_header(trimmed, "overall:"))
        {
            current = Section::Overall;
            overall = rest.to_string();
        } else if !trimmed.is_empty() {
            let target = match current {
                Section::Pros => &mut pros,
                Section::Cons => &mut cons,
                Section::Overall => &mut overall,
                Section::None => continue,
            };
            if !target.is_empty() {
                target.push(' ');
            }
            target.push_str(trimmed);
        }
    }

    let or_default = |s: String| {
        if s.is_empty() {
            NOT_SPECIFIED.to_string()
        } else {
            s
        }
    };

    (or_default(pros), or_default(cons), or_default(overall))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(html: &str) -> RenderedPage {
        RenderedPage {
            url: "https://www.example.com/p/N82E16819113877".to_string(),
            html: html.to_string(),
        }
    }

    fn extractor() -> ReviewExtractor {
        ReviewExtractor::new().unwrap()
    }

    const REVIEW_PAGE: &str = r#"
        <html><body>
          <h1 class="product-title">AMD Ryzen 7 9800X3D</h1>
          <div class="product-breadcrumb"><a>AMD</a></div>
          <li class="price-current"><strong>479.00</strong></li>
          <i class="rating rating-5"></i>
          <span class="item-rating-num">(1,234)</span>
          <div class="product-bullets"><ul><li>8 cores</li></ul></div>
          <div class="comments-cell">
            <div class="comments-title-content">Excellent CPU</div>
            <i class="rating rating-5"></i>
            <div class="comments-name">GamerOne</div>
            <div class="comments-text">12/24/2024 Ownership: 1 week to 1 month</div>
            <span class="comments-verified-owner">Verified Owner</span>
            <div class="comments-content">Pros: Fast and cool
Cons: Pricey
Overall Review: Worth every penny</div>
          </div>
          <div class="comments-cell">
            <div class="comments-title-content">Decent</div>
            <div class="comments-content">Does the job</div>
          </div>
          <div class="paginations"><a class="paginations-next">Next</a></div>
        </body></html>"#;

    #[test]
    fn test_item_number_from_url() {
        let ex = extractor();
        let item = ex
            .extract_item_number("https://www.example.com/some-product/p/N82E16819113877")
            .unwrap();
        assert_eq!(item, "N82E16819113877");

        assert!(ex.extract_item_number("https://www.example.com/no-item").is_err());
    }

    #[test]
    fn test_product_fields_from_page_one() {
        let ex = extractor();
        let extracted = ex.extract(&page(REVIEW_PAGE), 1, "N82E16819113877");

        let product = extracted.product.expect("page 1 yields product fields");
        assert_eq!(product.title, "AMD Ryzen 7 9800X3D");
        assert_eq!(product.brand, "AMD");
        assert_eq!(product.price, "479.00");
        assert_eq!(product.item_number, "N82E16819113877");
    }

    #[test]
    fn test_no_product_fields_after_page_one() {
        let ex = extractor();
        let extracted = ex.extract(&page(REVIEW_PAGE), 2, "N82E16819113877");
        assert!(extracted.product.is_none());
        assert_eq!(extracted.reviews.len(), 2);
    }

    #[test]
    fn test_review_record_shaping() {
        let ex = extractor();
        let extracted = ex.extract(&page(REVIEW_PAGE), 1, "N82E16819113877");

        let review = &extracted.reviews[0];
        assert_eq!(review.title, "Excellent CPU");
        assert_eq!(review.rating, "5/5");
        assert_eq!(review.author, "GamerOne");
        assert_eq!(review.date, "12/24/2024");
        assert!(review.is_verified);
        assert_eq!(review.ownership, "1 week to 1 month");
        assert_eq!(review.pros, "Fast and cool");
        assert_eq!(review.cons, "Pricey");
        assert_eq!(review.overall_review, "Worth every penny");
        assert_eq!(review.review_id, "N82E16819113877:p1:r1");
    }

    #[test]
    fn test_missing_rating_yields_unknown_marker() {
        let ex = extractor();
        let extracted = ex.extract(&page(REVIEW_PAGE), 1, "N82E16819113877");

        // Second review has no rating element
        let review = &extracted.reviews[1];
        assert_eq!(review.rating, UNKNOWN);
        assert_eq!(review.author, "Anonymous");
        assert!(!review.is_verified);
        assert_eq!(review.pros, NOT_SPECIFIED);
    }

    #[test]
    fn test_native_review_id_preferred() {
        let html = r#"
            <div class="comments-cell" data-review-id="rv-9981">
              <div class="comments-title-content">Good</div>
              <div class="comments-content">Nice</div>
            </div>"#;
        let ex = extractor();
        let extracted = ex.extract(&page(html), 3, "ITEM1");
        assert_eq!(extracted.reviews[0].review_id, "rv-9981");
    }

    #[test]
    fn test_empty_cell_is_skipped_not_fatal() {
        let html = r#"
            <div class="comments-cell"></div>
            <div class="comments-cell">
              <div class="comments-title-content">Kept</div>
              <div class="comments-content">Body</div>
            </div>"#;
        let ex = extractor();
        let extracted = ex.extract(&page(html), 1, "ITEM1");
        assert_eq!(extracted.reviews.len(), 1);
        assert_eq!(extracted.skipped, 1);
    }

    #[test]
    fn test_last_page_detection() {
        let ex = extractor();

        let with_next = ex.extract(&page(REVIEW_PAGE), 1, "X");
        assert!(!with_next.is_last_page);

        let disabled = r#"<div class="paginations">
            <a class="paginations-next is-disabled">Next</a></div>"#;
        assert!(ex.extract(&page(disabled), 1, "X").is_last_page);

        let no_pagination = "<html><body></body></html>";
        assert!(ex.extract(&page(no_pagination), 1, "X").is_last_page);
    }

    #[test]
    fn test_parse_review_sections_multiline() {
        let content = "Pros: Fast\nstays cool under load\nCons: Expensive\nOverall: Great";
        let (pros, cons, overall) = parse_review_sections(content);
        assert_eq!(pros, "Fast stays cool under load");
        assert_eq!(cons, "Expensive");
        assert_eq!(overall, "Great");
    }

    #[test]
    fn test_parse_review_sections_non_ascii_body() {
        // Characters whose lowercase form expands in bytes must not
        // break header stripping
        let (pros, cons, overall) = parse_review_sections("Pros:İyi işlemci, çok hızlı");
        assert_eq!(pros, "İyi işlemci, çok hızlı");
        assert_eq!(cons, NOT_SPECIFIED);
        assert_eq!(overall, NOT_SPECIFIED);

        let (pros, _, _) = parse_review_sections("Pros:İİİİİİ");
        assert_eq!(pros, "İİİİİİ");
    }

    #[test]
    fn test_parse_review_sections_header_case_insensitive() {
        let content = "PROS: quiet\ncOnS: heavy\nOVERALL REVIEW: solid";
        let (pros, cons, overall) = parse_review_sections(content);
        assert_eq!(pros, "quiet");
        assert_eq!(cons, "heavy");
        assert_eq!(overall, "solid");
    }

    #[test]
    fn test_parse_review_sections_short_non_ascii_lines() {
        // Lines shorter than a header, or with a multi-byte char where
        // the header would end, are continuation text
        let (pros, _, _) = parse_review_sections("Pros: good\nço\nk");
        assert_eq!(pros, "good ço k");
    }

    #[test]
    fn test_parse_review_sections_empty() {
        let (pros, cons, overall) = parse_review_sections("");
        assert_eq!(pros, NOT_SPECIFIED);
        assert_eq!(cons, NOT_SPECIFIED);
        assert_eq!(overall, NOT_SPECIFIED);
    }
}
