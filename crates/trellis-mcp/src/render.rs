//! Pagination and presentation of tool output.
//!
//! Both output formats are views over one shared envelope: pagination
//! happens once, on the full result set, and the human rendering is
//! strictly a presentation of the same fields the structured payload
//! carries. The size cap is a display safeguard only.

use crate::models::{IssueSummary, Page};

/// Character budget for the rendered text block.
pub const MAX_TEXT_CHARS: usize = 25_000;

/// Notice appended when the text block hits the budget.
pub const TRUNCATION_NOTICE: &str =
    "\n\n[Response truncated: output exceeded the 25000 character limit. \
     Use limit/offset to page through results.]";

/// A validated pagination request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    /// Page size, already checked against the 1..=100 contract.
    pub limit: usize,

    /// Offset into the full result set.
    pub offset: usize,
}

/// Slice `items` per the request and compute the pagination envelope.
///
/// The slice bounds are clamped: an offset at or past the end yields an
/// empty slice, never an error. `next_offset` is present exactly when
/// more results exist, and always equals `offset + returned`.
pub fn paginate<T: Clone>(items: &[T], request: PageRequest) -> (Vec<T>, Page) {
    let total = items.len();
    let start = request.offset.min(total);
    let end = start.saturating_add(request.limit).min(total);
    let slice: Vec<T> = items[start..end].to_vec();

    let returned = slice.len();
    let has_more = request.offset.saturating_add(returned) < total;
    let next_offset = has_more.then(|| request.offset + returned);

    (
        slice,
        Page {
            total,
            returned,
            offset: request.offset,
            limit: request.limit,
            has_more,
            next_offset,
        },
    )
}

/// Render a page of issues as display text.
///
/// `numbered` switches bullets to absolute positions (continuing from
/// the offset) and is used only for sub-issue listings, where position
/// conveys priority.
#[must_use]
pub fn render_issue_list(
    heading: &str,
    issues: &[IssueSummary],
    page: &Page,
    numbered: bool,
) -> String {
    let mut out = String::new();
    out.push_str(heading);
    out.push('\n');

    let first = page.offset + 1;
    let last = page.offset + page.returned;
    out.push_str(&format!(
        "Showing {first}-{last} of {total}.\n\n",
        total = page.total
    ));

    for (i, issue) in issues.iter().enumerate() {
        if numbered {
            out.push_str(&format!("{}. ", page.offset + i + 1));
        } else {
            out.push_str("- ");
        }
        out.push_str(&render_issue_line(issue));
        out.push('\n');
    }

    if let Some(next) = page.next_offset {
        let remaining = page.total - (page.offset + page.returned);
        out.push_str(&format!(
            "\n{remaining} more result(s) available. Pass offset={next} to continue.\n"
        ));
    }

    out
}

/// One-line rendering of an issue reference.
#[must_use]
pub fn render_issue_line(issue: &IssueSummary) -> String {
    format!(
        "#{number} [{state}] {title} (id {id})\n  {url}",
        number = issue.number,
        state = issue.state,
        title = issue.title,
        id = issue.id,
        url = issue.url,
    )
}

/// Enforce the text budget, appending the truncation notice when cut.
///
/// Truncation happens on character boundaries so multi-byte text cannot
/// be split mid-scalar. The structured payload is never affected.
#[must_use]
pub fn enforce_size_cap(text: String) -> String {
    if text.chars().count() <= MAX_TEXT_CHARS {
        return text;
    }
    let mut capped: String = text.chars().take(MAX_TEXT_CHARS).collect();
    capped.push_str(TRUNCATION_NOTICE);
    capped
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(total: usize) -> Vec<u32> {
        (0..total).map(|i| u32::try_from(i).unwrap()).collect()
    }

    #[test]
    fn first_page_of_three_with_limit_one() {
        let (slice, page) = paginate(&sample(3), PageRequest { limit: 1, offset: 0 });
        assert_eq!(slice, vec![0]);
        assert_eq!(page.total, 3);
        assert_eq!(page.returned, 1);
        assert!(page.has_more);
        assert_eq!(page.next_offset, Some(1));
    }

    #[test]
    fn exact_final_page_has_no_next_offset() {
        let (slice, page) = paginate(&sample(40), PageRequest { limit: 20, offset: 20 });
        assert_eq!(slice.len(), 20);
        assert!(!page.has_more);
        assert_eq!(page.next_offset, None);
    }

    #[test]
    fn offset_past_end_yields_empty_slice() {
        let (slice, page) = paginate(&sample(3), PageRequest { limit: 20, offset: 10 });
        assert!(slice.is_empty());
        assert_eq!(page.total, 3);
        assert!(!page.has_more);
        assert_eq!(page.next_offset, None);
    }

    #[test]
    fn empty_set_paginates_to_zero_counts() {
        let (slice, page) = paginate(&sample(0), PageRequest { limit: 20, offset: 0 });
        assert!(slice.is_empty());
        assert_eq!(page.total, 0);
        assert!(!page.has_more);
    }

    proptest! {
        #[test]
        fn pagination_algebra_holds(
            total in 0usize..500,
            offset in 0usize..600,
            limit in 1usize..=100,
        ) {
            let items = sample(total);
            let (slice, page) = paginate(&items, PageRequest { limit, offset });

            // returned = max(0, min(limit, total - offset))
            let expected = total.saturating_sub(offset).min(limit);
            prop_assert_eq!(slice.len(), expected);
            prop_assert_eq!(page.returned, expected);

            // has_more ⇔ offset + returned < total
            prop_assert_eq!(page.has_more, offset + page.returned < total);

            // next_offset present exactly when has_more, equal to
            // offset + returned
            match page.next_offset {
                Some(next) => {
                    prop_assert!(page.has_more);
                    prop_assert_eq!(next, offset + page.returned);
                }
                None => prop_assert!(!page.has_more),
            }
        }

        #[test]
        fn successive_pages_tile_without_gap_or_overlap(
            total in 1usize..300,
            limit in 1usize..=100,
        ) {
            let items = sample(total);
            let mut collected = Vec::new();
            let mut offset = 0;
            loop {
                let (slice, page) = paginate(&items, PageRequest { limit, offset });
                collected.extend(slice);
                match page.next_offset {
                    Some(next) => offset = next,
                    None => break,
                }
            }
            prop_assert_eq!(collected, items);
        }
    }

    #[test]
    fn size_cap_truncates_and_appends_notice() {
        let text = "x".repeat(MAX_TEXT_CHARS + 500);
        let capped = enforce_size_cap(text);
        assert!(capped.ends_with(TRUNCATION_NOTICE));
        assert_eq!(
            capped.chars().count(),
            MAX_TEXT_CHARS + TRUNCATION_NOTICE.chars().count()
        );
    }

    #[test]
    fn size_cap_counts_characters_not_bytes() {
        // Multi-byte characters: byte length exceeds the cap long before
        // the character count does.
        let text = "é".repeat(MAX_TEXT_CHARS);
        let capped = enforce_size_cap(text.clone());
        assert_eq!(capped, text);
    }

    #[test]
    fn size_cap_leaves_short_text_alone() {
        let text = "short".to_string();
        assert_eq!(enforce_size_cap(text.clone()), text);
    }

    #[test]
    fn trailer_names_next_offset() {
        let issues: Vec<IssueSummary> = Vec::new();
        let page = Page {
            total: 30,
            returned: 0,
            offset: 0,
            limit: 20,
            has_more: true,
            next_offset: Some(20),
        };
        let text = render_issue_list("Heading", &issues, &page, false);
        assert!(text.contains("offset=20"));
    }
}
