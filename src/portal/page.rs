//! Pure extraction over parsed portal pages. Every fragile assumption
//! about the portal's markup lives here; nothing in this module touches
//! the network or the session.

use crate::error::{PortalError, Result};
use crate::utils::clean_text;
use scraper::{ElementRef, Html, Selector};

/// Value of a uniquely-identified `<input>`. Missing elements are an
/// error: token extraction must never silently continue with stale state.
pub fn input_value(doc: &Html, id: &str) -> Result<String> {
    let sel = Selector::parse(&format!(r#"input[id="{}"]"#, id))
        .map_err(|_| PortalError::MissingField(format!("input#{}", id)))?;
    let input = doc
        .select(&sel)
        .next()
        .ok_or_else(|| PortalError::MissingToken { id: id.to_string() })?;
    input
        .value()
        .attr("value")
        .map(|v| v.to_string())
        .ok_or_else(|| PortalError::MissingToken { id: id.to_string() })
}

/// Value of the currently selected `<option>` on the page.
pub fn selected_option(doc: &Html) -> Result<String> {
    let sel = Selector::parse("option[selected]").unwrap();
    doc.select(&sel)
        .next()
        .and_then(|opt| opt.value().attr("value"))
        .map(|v| v.to_string())
        .ok_or_else(|| PortalError::MissingField("selected option".into()))
}

/// Every image-button control on the page, in document order.
pub fn image_inputs(doc: &Html) -> Vec<ElementRef<'_>> {
    let sel = Selector::parse(r#"input[type="image"]"#).unwrap();
    doc.select(&sel).collect()
}

/// The `<tr>` enclosing an element.
pub fn ancestor_row<'a>(el: ElementRef<'a>) -> Option<ElementRef<'a>> {
    let mut node = el.parent()?;
    loop {
        if let Some(parent) = ElementRef::wrap(node) {
            if parent.value().name() == "tr" {
                return Some(parent);
            }
        }
        node = node.parent()?;
    }
}

/// Text of each `<td>` in a row, cleaned of padding whitespace and the
/// non-breaking spaces the portal fills empty cells with.
pub fn row_cells(row: ElementRef<'_>) -> Vec<String> {
    let sel = Selector::parse("td").unwrap();
    row.select(&sel)
        .map(|td| clean_text(&td.text().collect::<String>()).to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_value_reads_hidden_field() {
        let doc = Html::parse_document(
            r#"<html><body><input type="hidden" id="__VIEWSTATE" value="abc123"/></body></html>"#,
        );
        assert_eq!(input_value(&doc, "__VIEWSTATE").unwrap(), "abc123");
    }

    #[test]
    fn input_value_fails_when_absent() {
        let doc = Html::parse_document("<html><body></body></html>");
        let err = input_value(&doc, "__VIEWSTATE").unwrap_err();
        assert!(matches!(err, PortalError::MissingToken { .. }));
    }

    #[test]
    fn selected_option_reads_value() {
        let doc = Html::parse_document(
            r#"<select><option value="20131">Winter</option>
               <option value="20132" selected="selected">Spring</option></select>"#,
        );
        assert_eq!(selected_option(&doc).unwrap(), "20132");
    }

    #[test]
    fn row_cells_strip_nbsp_padding() {
        let doc = Html::parse_document(
            "<table><tr><td>\u{a0}Smith J\u{a0}</td><td> 12/30 </td></tr></table>",
        );
        let sel = Selector::parse("tr").unwrap();
        let row = doc.select(&sel).next().unwrap();
        assert_eq!(row_cells(row), vec!["Smith J", "12/30"]);
    }

    #[test]
    fn ancestor_row_climbs_past_wrapping_cell() {
        let doc = Html::parse_document(
            r#"<table><tr><td><span><input type="image" name="x"/></span></td><td>other</td></tr></table>"#,
        );
        let input = image_inputs(&doc)[0];
        let row = ancestor_row(input).unwrap();
        assert_eq!(row_cells(row).len(), 2);
    }
}
