use tabled::builder::Builder;
use tabled::settings::object::Columns;
use tabled::settings::{Alignment, Padding, Style};

use crate::ui::renderer::TableSpec;

/// Renders `spec` with a header rule. Columns after the first are
/// right-aligned since they carry the percentages.
pub fn render_table(spec: &TableSpec) -> String {
    let mut builder = Builder::default();
    if !spec.headers.is_empty() {
        builder.push_record(spec.headers.iter().map(String::as_str));
    }
    for row in &spec.rows {
        builder.push_record(row.iter().map(String::as_str));
    }
    let mut table = builder.build();
    table.with(Style::psql());
    table.with(Padding::new(1, 1, 0, 0));
    table.modify(Columns::new(1..), Alignment::right());
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_contains_headers_and_cells() {
        let rendered = render_table(&TableSpec::new(
            vec!["pane".to_owned(), "width".to_owned()],
            vec![vec!["lint".to_owned(), "30.00".to_owned()]],
        ));
        let mut lines = rendered.lines();
        let header = lines.next().expect("header line");
        assert!(header.contains("pane"));
        assert!(header.contains("width"));
        assert!(rendered.contains("lint"));
        assert!(rendered.contains("30.00"));
    }
}
