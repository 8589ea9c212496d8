use std::rc::Rc;

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

use crate::catalog::{Catalog, CatalogBuilder};
use crate::cell::Cell;
use crate::config::ExtractConfig;
use crate::error::StructureError;
use crate::grid::{parse_colspan, parse_rowspan, SpanGrid, Spanned};

const ADJECTIVE_HEADER: &str = "Collateral adjective";
const ANIMAL_HEADER: &str = "Animal";

static TABLE: Lazy<Selector> = Lazy::new(|| Selector::parse("table").unwrap());
static TH: Lazy<Selector> = Lazy::new(|| Selector::parse("th").unwrap());

/// Extracts the adjective to animals mapping from an HTML snapshot.
///
/// Rows that cannot be interpreted are skipped, only a missing table is an error.
pub fn extract(html: &str, config: &ExtractConfig) -> Result<Catalog, StructureError> {
    let document = Html::parse_document(html);

    let table = document
        .select(&TABLE)
        .find(|table| table.select(&TH).any(|th| mentions_adjective(&header_text(th))))
        .ok_or(StructureError::TableNotFound(ADJECTIVE_HEADER))?;

    let catalog = TableWalker::new(&config.base_url).walk(table)?;
    log::info!(
        "Extracted {} adjectives referencing {} distinct animals",
        catalog.groups().len(),
        catalog.animals().len()
    );
    Ok(catalog)
}

fn mentions_adjective(text: &str) -> bool {
    text.to_lowercase().contains(&ADJECTIVE_HEADER.to_lowercase())
}

fn header_text(th: ElementRef) -> String {
    crate::cell::normalize(&th.text().collect::<String>())
}

#[derive(Debug, Clone, Copy)]
struct Columns {
    animal: usize,
    adjective: usize,
}

impl Columns {
    fn find(slots: &[Option<Rc<Cell>>]) -> Option<Self> {
        let headers = || slots.iter().map(|slot| slot.as_deref().filter(|c| c.header));
        let adjective = headers().position(|c| c.map_or(false, |c| mentions_adjective(&c.text)))?;
        let animal = headers()
            .position(|c| c.map_or(false, |c| c.text.eq_ignore_ascii_case(ANIMAL_HEADER)))?;
        Some(Self { animal, adjective })
    }
}

struct TableWalker<'a> {
    base: &'a Url,
    grid: SpanGrid<Rc<Cell>>,
    builder: CatalogBuilder,
}

impl<'a> TableWalker<'a> {
    fn new(base: &'a Url) -> Self {
        Self {
            base,
            grid: SpanGrid::default(),
            builder: CatalogBuilder::default(),
        }
    }

    fn walk(mut self, table: ElementRef) -> Result<Catalog, StructureError> {
        let mut columns = None;
        let mut saw_adjective_header = false;

        for (index, row) in rows(table).enumerate() {
            let slots = self.grid.advance(cells(row, self.base));

            let Some(cols) = columns else {
                if slots.iter().flatten().any(|c| c.header && mentions_adjective(&c.text)) {
                    saw_adjective_header = true;
                    columns = Columns::find(&slots);
                }
                continue;
            };

            self.row(index, &slots, cols);
        }

        match columns {
            Some(_) => Ok(self.builder.finish()),
            None if saw_adjective_header => Err(StructureError::MissingColumn(ANIMAL_HEADER)),
            None => Err(StructureError::MissingColumn(ADJECTIVE_HEADER)),
        }
    }

    fn row(&mut self, index: usize, slots: &[Option<Rc<Cell>>], cols: Columns) {
        if slots.iter().flatten().all(|c| c.tokens.is_empty()) {
            log::debug!("Skipping empty row {index}");
            return;
        }

        let Some(adjective_cell) = slots.get(cols.adjective).and_then(Option::as_ref) else {
            log::warn!(
                "Skipping row {index}: {} cells, no {ADJECTIVE_HEADER:?} column",
                slots.len()
            );
            return;
        };
        if adjective_cell.header {
            log::debug!("Skipping section row {index}: {:?}", adjective_cell.text);
            return;
        }

        let mut adjectives: Vec<String> = Vec::new();
        for token in &adjective_cell.tokens {
            let adjective = token.text.to_lowercase();
            if !adjectives.contains(&adjective) {
                adjectives.push(adjective);
            }
        }
        if adjectives.is_empty() {
            log::debug!("Skipping row {index} without adjective");
            return;
        }

        let animals: Vec<_> = match slots.get(cols.animal).and_then(Option::as_ref) {
            Some(cell) if !cell.header => cell
                .tokens
                .iter()
                .map(|t| self.builder.intern(&t.text, t.link.as_deref()))
                .collect(),
            _ => Vec::new(),
        };
        if animals.is_empty() {
            log::debug!("Row {index} lists no animal for {adjectives:?}");
        }

        for adjective in &adjectives {
            self.builder.extend_group(adjective, &animals);
        }
    }
}

fn cells<'b>(row: ElementRef<'b>, base: &'b Url) -> impl Iterator<Item = Spanned<Rc<Cell>>> + 'b {
    row.children()
        .filter_map(ElementRef::wrap)
        .filter(|e| matches!(e.value().name(), "td" | "th"))
        .map(move |e| Spanned {
            value: Rc::new(Cell::parse(e, base)),
            rowspan: parse_rowspan(e.value().attr("rowspan")),
            colspan: parse_colspan(e.value().attr("colspan")),
        })
}

/// Rows of the table itself, leaving out those of nested tables.
fn rows<'a>(table: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    table
        .children()
        .filter_map(ElementRef::wrap)
        .flat_map(|child| match child.value().name() {
            "tr" => vec![child],
            "thead" | "tbody" | "tfoot" => child
                .children()
                .filter_map(ElementRef::wrap)
                .filter(|e| e.value().name() == "tr")
                .collect(),
            _ => Vec::new(),
        })
}
