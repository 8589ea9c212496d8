//! Row layout honouring `rowspan` and `colspan`.

const MAX_COLSPAN: usize = 1000;
const MAX_ROWSPAN: usize = 65534;

/// Parses a span attribute, anything unusable counts as a single row/column.
pub(crate) fn parse_span(value: Option<&str>, max: usize) -> usize {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|&n| n > 0)
        .map_or(1, |n| n.min(max))
}

pub(crate) fn parse_rowspan(value: Option<&str>) -> usize {
    parse_span(value, MAX_ROWSPAN)
}

pub(crate) fn parse_colspan(value: Option<&str>) -> usize {
    parse_span(value, MAX_COLSPAN)
}

/// A physical cell of a row, with its spans.
#[derive(Debug, Clone)]
pub(crate) struct Spanned<T> {
    pub value: T,
    pub rowspan: usize,
    pub colspan: usize,
}

#[derive(Debug, Clone)]
struct Carry<T> {
    remaining: usize,
    value: T,
}

/// Per-column carry buffer, advanced one row at a time.
#[derive(Debug, Clone)]
pub(crate) struct SpanGrid<T> {
    carry: Vec<Option<Carry<T>>>,
}

impl<T> Default for SpanGrid<T> {
    fn default() -> Self {
        Self { carry: Vec::new() }
    }
}

impl<T: Clone> SpanGrid<T> {
    /// Lays out the physical cells of the next row into logical column slots.
    ///
    /// Slots still covered by a cell from a previous row reuse that cell. A slot is
    /// `None` only when the row ran out of cells before a later carried column.
    pub(crate) fn advance<I>(&mut self, cells: I) -> Vec<Option<T>>
    where
        I: IntoIterator<Item = Spanned<T>>,
    {
        let mut cells = cells.into_iter();
        let mut row = Vec::new();
        let mut col = 0;

        loop {
            if let Some(carry) = self.carry.get_mut(col).and_then(Option::as_mut) {
                row.push(Some(carry.value.clone()));
                carry.remaining -= 1;
                if carry.remaining == 0 {
                    self.carry[col] = None;
                }
                col += 1;
                continue;
            }

            match cells.next() {
                Some(Spanned {
                    value,
                    rowspan,
                    colspan,
                }) => {
                    for _ in 0..colspan {
                        // Overlapping spans are malformed, the newer cell wins
                        let carry = (rowspan > 1).then(|| Carry {
                            remaining: rowspan - 1,
                            value: value.clone(),
                        });
                        self.set(col, carry);
                        row.push(Some(value.clone()));
                        col += 1;
                    }
                }
                None => {
                    if self.carry.iter().skip(col).any(Option::is_some) {
                        row.push(None);
                        col += 1;
                    } else {
                        break;
                    }
                }
            }
        }

        row
    }

    fn set(&mut self, col: usize, carry: Option<Carry<T>>) {
        if carry.is_none() && col >= self.carry.len() {
            return;
        }
        if col >= self.carry.len() {
            self.carry.resize_with(col + 1, || None);
        }
        self.carry[col] = carry;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(value: &'static str) -> Spanned<&'static str> {
        Spanned {
            value,
            rowspan: 1,
            colspan: 1,
        }
    }

    fn spanned(value: &'static str, rowspan: usize, colspan: usize) -> Spanned<&'static str> {
        Spanned {
            value,
            rowspan,
            colspan,
        }
    }

    #[test]
    fn plain_rows() {
        let mut grid = SpanGrid::default();
        assert_eq!(grid.advance(vec![cell("a"), cell("b")]), [Some("a"), Some("b")]);
        assert_eq!(grid.advance(vec![cell("c")]), [Some("c")]);
        assert!(grid.advance(Vec::new()).is_empty());
    }

    #[test]
    fn rowspan_is_carried() {
        let mut grid = SpanGrid::default();
        assert_eq!(
            grid.advance(vec![cell("Cat"), spanned("kitten", 2, 1), cell("feline")]),
            [Some("Cat"), Some("kitten"), Some("feline")]
        );
        assert_eq!(
            grid.advance(vec![cell("Lion"), cell("leonine")]),
            [Some("Lion"), Some("kitten"), Some("leonine")]
        );
        assert_eq!(
            grid.advance(vec![cell("Dog"), cell("puppy"), cell("canine")]),
            [Some("Dog"), Some("puppy"), Some("canine")]
        );
    }

    #[test]
    fn trailing_rowspan_is_carried() {
        let mut grid = SpanGrid::default();
        grid.advance(vec![cell("Cat, Lion"), spanned("feline", 3, 1)]);
        assert_eq!(grid.advance(vec![cell("Tiger")]), [Some("Tiger"), Some("feline")]);
        assert_eq!(grid.advance(Vec::new()), [None, Some("feline")]);
        assert!(grid.advance(Vec::new()).is_empty());
    }

    #[test]
    fn colspan_fills_slots() {
        let mut grid = SpanGrid::default();
        assert_eq!(
            grid.advance(vec![spanned("A", 1, 3)]),
            [Some("A"), Some("A"), Some("A")]
        );
        assert_eq!(
            grid.advance(vec![spanned("x", 2, 2), cell("y")]),
            [Some("x"), Some("x"), Some("y")]
        );
        assert_eq!(grid.advance(vec![cell("z")]), [Some("x"), Some("x"), Some("z")]);
    }

    #[test]
    fn span_attributes() {
        assert_eq!(parse_rowspan(None), 1);
        assert_eq!(parse_rowspan(Some("3")), 3);
        assert_eq!(parse_rowspan(Some(" 2 ")), 2);
        assert_eq!(parse_rowspan(Some("0")), 1);
        assert_eq!(parse_rowspan(Some("two")), 1);
        assert_eq!(parse_colspan(Some("100000")), MAX_COLSPAN);
    }
}
