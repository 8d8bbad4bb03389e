//! Table-driven address resolution
//!
//! Turns the `<table>` elements of a page body into header/row structures and
//! looks up a server's address by hostname. Tables that do not carry the
//! configured columns, or that cannot be read as a table at all, are skipped
//! and the search moves on to the next table in document order.

use scraper::{ElementRef, Html};
use tracing::debug;

/// Upper bound for a cell's `colspan` and `rowspan`
const MAX_SPAN: usize = 1000;

/// One HTML table reduced to trimmed header labels and cell text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    /// Header labels, trimmed, in column order
    pub headers: Vec<String>,

    /// Data rows; each row holds trimmed cell text in column order
    pub rows: Vec<Vec<String>>,
}

/// A single data row viewed as a header → cell mapping
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    headers: &'a [String],
    cells: &'a [String],
}

impl<'a> Row<'a> {
    /// Cell under the given header, if the header exists and the row reaches it
    pub fn get(&self, column: &str) -> Option<&'a str> {
        let index = column_index(self.headers, column)?;
        self.cells.get(index).map(String::as_str)
    }

    /// `(header, cell)` pairs in column order
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
        let (headers, cells) = (self.headers, self.cells);
        headers
            .iter()
            .zip(cells.iter())
            .map(|(h, c)| (h.as_str(), c.as_str()))
    }
}

/// Outcome of looking a hostname up in a single table
#[derive(Debug, PartialEq, Eq)]
enum Lookup<'a> {
    /// Matching row with a non-blank address cell
    Found(&'a str),
    /// Matching row whose address cell is blank
    Blank,
    /// Nothing usable in this table
    Skip(&'static str),
}

impl Table {
    /// Index of the first header equal to `name` after trimming
    pub fn column(&self, name: &str) -> Option<usize> {
        column_index(&self.headers, name)
    }

    /// Data rows as header → cell views
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(|cells| Row {
            headers: &self.headers,
            cells,
        })
    }

    fn lookup(&self, server_name: &str, hostname_column: &str, address_column: &str) -> Lookup<'_> {
        if self.column(hostname_column).is_none() {
            return Lookup::Skip("no hostname column");
        }

        let Some(row) = self
            .rows()
            .find(|row| row.get(hostname_column).map(str::trim) == Some(server_name))
        else {
            return Lookup::Skip("no matching row");
        };

        if self.column(address_column).is_none() {
            return Lookup::Skip("no address column");
        }

        match row.get(address_column).map(str::trim) {
            None => Lookup::Skip("matching row has no address cell"),
            Some("") => Lookup::Blank,
            Some(address) => Lookup::Found(address),
        }
    }

    /// Build a table from a `<table>` element, or `None` if it has no usable header row
    fn from_element(table: ElementRef<'_>) -> Option<Self> {
        let mut carry = RowspanCarry::default();
        let mut rows = own_rows(table)
            .map(|tr| carry.expand(tr))
            .filter(|cells| !cells.is_empty());

        let headers = rows.next()?;
        if headers.iter().all(String::is_empty) {
            return None;
        }

        Some(Table {
            headers,
            rows: rows.collect(),
        })
    }
}

/// Parse every `<table>` in the document, in document order
///
/// Tables without a usable header row are left out.
///
/// # Example
/// ```
/// use wiki_ssh::resolver::tables;
///
/// let html = "<table><tr><th> Hostname </th><th>IP</th></tr>\
///             <tr><td>web01</td><td>10.0.0.5</td></tr></table>";
/// let parsed = tables(html);
/// assert_eq!(parsed.len(), 1);
/// assert_eq!(parsed[0].headers, vec!["Hostname", "IP"]);
/// ```
pub fn tables(document: &str) -> Vec<Table> {
    let html = Html::parse_document(document);

    html.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "table")
        .filter_map(|el| {
            let table = Table::from_element(el);
            if table.is_none() {
                debug!("Skipping table without a header row");
            }
            table
        })
        .collect()
}

/// Resolve `server_name` to the address listed next to it in the document's tables
///
/// The first row, in the first table carrying `hostname_column`, whose
/// trimmed hostname cell equals the trimmed `server_name` decides the result.
/// A table that has the hostname column but not `address_column` is passed
/// over. Returns `None` when no table yields an address.
///
/// # Example
/// ```
/// use wiki_ssh::resolver::resolve;
///
/// let html = "<table><tr><th>Hostname</th><th>IP Address</th></tr>\
///             <tr><td>web01</td><td> 10.0.0.5 </td></tr></table>";
/// assert_eq!(resolve(html, "web01", "Hostname", "IP Address").as_deref(), Some("10.0.0.5"));
/// assert_eq!(resolve(html, "web02", "Hostname", "IP Address"), None);
/// ```
pub fn resolve(
    document: &str,
    server_name: &str,
    hostname_column: &str,
    address_column: &str,
) -> Option<String> {
    let server_name = server_name.trim();

    for (index, table) in tables(document).iter().enumerate() {
        match table.lookup(server_name, hostname_column, address_column) {
            Lookup::Found(address) => {
                debug!(table = index, "Resolved {} to {}", server_name, address);
                return Some(address.to_string());
            }
            Lookup::Blank => {
                debug!(table = index, "Address cell for {} is empty", server_name);
                return None;
            }
            Lookup::Skip(reason) => {
                debug!(table = index, "Skipping table: {}", reason);
            }
        }
    }

    None
}

fn column_index(headers: &[String], name: &str) -> Option<usize> {
    let name = name.trim();
    headers.iter().position(|h| h == name)
}

/// `<tr>` elements whose nearest enclosing table is `table`
fn own_rows<'a>(table: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    table
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "tr")
        .filter(move |tr| {
            tr.ancestors()
                .filter_map(ElementRef::wrap)
                .find(|a| a.value().name() == "table")
                .is_some_and(|a| a == table)
        })
}

/// One `<td>`/`<th>` with its trimmed text and clamped spans
struct Cell {
    text: String,
    colspan: usize,
    rowspan: usize,
}

fn span(cell: ElementRef<'_>, attr: &str) -> usize {
    cell.value()
        .attr(attr)
        .and_then(|v| v.trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_SPAN)
}

fn raw_cells(tr: ElementRef<'_>) -> Vec<Cell> {
    tr.children()
        .filter_map(ElementRef::wrap)
        .filter(|c| matches!(c.value().name(), "td" | "th"))
        .map(|c| Cell {
            text: c.text().collect::<String>().trim().to_string(),
            colspan: span(c, "colspan"),
            rowspan: span(c, "rowspan"),
        })
        .collect()
}

/// Cells carried down into later rows by `rowspan`, indexed by column
#[derive(Debug, Default)]
struct RowspanCarry {
    /// Text and number of rows still to fill, per column
    pending: Vec<Option<(String, usize)>>,
}

impl RowspanCarry {
    /// Take the carried cell for `column`, if any
    fn take(&mut self, column: usize) -> Option<String> {
        let slot = self.pending.get_mut(column)?;
        let (text, left) = slot.as_mut()?;
        let text = text.clone();
        *left -= 1;
        if *left == 0 {
            *slot = None;
        }
        Some(text)
    }

    fn carry(&mut self, column: usize, text: &str, rows: usize) {
        if rows == 0 {
            return;
        }
        if self.pending.len() <= column {
            self.pending.resize(column + 1, None);
        }
        self.pending[column] = Some((text.to_string(), rows));
    }

    /// Last column at or after `from` that still has a carried cell
    fn last_pending(&self, from: usize) -> Option<usize> {
        (from..self.pending.len()).rev().find(|&c| self.pending[c].is_some())
    }

    /// Cell text of one row in column order, with spans expanded
    fn expand(&mut self, tr: ElementRef<'_>) -> Vec<String> {
        let mut cells = Vec::new();

        for cell in raw_cells(tr) {
            while let Some(text) = self.take(cells.len()) {
                cells.push(text);
            }
            for _ in 0..cell.colspan {
                self.carry(cells.len(), &cell.text, cell.rowspan - 1);
                cells.push(cell.text.clone());
            }
        }

        // Carried cells to the right of the row's own cells
        if let Some(last) = self.last_pending(cells.len()) {
            while cells.len() <= last {
                let text = self.take(cells.len()).unwrap_or_default();
                cells.push(text);
            }
        }

        cells
    }
}
