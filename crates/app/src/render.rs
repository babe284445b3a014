//! Plain text views of a session for the terminal.
use std::fmt::{self, Write as _};

use engine::{
    AssignmentLedger, AssignmentStatus, BatchOutcome, EngineError, ItemId, LineItem, Quantity,
    Session, Stage,
};

/// Column aligned table. Cells never wrap.
#[derive(Debug, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<String>) {
        self.rows.push(cells);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn widths(&self) -> Vec<usize> {
        let mut widths: Vec<usize> = self.headers.iter().map(|h| h.chars().count()).collect();
        for row in &self.rows {
            for (width, cell) in widths.iter_mut().zip(row) {
                *width = (*width).max(cell.chars().count());
            }
        }
        widths
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let widths = self.widths();
        let line = |f: &mut fmt::Formatter<'_>, cells: &[String]| -> fmt::Result {
            let padded: Vec<String> = cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| format!("{cell:<width$}"))
                .collect();
            writeln!(f, "{}", padded.join("  ").trim_end())
        };

        line(f, &self.headers)?;
        let rule: Vec<String> = widths.iter().map(|width| "-".repeat(*width)).collect();
        line(f, &rule)?;
        for row in &self.rows {
            line(f, row)?;
        }
        Ok(())
    }
}

fn count_cell(count: Option<Quantity>) -> String {
    count.map(|q| q.to_string()).unwrap_or_else(|| "-".to_string())
}

/// One line stating the stage and how far the current pass is.
pub fn stage_banner(session: &Session) -> String {
    let mut banner = format!(
        "{} / {}: stage {} of 3, {}",
        session.warehouse(),
        session.date(),
        session.stage().number(),
        session.stage()
    );
    match session.stage() {
        Stage::Finalized => {
            let _ = write!(banner, " ({} discrepancies)", session.discrepancies().len());
        }
        _ => {
            let progress = session.progress();
            let _ = write!(banner, " ({}/{} counted)", progress.recorded, progress.total);
            if progress.is_complete() {
                banner.push_str(", ready to advance");
            }
        }
    }
    banner
}

/// The visible items of the session. System quantities and differences only
/// appear once the session is finalized.
pub fn items_table(session: &Session) -> Table {
    table_of(session.stage(), session.visible_items())
}

/// Like [`items_table`], restricted to the items matching `query`.
pub fn search_table(session: &Session, query: &str) -> Table {
    table_of(session.stage(), session.search(query))
}

fn table_of(stage: Stage, items: Vec<&LineItem>) -> Table {
    let mut headers = vec!["Code", "Product", "Unit"];
    if stage == Stage::Finalized {
        headers.push("System");
    }
    headers.push(if stage == Stage::SecondCount { "Count 1" } else { "Count" });
    if stage != Stage::FirstCount {
        headers.push("Count 2");
    }
    if stage == Stage::Finalized {
        headers.push("Diff");
    }

    let mut table = Table::new(headers);
    for item in items {
        table.row(item_cells(item, stage));
    }
    table
}

fn item_cells(item: &LineItem, stage: Stage) -> Vec<String> {
    let mut cells = vec![
        item.code.clone(),
        item.name.clone(),
        item.unit_label().to_string(),
    ];
    if stage == Stage::Finalized {
        cells.push(item.system_quantity.to_string());
    }
    cells.push(count_cell(item.first_count));
    if stage != Stage::FirstCount {
        cells.push(count_cell(item.second_count));
    }
    if stage == Stage::Finalized {
        cells.push(
            item.discrepancy()
                .map(Quantity::signed)
                .unwrap_or_else(|| "-".to_string()),
        );
    }
    cells
}

/// Discrepancies of a finalized session with their notes and, when the
/// ledger is loaded, the assignment status.
pub fn discrepancy_table(session: &Session, ledger: Option<&AssignmentLedger>) -> Table {
    let mut table = Table::new(["Code", "Product", "Diff", "Kind", "Value", "Assigned", "Notes"]);
    for discrepancy in session.discrepancies() {
        let status = ledger
            .and_then(|ledger| ledger.status(discrepancy.item_id).ok())
            .map(status_label)
            .unwrap_or("-");
        table.row(vec![
            discrepancy.code.clone(),
            discrepancy.name.clone(),
            discrepancy.difference.signed(),
            discrepancy.kind().to_string(),
            discrepancy.value().to_string(),
            status.to_string(),
            discrepancy.notes.clone(),
        ]);
    }
    table
}

pub fn status_label(status: AssignmentStatus) -> &'static str {
    match status {
        AssignmentStatus::Unassigned => "no",
        AssignmentStatus::Partial => "partial",
        AssignmentStatus::Complete => "yes",
    }
}

/// The rows of one item of the ledger, with their value and what is left.
pub fn assignment_detail(ledger: &AssignmentLedger, item_id: ItemId) -> Result<String, EngineError> {
    let mut table = Table::new(["#", "Person", "Quantity", "Value"]);
    for (index, row) in ledger.rows(item_id)?.iter().enumerate() {
        let person = if row.person.is_empty() { "?" } else { &row.person };
        table.row(vec![
            index.to_string(),
            person.to_string(),
            row.quantity.to_string(),
            ledger.row_value(item_id, index)?.to_string(),
        ]);
    }

    let mut out = format!(
        "{}: {} to assign, {} assigned, {} left ({})\n",
        ledger.code(item_id)?,
        ledger.target(item_id)?,
        ledger.assigned(item_id)?,
        ledger.remaining(item_id)?,
        status_label(ledger.status(item_id)?)
    );
    if !table.is_empty() {
        out.push_str(&table.to_string());
    }
    Ok(out)
}

pub fn batch_summary(what: &str, outcome: &BatchOutcome) -> String {
    let mut out = format!(
        "{what}: {} saved, {} unchanged, {} failed",
        outcome.saved,
        outcome.skipped,
        outcome.failed()
    );
    for (item_id, err) in &outcome.failures {
        let _ = write!(out, "\n  item {item_id}: {err}");
    }
    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use engine::{Discrepancy, ItemId, LineItem, Money, Pass};

    use super::*;

    fn q(value: &str) -> Quantity {
        value.parse().unwrap()
    }

    fn session(items: Vec<LineItem>) -> Session {
        let date = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();
        Session::load(date, "floreana", items).unwrap()
    }

    #[test]
    fn first_count_hides_the_system_quantity() {
        let session = session(vec![
            LineItem::new(ItemId(1), "B02", "Ice", q("7")).first_count(q("6")),
            LineItem::new(ItemId(2), "A01", "Cola", q("12.5")).unit("box"),
        ]);
        let out = items_table(&session).to_string();
        let lines: Vec<&str> = out.lines().collect();

        assert_eq!(lines[0].split_whitespace().collect::<Vec<_>>(), ["Code", "Product", "Unit", "Count"]);
        assert!(lines[2].starts_with("A01"));
        assert!(lines[2].ends_with('-'));
        assert!(lines[3].contains("Unit"));
        assert!(!out.contains("12.5"));
        assert!(!out.contains('7'));
        assert_eq!(
            stage_banner(&session),
            "floreana / 2026-03-14: stage 1 of 3, first count (1/2 counted)"
        );
    }

    #[test]
    fn second_count_lists_failed_items_only() {
        let session = session(vec![
            LineItem::new(ItemId(1), "A", "Apple", q("4")).first_count(q("3")),
            LineItem::new(ItemId(2), "B", "Pear", q("2")).first_count(q("2")),
        ]);
        let table = items_table(&session);
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.headers, ["Code", "Product", "Unit", "Count 1", "Count 2"]);
        assert_eq!(table.rows[0], ["A", "Apple", "Unit", "3", "-"]);
        assert_eq!(
            stage_banner(&session),
            "floreana / 2026-03-14: stage 2 of 3, second count (0/1 counted)"
        );
    }

    #[test]
    fn banner_says_when_the_pass_is_done() {
        let mut session = session(vec![
            LineItem::new(ItemId(1), "A", "Apple", q("4")),
            LineItem::new(ItemId(2), "B", "Pear", q("2")).first_count(q("2")),
        ]);
        assert!(!stage_banner(&session).contains("ready"));

        let change = session
            .count_change(ItemId(1), Pass::First, Some(q("3")))
            .unwrap()
            .unwrap();
        session.apply_count(&change).unwrap();
        assert_eq!(
            stage_banner(&session),
            "floreana / 2026-03-14: stage 1 of 3, first count (2/2 counted), ready to advance"
        );
    }

    #[test]
    fn search_keeps_stage_columns() {
        let session = session(vec![
            LineItem::new(ItemId(1), "BEB-01", "Coca Cola", q("4")),
            LineItem::new(ItemId(2), "BEB-02", "Agua", q("2")),
            LineItem::new(ItemId(3), "ALM-01", "Colageno", q("1")),
        ]);

        let table = search_table(&session, "cola");
        assert_eq!(table.headers, ["Code", "Product", "Unit", "Count"]);
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0][0], "ALM-01");
        assert_eq!(table.rows[1][0], "BEB-01");
        assert!(search_table(&session, "cafe").is_empty());
    }

    #[test]
    fn finalized_shows_differences_and_values() {
        let session = session(vec![
            LineItem::new(ItemId(1), "A", "Apple", q("4"))
                .first_count(q("3"))
                .second_count(q("2.5"))
                .unit_cost(Money::new(2, 0))
                .notes("dropped"),
            LineItem::new(ItemId(2), "B", "Pear", q("2")).first_count(q("2")),
        ]);

        let table = items_table(&session);
        assert_eq!(table.rows[0].last().unwrap(), "-1.500");
        assert_eq!(table.rows[1].last().unwrap(), "0.000");

        let table = discrepancy_table(&session, None);
        assert_eq!(
            table.rows,
            [["A", "Apple", "-1.500", "shortage", "3.00", "-", "dropped"]]
        );
    }

    #[test]
    fn ledger_detail_reports_what_is_left() {
        let item = LineItem::new(ItemId(1), "A", "Apple", q("4"))
            .first_count(q("1"))
            .second_count(q("1"))
            .unit_cost(Money::new(150, 2));
        let discrepancy = Discrepancy::of(&item).unwrap();
        let mut ledger = AssignmentLedger::new(
            &[discrepancy],
            ["Ana".to_string()],
            Default::default(),
        );
        ledger.expand(ItemId(1)).unwrap();
        ledger.set_person(ItemId(1), 0, "Ana").unwrap();
        ledger.set_quantity(ItemId(1), 0, q("2")).unwrap();

        let out = assignment_detail(&ledger, ItemId(1)).unwrap();
        assert!(out.starts_with("A: 3 to assign, 2 assigned, 1 left (partial)"));
        assert!(out.contains("Ana"));
        assert!(out.contains("3.00"));
    }
}
