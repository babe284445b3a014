//! Line based counting shell.
//!
//! The shell owns the [`Engine`] for one session. Count writes that the
//! backend did not confirm stay pending in the shell until `flush` or
//! `advance` retries them.
use std::collections::BTreeMap;

use chrono::NaiveDate;
use engine::{Backend, Engine, EngineError, ItemId, Pass, Quantity, Stage, WriteOutcome};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::{
    error::{AppError, Result},
    render,
};

pub const HELP: &str = "\
list                              show the session
find <text>                       list the items whose code or name contains text
set <code> <qty|->                record the count of the current pass, - clears it
flush                             retry counts the backend did not confirm
advance                           move to the next stage
note <code> <text>                explain a discrepancy (finalized only)
notes                             save every note again
expand <code>                     show the assignment rows of a discrepancy
assign <code> <row> <person> <qty>
                                  fill one assignment row
row add <code> | row rm <code> <row>
                                  add or remove an assignment row
save <code>                       save the assignments of one item
save-all                          save every item with assigned quantities
people                            list who can be assigned
reload                            load the session again from the backend
help                              this text
quit                              leave the shell";

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    List,
    Find { text: String },
    Set { code: String, value: Option<Quantity> },
    Flush,
    Advance,
    Note { code: String, text: String },
    Notes,
    Expand { code: String },
    Assign {
        code: String,
        row: usize,
        person: String,
        quantity: Quantity,
    },
    RowAdd { code: String },
    RowRemove { code: String, row: usize },
    Save { code: String },
    SaveAll,
    People,
    Reload,
    Help,
    Quit,
}

fn usage(text: &str) -> AppError {
    AppError::input(format!("usage: {text}"))
}

fn row_index(token: &str) -> Result<usize> {
    token
        .parse()
        .map_err(|_| AppError::input(format!("invalid row number: {token}")))
}

/// Parses one input line. Blank lines are `None`.
pub fn parse_command(line: &str) -> Result<Option<Command>> {
    let line = line.trim();
    let Some(name) = line.split_whitespace().next() else {
        return Ok(None);
    };
    let rest = line[name.len()..].trim();
    let args: Vec<&str> = rest.split_whitespace().collect();

    let command = match (name, args.as_slice()) {
        ("list" | "ls", []) => Command::List,
        ("find", [_, ..]) => Command::Find {
            text: rest.to_string(),
        },
        ("find", []) => return Err(usage("find <text>")),
        ("set", [code, value]) => {
            let value = match *value {
                "-" => None,
                value => {
                    let quantity: Quantity = value.parse()?;
                    if quantity.is_negative() {
                        return Err(AppError::input("a count cannot be negative"));
                    }
                    Some(quantity)
                }
            };
            Command::Set {
                code: code.to_string(),
                value,
            }
        }
        ("set", _) => return Err(usage("set <code> <qty|->")),
        ("flush", []) => Command::Flush,
        ("advance", []) => Command::Advance,
        ("note", [code, ..]) => Command::Note {
            code: code.to_string(),
            text: rest[code.len()..].trim().to_string(),
        },
        ("note", []) => return Err(usage("note <code> <text>")),
        ("notes", []) => Command::Notes,
        ("expand", [code]) => Command::Expand {
            code: code.to_string(),
        },
        ("assign", [code, row, person @ .., quantity]) if !person.is_empty() => {
            // The name is everything between the row and the quantity, kept
            // byte for byte.
            let after_row = rest[code.len()..].trim_start()[row.len()..].trim();
            let person = after_row[..after_row.len() - quantity.len()].trim();
            Command::Assign {
                code: code.to_string(),
                row: row_index(row)?,
                person: person.to_string(),
                quantity: quantity.parse()?,
            }
        }
        ("assign", _) => return Err(usage("assign <code> <row> <person> <qty>")),
        ("row", ["add", code]) => Command::RowAdd {
            code: code.to_string(),
        },
        ("row", ["rm", code, row]) => Command::RowRemove {
            code: code.to_string(),
            row: row_index(row)?,
        },
        ("row", _) => return Err(usage("row add <code> | row rm <code> <row>")),
        ("save", [code]) => Command::Save {
            code: code.to_string(),
        },
        ("save-all", []) => Command::SaveAll,
        ("people", []) => Command::People,
        ("reload", []) => Command::Reload,
        ("help" | "?", _) => Command::Help,
        ("quit" | "exit" | "q", []) => Command::Quit,
        _ => return Err(AppError::input(format!("unknown command: {line} (try help)"))),
    };
    Ok(Some(command))
}

pub enum Reply {
    Text(String),
    Quit,
}

pub struct Shell<B> {
    engine: Engine<B>,
    date: NaiveDate,
    warehouse: String,
    pending: BTreeMap<ItemId, (Pass, Option<Quantity>)>,
}

impl<B: Backend> Shell<B> {
    /// Opens the session; a session that cannot be loaded is an error.
    pub async fn open(mut engine: Engine<B>, date: NaiveDate, warehouse: &str) -> Result<Self> {
        engine.open_session(date, warehouse).await?;
        Ok(Self {
            engine,
            date,
            warehouse: warehouse.to_string(),
            pending: BTreeMap::new(),
        })
    }

    #[cfg(test)]
    fn engine(&self) -> &Engine<B> {
        &self.engine
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn list(&self) -> Result<String> {
        let session = self.engine.session()?;
        let mut out = render::stage_banner(session);
        out.push('\n');
        out.push_str(&render::items_table(session).to_string());
        if session.stage() == Stage::Finalized {
            let ledger = self.engine.ledger().ok();
            let table = render::discrepancy_table(session, ledger);
            if !table.is_empty() {
                out.push('\n');
                out.push_str(&table.to_string());
            }
            out.push_str(&format!("Discrepancy value: {}", session.total_value()));
        }
        if !self.pending.is_empty() {
            out.push_str(&format!("\n{} count(s) not saved yet, run flush", self.pending.len()));
        }
        Ok(out)
    }

    fn find(&self, text: &str) -> Result<String> {
        let table = render::search_table(self.engine.session()?, text);
        if table.is_empty() {
            return Ok(format!("no item matches \"{text}\""));
        }
        Ok(table.to_string())
    }

    async fn set(&mut self, code: &str, value: Option<Quantity>) -> Result<String> {
        let item_id = self.engine.item_id(code)?;
        let pass = self
            .engine
            .stage()?
            .active_pass()
            .ok_or_else(|| AppError::input("counts are read-only once the session is finalized"))?;

        match self.engine.record_count(item_id, pass, value).await {
            Ok(outcome) => {
                self.pending.remove(&item_id);
                Ok(match outcome {
                    WriteOutcome::Saved => format!("{code}: count {pass} saved"),
                    WriteOutcome::Unchanged => format!("{code}: unchanged"),
                })
            }
            Err(err @ EngineError::Persistence(_)) => {
                self.pending.insert(item_id, (pass, value));
                tracing::warn!(code, "count kept for retry: {err}");
                Ok(format!("{code}: NOT SAVED ({err}), run flush to retry"))
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn flush(&mut self) -> Result<String> {
        if self.pending.is_empty() {
            return Ok("nothing to flush".to_string());
        }
        let entries: Vec<_> = self
            .pending
            .iter()
            .map(|(item_id, (pass, value))| (*item_id, *pass, *value))
            .collect();
        let outcome = self.engine.record_counts(entries).await?;

        let failed: Vec<ItemId> = outcome.failures.iter().map(|(item_id, _)| *item_id).collect();
        self.pending.retain(|item_id, _| failed.contains(item_id));
        Ok(render::batch_summary("counts", &outcome))
    }

    async fn advance(&mut self) -> Result<String> {
        let mut out = String::new();
        if !self.pending.is_empty() {
            out.push_str(&self.flush().await?);
            out.push('\n');
            if !self.pending.is_empty() {
                return Err(AppError::input(format!(
                    "{out}some counts are still not saved, the stage was not advanced"
                )));
            }
        }
        let stage = self.engine.advance_stage().await?;
        out.push_str(&format!("now in stage {}: {stage}\n", stage.number()));
        out.push_str(&self.list()?);
        Ok(out)
    }

    async fn reload(&mut self) -> Result<String> {
        self.pending.clear();
        self.engine.open_session(self.date, &self.warehouse).await?;
        self.list()
    }

    fn detail(&self, item_id: ItemId) -> Result<String> {
        Ok(render::assignment_detail(self.engine.ledger()?, item_id)?)
    }

    pub async fn execute(&mut self, command: Command) -> Result<Reply> {
        let text = match command {
            Command::List => self.list()?,
            Command::Find { text } => self.find(&text)?,
            Command::Set { code, value } => self.set(&code, value).await?,
            Command::Flush => self.flush().await?,
            Command::Advance => self.advance().await?,
            Command::Note { code, text } => {
                let item_id = self.engine.item_id(&code)?;
                match self.engine.record_note(item_id, &text).await? {
                    WriteOutcome::Saved => format!("{code}: note saved"),
                    WriteOutcome::Unchanged => format!("{code}: note unchanged"),
                }
            }
            Command::Notes => {
                let notes: Vec<(ItemId, String)> = self
                    .engine
                    .session()?
                    .discrepancies()
                    .into_iter()
                    .map(|d| (d.item_id, d.notes))
                    .collect();
                let outcome = self.engine.record_notes(notes).await?;
                render::batch_summary("notes", &outcome)
            }
            Command::Expand { code } => {
                let item_id = self.engine.item_id(&code)?;
                self.engine.expand_assignment(item_id)?;
                self.detail(item_id)?
            }
            Command::Assign {
                code,
                row,
                person,
                quantity,
            } => {
                let item_id = self.engine.item_id(&code)?;
                self.engine.set_assignment_person(item_id, row, &person)?;
                let clamped = self.engine.set_assignment_quantity(item_id, row, quantity)?;
                let mut out = String::new();
                if clamped.max_exceeded {
                    out.push_str(&format!(
                        "quantity reduced to {}, the maximum left for this row\n",
                        clamped.quantity
                    ));
                }
                out.push_str(&self.detail(item_id)?);
                out
            }
            Command::RowAdd { code } => {
                let item_id = self.engine.item_id(&code)?;
                self.engine.add_assignment_row(item_id)?;
                self.detail(item_id)?
            }
            Command::RowRemove { code, row } => {
                let item_id = self.engine.item_id(&code)?;
                self.engine.remove_assignment_row(item_id, row)?;
                self.detail(item_id)?
            }
            Command::Save { code } => {
                let item_id = self.engine.item_id(&code)?;
                self.engine.save_assignments(item_id).await?;
                format!("{code}: assignments saved")
            }
            Command::SaveAll => {
                let outcome = self.engine.save_all_assignments().await?;
                render::batch_summary("assignments", &outcome)
            }
            Command::People => {
                let people: Vec<&str> = self
                    .engine
                    .ledger()?
                    .personnel()
                    .iter()
                    .map(String::as_str)
                    .collect();
                people.join("\n")
            }
            Command::Reload => self.reload().await?,
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(Reply::Quit),
        };
        Ok(Reply::Text(text))
    }
}

/// Reads commands from stdin until `quit` or end of input. Command errors
/// are printed and the shell keeps going.
pub async fn run<B: Backend>(mut shell: Shell<B>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    println!("{}", shell.list()?);
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        let reply = match parse_command(&line) {
            Ok(Some(command)) => shell.execute(command).await,
            Ok(None) => continue,
            Err(err) => Err(err),
        };
        match reply {
            Ok(Reply::Text(text)) => println!("{text}"),
            Ok(Reply::Quit) => break,
            Err(err) => println!("error: {err}"),
        }
    }

    if shell.pending() > 0 {
        tracing::warn!(pending = shell.pending(), "leaving with unsaved counts");
    }
    Ok(())
}
