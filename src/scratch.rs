//! The scripted query scenario: every step prints a banner followed by its rendered result.

use crate::connection::Connection;
use crate::display::{banner, render};
use crate::errors::DbError;
use crate::filter::{
    IdBounds, by_id_range, by_title_contains, by_title_exact, by_title_missing_or_present, combine_and,
    combine_not, paginate,
};
use crate::note::{CONTENT, Note, NoteDraft, TITLE};
use crate::query::{CmpOp, Filter, FindOptions, Patch, Projection};
use crate::runner::{Operation, QueryResult, QueryRunner, UpdateOptions};
use crate::types::numbered_id;
use bson::Bson;
use std::io::Write;

#[derive(Debug, Clone)]
pub struct Step {
    pub title: &'static str,
    pub operation: Operation,
}

fn step(title: &'static str, operation: Operation) -> Step {
    Step { title, operation }
}

fn find(filter: Filter) -> Operation {
    Operation::FindMany { filter, options: FindOptions::default() }
}

fn bounds() -> IdBounds {
    IdBounds::default()
}

fn returning() -> UpdateOptions {
    UpdateOptions { return_updated: true }
}

/// The scenario's steps in order.
///
/// # Errors
/// `InvalidQuery` if a title filter cannot be compiled.
pub fn steps() -> Result<Vec<Step>, DbError> {
    let title_only = Projection::include([TITLE]);
    Ok(vec![
        step("Find all the notes", find(Filter::True)),
        step(
            "Find all the notes selecting for title field",
            Operation::FindMany {
                filter: Filter::True,
                options: FindOptions { projection: Some(title_only.clone()), ..FindOptions::default() },
            },
        ),
        step(
            "Find all the notes with the title '5 life lessons learned from cats'",
            find(by_title_exact(Some("5 life lessons learned from cats"))),
        ),
        step(
            "Find the first 5 notes",
            Operation::FindMany { filter: Filter::True, options: paginate(Some(5), None).into() },
        ),
        step(
            "Find the first 5 notes after skipping the first 5",
            Operation::FindMany { filter: Filter::True, options: paginate(Some(5), Some(5)).into() },
        ),
        step("Count the number of documents", Operation::Count { filter: Filter::True }),
        step(
            "Find the notes with _id greater than 7",
            find(by_id_range(IdBounds { gt: Some(numbered_id(7)), ..bounds() })),
        ),
        step(
            "Find the notes with _id between 9 and 17 inclusive",
            find(by_id_range(IdBounds { gte: Some(numbered_id(9)), lte: Some(numbered_id(17)), ..bounds() })),
        ),
        step(
            "Find the notes with _id less than or equal to 7",
            find(by_id_range(IdBounds { lte: Some(numbered_id(7)), ..bounds() })),
        ),
        step("Find one note", Operation::FindOne { filter: Filter::True, projection: None }),
        step(
            "Find one note and display only the title",
            Operation::FindOne { filter: Filter::True, projection: Some(title_only) },
        ),
        step(
            "Insert one note",
            Operation::InsertOne(
                NoteDraft::new("11 reasons why cats sleep all day and stay up all night", "lorem ipsum...").into(),
            ),
        ),
        step(
            "Insert two notes",
            Operation::InsertMany(vec![
                NoteDraft::new("make more notes about dogs", "lorem ipsum...").into(),
                NoteDraft::new("cats are the best but dogs are great too", "lorem ipsum...").into(),
            ]),
        ),
        step(
            "Update one note",
            Operation::UpdateById {
                id: numbered_id(3),
                patch: Patch::new().set(TITLE, "new title").set(CONTENT, "new content"),
                options: returning(),
            },
        ),
        step(
            "Update only the title field of one note",
            Operation::UpdateById { id: numbered_id(7), patch: Patch::new().set(TITLE, "new title"), options: returning() },
        ),
        step(
            "Update title and content fields of all notes with _id greater than 14",
            Operation::UpdateMany {
                filter: by_id_range(IdBounds { gt: Some(numbered_id(14)), ..bounds() }),
                patch: Patch::new().set(TITLE, "new title").set(CONTENT, "new content"),
            },
        ),
        step(
            "Update Note 8 to remove title",
            Operation::UpdateById { id: numbered_id(8), patch: Patch::new().unset(TITLE), options: returning() },
        ),
        step(
            "Update Notes with ids less than or equal to 6 to remove the content field",
            Operation::UpdateMany {
                filter: by_id_range(IdBounds { lte: Some(numbered_id(6)), ..bounds() }),
                patch: Patch::new().unset(CONTENT),
            },
        ),
        step(
            "Update Notes with ids less than or equal to 3 to remove the title field",
            Operation::UpdateMany {
                filter: by_id_range(IdBounds { lte: Some(numbered_id(3)), ..bounds() }),
                patch: Patch::new().unset(TITLE),
            },
        ),
        step("Remove the note with id 17", Operation::FindByIdAndRemove { id: numbered_id(17) }),
        step(
            "Remove notes with id not less than 17",
            Operation::DeleteMany {
                filter: combine_not(by_id_range(IdBounds { lt: Some(numbered_id(17)), ..bounds() })),
            },
        ),
        step(
            "Remove the notes with id greater than or equal 13 with \"dogs\" in title",
            Operation::DeleteMany {
                filter: combine_and([
                    by_id_range(IdBounds { gte: Some(numbered_id(13)), ..bounds() }),
                    by_title_contains(Some("dogs"))?,
                ]),
            },
        ),
        step(
            "Find all the notes that do not have a title field",
            find(Filter::Cmp { path: TITLE.to_string(), op: CmpOp::Eq, value: Bson::Null }),
        ),
        step(
            "Remove the notes with \"cat\" in the title and not \"the\" in the title",
            Operation::DeleteMany {
                filter: combine_and([by_title_contains(Some("cat"))?, combine_not(by_title_contains(Some("the"))?)]),
            },
        ),
        step(
            "Find all the notes that assuredly have a title field which does not contain the string \"dogs\"",
            find(combine_and([combine_not(by_title_contains(Some("dogs"))?), by_title_missing_or_present(true)])),
        ),
    ])
}

/// Run `steps` in order, writing each banner and result to `out`.
///
/// A step that fails with `NotFound` prints `null` and the run goes on; any other error stops it.
///
/// # Errors
/// The first error that is not `NotFound`, or an I/O error writing to `out`.
pub fn run<W: Write>(runner: &QueryRunner<'_, Note>, steps: &[Step], out: &mut W) -> Result<usize, DbError> {
    for (i, s) in steps.iter().enumerate() {
        writeln!(out, "{}", banner(s.title))?;
        let text = match runner.execute(&s.operation) {
            Ok(result) => render(&result),
            Err(e) if e.is_not_found() => {
                log::warn!("step {} ({}): {e}", i + 1, s.title);
                render::<Note>(&QueryResult::Document(None))
            }
            Err(e) => {
                log::error!("step {} ({}) failed: {e}", i + 1, s.title);
                return Err(e);
            }
        };
        writeln!(out, "{text}\n")?;
    }
    Ok(steps.len())
}

/// Run the full scenario against the note collection, reseeding it first when asked.
///
/// # Errors
/// As [`run`], plus seeding failures.
pub fn run_scenario<W: Write>(conn: &Connection, seed: bool, out: &mut W) -> Result<usize, DbError> {
    let runner = QueryRunner::<Note>::new(conn)?;
    if seed {
        crate::seed::reseed(&runner)?;
    }
    run(&runner, &steps()?, out)
}
