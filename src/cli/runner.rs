use crate::connection::Connection;
use crate::display::render;
use crate::errors::DbError;
use crate::filter::paginate;
use crate::note::Note;
use crate::query::{self, Filter, FindOptions};
use crate::runner::{Operation, QueryRunner, UpdateOptions};
use crate::types::parse_id;
use std::io::Write;

use super::command::Command;
use super::util::{parse_document_json, parse_sort};

fn operation(cmd: Command) -> Result<Operation, DbError> {
    Ok(match cmd {
        Command::Find { filter_json, project, sort, limit, skip } => Operation::FindMany {
            filter: query::parse_filter_json(&filter_json)?,
            options: FindOptions {
                projection: project.as_deref().map(query::parse_projection).transpose()?,
                sort: sort.as_deref().and_then(parse_sort),
                ..FindOptions::from(paginate(limit, skip))
            },
        },
        Command::FindOne { filter_json, project } => Operation::FindOne {
            filter: query::parse_filter_json(&filter_json)?,
            projection: project.as_deref().map(query::parse_projection).transpose()?,
        },
        Command::Count { filter_json } => Operation::Count {
            filter: filter_json.as_deref().map(query::parse_filter_json).transpose()?.unwrap_or(Filter::True),
        },
        Command::Insert { docs_json } => {
            let mut docs =
                docs_json.iter().map(String::as_str).map(parse_document_json).collect::<Result<Vec<_>, _>>()?;
            match docs.len() {
                0 => return Err(DbError::InvalidQuery("insert needs at least one document".into())),
                1 => Operation::InsertOne(docs.remove(0)),
                _ => Operation::InsertMany(docs),
            }
        }
        Command::UpdateById { id, patch_json, return_updated } => Operation::UpdateById {
            id: parse_id(&id)?,
            patch: query::parse_patch_json(&patch_json)?,
            options: UpdateOptions { return_updated },
        },
        Command::UpdateMany { filter_json, patch_json } => Operation::UpdateMany {
            filter: query::parse_filter_json(&filter_json)?,
            patch: query::parse_patch_json(&patch_json)?,
        },
        Command::DeleteMany { filter_json } => {
            Operation::DeleteMany { filter: query::parse_filter_json(&filter_json)? }
        }
        Command::Scratch { .. } | Command::Seed => {
            return Err(DbError::InvalidQuery("not a single query command".into()));
        }
    })
}

/// Run one command against `collection`, writing its rendered output to `out`.
///
/// # Errors
/// Parse errors as `InvalidQuery`, then whatever the operation returns.
pub fn run<W: Write>(conn: &Connection, collection: &str, cmd: Command, out: &mut W) -> Result<(), DbError> {
    let runner = QueryRunner::<Note>::with_collection(conn, collection)?;
    match cmd {
        Command::Scratch { seed } => {
            if seed {
                crate::seed::reseed(&runner)?;
            }
            let ran = crate::scratch::run(&runner, &crate::scratch::steps()?, out)?;
            log::info!("scratch scenario finished: {ran} steps");
        }
        Command::Seed => {
            let n = crate::seed::reseed(&runner)?;
            writeln!(out, "seeded {n} notes into {collection}")?;
        }
        other => {
            let result = runner.execute(&operation(other)?)?;
            writeln!(out, "{}", render(&result))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::connect;

    fn run_text(conn: &Connection, cmd: Command) -> String {
        let mut out = Vec::new();
        run(conn, "notes", cmd, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn seed_then_count_and_find() {
        let conn = connect("memory://cli-seed").unwrap();
        assert_eq!(run_text(&conn, Command::Seed), "seeded 20 notes into notes\n");
        assert_eq!(run_text(&conn, Command::Count { filter_json: None }), "20\n");
        let found = run_text(
            &conn,
            Command::Find {
                filter_json: r#"{"_id": {"$gt": "000000000000000000000018"}}"#.into(),
                project: Some("title -_id".into()),
                sort: Some("-_id".into()),
                limit: None,
                skip: None,
            },
        );
        let lines: Vec<&str> = found.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("{ title: '12 surprising"));
    }

    #[test]
    fn zero_limit_lists_every_note() {
        let conn = connect("memory://cli-zero-limit").unwrap();
        run_text(&conn, Command::Seed);
        let found = run_text(
            &conn,
            Command::Find { filter_json: "{}".into(), project: None, sort: None, limit: Some(0), skip: Some(0) },
        );
        assert_eq!(found.lines().count(), 20);
    }

    #[test]
    fn update_by_id_with_bad_id_is_invalid_query() {
        let conn = connect("memory://cli-bad-id").unwrap();
        let cmd = Command::UpdateById { id: "nope".into(), patch_json: r#"{"title":"x"}"#.into(), return_updated: true };
        let err = run(&conn, "notes", cmd, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, DbError::InvalidQuery(_)));
    }

    #[test]
    fn insert_reports_created_notes() {
        let conn = connect("memory://cli-insert").unwrap();
        let text = run_text(
            &conn,
            Command::Insert { docs_json: vec![r#"{"_id": "000000000000000000000042", "title": "t"}"#.into()] },
        );
        assert_eq!(text, "{ _id: 000000000000000000000042, title: 't' }\n");
    }
}
