//! The 20-note fixture.

use crate::document::Model;
use crate::errors::DbError;
use crate::note::{Note, NoteDraft};
use crate::query::Filter;
use crate::runner::QueryRunner;
use crate::types::numbered_id;

const LOREM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod tempor \
incididunt ut labore et dolore magna aliqua.";

const TITLES: [&str; 20] = [
    "5 life lessons learned from cats",
    "What the government doesn't want you to know about cats",
    "The most boring article about cats you'll ever read",
    "7 things lady gaga has in common with cats",
    "The most incredible article about cats you'll ever read",
    "10 ways cats can help you live to 100",
    "9 reasons you can blame the recession on cats",
    "10 ways marketers are making you addicted to cats",
    "11 ways investing in cats can make you a millionaire",
    "Why you should forget everything you learned about cats",
    "10 dogs you'll never see on a tv show",
    "7 dogs who can run faster than a car",
    "The best dogs you'll ever meet",
    "13 dogs worth visiting this summer",
    "Why dogs are the best friends of humans",
    "The dogs who love cats the most",
    "6 secrets about dogs nobody tells you",
    "8 dogs that changed the world",
    "How dogs can help you sleep better",
    "12 surprising facts about dogs and cats",
];

/// Fixture notes with ids `000000000000000000000001` through `000000000000000000000020`.
#[must_use]
pub fn notes() -> Vec<NoteDraft> {
    (1u32..)
        .zip(TITLES)
        .map(|(n, title)| NoteDraft::new(title, LOREM).with_id(numbered_id(n)))
        .collect()
}

/// Replace the contents of the note collection with the fixture.
///
/// # Errors
/// `Connection` if the store is closed or the journal cannot be written.
pub fn reseed(runner: &QueryRunner<'_, Note>) -> Result<usize, DbError> {
    let removed = runner.delete_many(&Filter::True)?;
    let inserted = runner.insert_many(notes())?;
    log::info!(
        "reseeded {}: removed {}, inserted {}",
        Note::COLLECTION,
        removed.deleted,
        inserted.len()
    );
    Ok(inserted.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixture_ids_are_sequential() {
        let notes = notes();
        assert_eq!(notes.len(), 20);
        assert_eq!(notes[0].id, Some(numbered_id(1)));
        assert_eq!(notes[19].id, Some(numbered_id(20)));
    }
}
