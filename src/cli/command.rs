/// Programmatic form of the `noteful` subcommands. JSON arguments are kept as text
/// and parsed when the command runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Scratch {
        seed: bool,
    },
    Seed,
    Find {
        filter_json: String,
        project: Option<String>,
        sort: Option<String>,
        limit: Option<usize>,
        skip: Option<usize>,
    },
    FindOne {
        filter_json: String,
        project: Option<String>,
    },
    Count {
        filter_json: Option<String>,
    },
    Insert {
        docs_json: Vec<String>,
    },
    UpdateById {
        id: String,
        patch_json: String,
        return_updated: bool,
    },
    UpdateMany {
        filter_json: String,
        patch_json: String,
    },
    DeleteMany {
        filter_json: String,
    },
}
