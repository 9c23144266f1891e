mod eval;
mod exec;
mod parse;
mod types;

pub use eval::{compare_bson, compare_docs, eval_filter, project_fields};
pub use exec::{
    apply_patch, count_docs, delete_many, delete_one, find_docs, find_one_and_delete, update_by_id,
    update_many, update_one,
};
pub use parse::{
    filter_to_json, parse_filter_json, parse_filter_value, parse_patch_json, parse_projection,
    validate_filter, validate_find_options, validate_patch, validate_projection,
};
pub(crate) use parse::regex_filter;
pub use types::{
    CmpOp, DeleteReport, Filter, FindOptions, ID_FIELD, Order, Patch, Projection, SortSpec,
    UpdateReport,
};
pub(crate) use types::MAX_LIMIT;
