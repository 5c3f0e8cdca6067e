pub mod formatter;

pub use formatter::{
    format_batch_summary, format_batch_table, format_evaluation, format_evaluation_error,
    format_issues, format_model_doc, format_model_list, format_percentage, format_result_detail,
    format_tsv, format_value, should_use_colors,
};
