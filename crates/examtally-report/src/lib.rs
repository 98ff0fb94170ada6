//! examtally-report: Report emitters.
//!
//! Renders aggregated users and score summaries as CSV files and a
//! self-contained HTML page, and reads reviewer grade sheets back in.
//! Emitters only read `is_correct`; they never re-grade an answer.

pub mod csv_report;
pub mod grades;
pub mod html;

pub use csv_report::{
    append_standard_accuracy, read_summary_table, write_general_statistics, write_user_csvs,
};
pub use grades::{read_grade_sheet, read_manual_grades};
pub use html::{generate_html, write_html_report};
