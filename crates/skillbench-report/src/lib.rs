//! Reporting for skillbench runs: terminal tables and JSON result files.

pub mod console;
pub mod export;
pub mod table;

pub use console::{
    activation_summary_table, effectiveness_summary_table, mechanism_comparison_table, outcome,
    render_activation, render_effectiveness, size_comparison_table, skills_table,
    variant_comparison_table,
};
pub use export::{
    auto_output_path, write_result_file, ActivationExport, EffectivenessExport, EvalType,
    ResultFile, SizeImpactExport, VariantsExport,
};
pub use table::Table;
