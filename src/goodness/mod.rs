// Load modules
mod comprehensive_scheme;
mod goodness_ranker;
mod gradient;

// Expose
pub use comprehensive_scheme::{build_comprehensive_scheme, electrode_count_chain};
pub use goodness_ranker::{SelectionSettings, select_configurations, split_budget};
pub use gradient::cell_gradient;
