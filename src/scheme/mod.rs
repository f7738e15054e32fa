// Load modules
mod scheme;
mod scheme_file;
mod scheme_registry;
mod scheme_types;

// Expose
pub use scheme::{Configuration, Quadruple, Scheme};
pub use scheme_file::{parse_scheme, read_scheme_file, scheme_to_string, write_scheme_file};
pub use scheme_registry::{extract_configurations, find_duplicate_configurations, merge_schemes};
pub use scheme_types::{STANDARD_SCHEME_NAMES, StandardSchemeGenerator};
