//! Name normalization, fuzzy matching, quality detection, call signs, and
//! the tag registry.
//!
//! Every subsystem that needs to compare stream or channel names goes
//! through here rather than rolling its own string handling: rule
//! condition evaluation (`name_normalized`, `tag_in`), the
//! `merge_streams` target=auto cascade, and the `{quality}`/`{quality_raw}`
//! template variables all build on these primitives.

pub mod callsign;
pub mod engine;
pub mod fuzzy;
pub mod quality;
pub mod scorer;
pub mod tags;
pub mod text;

pub use callsign::{contains_call_sign, extract_call_sign};
pub use engine::{apply_rules, NormalizationRule};
pub use fuzzy::{best_match, FuzzyMatch};
pub use quality::{detect_quality, detect_qualities};
pub use scorer::FuzzyConfig;
pub use tags::{matches_any_tag, matches_tag, TagEntry, TagMode};
pub use text::{base_name, deparenthesize, normalize_name, strip_number_prefix};
