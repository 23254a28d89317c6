pub mod gate;
pub mod selector;

pub use gate::{
    challenge_phrase, confirm_destruction, evaluate_response, Authorization, SafetyDecision,
};
pub use selector::{choose_disk, eligible, parse_selection, render_table, Retry};
