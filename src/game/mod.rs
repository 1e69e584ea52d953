pub mod chart;
pub mod gameplay;
pub mod judgment;
pub mod note;
pub mod parsing;
pub mod scores;
pub mod timing;
