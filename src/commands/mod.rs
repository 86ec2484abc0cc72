pub mod analyze;
pub mod check_study;

pub use analyze::handle_analyze;
pub use check_study::handle_check_study;
