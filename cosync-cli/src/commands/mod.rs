pub mod check_ignore;
pub mod sync;
