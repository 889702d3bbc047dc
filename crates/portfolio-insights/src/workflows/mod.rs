pub mod insights;
pub mod legal_watch;
