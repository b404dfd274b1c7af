pub mod handler_locator;
pub mod log_template;
pub mod reference_scan;
