// Color constants shared by the review panels and progress output,
// kept in one place for a consistent scheme across the application.
#![allow(dead_code)]

pub const FORMAT_RESET: &str = "\x1b[0m";
pub const FORMAT_BOLD: &str = "\x1b[1m";
pub const FORMAT_GRAY: &str = "\x1b[90m";
pub const FORMAT_RED: &str = "\x1b[31m";
pub const FORMAT_GREEN: &str = "\x1b[32m";
pub const FORMAT_YELLOW: &str = "\x1b[33m";
pub const FORMAT_BLUE: &str = "\x1b[34m";
pub const FORMAT_CYAN: &str = "\x1b[36m";
