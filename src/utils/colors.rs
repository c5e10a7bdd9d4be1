// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 flowspec contributors

//! Terminal color utilities

use colored::Colorize;

/// Whether output should be colored; honours `NO_COLOR`
pub fn should_use_colors() -> bool {
    std::env::var_os("NO_COLOR").is_none()
}

/// Apply the color preference to every later write
pub fn configure_colors() {
    if !should_use_colors() {
        colored::control::set_override(false);
    }
}

/// Print a styled header
pub fn print_header(title: &str) {
    println!("{}", title.bold());
    println!("{}", "═".repeat(title.len().max(40)));
}

/// Print a success check
pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green(), msg);
}
