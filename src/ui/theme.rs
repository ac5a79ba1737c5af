//! Color helpers for CLI output, built on owo-colors.

use owo_colors::OwoColorize;
use std::fmt::Display;

pub struct Style;

impl Style {
    /// Section headers ("Configured providers", "Summary").
    pub fn header<T: Display>(text: T) -> String {
        format!("{}", text.bold())
    }

    /// Keys in key/value listings.
    pub fn label<T: Display>(text: T) -> String {
        format!("{}", text.dimmed())
    }

    /// Provider names, model names, counts.
    pub fn value<T: Display>(text: T) -> String {
        format!("{}", text.cyan())
    }

    /// Endpoints, descriptions, language names.
    pub fn secondary<T: Display>(text: T) -> String {
        format!("{}", text.dimmed())
    }

    pub fn success<T: Display>(text: T) -> String {
        format!("{}", text.green())
    }

    pub fn warning<T: Display>(text: T) -> String {
        format!("{}", text.yellow())
    }

    pub fn code<T: Display>(text: T) -> String {
        format!("{}", text.yellow())
    }

    pub fn default_marker() -> String {
        format!("{}", "(default)".dimmed())
    }
}
