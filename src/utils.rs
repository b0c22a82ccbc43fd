use std::fmt;

use terminal_size::{terminal_size, Width};

/// A trait for printing trees (the CDM, an ISD) to stdout, wrapping long
/// lines to the terminal width when one is available.
pub trait PrintableTree
where
    Self: fmt::Display,
{
    fn print(&self) {
        if let Some((Width(w), _)) = terminal_size() {
            let view = self.to_string();
            for line in view.lines() {
                if line.len() > w as usize {
                    println!("{}...", &line[..w as usize - 3]);
                } else {
                    println!("{}", line);
                }
            }
        } else {
            println!("{}", self);
        }
    }
}
