//! Ready-made progress reporters for drivers. The conversion core only ever
//! calls an opaque callback; these are convenience implementations of it.

use colored::Colorize;

use crate::transfer::ProgressFn;

/// Reports every processed row on stderr.
pub fn print_simple() -> ProgressFn {
    Box::new(|done, total| {
        eprintln!("Processing entry {done} of {total}");
    })
}

/// Overwrites a single stderr line with the completion percentage, roughly
/// every 5%, and finishes the line on the last row.
pub fn print_percent() -> ProgressFn {
    Box::new(|done, total| {
        let interval = (total / 20).max(1);
        if done % interval == 0 || done == total {
            let percent = (done as f64 / total as f64) * 100.0;
            let label = format!("{percent:5.1}% completed");
            let label = if done == total {
                label.as_str().green()
            } else {
                label.as_str().yellow()
            };
            eprint!("\rProcessing entry {done} of {total} [{label}]");
            if done == total {
                eprintln!();
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reporters_survive_small_and_large_totals() {
        // Exercise the interval math; totals below the percentage granularity
        // must not divide by zero.
        let mut simple = print_simple();
        let mut percent = print_percent();
        for total in [1_u64, 3, 19, 100] {
            for done in 1..=total {
                simple(done, total);
                percent(done, total);
            }
        }
    }
}
