//! Destination-side helpers that are not tied to a database driver.

mod dry_run;

pub use dry_run::DryRunTarget;
