//! Settings-file fixtures built on `figment::Jail`.
//!
//! Each call gets its own working directory, so the relative settings path
//! handed to the closure never leaks between tests.

use std::fmt::Display;

use anyhow::{Result, anyhow};
use camino::Utf8Path;

/// Name of the settings file created inside the jail.
pub const SETTINGS_FILE_NAME: &str = "merge.toml";

/// Runs `f` inside a [`figment::Jail`] with [`SETTINGS_FILE_NAME`] holding
/// `contents`, or absent when `contents` is `None`.
///
/// The closure receives the relative settings path. Its error type only
/// needs to be displayable, so library errors can be returned directly.
///
/// # Errors
///
/// Returns an error if the jail or the settings file cannot be set up, or if
/// the closure fails.
///
/// # Examples
///
/// ```
/// use manifest_merge_test_helpers::figment::with_settings_file;
///
/// let text = with_settings_file(Some("key = 1\n"), |path| std::fs::read_to_string(path))
///     .expect("read settings");
/// assert_eq!(text, "key = 1\n");
/// ```
pub fn with_settings_file<F, T, E>(contents: Option<&str>, f: F) -> Result<T>
where
    F: FnOnce(&Utf8Path) -> Result<T, E>,
    E: Display,
{
    let mut output = None;
    figment::Jail::try_with(|jail| {
        if let Some(text) = contents {
            jail.create_file(SETTINGS_FILE_NAME, text)?;
        }
        let value = f(Utf8Path::new(SETTINGS_FILE_NAME))
            .map_err(|err| figment::Error::from(err.to_string()))?;
        output = Some(value);
        Ok(())
    })
    .map_err(|err| anyhow!(err.to_string()))?;
    output.ok_or_else(|| anyhow!("settings closure did not return a value"))
}
