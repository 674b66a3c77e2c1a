//! Terminal styling for CLI output
//!
//! One palette for every command: green/yellow/red for state, cyan for
//! headers and identifiers, dark grey for secondary details.

use crossterm::style::Stylize;

/// Semantic styling on top of crossterm's `Stylize`
///
/// ```
/// use plugsw::style::PlugswStyle;
///
/// println!("{}", "Outputs".header());
/// println!("{}", "Running".success());
/// println!("{}", "alsa_output.usb-headset".technical());
/// ```
pub trait PlugswStyle: Stylize {
    /// Section titles such as "Outputs" or "Daemon" (cyan bold)
    fn header(self) -> <<Self as Stylize>::Styled as Stylize>::Styled
    where
        Self: Sized,
        <Self as Stylize>::Styled: Stylize,
    {
        self.cyan().bold()
    }

    /// Healthy states: "Running", "enabled" (green)
    fn success(self) -> <Self as Stylize>::Styled
    where
        Self: Sized,
    {
        self.green()
    }

    /// Failures and missing things: "Not running", "not found" (red)
    fn error(self) -> <Self as Stylize>::Styled
    where
        Self: Sized,
    {
        self.red()
    }

    /// Degraded states: "disabled", last warning (yellow)
    fn warning(self) -> <Self as Stylize>::Styled
    where
        Self: Sized,
    {
        self.yellow()
    }

    /// Node names, paths, counters (cyan)
    fn technical(self) -> <Self as Stylize>::Styled
    where
        Self: Sized,
    {
        self.cyan()
    }

    /// Secondary details like indices and hints (dark grey)
    fn secondary(self) -> <Self as Stylize>::Styled
    where
        Self: Sized,
    {
        self.dark_grey()
    }

    /// The device currently preferred for its role (green bold)
    fn preferred(self) -> <<Self as Stylize>::Styled as Stylize>::Styled
    where
        Self: Sized,
        <Self as Stylize>::Styled: Stylize,
    {
        self.green().bold()
    }
}

impl<T: Stylize> PlugswStyle for T {}
