//! crates/logging/src/category.rs
//! Diagnostic categories and their tracing targets.

use std::fmt;

/// Subsystem that produced a diagnostic.
///
/// Every recoverable failure inside the core is reported as a
/// `(category, message)` pair. The category maps onto a tracing target of the
/// form `dupluxy::<name>`, so `EnvFilter` directives such as
/// `dupluxy::flags=debug` select individual subsystems.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum LogCategory {
    /// Directory enumeration.
    ListDir,
    /// Extended attribute capture and restore.
    Attributes,
    /// OS flag word capture and restore.
    Flags,
    /// Ownership restore.
    Ownership,
    /// Hardlink tracking and restore.
    Hardlink,
    /// Special file creation.
    Special,
    /// Exclusion by attribute marker.
    Exclude,
    /// Tree walk driver.
    Walk,
}

impl LogCategory {
    /// All categories in declaration order.
    pub const ALL: [Self; 8] = [
        Self::ListDir,
        Self::Attributes,
        Self::Flags,
        Self::Ownership,
        Self::Hardlink,
        Self::Special,
        Self::Exclude,
        Self::Walk,
    ];

    /// Short name used in the tracing target.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ListDir => "list_dir",
            Self::Attributes => "attributes",
            Self::Flags => "flags",
            Self::Ownership => "ownership",
            Self::Hardlink => "hardlink",
            Self::Special => "special",
            Self::Exclude => "exclude",
            Self::Walk => "walk",
        }
    }

    /// Full tracing target, e.g. `dupluxy::flags`.
    #[must_use]
    pub const fn target(self) -> &'static str {
        match self {
            Self::ListDir => "dupluxy::list_dir",
            Self::Attributes => "dupluxy::attributes",
            Self::Flags => "dupluxy::flags",
            Self::Ownership => "dupluxy::ownership",
            Self::Hardlink => "dupluxy::hardlink",
            Self::Special => "dupluxy::special",
            Self::Exclude => "dupluxy::exclude",
            Self::Walk => "dupluxy::walk",
        }
    }

    /// Maps a tracing target back onto its category.
    #[must_use]
    pub fn from_target(target: &str) -> Option<Self> {
        let name = target.strip_prefix("dupluxy::")?;
        Self::ALL.into_iter().find(|category| category.name() == name)
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
