//! Archive index read model (year → month → entries).

use crate::model::blog_entry::BlogEntry;
use chrono::Month;

/// One month of the archive index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveMonth {
    /// Calendar month, 1-12.
    pub month: u32,
    /// English month name, e.g. `"January"`.
    pub name: String,
    /// Visible entries published in this month, newest first. Never empty.
    pub entries: Vec<BlogEntry>,
}

/// One year of the archive index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveYear {
    pub year: i32,
    /// Months newest first. Never empty.
    pub months: Vec<ArchiveMonth>,
}

/// Archive index over visible entries, newest year first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlogArchive {
    pub years: Vec<ArchiveYear>,
}

impl BlogArchive {
    pub fn is_empty(&self) -> bool {
        self.years.is_empty()
    }

    pub fn year(&self, year: i32) -> Option<&ArchiveYear> {
        self.years.iter().find(|item| item.year == year)
    }

    /// Total number of entries across every month.
    pub fn entry_count(&self) -> usize {
        self.years
            .iter()
            .flat_map(|year| year.months.iter())
            .map(|month| month.entries.len())
            .sum()
    }
}

/// English name for a 1-based month number.
pub fn month_name(month: u32) -> Option<&'static str> {
    let month = u8::try_from(month).ok()?;
    Month::try_from(month).ok().map(|value| value.name())
}
