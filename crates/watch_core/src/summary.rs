use std::fmt;

use crate::{ChangeEvent, ChangeKind, Intake};

/// Counts for one run; producible even when individual items failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub received: usize,
    pub malformed: usize,
    pub duplicates: usize,
    pub filtered_out: usize,
    pub new: usize,
    pub price_changed: usize,
    pub reposted: usize,
    pub unchanged: usize,
    pub delivered: usize,
    pub failed: usize,
    /// Notable events recorded without delivery (seeding).
    pub suppressed: usize,
}

impl RunSummary {
    pub fn from_intake(intake: &Intake) -> Self {
        Self {
            received: intake.received,
            malformed: intake.malformed.len(),
            duplicates: intake.duplicates,
            filtered_out: intake.filtered_out,
            ..Self::default()
        }
    }

    pub fn count_events(&mut self, events: &[ChangeEvent]) {
        for event in events {
            match event.kind() {
                ChangeKind::New => self.new += 1,
                ChangeKind::PriceChanged => self.price_changed += 1,
                ChangeKind::PossibleRepost => self.reposted += 1,
                ChangeKind::Unchanged => self.unchanged += 1,
            }
        }
    }

    pub fn notable(&self) -> usize {
        self.new + self.price_changed + self.reposted
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "received={} malformed={} duplicates={} filtered_out={} new={} price_changed={} \
             reposted={} unchanged={} delivered={} failed={} suppressed={}",
            self.received,
            self.malformed,
            self.duplicates,
            self.filtered_out,
            self.new,
            self.price_changed,
            self.reposted,
            self.unchanged,
            self.delivered,
            self.failed,
            self.suppressed
        )
    }
}
