//! Calendar block/unblock editing for a car's availability.
//!
//! Hosts tap two days to select a range; the range is then blocked or
//! unblocked as a whole after confirmation. Edits are staged in a
//! [`BlockedDates`] set and only reach the backend when the surrounding
//! draft is saved.

use jiff::{Span, civil::Date};
use payloads::DateKey;
use std::collections::BTreeSet;

/// Upper bound on the number of days a single range application touches.
pub const MAX_RANGE_DAYS: usize = 400;

/// An inclusive span of days with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    start: DateKey,
    end: DateKey,
}

impl DateRange {
    /// Order two tapped days so the range runs forward regardless of which
    /// was tapped first. The end is pulled in so the range spans at most
    /// [`MAX_RANGE_DAYS`] days.
    pub fn normalize(a: DateKey, b: DateKey) -> Self {
        let (start, end) = if a <= b { (a, b) } else { (b, a) };
        Self {
            start,
            end: end.min(last_allowed_day(start)),
        }
    }

    pub fn single(day: DateKey) -> Self {
        Self {
            start: day,
            end: day,
        }
    }

    pub fn start(&self) -> DateKey {
        self.start
    }

    pub fn end(&self) -> DateKey {
        self.end
    }

    pub fn is_single_day(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, day: DateKey) -> bool {
        self.start <= day && day <= self.end
    }

    pub fn days(&self) -> Vec<DateKey> {
        let end = self.end;
        std::iter::successors(Some(self.start), |day| day.next_day())
            .take_while(|day| *day <= end)
            .collect()
    }
}

/// Last day a range starting on `start` may reach. Falls back to the
/// latest representable date at the end of the calendar.
fn last_allowed_day(start: DateKey) -> DateKey {
    let span = Span::new().days(MAX_RANGE_DAYS as i64 - 1);
    match start.date().checked_add(span) {
        Ok(date) => DateKey::new(date),
        Err(_) => DateKey::new(Date::MAX),
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_single_day() {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{} to {}", self.start, self.end)
        }
    }
}

/// The staged set of blocked days, kept sorted and free of duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockedDates(BTreeSet<DateKey>);

impl BlockedDates {
    /// Build from a loaded record, dropping days before `today`.
    pub fn from_loaded(
        days: impl IntoIterator<Item = DateKey>,
        today: DateKey,
    ) -> Self {
        Self(days.into_iter().filter(|day| *day >= today).collect())
    }

    pub fn contains(&self, day: DateKey) -> bool {
        self.0.contains(&day)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = DateKey> + '_ {
        self.0.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<DateKey> {
        self.iter().collect()
    }

    pub fn all_blocked(&self, days: &[DateKey]) -> bool {
        days.iter().all(|day| self.0.contains(day))
    }

    pub fn block(&mut self, days: &[DateKey]) {
        self.0.extend(days.iter().copied());
    }

    pub fn unblock(&mut self, days: &[DateKey]) {
        for day in days {
            self.0.remove(day);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RangeAction {
    Block,
    Unblock,
}

impl RangeAction {
    /// Unblock only when every day is already blocked; anything else
    /// blocks the whole range.
    pub fn for_days(blocked: &BlockedDates, days: &[DateKey]) -> Self {
        if !days.is_empty() && blocked.all_blocked(days) {
            Self::Unblock
        } else {
            Self::Block
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            Self::Block => "Block",
            Self::Unblock => "Unblock",
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            Self::Block => "Blocked",
            Self::Unblock => "Unblocked",
        }
    }
}

/// Where the host is in the two-tap range flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Selection {
    #[default]
    Idle,
    RangeStarted { start: DateKey },
    /// Waiting for the host to confirm `action` over the tapped days.
    Applying {
        start: DateKey,
        end: DateKey,
        action: RangeAction,
    },
}

impl Selection {
    /// The highlighted span, normalized so caps sit on the true start and
    /// end whatever order the days were tapped in.
    pub fn highlighted(&self) -> Option<DateRange> {
        match *self {
            Self::Idle => None,
            Self::RangeStarted { start } => Some(DateRange::single(start)),
            Self::Applying { start, end, .. } => {
                Some(DateRange::normalize(start, end))
            }
        }
    }
}

/// A change awaiting confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingChange {
    pub range: DateRange,
    pub action: RangeAction,
}

impl PendingChange {
    pub fn title(&self) -> String {
        format!("{} dates?", self.action.verb())
    }

    pub fn message(&self) -> String {
        let count = self.range.days().len();
        if count == 1 {
            format!("{} {}?", self.action.verb(), self.range)
        } else {
            format!("{} {} ({count} days)?", self.action.verb(), self.range)
        }
    }
}

/// Result of applying a confirmed change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppliedChange {
    pub range: DateRange,
    pub action: RangeAction,
    pub days: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapOutcome {
    /// Past day; nothing happened.
    Ignored,
    /// First day of a range selected, with a preview of what a single-day
    /// selection would do.
    Started { preview: String },
    /// Second day selected; the host must confirm.
    ConfirmRequired(PendingChange),
}

/// How a calendar cell should be drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayMarker {
    Past,
    Available,
    Blocked,
    Selected(RangePosition),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangePosition {
    Single,
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AvailabilityEditor {
    blocked: BlockedDates,
    selection: Selection,
    note: Option<String>,
}

impl AvailabilityEditor {
    pub fn new(blocked: BlockedDates) -> Self {
        Self {
            blocked,
            selection: Selection::Idle,
            note: None,
        }
    }

    pub fn blocked(&self) -> &BlockedDates {
        &self.blocked
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// The latest informational note for the host, if any.
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }

    /// The change waiting on a confirmation prompt.
    pub fn pending(&self) -> Option<PendingChange> {
        match self.selection {
            Selection::Applying { start, end, action } => Some(PendingChange {
                range: DateRange::normalize(start, end),
                action,
            }),
            _ => None,
        }
    }

    /// Replace the staged set, dropping any selection in progress.
    pub fn reset(&mut self, blocked: BlockedDates) {
        self.blocked = blocked;
        self.selection = Selection::Idle;
        self.note = None;
    }

    pub fn tap(&mut self, day: DateKey, today: DateKey) -> TapOutcome {
        if day < today {
            return TapOutcome::Ignored;
        }

        match self.selection {
            Selection::RangeStarted { start } => {
                let range = DateRange::normalize(start, day);
                let action = RangeAction::for_days(&self.blocked, &range.days());
                self.selection = Selection::Applying {
                    start,
                    end: day,
                    action,
                };
                TapOutcome::ConfirmRequired(PendingChange { range, action })
            }
            Selection::Idle | Selection::Applying { .. } => {
                self.selection = Selection::RangeStarted { start: day };
                let would = if self.blocked.contains(day) {
                    "unblock"
                } else {
                    "block"
                };
                let preview = format!(
                    "Tap another date to select a range, or {day} again to \
                     {would} just that day."
                );
                self.note = Some(preview.clone());
                TapOutcome::Started { preview }
            }
        }
    }

    /// Offer to unblock a single blocked day directly. Returns None for
    /// past or unblocked days.
    pub fn long_press(
        &mut self,
        day: DateKey,
        today: DateKey,
    ) -> Option<PendingChange> {
        if day < today || !self.blocked.contains(day) {
            return None;
        }
        self.selection = Selection::Applying {
            start: day,
            end: day,
            action: RangeAction::Unblock,
        };
        self.pending()
    }

    /// Apply the pending change in one update and return to idle.
    pub fn confirm(&mut self) -> Option<AppliedChange> {
        let pending = self.pending()?;
        let days = pending.range.days();
        match pending.action {
            RangeAction::Block => self.blocked.block(&days),
            RangeAction::Unblock => self.blocked.unblock(&days),
        }
        self.selection = Selection::Idle;

        let applied = AppliedChange {
            range: pending.range,
            action: pending.action,
            days: days.len(),
        };
        self.note = Some(if applied.days == 1 {
            format!("{} {}.", pending.action.past_tense(), pending.range)
        } else {
            format!("{} {} days.", pending.action.past_tense(), applied.days)
        });
        tracing::debug!(
            action = ?applied.action,
            range = %applied.range,
            "Applied availability change"
        );
        Some(applied)
    }

    /// Dismiss the confirmation prompt and clear the selection.
    pub fn cancel(&mut self) {
        self.selection = Selection::Idle;
        self.note = None;
    }

    pub fn day_marker(&self, day: DateKey, today: DateKey) -> DayMarker {
        if day < today {
            return DayMarker::Past;
        }
        if let Some(range) = self.selection.highlighted()
            && range.contains(day)
        {
            let position = if range.is_single_day() {
                RangePosition::Single
            } else if day == range.start() {
                RangePosition::Start
            } else if day == range.end() {
                RangePosition::End
            } else {
                RangePosition::Middle
            };
            return DayMarker::Selected(position);
        }
        if self.blocked.contains(day) {
            DayMarker::Blocked
        } else {
            DayMarker::Available
        }
    }
}
