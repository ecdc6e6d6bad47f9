// SPDX-FileCopyrightText: (C) 2024 Jason Ish <jason@codemonkey.net>
// SPDX-License-Identifier: MIT

//! Date range picker state.
//!
//! The picker keeps three selections: the one it was given by its owner
//! (props), the last one applied, and the provisional one being edited
//! while open. `handle` returns the applied selection whenever the owner
//! should be notified of a change.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::datetime::{self, end_of_day, start_of_day, DateRange, RelativeRange};
use crate::options::ReportOptions;
use crate::precision::{self, Precision};
use crate::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub relative_range: RelativeRange,
    pub precision: Precision,
}

impl Selection {
    pub fn range(&self) -> DateRange {
        DateRange::new(self.from, self.to)
    }

    fn set_range(&mut self, range: DateRange) {
        self.from = range.from;
        self.to = range.to;
        self.precision = precision::recommend(range.from, range.to, Some(self.precision));
    }
}

impl From<&ReportOptions> for Selection {
    fn from(options: &ReportOptions) -> Self {
        Self {
            from: options.from,
            to: options.to,
            relative_range: options.relative_range,
            precision: options.precision,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerState {
    Closed,
    OpenIdle,
    /// The first day of a range has been clicked.
    Selecting { anchor: NaiveDate },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerEvent {
    Open,
    DayClick(NaiveDate),
    DayHover(NaiveDate),
    SelectRange(RelativeRange),
    SelectPrecision(Precision),
    Escape,
    Enter,
    Apply,
    Cancel,
}

/// Checks a provisional range, returning a message to show when it is
/// not acceptable.
pub type Validator = Box<dyn Fn(&DateRange) -> Option<String>>;

pub struct DatePicker {
    state: PickerState,
    props: Selection,
    committed: Selection,
    selected: Selection,
    error: Option<String>,
    validator: Option<Validator>,
}

impl std::fmt::Debug for DatePicker {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("DatePicker")
            .field("state", &self.state)
            .field("selected", &self.selected)
            .field("committed", &self.committed)
            .field("error", &self.error)
            .finish()
    }
}

impl DatePicker {
    pub fn new(props: Selection) -> Self {
        Self {
            state: PickerState::Closed,
            props,
            committed: props,
            selected: props,
            error: None,
            validator: None,
        }
    }

    pub fn with_validator<F>(mut self, validator: F) -> Self
    where
        F: Fn(&DateRange) -> Option<String> + 'static,
    {
        self.validator = Some(Box::new(validator));
        self
    }

    /// Replace the owner supplied selection. While closed the picker
    /// follows it immediately.
    pub fn set_props(&mut self, props: Selection) {
        self.props = props;
        if self.state == PickerState::Closed {
            self.committed = props;
            self.selected = props;
        }
    }

    pub fn state(&self) -> PickerState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state != PickerState::Closed
    }

    pub fn is_selecting(&self) -> bool {
        matches!(self.state, PickerState::Selecting { .. })
    }

    /// The provisional selection.
    pub fn selection(&self) -> &Selection {
        &self.selected
    }

    pub fn committed(&self) -> &Selection {
        &self.committed
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_timezone_disabled(&self) -> bool {
        self.selected.precision.is_forced_utc()
    }

    pub fn handle(&mut self, event: PickerEvent) -> Option<Selection> {
        self.handle_at(event, Utc::now())
    }

    /// Apply one event. Returns the newly applied selection when the
    /// owner's change handler should be called.
    pub fn handle_at(&mut self, event: PickerEvent, now: DateTime<Utc>) -> Option<Selection> {
        trace!("Date picker event {:?} in state {:?}", event, self.state);
        if self.state == PickerState::Closed {
            if event == PickerEvent::Open {
                self.selected = self.committed;
                self.error = None;
                self.state = PickerState::OpenIdle;
            }
            return None;
        }

        match event {
            PickerEvent::Open => {}
            PickerEvent::DayClick(day) => self.day_click(day),
            PickerEvent::DayHover(day) => {
                if let PickerState::Selecting { anchor } = self.state {
                    self.selected.set_range(ordered_days(anchor, day));
                }
            }
            PickerEvent::SelectRange(RelativeRange::Custom) => {
                self.selected.relative_range = RelativeRange::Custom;
            }
            PickerEvent::SelectRange(range) => {
                self.selected.relative_range = range;
                self.selected
                    .set_range(datetime::resolve(range.as_str(), now));
                self.error = None;
                self.state = PickerState::OpenIdle;
            }
            PickerEvent::SelectPrecision(requested) => {
                self.selected.precision =
                    precision::recommend(self.selected.from, self.selected.to, Some(requested));
            }
            PickerEvent::Escape => {
                self.selected = self.committed;
                self.close();
            }
            PickerEvent::Enter => {
                if !self.is_selecting() {
                    return Some(self.commit());
                }
            }
            PickerEvent::Apply => return Some(self.commit()),
            PickerEvent::Cancel => {
                self.committed = self.props;
                self.selected = self.props;
                self.close();
            }
        }
        None
    }

    fn day_click(&mut self, day: NaiveDate) {
        let (range, next) = match self.state {
            PickerState::Selecting { anchor } => (ordered_days(anchor, day), PickerState::OpenIdle),
            _ => (
                DateRange::new(start_of_day(day), end_of_day(day)),
                PickerState::Selecting { anchor: day },
            ),
        };
        if let Some(validator) = &self.validator {
            if let Some(error) = validator(&range) {
                debug!("Date range rejected: {}", error);
                self.error = Some(error);
                return;
            }
        }
        self.error = None;
        self.selected.relative_range = RelativeRange::Custom;
        self.selected.set_range(range);
        self.state = next;
    }

    fn commit(&mut self) -> Selection {
        self.committed = self.selected;
        self.close();
        self.committed
    }

    fn close(&mut self) {
        self.error = None;
        self.state = PickerState::Closed;
    }
}

/// The range covering both days, whichever order they were picked in.
fn ordered_days(a: NaiveDate, b: NaiveDate) -> DateRange {
    let (first, last) = if b < a { (b, a) } else { (a, b) };
    DateRange::new(start_of_day(first), end_of_day(last))
}
