//! Search form draft and its validation into a [`SearchQuery`]

use crate::pointer::{PanelRegion, PointerEvent, PointerEvents, PointerSubscription};
use crate::{
    CabinClass, CountAdjustment, PassengerCategory, Passengers, SearchQuery, ValidationError,
};
use std::fmt;
use tracing::debug;

/// Scalar fields of the draft that accept free-form input
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftField {
    Origin,
    Destination,
    DepartureDate,
    ReturnDate,
    CabinClass,
}

impl fmt::Display for DraftField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DraftField::Origin => "origin",
            DraftField::Destination => "destination",
            DraftField::DepartureDate => "departure date",
            DraftField::ReturnDate => "return date",
            DraftField::CabinClass => "cabin class",
        };
        f.write_str(name)
    }
}

/// Which of the two date inputs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateFieldKind {
    Departure,
    Return,
}

/// Presentation mode of a date input.
///
/// An empty input shows its placeholder as plain text and only becomes a
/// date picker while focused, so it never sits there as a blank picker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DateInputMode {
    #[default]
    Text,
    DatePicker,
}

impl DateInputMode {
    pub fn on_focus(self) -> Self {
        DateInputMode::DatePicker
    }

    pub fn on_blur(self, value_is_empty: bool) -> Self {
        if value_is_empty {
            DateInputMode::Text
        } else {
            self
        }
    }
}

#[derive(Debug, Default)]
struct DateField {
    value: String,
    mode: DateInputMode,
}

/// Passenger selector dropdown. Holds a pointer subscription only while open.
#[derive(Debug)]
struct SelectorPanel {
    open: bool,
    /// `None` when no hub is attached: only explicit calls close the panel
    region: Option<PanelRegion>,
    pointer: Option<PointerEvents>,
    subscription: Option<PointerSubscription>,
}

impl SelectorPanel {
    fn open(&mut self) {
        self.open = true;
        self.subscription = self.pointer.as_ref().map(PointerEvents::subscribe);
    }

    fn close(&mut self) {
        self.open = false;
        // Dropping the subscription detaches it from the hub.
        self.subscription = None;
    }
}

/// In-progress search form.
///
/// Every mutator only touches the draft; nothing is checked until
/// [`QueryBuilder::validate`] takes a snapshot.
#[derive(Debug)]
pub struct QueryBuilder {
    origin: String,
    destination: String,
    departure: DateField,
    return_date: DateField,
    passengers: Passengers,
    cabin_class: CabinClass,
    selector: SelectorPanel,
}

impl Default for QueryBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryBuilder {
    /// Draft without a pointer hub; the selector closes only on explicit calls
    pub fn new() -> Self {
        Self {
            origin: String::new(),
            destination: String::new(),
            departure: DateField::default(),
            return_date: DateField::default(),
            passengers: Passengers::default(),
            cabin_class: CabinClass::default(),
            selector: SelectorPanel {
                open: false,
                region: None,
                pointer: None,
                subscription: None,
            },
        }
    }

    /// Draft whose passenger selector closes on pointer presses outside `region`
    pub fn with_pointer_events(pointer: PointerEvents, region: PanelRegion) -> Self {
        let mut builder = Self::new();
        builder.selector.pointer = Some(pointer);
        builder.selector.region = Some(region);
        builder
    }

    pub fn set_field(
        &mut self,
        field: DraftField,
        value: impl Into<String>,
    ) -> Result<(), ValidationError> {
        let value = value.into();
        match field {
            DraftField::Origin => self.origin = value,
            DraftField::Destination => self.destination = value,
            DraftField::DepartureDate => self.departure.value = value,
            DraftField::ReturnDate => self.return_date.value = value,
            DraftField::CabinClass => self.cabin_class = value.parse()?,
        }
        Ok(())
    }

    pub fn set_cabin_class(&mut self, cabin_class: CabinClass) {
        self.cabin_class = cabin_class;
    }

    /// Increment, or decrement without going below zero. Returns the new count.
    pub fn adjust_passenger_count(
        &mut self,
        category: PassengerCategory,
        adjustment: CountAdjustment,
    ) -> u32 {
        let count = self.passengers.get_mut(category);
        *count = match adjustment {
            CountAdjustment::Increment => count.saturating_add(1),
            CountAdjustment::Decrement => count.saturating_sub(1),
        };
        *count
    }

    pub fn set_passenger_count(&mut self, category: PassengerCategory, count: u32) {
        *self.passengers.get_mut(category) = count;
    }

    pub fn passengers(&self) -> Passengers {
        self.passengers
    }

    pub fn total_passengers(&self) -> u64 {
        self.passengers.total()
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn departure_date(&self) -> &str {
        &self.departure.value
    }

    pub fn return_date(&self) -> &str {
        &self.return_date.value
    }

    pub fn cabin_class(&self) -> CabinClass {
        self.cabin_class
    }

    pub fn toggle_selector(&mut self) {
        if self.selector.open {
            self.selector.close();
        } else {
            self.selector.open();
        }
        debug!(open = self.selector.open, "Passenger selector toggled");
    }

    pub fn close_selector(&mut self) {
        self.selector.close();
    }

    pub fn is_selector_open(&self) -> bool {
        self.selector.open
    }

    /// Apply one pointer press; a press outside the open panel closes it
    pub fn handle_pointer(&mut self, event: PointerEvent) {
        let Some(region) = self.selector.region else {
            return;
        };
        if self.selector.open && !region.contains(&event) {
            debug!(x = event.x, y = event.y, "Pointer pressed outside passenger selector");
            self.selector.close();
        }
    }

    /// Drain events dispatched to the hub since the last call
    pub fn process_pointer_events(&mut self) {
        let events = match self.selector.subscription.as_mut() {
            Some(subscription) => subscription.drain(),
            None => return,
        };
        for event in events {
            self.handle_pointer(event);
            if !self.selector.open {
                break;
            }
        }
    }

    fn date_field_mut(&mut self, kind: DateFieldKind) -> &mut DateField {
        match kind {
            DateFieldKind::Departure => &mut self.departure,
            DateFieldKind::Return => &mut self.return_date,
        }
    }

    pub fn focus_date(&mut self, kind: DateFieldKind) {
        let field = self.date_field_mut(kind);
        field.mode = field.mode.on_focus();
    }

    pub fn blur_date(&mut self, kind: DateFieldKind) {
        let field = self.date_field_mut(kind);
        field.mode = field.mode.on_blur(field.value.is_empty());
    }

    pub fn date_input_mode(&self, kind: DateFieldKind) -> DateInputMode {
        match kind {
            DateFieldKind::Departure => self.departure.mode,
            DateFieldKind::Return => self.return_date.mode,
        }
    }

    /// Snapshot the draft, or list every required field that is still blank
    pub fn validate(&self) -> Result<SearchQuery, ValidationError> {
        let required = [
            (DraftField::Origin, &self.origin),
            (DraftField::Destination, &self.destination),
            (DraftField::DepartureDate, &self.departure.value),
        ];
        let missing: Vec<DraftField> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(field, _)| *field)
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let return_date = self.return_date.value.trim();
        Ok(SearchQuery {
            origin: self.origin.trim().to_string(),
            destination: self.destination.trim().to_string(),
            departure_date: self.departure.value.trim().to_string(),
            return_date: (!return_date.is_empty()).then(|| return_date.to_string()),
            passengers: self.passengers,
            cabin_class: self.cabin_class,
        })
    }
}
