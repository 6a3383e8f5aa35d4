//! In-memory batch buffer.

use parking_lot::Mutex;
use pulse_core::MeasurementEvent;

/// Ordered buffer of pending measurements.
///
/// The append that brings the length to the threshold takes the contents
/// out in the same critical section, so the buffer never rests at or above
/// the threshold.
#[derive(Debug)]
pub struct BatchBuffer {
    threshold: usize,
    events: Mutex<Vec<MeasurementEvent>>,
}

impl BatchBuffer {
    pub fn new(threshold: usize) -> Self {
        let threshold = threshold.max(1);
        Self {
            threshold,
            events: Mutex::new(Vec::with_capacity(threshold)),
        }
    }

    /// Appends one event. Returns the drained batch when the threshold is reached.
    pub fn push(&self, event: MeasurementEvent) -> Option<Vec<MeasurementEvent>> {
        let mut events = self.events.lock();
        events.push(event);
        if events.len() >= self.threshold {
            Some(std::mem::replace(
                &mut *events,
                Vec::with_capacity(self.threshold),
            ))
        } else {
            None
        }
    }

    /// Takes everything buffered so far.
    pub fn take(&self) -> Vec<MeasurementEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }
}
