/// Running eye-contact counters for one session.
///
/// Only frames with a detected face are recorded; the percentage is always
/// derived from the two counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContactTally {
    total_samples: u64,
    in_contact_samples: u64,
}

impl ContactTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one face frame with its instantaneous contact decision.
    pub fn record(&mut self, in_contact: bool) -> f64 {
        self.total_samples += 1;
        if in_contact {
            self.in_contact_samples += 1;
        }
        self.eye_contact_pct()
    }

    pub fn total_samples(&self) -> u64 {
        self.total_samples
    }

    pub fn in_contact_samples(&self) -> u64 {
        self.in_contact_samples
    }

    pub fn eye_contact_pct(&self) -> f64 {
        self.in_contact_samples as f64 / self.total_samples.max(1) as f64
    }
}
