//! Printer status reported by heartbeat replies.
//!
//! Different firmware revisions answer the heartbeat with different
//! payload lengths, each carrying a different subset of the fields:
//!
//! ```text
//! len  closing  power  paper  rfid
//!  9     [8]      -      -      -
//! 10     [8]     [9]     -      -
//! 13     [9]    [10]   [11]   [12]
//! 19    [15]    [16]   [17]   [18]
//! 20      -       -    [18]   [19]
//! ```

/// Last known device status; every field is `None` until reported.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PrinterStatus {
    pub closing_state: Option<u8>,
    pub power_level: Option<u8>,
    pub paper_state: Option<u8>,
    pub rfid_read_state: Option<u8>,
}

/// Which heartbeat layout a payload matched.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum HeartbeatLayout {
    /// One of the documented lengths; fields were updated.
    Known(usize),
    /// Nine bytes or more but not a documented length.
    Unrecognized(usize),
    /// Too short to carry status (still counts as a heartbeat).
    Short(usize),
}

impl PrinterStatus {
    /// Merge the fields carried by a heartbeat payload.  Fields absent
    /// from this layout keep their previous value.
    pub fn apply_heartbeat(&mut self, data: &[u8]) -> HeartbeatLayout {
        let len = data.len();
        let (closing, power, paper, rfid) = match len {
            9 => (Some(8), None, None, None),
            10 => (Some(8), Some(9), None, None),
            13 => (Some(9), Some(10), Some(11), Some(12)),
            19 => (Some(15), Some(16), Some(17), Some(18)),
            20 => (None, None, Some(18), Some(19)),
            n if n >= 9 => return HeartbeatLayout::Unrecognized(n),
            n => return HeartbeatLayout::Short(n),
        };

        let pick = |offset: Option<usize>, current: Option<u8>| {
            offset.map(|i| data[i]).or(current)
        };
        self.closing_state = pick(closing, self.closing_state);
        self.power_level = pick(power, self.power_level);
        self.paper_state = pick(paper, self.paper_state);
        self.rfid_read_state = pick(rfid, self.rfid_read_state);
        HeartbeatLayout::Known(len)
    }

    pub fn is_known(&self) -> bool {
        self.closing_state.is_some()
            || self.power_level.is_some()
            || self.paper_state.is_some()
            || self.rfid_read_state.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(len: usize) -> [u8; 20] {
        let mut data = [0u8; 20];
        for (i, b) in data.iter_mut().enumerate().take(len) {
            *b = 100 + i as u8;
        }
        data
    }

    #[test]
    fn starts_unknown() {
        let status = PrinterStatus::default();
        assert!(!status.is_known());
    }

    #[test]
    fn thirteen_byte_layout_fills_all_fields() {
        let mut status = PrinterStatus::default();
        let data = payload(13);
        assert_eq!(status.apply_heartbeat(&data[..13]), HeartbeatLayout::Known(13));
        assert_eq!(status.closing_state, Some(109));
        assert_eq!(status.power_level, Some(110));
        assert_eq!(status.paper_state, Some(111));
        assert_eq!(status.rfid_read_state, Some(112));
    }

    #[test]
    fn nineteen_byte_layout() {
        let mut status = PrinterStatus::default();
        let data = payload(19);
        status.apply_heartbeat(&data[..19]);
        assert_eq!(status.closing_state, Some(115));
        assert_eq!(status.power_level, Some(116));
        assert_eq!(status.paper_state, Some(117));
        assert_eq!(status.rfid_read_state, Some(118));
    }

    #[test]
    fn partial_layouts_keep_other_fields() {
        let mut status = PrinterStatus::default();
        let data = payload(20);
        status.apply_heartbeat(&data[..20]);
        assert_eq!(status.closing_state, None);
        assert_eq!(status.paper_state, Some(118));
        assert_eq!(status.rfid_read_state, Some(119));

        status.apply_heartbeat(&data[..10]);
        assert_eq!(status.closing_state, Some(108));
        assert_eq!(status.power_level, Some(109));
        assert_eq!(status.paper_state, Some(118));

        status.apply_heartbeat(&data[..9]);
        assert_eq!(status.closing_state, Some(108));
        assert_eq!(status.power_level, Some(109));
    }

    #[test]
    fn unknown_lengths_are_tolerated() {
        let mut status = PrinterStatus::default();
        let data = payload(20);
        assert_eq!(
            status.apply_heartbeat(&data[..15]),
            HeartbeatLayout::Unrecognized(15)
        );
        assert_eq!(status.apply_heartbeat(&data[..1]), HeartbeatLayout::Short(1));
        assert!(!status.is_known());
    }
}
