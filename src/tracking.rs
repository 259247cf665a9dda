//! `ChannelTrackingStatus`: the 32-bit packed word NovAtel receivers attach
//! to every tracked measurement channel, and the enums it's made of.

use num_enum::TryFromPrimitive;
use num_enum::TryFromPrimitiveError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, TryFromPrimitive)]
#[repr(u8)]
pub enum SatelliteSystem {
    Gps = 0,
    Glonass = 1,
    Sbas = 2,
    Galileo = 3,
    Beidou = 4,
    Qzss = 5,
    Navic = 6,
    Other = 7,
}

/// Signal-type codes are only meaningful relative to a [`SatelliteSystem`]
/// (GPS code 0 is L1 C/A, GLONASS code 0 is also L1 C/A, but BeiDou code 0
/// is B1I) so this is a lookup helper rather than a single flat enum.
pub fn signal_name(system: SatelliteSystem, raw: u32) -> &'static str {
    use SatelliteSystem::*;
    match (system, raw) {
        (Gps, 0) => "L1CA",
        (Gps, 5) => "L2P",
        (Gps, 9) => "L2Y",
        (Gps, 14) => "L2CM",
        (Gps, 17) => "L5Q",
        (Glonass, 0) => "L1CA",
        (Glonass, 5) => "L2CA",
        (Galileo, 1) => "E1",
        (Galileo, 12) => "E5A",
        (Galileo, 17) => "E5B",
        (Beidou, 0) => "B1I",
        (Beidou, 1) => "B2I",
        _ => "UNKNOWN",
    }
}

/// A 32-bit packed descriptor of one measurement channel. Lifecycle: derived
/// per measurement, used as both an output field (in `RANGE`) and as a key
/// into the RangeCmp decompressor's reference table (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ChannelTrackingStatus(pub u32);

impl ChannelTrackingStatus {
    pub fn new(raw: u32) -> Self {
        ChannelTrackingStatus(raw)
    }

    pub fn raw(self) -> u32 {
        self.0
    }

    fn bits(self, shift: u32, width: u32) -> u32 {
        (self.0 >> shift) & ((1u32 << width) - 1)
    }

    pub fn tracking_state(self) -> u32 {
        self.bits(0, 5)
    }

    pub fn channel_number(self) -> u32 {
        self.bits(5, 5)
    }

    pub fn phase_locked(self) -> bool {
        self.bits(10, 1) != 0
    }

    pub fn parity_known(self) -> bool {
        self.bits(11, 1) != 0
    }

    pub fn code_locked(self) -> bool {
        self.bits(12, 1) != 0
    }

    pub fn correlator_spacing(self) -> u32 {
        self.bits(13, 3)
    }

    pub fn satellite_system(self) -> Result<SatelliteSystem, TryFromPrimitiveError<SatelliteSystem>> {
        SatelliteSystem::try_from(self.bits(16, 3) as u8)
    }

    pub fn grouping(self) -> bool {
        self.bits(20, 1) != 0
    }

    pub fn signal_type_raw(self) -> u32 {
        self.bits(21, 5)
    }

    pub fn primary_l1_channel(self) -> bool {
        self.bits(25, 1) != 0
    }

    pub fn half_cycle_added(self) -> bool {
        self.bits(26, 1) != 0
    }

    pub fn digital_filtering(self) -> u32 {
        self.bits(27, 2)
    }

    pub fn prn_lock(self) -> bool {
        self.bits(29, 1) != 0
    }

    pub fn forced_assignment(self) -> bool {
        self.bits(30, 1) != 0
    }
}

impl From<u32> for ChannelTrackingStatus {
    fn from(raw: u32) -> Self {
        ChannelTrackingStatus(raw)
    }
}

impl From<ChannelTrackingStatus> for u32 {
    fn from(cts: ChannelTrackingStatus) -> Self {
        cts.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn decodes_tracking_state_and_channel() {
        // tracking_state = 5, channel_number = 3 -> bits [0..5)=5, [5..10)=3
        let raw = 5 | (3 << 5);
        let cts = ChannelTrackingStatus::new(raw);
        assert_eq!(cts.tracking_state(), 5);
        assert_eq!(cts.channel_number(), 3);
    }

    #[test]
    fn decodes_lock_flags() {
        let raw = (1 << 10) | (1 << 11) | (1 << 12);
        let cts = ChannelTrackingStatus::new(raw);
        assert!(cts.phase_locked());
        assert!(cts.parity_known());
        assert!(cts.code_locked());
    }

    #[test]
    fn decodes_satellite_system() {
        let raw = 3u32 << 16; // Galileo
        let cts = ChannelTrackingStatus::new(raw);
        assert_eq!(cts.satellite_system().unwrap(), SatelliteSystem::Galileo);
    }
}
