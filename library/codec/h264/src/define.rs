pub mod nal_unit_type {
    pub const SLICE: u8 = 1;
    pub const SLICE_DPA: u8 = 2;
    pub const SLICE_DPB: u8 = 3;
    pub const SLICE_DPC: u8 = 4;
    pub const IDR: u8 = 5;
    pub const SEI: u8 = 6;
    pub const SPS: u8 = 7;
    pub const PPS: u8 = 8;
    pub const AUD: u8 = 9;
    pub const END_SEQUENCE: u8 = 10;
    pub const END_STREAM: u8 = 11;
    pub const FILLER_DATA: u8 = 12;
    pub const SPS_EXT: u8 = 13;
}

pub const MAX_SPS_COUNT: usize = 32;
pub const MAX_PPS_COUNT: usize = 256;

// Table E-1 Meaning of sample aspect ratio indicator
pub const EXTENDED_SAR: u8 = 255;
pub const ASPECT_RATIOS: [(u16, u16); 17] = [
    (0, 1),
    (1, 1),
    (12, 11),
    (10, 11),
    (16, 11),
    (40, 33),
    (24, 11),
    (20, 11),
    (32, 11),
    (80, 33),
    (18, 11),
    (15, 11),
    (64, 33),
    (160, 99),
    (4, 3),
    (3, 2),
    (2, 1),
];

// Table A-1 Level limits, MaxCPB in units of 1000 bits for the Baseline,
// Extended and Main profiles. Level 9 stands for level 1b.
const LEVEL_MAX_CPB: [(u8, u32); 17] = [
    (9, 350),
    (10, 175),
    (11, 500),
    (12, 1000),
    (13, 2000),
    (20, 2000),
    (21, 4000),
    (22, 4000),
    (30, 10000),
    (31, 14000),
    (32, 20000),
    (40, 25000),
    (41, 62500),
    (42, 62500),
    (50, 135000),
    (51, 240000),
    (52, 240000),
];

/// Coded picture buffer size in bits for a profile/level pair, scaled by the
/// cpbBrNalFactor of Table A-2 for the high profiles.
pub fn cpb_size_bits(profile_idc: u8, level_idc: u8) -> Option<u64> {
    let (_, max_cpb) = LEVEL_MAX_CPB
        .iter()
        .find(|(level, _)| *level == level_idc)?;

    let (num, den) = match profile_idc {
        100 => (5, 4),
        110 => (3, 1),
        122 | 244 | 44 => (4, 1),
        _ => (1, 1),
    };
    Some(*max_cpb as u64 * 1000 * num / den)
}

pub fn is_high_profile(profile_idc: u8) -> bool {
    matches!(
        profile_idc,
        100 | 110 | 122 | 244 | 44 | 83 | 86 | 118 | 128 | 138 | 139 | 134 | 135
    )
}

#[cfg(test)]
mod tests {
    use super::cpb_size_bits;

    #[test]
    fn test_cpb_size() {
        assert_eq!(cpb_size_bits(66, 30), Some(10_000_000));
        assert_eq!(cpb_size_bits(100, 40), Some(31_250_000));
        assert_eq!(cpb_size_bits(66, 7), None);
    }
}
