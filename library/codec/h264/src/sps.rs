use {
    super::{
        define::{self, ASPECT_RATIOS, EXTENDED_SAR},
        errors::{H264Error, H264ErrorValue},
    },
    bytesio::bits_reader::BitsReader,
    std::vec::Vec,
};

#[derive(Default, Debug, Clone)]
pub struct Vui {
    pub aspect_ratio_idc: u8,
    pub sar_width: u16,
    pub sar_height: u16,
    pub video_full_range_flag: bool,
    pub timing_info_present_flag: bool,
    pub num_units_in_tick: u32,
    pub time_scale: u32,
    pub fixed_frame_rate_flag: bool,
}

#[derive(Default, Debug, Clone)]
pub struct Sps {
    pub profile_idc: u8, // u(8)
    pub constraint_flags: u8,

    pub level_idc: u8,             // u(8)
    pub seq_parameter_set_id: u32, // ue(v)

    pub chroma_format_idc: u32, // ue(v)

    pub separate_colour_plane_flag: bool,     // u(1)
    pub bit_depth_luma_minus8: u32,           // ue(v)
    pub bit_depth_chroma_minus8: u32,         // ue(v)
    qpprime_y_zero_transform_bypass_flag: u8, // u(1)

    seq_scaling_matrix_present_flag: u8, // u(1)

    pub log2_max_frame_num_minus4: u32, // ue(v)
    pub pic_order_cnt_type: u32,        // ue(v)

    pub log2_max_pic_order_cnt_lsb_minus4: u32, // ue(v)

    pub delta_pic_order_always_zero_flag: bool, // u(1)
    offset_for_non_ref_pic: i32,                // se(v)
    offset_for_top_to_bottom_field: i32,        // se(v)
    num_ref_frames_in_pic_order_cnt_cycle: u32, // ue(v)

    offset_for_ref_frame: Vec<i32>, // se(v)

    pub max_num_ref_frames: u32,              // ue(v)
    gaps_in_frame_num_value_allowed_flag: u8, // u(1)

    pub pic_width_in_mbs_minus1: u32,        // ue(v)
    pub pic_height_in_map_units_minus1: u32, // ue(v)
    pub frame_mbs_only_flag: bool,           // u(1)

    mb_adaptive_frame_field_flag: u8, // u(1)

    direct_8x8_inference_flag: u8, // u(1)

    frame_cropping_flag: bool, // u(1)

    pub frame_crop_left_offset: u32,   // ue(v)
    pub frame_crop_right_offset: u32,  // ue(v)
    pub frame_crop_top_offset: u32,    // ue(v)
    pub frame_crop_bottom_offset: u32, // ue(v)

    pub vui_parameters_present_flag: bool, // u(1)
    pub vui: Vui,

    pub width: u32,
    pub height: u32,
}

impl Sps {
    fn crop_units(&self) -> (u32, u32) {
        let frame_factor = 2 - self.frame_mbs_only_flag as u32;
        // Table 6-1 SubWidthC / SubHeightC
        let (sub_width_c, sub_height_c) = match self.chroma_format_idc {
            1 => (2, 2),
            2 => (2, 1),
            _ => (1, 1),
        };
        if self.chroma_format_idc == 0 || self.separate_colour_plane_flag {
            (1, frame_factor)
        } else {
            (sub_width_c, sub_height_c * frame_factor)
        }
    }

    fn compute_dimensions(&mut self) -> Result<(), H264Error> {
        let (crop_unit_x, crop_unit_y) = self.crop_units();

        let coded_width = (self.pic_width_in_mbs_minus1 + 1) * 16;
        let coded_height = (2 - self.frame_mbs_only_flag as u32)
            * (self.pic_height_in_map_units_minus1 + 1)
            * 16;

        let crop_x = (self.frame_crop_left_offset + self.frame_crop_right_offset) * crop_unit_x;
        let crop_y = (self.frame_crop_top_offset + self.frame_crop_bottom_offset) * crop_unit_y;

        if crop_x >= coded_width || crop_y >= coded_height {
            return Err(H264Error::out_of_range("frame cropping", crop_x.max(crop_y)));
        }

        self.width = coded_width - crop_x;
        self.height = coded_height - crop_y;
        Ok(())
    }

    pub fn max_frame_num_bits(&self) -> usize {
        self.log2_max_frame_num_minus4 as usize + 4
    }

    pub fn max_pic_order_cnt_lsb_bits(&self) -> usize {
        self.log2_max_pic_order_cnt_lsb_minus4 as usize + 4
    }

    /// Sample aspect ratio, 1:1 when the stream does not signal one.
    pub fn sample_aspect_ratio(&self) -> (u16, u16) {
        if self.vui.sar_width == 0 || self.vui.sar_height == 0 {
            (1, 1)
        } else {
            (self.vui.sar_width, self.vui.sar_height)
        }
    }

    pub fn pixel_aspect(&self) -> f64 {
        let (w, h) = self.sample_aspect_ratio();
        w as f64 / h as f64
    }

    pub fn display_aspect(&self) -> f64 {
        if self.height == 0 {
            return 0.0;
        }
        self.pixel_aspect() * self.width as f64 / self.height as f64
    }

    /// Frame duration in 90 kHz ticks derived from the VUI timing info.
    pub fn frame_duration_90k(&self) -> Option<u64> {
        if !self.vui.timing_info_present_flag || self.vui.time_scale == 0 {
            return None;
        }
        let duration =
            90000u64 * 2 * self.vui.num_units_in_tick as u64 / self.vui.time_scale as u64;
        if duration == 0 {
            None
        } else {
            Some(duration)
        }
    }

    pub fn cpb_size_bits(&self) -> Option<u64> {
        define::cpb_size_bits(self.profile_idc, self.level_idc)
    }
}

pub struct SpsParser<'a> {
    pub bits_reader: BitsReader<'a>,
    pub sps: Sps,
}

impl<'a> SpsParser<'a> {
    /// `rbsp` is the unescaped payload following the one byte NAL header.
    pub fn new(rbsp: &'a [u8]) -> SpsParser<'a> {
        Self {
            bits_reader: BitsReader::new(rbsp),
            sps: Sps::default(),
        }
    }

    fn read_uev_bounded(&mut self, field: &'static str, max: u32) -> Result<u32, H264Error> {
        let value = self.bits_reader.read_uev();
        if value > max {
            return Err(H264Error::out_of_range(field, value));
        }
        Ok(value)
    }

    // 7.3.2.1.1.1 Scaling list syntax, values are not kept.
    fn skip_scaling_list(&mut self, size: usize) {
        let mut last_scale: i32 = 8;
        let mut next_scale: i32 = 8;
        for _ in 0..size {
            if next_scale != 0 {
                let delta_scale = self.bits_reader.read_sev();
                next_scale = (last_scale + delta_scale + 256) % 256;
            }
            if next_scale != 0 {
                last_scale = next_scale;
            }
        }
    }

    pub fn parse(mut self) -> Result<Sps, H264Error> {
        if self.bits_reader.remaining_bits() < 24 {
            return Err(H264ErrorValue::NotEnoughData.into());
        }
        self.sps.profile_idc = self.bits_reader.read_byte();
        self.sps.constraint_flags = self.bits_reader.read_byte();
        self.sps.level_idc = self.bits_reader.read_byte();
        log::debug!(
            "profile_idc: {} level_idc: {}",
            self.sps.profile_idc,
            self.sps.level_idc
        );
        self.sps.seq_parameter_set_id =
            self.read_uev_bounded("seq_parameter_set_id", define::MAX_SPS_COUNT as u32 - 1)?;

        self.sps.chroma_format_idc = 1;
        if define::is_high_profile(self.sps.profile_idc) {
            self.sps.chroma_format_idc = self.read_uev_bounded("chroma_format_idc", 3)?;
            if self.sps.chroma_format_idc == 3 {
                self.sps.separate_colour_plane_flag = self.bits_reader.read_flag();
            }
            self.sps.bit_depth_luma_minus8 = self.read_uev_bounded("bit_depth_luma", 6)?;
            self.sps.bit_depth_chroma_minus8 = self.read_uev_bounded("bit_depth_chroma", 6)?;

            self.sps.qpprime_y_zero_transform_bypass_flag = self.bits_reader.read_bit();
            self.sps.seq_scaling_matrix_present_flag = self.bits_reader.read_bit();

            if self.sps.seq_scaling_matrix_present_flag > 0 {
                let list_count: usize = if self.sps.chroma_format_idc != 3 {
                    8
                } else {
                    12
                };

                for i in 0..list_count {
                    if self.bits_reader.read_flag() {
                        self.skip_scaling_list(if i < 6 { 16 } else { 64 });
                    }
                }
            }
        }

        self.sps.log2_max_frame_num_minus4 = self.read_uev_bounded("log2_max_frame_num", 12)?;
        self.sps.pic_order_cnt_type = self.read_uev_bounded("pic_order_cnt_type", 2)?;

        match self.sps.pic_order_cnt_type {
            0 => {
                self.sps.log2_max_pic_order_cnt_lsb_minus4 =
                    self.read_uev_bounded("log2_max_pic_order_cnt_lsb", 12)?;
            }
            1 => {
                self.sps.delta_pic_order_always_zero_flag = self.bits_reader.read_flag();
                self.sps.offset_for_non_ref_pic = self.bits_reader.read_sev();
                self.sps.offset_for_top_to_bottom_field = self.bits_reader.read_sev();
                self.sps.num_ref_frames_in_pic_order_cnt_cycle =
                    self.read_uev_bounded("num_ref_frames_in_pic_order_cnt_cycle", 255)?;

                for _ in 0..self.sps.num_ref_frames_in_pic_order_cnt_cycle {
                    let offset = self.bits_reader.read_sev();
                    self.sps.offset_for_ref_frame.push(offset);
                }
            }
            _ => {}
        }

        self.sps.max_num_ref_frames = self.bits_reader.read_uev();
        self.sps.gaps_in_frame_num_value_allowed_flag = self.bits_reader.read_bit();

        self.sps.pic_width_in_mbs_minus1 = self.read_uev_bounded("pic_width_in_mbs", 1023)?;
        self.sps.pic_height_in_map_units_minus1 =
            self.read_uev_bounded("pic_height_in_map_units", 1023)?;

        self.sps.frame_mbs_only_flag = self.bits_reader.read_flag();

        if !self.sps.frame_mbs_only_flag {
            self.sps.mb_adaptive_frame_field_flag = self.bits_reader.read_bit();
        }
        self.sps.direct_8x8_inference_flag = self.bits_reader.read_bit();
        self.sps.frame_cropping_flag = self.bits_reader.read_flag();

        if self.sps.frame_cropping_flag {
            self.sps.frame_crop_left_offset = self.bits_reader.read_uev();
            self.sps.frame_crop_right_offset = self.bits_reader.read_uev();
            self.sps.frame_crop_top_offset = self.bits_reader.read_uev();
            self.sps.frame_crop_bottom_offset = self.bits_reader.read_uev();
        }

        self.sps.vui_parameters_present_flag = self.bits_reader.read_flag();
        if self.bits_reader.is_overrun() {
            return Err(H264ErrorValue::NotEnoughData.into());
        }

        if self.sps.vui_parameters_present_flag {
            self.parse_vui();
        }

        self.sps.compute_dimensions()?;

        log::trace!("parsed sps data: {:?}", self.sps);
        Ok(self.sps)
    }

    // E.1.1 VUI parameters syntax, up to the timing info. A truncated VUI
    // keeps whatever was read before the end.
    fn parse_vui(&mut self) {
        let reader = &mut self.bits_reader;
        let vui = &mut self.sps.vui;

        if reader.read_flag() {
            vui.aspect_ratio_idc = reader.read_byte();
            if vui.aspect_ratio_idc == EXTENDED_SAR {
                vui.sar_width = reader.read_n_bits(16) as u16;
                vui.sar_height = reader.read_n_bits(16) as u16;
            } else if let Some((w, h)) = ASPECT_RATIOS.get(vui.aspect_ratio_idc as usize) {
                vui.sar_width = *w;
                vui.sar_height = *h;
            } else {
                log::debug!("reserved aspect_ratio_idc: {}", vui.aspect_ratio_idc);
            }
        }

        //overscan_info_present_flag
        if reader.read_flag() {
            reader.skip_n_bits(1);
        }

        //video_signal_type_present_flag
        if reader.read_flag() {
            reader.skip_n_bits(3);
            vui.video_full_range_flag = reader.read_flag();
            //colour_description_present_flag
            if reader.read_flag() {
                reader.skip_n_bits(24);
            }
        }

        //chroma_loc_info_present_flag
        if reader.read_flag() {
            reader.read_uev();
            reader.read_uev();
        }

        vui.timing_info_present_flag = reader.read_flag();
        if vui.timing_info_present_flag {
            vui.num_units_in_tick = reader.read_n_bits(32) as u32;
            vui.time_scale = reader.read_n_bits(32) as u32;
            vui.fixed_frame_rate_flag = reader.read_flag();
        }

        if reader.is_overrun() {
            log::debug!("sps vui is truncated");
            vui.timing_info_present_flag = false;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {

    use super::SpsParser;
    use bytes::BytesMut;
    use bytesio::bits_writer::BitsWriter;
    use bytesio::bytes_writer::BytesWriter;

    /// A baseline SPS body (without the NAL header byte).
    pub fn baseline_sps(width_mbs: u32, height_mbs: u32, vui: bool) -> BytesMut {
        let mut writer = BitsWriter::new(BytesWriter::new());
        writer.write_n_bits(66, 8).unwrap(); //profile_idc
        writer.write_n_bits(0, 8).unwrap(); //constraint flags
        writer.write_n_bits(30, 8).unwrap(); //level_idc
        writer.write_uev(0).unwrap(); //seq_parameter_set_id
        writer.write_uev(0).unwrap(); //log2_max_frame_num_minus4
        writer.write_uev(0).unwrap(); //pic_order_cnt_type
        writer.write_uev(0).unwrap(); //log2_max_pic_order_cnt_lsb_minus4
        writer.write_uev(1).unwrap(); //max_num_ref_frames
        writer.write_bit(0).unwrap(); //gaps
        writer.write_uev(width_mbs - 1).unwrap();
        writer.write_uev(height_mbs - 1).unwrap();
        writer.write_bit(1).unwrap(); //frame_mbs_only_flag
        writer.write_bit(1).unwrap(); //direct_8x8_inference_flag
        writer.write_bit(0).unwrap(); //frame_cropping_flag
        writer.write_bit(vui as u8).unwrap();
        if vui {
            writer.write_bit(1).unwrap(); //aspect_ratio_info_present_flag
            writer.write_n_bits(14, 8).unwrap(); //4:3
            writer.write_bit(0).unwrap(); //overscan
            writer.write_bit(0).unwrap(); //video signal type
            writer.write_bit(0).unwrap(); //chroma loc
            writer.write_bit(1).unwrap(); //timing_info_present_flag
            writer.write_n_bits(1, 32).unwrap();
            writer.write_n_bits(50, 32).unwrap();
            writer.write_bit(1).unwrap();
        }
        writer.write_bit(1).unwrap(); //rbsp_stop_one_bit
        writer.bits_aligment_8().unwrap();
        writer.get_current_bytes()
    }

    #[test]
    fn test_baseline_dimensions() {
        let data = baseline_sps(10, 10, false);
        let sps = SpsParser::new(&data[..]).parse().unwrap();

        assert_eq!(sps.width, 160);
        assert_eq!(sps.height, 160);
        assert_eq!(sps.profile_idc, 66);
        assert_eq!(sps.pixel_aspect(), 1.0);
        assert_eq!(sps.frame_duration_90k(), None);
        assert_eq!(sps.cpb_size_bits(), Some(10_000_000));
    }

    #[test]
    fn test_vui_aspect_and_timing() {
        let data = baseline_sps(45, 36, true);
        let sps = SpsParser::new(&data[..]).parse().unwrap();

        assert_eq!(sps.width, 720);
        assert_eq!(sps.height, 576);
        assert_eq!(sps.sample_aspect_ratio(), (4, 3));
        assert!((sps.display_aspect() - 720.0 * 4.0 / (576.0 * 3.0)).abs() < 1e-9);
        //time_scale 50, num_units_in_tick 1 => 25 frames per second
        assert_eq!(sps.frame_duration_90k(), Some(3600));
    }

    #[test]
    fn test_cropping_on_1080p() {
        let mut writer = BitsWriter::new(BytesWriter::new());
        writer.write_n_bits(77, 8).unwrap();
        writer.write_n_bits(0, 8).unwrap();
        writer.write_n_bits(40, 8).unwrap();
        writer.write_uev(0).unwrap();
        writer.write_uev(0).unwrap();
        writer.write_uev(2).unwrap(); //pic_order_cnt_type
        writer.write_uev(4).unwrap();
        writer.write_bit(0).unwrap();
        writer.write_uev(119).unwrap();
        writer.write_uev(67).unwrap();
        writer.write_bit(1).unwrap();
        writer.write_bit(1).unwrap();
        writer.write_bit(1).unwrap(); //frame_cropping_flag
        writer.write_uev(0).unwrap();
        writer.write_uev(0).unwrap();
        writer.write_uev(0).unwrap();
        writer.write_uev(4).unwrap(); //8 lines off the bottom
        writer.write_bit(0).unwrap();
        writer.write_bit(1).unwrap();
        writer.bits_aligment_8().unwrap();
        let data = writer.get_current_bytes();

        let sps = SpsParser::new(&data[..]).parse().unwrap();
        assert_eq!(sps.width, 1920);
        assert_eq!(sps.height, 1080);
    }

    #[test]
    fn test_truncated_sps_is_error() {
        let data = baseline_sps(10, 10, false);
        assert!(SpsParser::new(&data[..4]).parse().is_err());
    }
}
