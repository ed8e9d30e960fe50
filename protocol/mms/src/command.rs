use {
    super::{
        define::{
            ASF_HEADER_PACKET_ID_TYPE, CMD_HEADER_LEN, CMD_PREFIX_LEN, MMS_MAGIC, MMS_PROTOCOL_TAG,
        },
        errors::{MmsError, MmsErrorValue},
    },
    byteorder::{ByteOrder, LittleEndian},
    bytes::BytesMut,
    bytesio::bytes_writer::BytesWriter,
};

/// Serializes one command: the 40 byte header, the two prefix words and
/// the body zero-padded to a multiple of 8.
pub fn marshal_command(
    seq_num: u32,
    command: u32,
    prefix1: u32,
    prefix2: u32,
    body: &[u8],
) -> Result<BytesMut, MmsError> {
    let len8 = ((body.len() + 7) / 8) as u32;

    let mut writer = BytesWriter::with_capacity(CMD_HEADER_LEN + CMD_PREFIX_LEN + body.len() + 8);
    writer.write_u32::<LittleEndian>(0x0000_0001)?;
    writer.write_u32::<LittleEndian>(MMS_MAGIC)?;
    writer.write_u32::<LittleEndian>(len8 * 8 + 32)?;
    writer.write_u32::<LittleEndian>(MMS_PROTOCOL_TAG)?;
    writer.write_u32::<LittleEndian>(len8 + 4)?;
    writer.write_u32::<LittleEndian>(seq_num)?;
    writer.write_u32::<LittleEndian>(0)?;
    writer.write_u32::<LittleEndian>(0)?;
    writer.write_u32::<LittleEndian>(len8 + 2)?;
    writer.write_u32::<LittleEndian>(0x0003_0000 | command)?;

    writer.write_u32::<LittleEndian>(prefix1)?;
    writer.write_u32::<LittleEndian>(prefix2)?;
    writer.write(body)?;
    writer.pad_to_multiple(8);

    Ok(writer.extract_current_bytes())
}

/// Header of a data packet: the first 8 bytes of anything the server sends
/// that is not a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketHeader {
    AsfHeader {
        packet_seq: u32,
        packet_len: usize,
        flags: u8,
    },
    AsfMedia {
        packet_seq: u32,
        packet_id_type: u8,
        packet_len: usize,
        flags: u8,
    },
}

impl PacketHeader {
    pub fn is_command(prefix: &[u8]) -> bool {
        prefix.len() >= 8 && LittleEndian::read_u32(&prefix[4..8]) == MMS_MAGIC
    }

    pub fn data(prefix: &[u8]) -> PacketHeader {
        let packet_seq = LittleEndian::read_u32(&prefix[0..4]);
        let packet_id_type = prefix[4];
        let flags = prefix[5];
        let packet_len = (LittleEndian::read_u16(&prefix[6..8]) as usize).wrapping_sub(8) & 0xFFFF;

        if packet_id_type as u32 == ASF_HEADER_PACKET_ID_TYPE {
            PacketHeader::AsfHeader {
                packet_seq,
                packet_len,
                flags,
            }
        } else {
            PacketHeader::AsfMedia {
                packet_seq,
                packet_id_type,
                packet_len,
                flags,
            }
        }
    }

    pub fn packet_len(&self) -> usize {
        match self {
            PacketHeader::AsfHeader { packet_len, .. } => *packet_len,
            PacketHeader::AsfMedia { packet_len, .. } => *packet_len,
        }
    }

    pub fn flags(&self) -> u8 {
        match self {
            PacketHeader::AsfHeader { flags, .. } => *flags,
            PacketHeader::AsfMedia { flags, .. } => *flags,
        }
    }
}

/// Bytes that follow the first 12 bytes of a command packet.
pub fn command_packet_len(header: &[u8]) -> usize {
    LittleEndian::read_u32(&header[8..12]) as usize + 4
}

/// A received command packet, kept with its 12 leading header bytes so
/// field offsets match the on-wire layout.
#[derive(Debug, Clone)]
pub struct CommandPacket {
    pub command: u32,
    pub data: BytesMut,
}

impl CommandPacket {
    pub fn parse(data: BytesMut) -> Result<Self, MmsError> {
        if data.len() < CMD_HEADER_LEN || LittleEndian::read_u32(&data[12..16]) != MMS_PROTOCOL_TAG
        {
            return Err(MmsError {
                value: MmsErrorValue::InvalidCommand,
            });
        }
        let command = LittleEndian::read_u32(&data[36..40]) & 0xFFFF;
        Ok(Self { command, data })
    }

    pub fn u32_at(&self, offset: usize) -> Option<u32> {
        self.data
            .get(offset..offset + 4)
            .map(LittleEndian::read_u32)
    }

    pub fn byte_at(&self, offset: usize) -> Option<u8> {
        self.data.get(offset).copied()
    }
}
