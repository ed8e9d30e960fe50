use bytes::BytesMut;

/// Strips emulation prevention bytes: every `00 00 03` becomes `00 00`.
pub fn nal_to_rbsp(nal: &[u8]) -> BytesMut {
    let mut rbsp = BytesMut::with_capacity(nal.len());
    let mut zero_count = 0;

    for byte in nal {
        if zero_count >= 2 && *byte == 0x03 {
            zero_count = 0;
            continue;
        }

        rbsp.extend_from_slice(&[*byte]);
        if *byte == 0 {
            zero_count += 1;
        } else {
            zero_count = 0;
        }
    }

    rbsp
}

/// Finds the next `00 00 01` start code at or after `from`, returning the
/// offset of its first zero byte.
pub fn find_start_code(data: &[u8], from: usize) -> Option<usize> {
    if data.len() < 3 {
        return None;
    }
    let mut idx = from;
    while idx + 3 <= data.len() {
        if data[idx + 2] > 1 {
            idx += 3;
        } else if data[idx] == 0 && data[idx + 1] == 0 && data[idx + 2] == 1 {
            return Some(idx);
        } else {
            idx += 1;
        }
    }
    None
}

#[cfg(test)]
mod tests {

    use super::{find_start_code, nal_to_rbsp};

    #[test]
    fn test_nal_to_rbsp() {
        let nal = [0x67, 0x00, 0x00, 0x03, 0x01, 0x00, 0x00, 0x03, 0x00, 0x03];
        let rbsp = nal_to_rbsp(&nal);
        assert_eq!(&rbsp[..], &[0x67, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x03]);
    }

    #[test]
    fn test_find_start_code() {
        let data = [0xFF, 0x00, 0x00, 0x01, 0x67, 0x42, 0x00, 0x00, 0x00, 0x01, 0x68];
        assert_eq!(find_start_code(&data, 0), Some(1));
        assert_eq!(find_start_code(&data, 2), Some(7));
        assert_eq!(find_start_code(&data, 8), None);
    }
}
