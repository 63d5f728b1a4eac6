//! Just enough DER to walk and extend PKCS#12 containers

pub(crate) const TAG_INTEGER: u8 = 0x02;
pub(crate) const TAG_OCTET_STRING: u8 = 0x04;
pub(crate) const TAG_NULL: u8 = 0x05;
pub(crate) const TAG_OID: u8 = 0x06;
pub(crate) const TAG_BMP_STRING: u8 = 0x1E;
pub(crate) const TAG_SEQUENCE: u8 = 0x30;
pub(crate) const TAG_SET: u8 = 0x31;
/// `[0]`, primitive (implicitly tagged octets)
pub(crate) const TAG_CONTEXT_0: u8 = 0x80;
/// `[0]`, constructed
pub(crate) const TAG_CONTEXT_0_CONSTRUCTED: u8 = 0xA0;

/// One tag-length-value element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tlv<'a> {
    pub tag: u8,
    pub value: &'a [u8],
    /// The whole element, header included
    pub raw: &'a [u8],
}

pub(crate) struct DerReader<'a> {
    buf: &'a [u8],
}

impl<'a> DerReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn peek_tag(&self) -> Option<u8> {
        self.buf.first().copied()
    }

    pub fn read(&mut self) -> Result<Tlv<'a>, String> {
        let buf = self.buf;
        let (&tag, rest) = buf.split_first().ok_or("unexpected end of DER data")?;
        if tag & 0x1F == 0x1F {
            return Err(format!("unsupported multi-byte tag {:#04x}", tag));
        }

        let (&first, mut rest) = rest.split_first().ok_or("unexpected end of DER data")?;
        let len = match first {
            0..=0x7F => first as usize,
            0x80 => return Err("indefinite lengths are not DER".to_string()),
            _ => {
                let n = (first & 0x7F) as usize;
                if n > 4 || rest.len() < n {
                    return Err(format!("invalid length for tag {:#04x}", tag));
                }
                let (octets, tail) = rest.split_at(n);
                rest = tail;
                octets.iter().fold(0usize, |acc, &b| (acc << 8) | b as usize)
            }
        };
        if rest.len() < len {
            return Err(format!("truncated element with tag {:#04x}", tag));
        }

        let header = buf.len() - rest.len();
        let (raw, tail) = buf.split_at(header + len);
        self.buf = tail;
        Ok(Tlv {
            tag,
            value: &raw[header..],
            raw,
        })
    }

    /// Read the next element, which must carry `tag`, and return its contents
    pub fn expect(&mut self, tag: u8) -> Result<&'a [u8], String> {
        let tlv = self.read()?;
        if tlv.tag != tag {
            return Err(format!(
                "expected tag {:#04x}, found {:#04x}",
                tag, tlv.tag
            ));
        }
        Ok(tlv.value)
    }

    /// A reader over the contents of the next element
    pub fn nested(&mut self, tag: u8) -> Result<DerReader<'a>, String> {
        self.expect(tag).map(DerReader::new)
    }

    /// The next element if it carries `tag`
    pub fn optional(&mut self, tag: u8) -> Result<Option<&'a [u8]>, String> {
        if self.peek_tag() == Some(tag) {
            self.expect(tag).map(Some)
        } else {
            Ok(None)
        }
    }

    pub fn uint(&mut self) -> Result<u32, String> {
        let value = self.expect(TAG_INTEGER)?;
        if value.first().is_some_and(|b| b & 0x80 != 0) {
            return Err("negative integer".to_string());
        }
        let digits = match value {
            [0, rest @ ..] => rest,
            _ => value,
        };
        if digits.len() > 4 {
            return Err("integer out of range".to_string());
        }
        Ok(digits.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32))
    }
}

pub(crate) fn tlv(tag: u8, value: &[u8]) -> Vec<u8> {
    let mut out = vec![tag];
    let len = value.len();
    if len < 0x80 {
        out.push(len as u8);
    } else {
        let octets = len.to_be_bytes();
        let skip = octets.iter().take_while(|&&b| b == 0).count();
        out.push(0x80 | (octets.len() - skip) as u8);
        out.extend_from_slice(&octets[skip..]);
    }
    out.extend_from_slice(value);
    out
}

pub(crate) fn sequence(parts: &[Vec<u8>]) -> Vec<u8> {
    tlv(TAG_SEQUENCE, &parts.concat())
}

pub(crate) fn integer(value: u32) -> Vec<u8> {
    let octets = value.to_be_bytes();
    let skip = octets.iter().take_while(|&&b| b == 0).count().min(3);
    let mut digits = octets[skip..].to_vec();
    if digits[0] & 0x80 != 0 {
        digits.insert(0, 0);
    }
    tlv(TAG_INTEGER, &digits)
}

pub(crate) fn oid(encoded: &[u8]) -> Vec<u8> {
    tlv(TAG_OID, encoded)
}

pub(crate) fn octet_string(value: &[u8]) -> Vec<u8> {
    tlv(TAG_OCTET_STRING, value)
}

/// UTF-16BE, no terminator
pub(crate) fn bmp_bytes(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(u16::to_be_bytes).collect()
}

pub(crate) fn parse_bmp(value: &[u8]) -> Result<String, String> {
    if value.len() % 2 != 0 {
        return Err("odd-length BMPString".to_string());
    }
    let units: Vec<u16> = value
        .chunks_exact(2)
        .map(|c| u16::from_be_bytes([c[0], c[1]]))
        .collect();
    String::from_utf16(&units).map_err(|e| format!("invalid BMPString: {}", e))
}
