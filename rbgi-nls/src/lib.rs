use std::fmt;
use std::str::FromStr;

use encoding_rs::{Encoding as RsEncoding, GB18030, SHIFT_JIS, UTF_8};

/// Script text encodings the tooling can read and write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoding {
    /// The engine's native encoding (cp932 in practice).
    ShiftJis,
    /// Decoded and encoded as GB18030, its superset.
    Gbk,
    Utf8,
}

impl Encoding {
    #[inline]
    pub fn as_encoding_rs(self) -> &'static RsEncoding {
        match self {
            Encoding::ShiftJis => SHIFT_JIS,
            Encoding::Gbk => GB18030,
            Encoding::Utf8 => UTF_8,
        }
    }

    /// Parse a user-facing name, as spelled in registry files and CLI flags.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "sjis" | "shift_jis" | "shift-jis" | "cp932" => Some(Encoding::ShiftJis),
            "gbk" | "gb18030" => Some(Encoding::Gbk),
            "utf8" | "utf-8" => Some(Encoding::Utf8),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Encoding::ShiftJis => "sjis",
            Encoding::Gbk => "gbk",
            Encoding::Utf8 => "utf8",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Default for Encoding {
    fn default() -> Self {
        Encoding::ShiftJis
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEncoding(pub String);

impl fmt::Display for UnknownEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown encoding {:?} (expected sjis, gbk or utf8)", self.0)
    }
}

impl std::error::Error for UnknownEncoding {}

impl FromStr for Encoding {
    type Err = UnknownEncoding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Encoding::from_name(s).ok_or_else(|| UnknownEncoding(s.to_owned()))
    }
}

/// A codec bound to one encoding.
///
/// `decode` and `encode` are strict: malformed or unmappable input yields
/// `None` instead of replacement characters, so callers can report the exact
/// offending byte range rather than silently corrupting the text.
#[derive(Debug, Clone, Copy, Default)]
pub struct Codec {
    enc: Encoding,
}

impl Codec {
    #[inline]
    pub fn new(enc: Encoding) -> Self {
        Self { enc }
    }

    #[inline]
    pub fn encoding(&self) -> Encoding {
        self.enc
    }

    /// Strict decode. `None` if the bytes are not valid in this encoding.
    /// A BOM is treated as ordinary bytes, never as an encoding override.
    pub fn decode(&self, bytes: &[u8]) -> Option<String> {
        self.enc
            .as_encoding_rs()
            .decode_without_bom_handling_and_without_replacement(bytes)
            .map(|cow| cow.into_owned())
    }

    /// Lossy decode for forensic listings: malformed sequences become U+FFFD.
    pub fn decode_lossy(&self, bytes: &[u8]) -> String {
        let (cow, _had_errors) = self
            .enc
            .as_encoding_rs()
            .decode_without_bom_handling(bytes);
        cow.into_owned()
    }

    /// Strict encode. `None` if `s` contains characters the encoding cannot
    /// represent.
    pub fn encode(&self, s: &str) -> Option<Vec<u8>> {
        let (cow, _, had_errors) = self.enc.as_encoding_rs().encode(s);
        if had_errors {
            None
        } else {
            Some(cow.into_owned())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strict_sjis_rejects_dangling_lead_byte() {
        let c = Codec::new(Encoding::ShiftJis);
        // 0x82 is a Shift-JIS lead byte with no trail byte following.
        assert_eq!(c.decode(&[0x41, 0x82]), None);
        assert_eq!(c.decode_lossy(&[0x41, 0x82]), "A\u{fffd}");
    }

    #[test]
    fn sjis_roundtrip_japanese() {
        let c = Codec::new(Encoding::ShiftJis);
        let s = "こんにちは、世界";
        let b = c.encode(s).unwrap();
        assert_eq!(c.decode(&b).unwrap(), s);
    }

    #[test]
    fn strict_encode_rejects_unmappable() {
        let c = Codec::new(Encoding::ShiftJis);
        assert_eq!(c.encode("🎴"), None);
    }

    #[test]
    fn name_parsing() {
        assert_eq!(Encoding::from_name("Shift-JIS"), Some(Encoding::ShiftJis));
        assert_eq!(Encoding::from_name("cp932"), Some(Encoding::ShiftJis));
        assert_eq!(Encoding::from_name("gb18030"), Some(Encoding::Gbk));
        assert_eq!(Encoding::from_name("utf-8"), Some(Encoding::Utf8));
        assert_eq!(Encoding::from_name("latin1"), None);
        assert_eq!(Encoding::Utf8.name(), "utf8");
        assert_eq!("GBK".parse(), Ok(Encoding::Gbk));
        assert!("latin1".parse::<Encoding>().is_err());
    }
}
