//! Fragmented transfers of payloads larger than one frame.
//!
//! ## Small tier (up to 1530 bytes), opcode `fragmented_package`
//!
//! | fragment | byte 0 | byte 1      | byte 2 | bytes 3..=4 | bytes 5..=6 |
//! |----------|--------|-------------|--------|-------------|-------------|
//! | header   | 0      | sub-command | 0      | length LE   | checksum LE |
//! | data     | index  | up to 6 data bytes                               |
//!
//! ## Large tier (1531..=65535 bytes)
//!
//! One `fragmented_package_large_start` header with the same layout as above
//! (byte 0 reserved), then `fragmented_package_large_data` fragments carrying
//! 7 raw data bytes each.
//!
//! The checksum is a plain 16-bit sum of the payload bytes. A short final
//! fragment only overwrites the bytes it carries; the rest keep the contents
//! of the fragment before it.

use crate::constants::{FRAME_PAYLOAD_SIZE, LARGE_FRAGMENT_DATA, LARGE_TIER_MAX, SMALL_FRAGMENT_DATA, SMALL_TIER_MAX};
use crate::error::LegacyError;
use crate::frame::LegacyCommand;
use num_enum::{FromPrimitive, IntoPrimitive};
use strum_macros::Display;
use zerocopy::byteorder::little_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

/// Sub-command tag describing what a fragmented transfer contains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, IntoPrimitive, FromPrimitive)]
#[repr(u8)]
pub enum FragmentCommand {
    /// Page CRCs reported during update negotiation. Sent even while offline.
    #[strum(to_string = "page_CRC_external")]
    PageCrcExternal = 0x01,

    #[num_enum(catch_all)]
    Other(u8),
}

/// Framing variant, selected by payload size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Tier {
    #[strum(to_string = "small")]
    Small,
    #[strum(to_string = "large")]
    Large,
}

impl Tier {
    pub fn for_len(len: usize) -> Result<Self, LegacyError> {
        match len {
            0..=SMALL_TIER_MAX => Ok(Tier::Small),
            _ if len <= LARGE_TIER_MAX => Ok(Tier::Large),
            _ => Err(LegacyError::PayloadTooLarge { len }),
        }
    }

    /// Payload bytes carried per data fragment.
    pub fn chunk_size(self) -> usize {
        match self {
            Tier::Small => SMALL_FRAGMENT_DATA,
            Tier::Large => LARGE_FRAGMENT_DATA,
        }
    }

    pub fn header_command(self) -> LegacyCommand {
        match self {
            Tier::Small => LegacyCommand::FragmentedPackage,
            Tier::Large => LegacyCommand::FragmentedPackageLargeStart,
        }
    }

    pub fn data_command(self) -> LegacyCommand {
        match self {
            Tier::Small => LegacyCommand::FragmentedPackage,
            Tier::Large => LegacyCommand::FragmentedPackageLargeData,
        }
    }
}

/// Header fragment payload, shared by both tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
#[repr(C)]
pub struct FragmentHeader {
    /// Fragment index 0 in the small tier, reserved in the large tier
    pub lead: u8,
    pub command: u8,
    pub reserved: u8,
    pub length: U16,
    pub checksum: U16,
}

impl FragmentHeader {
    pub fn new(command: FragmentCommand, length: u16, checksum: u16) -> Self {
        Self {
            lead: 0,
            command: command.into(),
            reserved: 0,
            length: U16::new(length),
            checksum: U16::new(checksum),
        }
    }

    pub fn parse(data: &[u8; FRAME_PAYLOAD_SIZE]) -> Self {
        // 7 bytes always match the header layout
        Self::read_from_bytes(&data[..]).unwrap_or_else(|_| Self::new(FragmentCommand::Other(0), 0, 0))
    }

    fn to_payload(self) -> [u8; FRAME_PAYLOAD_SIZE] {
        let mut payload = [0u8; FRAME_PAYLOAD_SIZE];
        payload.copy_from_slice(self.as_bytes());
        payload
    }
}

/// 16-bit wrapping sum of all bytes. Not an Internet checksum.
pub fn checksum16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |sum, &b| sum.wrapping_add(u16::from(b)))
}

/// One fragment, ready to be placed into a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fragment {
    pub command: LegacyCommand,
    pub data: [u8; FRAME_PAYLOAD_SIZE],
}

/// Lazily produces the fragments of one transfer, header first.
///
/// Borrows the payload for the lifetime of the iterator only.
#[derive(Debug, Clone)]
pub struct FragmentStream<'a> {
    tier: Tier,
    header: FragmentHeader,
    payload: &'a [u8],
    offset: usize,
    scratch: [u8; FRAME_PAYLOAD_SIZE],
    header_sent: bool,
}

impl<'a> FragmentStream<'a> {
    /// Plans a transfer. Payloads of 65536 bytes or more are refused.
    pub fn new(command: FragmentCommand, payload: &'a [u8]) -> Result<Self, LegacyError> {
        let tier = Tier::for_len(payload.len())?;
        let header = FragmentHeader::new(command, payload.len() as u16, checksum16(payload));
        Ok(Self {
            tier,
            header,
            payload,
            offset: 0,
            scratch: header.to_payload(),
            header_sent: false,
        })
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn header(&self) -> FragmentHeader {
        self.header
    }

    fn remaining_fragments(&self) -> usize {
        let header = usize::from(!self.header_sent);
        header + (self.payload.len() - self.offset).div_ceil(self.tier.chunk_size())
    }
}

impl Iterator for FragmentStream<'_> {
    type Item = Fragment;

    fn next(&mut self) -> Option<Fragment> {
        if !self.header_sent {
            self.header_sent = true;
            return Some(Fragment {
                command: self.tier.header_command(),
                data: self.scratch,
            });
        }
        if self.offset >= self.payload.len() {
            return None;
        }

        let chunk_size = self.tier.chunk_size();
        let end = (self.offset + chunk_size).min(self.payload.len());
        let chunk = &self.payload[self.offset..end];
        match self.tier {
            Tier::Small => {
                self.scratch[0] = self.scratch[0].wrapping_add(1);
                self.scratch[1..1 + chunk.len()].copy_from_slice(chunk);
            }
            Tier::Large => self.scratch[..chunk.len()].copy_from_slice(chunk),
        }
        self.offset = end;
        Some(Fragment {
            command: self.tier.data_command(),
            data: self.scratch,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining_fragments();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FragmentStream<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_wraps_without_folding() {
        assert_eq!(checksum16(&[]), 0);
        assert_eq!(checksum16(&[0x01, 0x02, 0xFF]), 0x0102);
        assert_eq!(checksum16(&[0xFF; 257]), 0xFFFF);
        assert_eq!(checksum16(&[0xFF; 300]), (0xFFu32 * 300 % 0x1_0000) as u16);
    }

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(Tier::for_len(0).unwrap(), Tier::Small);
        assert_eq!(Tier::for_len(1530).unwrap(), Tier::Small);
        assert_eq!(Tier::for_len(1531).unwrap(), Tier::Large);
        assert_eq!(Tier::for_len(65535).unwrap(), Tier::Large);
        assert!(matches!(
            Tier::for_len(65536),
            Err(LegacyError::PayloadTooLarge { len: 65536 })
        ));
    }

    #[test]
    fn test_small_tier_layout() {
        let payload: Vec<u8> = (1..=8).collect();
        let fragments: Vec<Fragment> = FragmentStream::new(FragmentCommand::Other(0x42), &payload)
            .unwrap()
            .collect();
        assert_eq!(fragments.len(), 3);
        assert!(fragments.iter().all(|f| f.command == LegacyCommand::FragmentedPackage));
        assert_eq!(fragments[0].data, [0x00, 0x42, 0x00, 0x08, 0x00, 0x24, 0x00]);
        assert_eq!(fragments[1].data, [0x01, 1, 2, 3, 4, 5, 6]);
        // the final fragment keeps the tail of the previous one
        assert_eq!(fragments[2].data, [0x02, 7, 8, 3, 4, 5, 6]);
    }

    #[test]
    fn test_empty_payload_is_header_only() {
        let fragments: Vec<Fragment> = FragmentStream::new(FragmentCommand::PageCrcExternal, &[])
            .unwrap()
            .collect();
        assert_eq!(fragments.len(), 1);
        assert_eq!(fragments[0].data, [0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn test_large_tier_layout() {
        let payload = vec![0xAB; 1531];
        let stream = FragmentStream::new(FragmentCommand::Other(0x07), &payload).unwrap();
        assert_eq!(stream.tier(), Tier::Large);
        assert_eq!(stream.len(), 1 + 219);

        let fragments: Vec<Fragment> = stream.collect();
        let checksum = checksum16(&payload).to_le_bytes();
        assert_eq!(fragments[0].command, LegacyCommand::FragmentedPackageLargeStart);
        assert_eq!(
            fragments[0].data,
            [0x00, 0x07, 0x00, 0xFB, 0x05, checksum[0], checksum[1]]
        );
        assert!(fragments[1..]
            .iter()
            .all(|f| f.command == LegacyCommand::FragmentedPackageLargeData && f.data == [0xAB; 7]));
    }

    #[test]
    fn test_header_accessor_matches_first_fragment() {
        let payload = [9u8; 20];
        let mut stream = FragmentStream::new(FragmentCommand::PageCrcExternal, &payload).unwrap();
        let header = stream.header();
        assert_eq!(header.length.get(), 20);
        assert_eq!(header.checksum.get(), 180);
        let first = stream.next().unwrap();
        assert_eq!(FragmentHeader::parse(&first.data), header);
    }
}
