//! Raw payload layouts
//!
//! Fixed `#[repr(C)]` records as delivered by the transport. Fixed-size
//! records decode with `bytemuck`; image payloads are a header followed by
//! the present frames in slot order (all left, all right, all depth).

use std::mem::size_of;

use bytemuck::{Pod, Zeroable};
use bytes::{BufMut, Bytes, BytesMut};
use contracts::{VbusIndex, CAMERA_PAIR_COUNT, IMAGE_PIXELS};
use thiserror::Error;

/// Payload decoding failure
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{record} payload has {actual} bytes, expected {expected}")]
    WrongSize {
        record: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("image header flag {value} at {channel:?}[{slot}] is not 0/1")]
    BadFlag {
        channel: ImageChannel,
        slot: usize,
        value: u8,
    },
}

/// Obstacle distance per camera direction (cm)
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ObstacleDistanceRaw {
    pub frame_index: u32,
    pub time_stamp: u32,
    pub distance: [u16; CAMERA_PAIR_COUNT],
    pub _reserved: u16,
}

/// Ultrasonic distance (mm) and reliability per sector
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct UltrasonicRaw {
    pub frame_index: u32,
    pub time_stamp: u32,
    pub ultrasonic: [i16; CAMERA_PAIR_COUNT],
    pub reliability: [u16; CAMERA_PAIR_COUNT],
}

/// Presence flags preceding image slots
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Pod, Zeroable)]
pub struct ImageHeader {
    pub frame_index: u32,
    pub time_stamp: u32,
    pub left_present: [u8; CAMERA_PAIR_COUNT],
    pub right_present: [u8; CAMERA_PAIR_COUNT],
    pub depth_present: [u8; CAMERA_PAIR_COUNT],
    pub _pad: u8,
}

fn decode_record<T: Pod>(record: &'static str, bytes: &[u8]) -> Result<T, DecodeError> {
    bytemuck::try_pod_read_unaligned(bytes).map_err(|_| DecodeError::WrongSize {
        record,
        expected: size_of::<T>(),
        actual: bytes.len(),
    })
}

impl ObstacleDistanceRaw {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        decode_record("obstacle_distance", bytes)
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(bytemuck::bytes_of(self))
    }
}

impl UltrasonicRaw {
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        decode_record("ultrasonic", bytes)
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(bytemuck::bytes_of(self))
    }
}

/// Image slot family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageChannel {
    /// Greyscale left, 8 bit
    Left,
    /// Greyscale right, 8 bit
    Right,
    /// Depth, 16 bit
    Depth,
}

impl ImageChannel {
    /// Slot order inside an image payload
    pub const ALL: [ImageChannel; 3] = [Self::Left, Self::Right, Self::Depth];

    fn index(self) -> usize {
        match self {
            Self::Left => 0,
            Self::Right => 1,
            Self::Depth => 2,
        }
    }

    /// Bytes per frame
    pub fn frame_len(self) -> usize {
        match self {
            Self::Left | Self::Right => IMAGE_PIXELS,
            Self::Depth => IMAGE_PIXELS * 2,
        }
    }
}

impl ImageHeader {
    fn flags(&self, channel: ImageChannel) -> &[u8; CAMERA_PAIR_COUNT] {
        match channel {
            ImageChannel::Left => &self.left_present,
            ImageChannel::Right => &self.right_present,
            ImageChannel::Depth => &self.depth_present,
        }
    }

    fn flags_mut(&mut self, channel: ImageChannel) -> &mut [u8; CAMERA_PAIR_COUNT] {
        match channel {
            ImageChannel::Left => &mut self.left_present,
            ImageChannel::Right => &mut self.right_present,
            ImageChannel::Depth => &mut self.depth_present,
        }
    }
}

type SlotTable<'a> = [[Option<&'a [u8]>; CAMERA_PAIR_COUNT]; 3];

/// Borrowed view of an image payload
#[derive(Debug)]
pub struct ImageFrame<'a> {
    pub frame_index: u32,
    pub time_stamp: u32,
    slots: SlotTable<'a>,
}

impl<'a> ImageFrame<'a> {
    pub fn decode(bytes: &'a [u8]) -> Result<Self, DecodeError> {
        let header_len = size_of::<ImageHeader>();
        let head = bytes.get(..header_len).ok_or(DecodeError::WrongSize {
            record: "image",
            expected: header_len,
            actual: bytes.len(),
        })?;
        let header: ImageHeader = decode_record("image", head)?;

        let mut slots: SlotTable<'a> = [[None; CAMERA_PAIR_COUNT]; 3];
        let mut offset = header_len;
        for channel in ImageChannel::ALL {
            for (slot, &value) in header.flags(channel).iter().enumerate() {
                match value {
                    0 => continue,
                    1 => {}
                    value => return Err(DecodeError::BadFlag { channel, slot, value }),
                }
                let end = offset + channel.frame_len();
                let frame = bytes.get(offset..end).ok_or(DecodeError::WrongSize {
                    record: "image",
                    expected: end,
                    actual: bytes.len(),
                })?;
                slots[channel.index()][slot] = Some(frame);
                offset = end;
            }
        }

        if offset != bytes.len() {
            return Err(DecodeError::WrongSize {
                record: "image",
                expected: offset,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            frame_index: header.frame_index,
            time_stamp: header.time_stamp,
            slots,
        })
    }

    /// Frame for a channel of one camera pair, if present
    pub fn get(&self, channel: ImageChannel, vbus: VbusIndex) -> Option<&'a [u8]> {
        self.slots[channel.index()][vbus.slot()]
    }
}

/// Build an image payload; frames of the wrong length are rejected
pub fn encode_image(
    frame_index: u32,
    time_stamp: u32,
    frames: &[(ImageChannel, VbusIndex, &[u8])],
) -> Result<Bytes, DecodeError> {
    let mut header = ImageHeader {
        frame_index,
        time_stamp,
        ..Zeroable::zeroed()
    };
    let mut slots: SlotTable<'_> = [[None; CAMERA_PAIR_COUNT]; 3];
    for &(channel, vbus, data) in frames {
        if data.len() != channel.frame_len() {
            return Err(DecodeError::WrongSize {
                record: "image frame",
                expected: channel.frame_len(),
                actual: data.len(),
            });
        }
        header.flags_mut(channel)[vbus.slot()] = 1;
        slots[channel.index()][vbus.slot()] = Some(data);
    }

    let body: usize = frames.iter().map(|(c, _, _)| c.frame_len()).sum();
    let mut out = BytesMut::with_capacity(size_of::<ImageHeader>() + body);
    out.put_slice(bytemuck::bytes_of(&header));
    for frame in slots.iter().flatten().flatten() {
        out.put_slice(frame);
    }
    Ok(out.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vbus(n: u8) -> VbusIndex {
        VbusIndex::new(n).unwrap()
    }

    #[test]
    fn test_record_sizes() {
        assert_eq!(size_of::<ObstacleDistanceRaw>(), 20);
        assert_eq!(size_of::<UltrasonicRaw>(), 28);
        assert_eq!(size_of::<ImageHeader>(), 24);
    }

    #[test]
    fn test_fixed_record_wrong_size() {
        let err = UltrasonicRaw::decode(&[0u8; 27]).unwrap_err();
        assert_eq!(
            err,
            DecodeError::WrongSize {
                record: "ultrasonic",
                expected: 28,
                actual: 27
            }
        );
    }

    #[test]
    fn test_ultrasonic_fields_survive_encoding() {
        let raw = UltrasonicRaw {
            frame_index: 7,
            time_stamp: 1000,
            ultrasonic: [3000, 1200, -1, 0, 450],
            reliability: [1, 1, 0, 1, 1],
        };
        let decoded = UltrasonicRaw::decode(&raw.to_bytes()).unwrap();
        assert_eq!(decoded.ultrasonic[1], 1200);
        assert_eq!(decoded.reliability[2], 0);
    }

    #[test]
    fn test_image_slots_located_by_channel() {
        let left = vec![1u8; IMAGE_PIXELS];
        let right = vec![2u8; IMAGE_PIXELS];
        let depth = vec![3u8; IMAGE_PIXELS * 2];
        let bytes = encode_image(
            9,
            42,
            &[
                (ImageChannel::Depth, vbus(3), depth.as_slice()),
                (ImageChannel::Right, vbus(3), right.as_slice()),
                (ImageChannel::Left, vbus(3), left.as_slice()),
            ],
        )
        .unwrap();
        assert_eq!(bytes.len(), 24 + IMAGE_PIXELS * 4);

        let frame = ImageFrame::decode(&bytes).unwrap();
        assert_eq!(frame.frame_index, 9);
        assert_eq!(frame.get(ImageChannel::Left, vbus(3)).unwrap()[0], 1);
        assert_eq!(frame.get(ImageChannel::Right, vbus(3)).unwrap()[0], 2);
        assert_eq!(frame.get(ImageChannel::Depth, vbus(3)).unwrap().len(), IMAGE_PIXELS * 2);
        assert!(frame.get(ImageChannel::Left, vbus(1)).is_none());
    }

    #[test]
    fn test_truncated_image_rejected() {
        let left = vec![0u8; IMAGE_PIXELS];
        let bytes = encode_image(1, 1, &[(ImageChannel::Left, vbus(1), left.as_slice())]).unwrap();
        let err = ImageFrame::decode(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, DecodeError::WrongSize { record: "image", .. }));
        assert!(ImageFrame::decode(&bytes[..10]).is_err());
    }

    #[test]
    fn test_bad_presence_flag() {
        let mut header: ImageHeader = Zeroable::zeroed();
        header.right_present[0] = 7;
        let err = ImageFrame::decode(bytemuck::bytes_of(&header)).unwrap_err();
        assert_eq!(
            err,
            DecodeError::BadFlag {
                channel: ImageChannel::Right,
                slot: 0,
                value: 7
            }
        );
    }
}
