use serde::Serialize;
use thiserror::Error;

/// Byte-mode capacity of QR versions 1..=40 at error-correction level H.
const BYTE_CAPACITY_H: [usize; 40] = [
    7, 14, 24, 34, 44, 58, 64, 84, 98, 119, 137, 155, 177, 194, 220, 250, 280, 310, 338, 382, 403,
    439, 461, 511, 535, 593, 625, 658, 698, 742, 790, 842, 898, 958, 983, 1051, 1093, 1139, 1219,
    1273,
];

pub const MIN_VERSION: u8 = 10;
pub const MAX_VERSION: u8 = 40;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    #[error("nothing to encode")]
    Empty,
    #[error(
        "payload of {bytes} bytes exceeds the {capacity}-byte capacity of a version {max_version} code"
    )]
    TooLarge {
        bytes: usize,
        capacity: usize,
        max_version: u8,
    },
}

/// Turns a section's serialized text into something a scanner can read.
pub trait CodeEncoder {
    type Output;

    fn encode(&self, payload: &str) -> Result<Self::Output, EncodeError>;
}

/// Symbol parameters handed to the image generator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QrPlan {
    pub version: u8,
    pub error_correction: &'static str,
    pub mode: &'static str,
    pub bytes: usize,
    pub capacity: usize,
}

/// Picks the smallest byte-mode, level-H QR version that fits the UTF-8
/// payload, never below `min_version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrPlanner {
    min_version: u8,
    max_version: u8,
}

impl Default for QrPlanner {
    fn default() -> Self {
        Self {
            min_version: MIN_VERSION,
            max_version: MAX_VERSION,
        }
    }
}

impl QrPlanner {
    pub fn new(min_version: u8, max_version: u8) -> Self {
        let max_version = max_version.clamp(1, MAX_VERSION);
        Self {
            min_version: min_version.clamp(1, max_version),
            max_version,
        }
    }

    pub fn capacity(version: u8) -> usize {
        BYTE_CAPACITY_H[usize::from(version.clamp(1, MAX_VERSION)) - 1]
    }
}

impl CodeEncoder for QrPlanner {
    type Output = QrPlan;

    fn encode(&self, payload: &str) -> Result<QrPlan, EncodeError> {
        let bytes = payload.len();
        if bytes == 0 {
            return Err(EncodeError::Empty);
        }
        (self.min_version..=self.max_version)
            .map(|version| (version, Self::capacity(version)))
            .find(|(_, capacity)| *capacity >= bytes)
            .map(|(version, capacity)| QrPlan {
                version,
                error_correction: "H",
                mode: "byte",
                bytes,
                capacity,
            })
            .ok_or_else(|| EncodeError::TooLarge {
                bytes,
                capacity: Self::capacity(self.max_version),
                max_version: self.max_version,
            })
    }
}
