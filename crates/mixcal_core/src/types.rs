//! Core types for MIXCAL
//!
//! Gantree: L0_Foundation → CoreTypes
//!
//! Port roles, mixer offsets and channel roles shared by the synthesis
//! engine and the mixer tuner.

use crate::error::{MixcalError, MixcalResult};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// Frequency in Hz
pub type Hertz = f64;

/// Device port number on the controller
pub type PortNumber = u8;

/// Role key → port number
/// Gantree: PortMap // pub type PortMap = BTreeMap<PortKey, PortNumber>
pub type PortMap = BTreeMap<PortKey, PortNumber>;

// ============================================================================
// Port Keys
// ============================================================================

/// Role of a port within a channel
/// Gantree: PortKey // 포트 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PortKey {
    /// In-phase mixer input
    I,
    /// Quadrature mixer input
    Q,
    /// Single (non-mixed) analog output
    #[serde(rename = "single")]
    Single,
    /// Analog input (readout)
    #[serde(rename = "out")]
    Out,
}

impl PortKey {
    /// Key name as used in the configuration document
    pub fn as_str(&self) -> &'static str {
        match self {
            PortKey::I => "I",
            PortKey::Q => "Q",
            PortKey::Single => "single",
            PortKey::Out => "out",
        }
    }

    /// Check if the port drives an analog output
    pub fn is_output(&self) -> bool {
        !matches!(self, PortKey::Out)
    }

    /// DC offset feeding this port
    pub fn offset_key(&self) -> OffsetKey {
        match self {
            PortKey::I | PortKey::Single => OffsetKey::I,
            PortKey::Q => OffsetKey::Q,
            PortKey::Out => OffsetKey::Out,
        }
    }
}

impl fmt::Display for PortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Render a keyset for error messages
pub fn keyset_names(keys: &BTreeSet<PortKey>) -> Vec<String> {
    keys.iter().map(|k| k.as_str().to_string()).collect()
}

// ============================================================================
// Channel Role
// ============================================================================

/// What a channel is used for
/// Gantree: ChannelRole // 채널 역할
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ChannelRole {
    /// Drive line (qubit, cavity)
    #[default]
    Drive,
    /// Readout line with an analog input
    Readout,
}

impl ChannelRole {
    /// Valid port keysets for this role
    pub fn valid_keysets(&self) -> Vec<BTreeSet<PortKey>> {
        match self {
            ChannelRole::Drive => vec![
                [PortKey::I, PortKey::Q].into_iter().collect(),
                [PortKey::Single].into_iter().collect(),
            ],
            ChannelRole::Readout => vec![
                [PortKey::I, PortKey::Q, PortKey::Out].into_iter().collect(),
                [PortKey::Single, PortKey::Out].into_iter().collect(),
            ],
        }
    }

    /// Validate a port map keyset against this role
    pub fn check_ports(&self, channel: &str, ports: &PortMap) -> MixcalResult<InputMode> {
        let keys: BTreeSet<PortKey> = ports.keys().copied().collect();
        let valid = self.valid_keysets();

        if !valid.contains(&keys) {
            let expected = valid
                .iter()
                .map(|set| format!("{:?}", keyset_names(set)))
                .collect::<Vec<_>>()
                .join(" | ");
            return Err(MixcalError::InvalidPortKeyset {
                channel: channel.to_string(),
                keys: keyset_names(&keys),
                expected,
            });
        }

        Ok(if keys.contains(&PortKey::I) {
            InputMode::Mixed
        } else {
            InputMode::Single
        })
    }
}

/// How a channel is driven
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InputMode {
    /// Two-channel IQ mixer inputs
    Mixed,
    /// Single analog output
    Single,
}

impl fmt::Display for InputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputMode::Mixed => write!(f, "mixed"),
            InputMode::Single => write!(f, "single"),
        }
    }
}

// ============================================================================
// Mixer Offsets
// ============================================================================

/// Offset key of the mixer calibration
/// Gantree: OffsetKey // 오프셋 키
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OffsetKey {
    /// I DC offset (V)
    I,
    /// Q DC offset (V)
    Q,
    /// Gain imbalance correction
    G,
    /// Phase imbalance correction (rad)
    P,
    /// Analog input DC offset (V)
    #[serde(rename = "out")]
    Out,
}

impl OffsetKey {
    /// All keys in document order
    pub const ALL: [OffsetKey; 5] = [
        OffsetKey::I,
        OffsetKey::Q,
        OffsetKey::G,
        OffsetKey::P,
        OffsetKey::Out,
    ];

    /// Check if the key is a DC voltage offset
    pub fn is_dc(&self) -> bool {
        matches!(self, OffsetKey::I | OffsetKey::Q | OffsetKey::Out)
    }
}

impl fmt::Display for OffsetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OffsetKey::I => "I",
            OffsetKey::Q => "Q",
            OffsetKey::G => "G",
            OffsetKey::P => "P",
            OffsetKey::Out => "out",
        };
        write!(f, "{}", name)
    }
}

/// IQ mixer calibration offsets
/// Gantree: MixerOffsets // 믹서 오프셋
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct MixerOffsets {
    /// I DC offset (V)
    pub i: f64,
    /// Q DC offset (V)
    pub q: f64,
    /// Gain correction (dimensionless)
    pub g: f64,
    /// Phase correction (rad)
    pub p: f64,
    /// Analog input DC offset (V), readout only
    #[serde(default)]
    pub out: f64,
}

impl MixerOffsets {
    /// Create offsets with all values at zero
    pub fn zero() -> Self {
        Self::default()
    }

    /// Create from the four mixer offsets
    pub fn new(i: f64, q: f64, g: f64, p: f64) -> Self {
        Self {
            i,
            q,
            g,
            p,
            out: 0.0,
        }
    }

    /// Get offset by key
    pub fn get(&self, key: OffsetKey) -> f64 {
        match key {
            OffsetKey::I => self.i,
            OffsetKey::Q => self.q,
            OffsetKey::G => self.g,
            OffsetKey::P => self.p,
            OffsetKey::Out => self.out,
        }
    }

    /// Set offset by key
    pub fn set(&mut self, key: OffsetKey, value: f64) {
        match key {
            OffsetKey::I => self.i = value,
            OffsetKey::Q => self.q = value,
            OffsetKey::G => self.g = value,
            OffsetKey::P => self.p = value,
            OffsetKey::Out => self.out = value,
        }
    }

    /// Keys whose value differs from `other`
    pub fn changed_keys(&self, other: &MixerOffsets) -> Vec<OffsetKey> {
        OffsetKey::ALL
            .iter()
            .copied()
            .filter(|&key| self.get(key) != other.get(key))
            .collect()
    }

    /// Check that every offset is finite
    pub fn validate(&self) -> MixcalResult<()> {
        for key in OffsetKey::ALL {
            let value = self.get(key);
            if !value.is_finite() {
                return Err(MixcalError::InvalidValue {
                    name: format!("offset {}", key),
                    value,
                });
            }
        }
        Ok(())
    }
}

impl fmt::Display for MixerOffsets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Offsets(I={:.5}, Q={:.5}, G={:.5}, P={:.5}, out={:.5})",
            self.i, self.q, self.g, self.p, self.out
        )
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn ports(entries: &[(PortKey, u8)]) -> PortMap {
        entries.iter().copied().collect()
    }

    #[test]
    fn test_drive_keysets() {
        let role = ChannelRole::Drive;
        assert_eq!(
            role.check_ports("q", &ports(&[(PortKey::I, 1), (PortKey::Q, 2)]))
                .unwrap(),
            InputMode::Mixed
        );
        assert_eq!(
            role.check_ports("q", &ports(&[(PortKey::Single, 3)])).unwrap(),
            InputMode::Single
        );
        assert!(role.check_ports("q", &ports(&[(PortKey::I, 1)])).is_err());
        assert!(role
            .check_ports("q", &ports(&[(PortKey::I, 1), (PortKey::Q, 2), (PortKey::Out, 1)]))
            .is_err());
    }

    #[test]
    fn test_readout_keysets() {
        let role = ChannelRole::Readout;
        assert!(role
            .check_ports("rr", &ports(&[(PortKey::I, 3), (PortKey::Q, 4), (PortKey::Out, 1)]))
            .is_ok());
        assert!(role
            .check_ports("rr", &ports(&[(PortKey::Single, 3), (PortKey::Out, 2)]))
            .is_ok());
        let err = role
            .check_ports("rr", &ports(&[(PortKey::I, 3), (PortKey::Q, 4)]))
            .unwrap_err();
        assert!(err.is_structural());
    }

    #[test]
    fn test_offsets_changed_keys() {
        let a = MixerOffsets::zero();
        let mut b = a;
        b.set(OffsetKey::G, 0.1);
        b.set(OffsetKey::Q, -0.01);
        assert_eq!(b.changed_keys(&a), vec![OffsetKey::Q, OffsetKey::G]);
        assert!(a.changed_keys(&a).is_empty());
    }

    #[test]
    fn test_offsets_validate() {
        let mut offsets = MixerOffsets::zero();
        assert!(offsets.validate().is_ok());
        offsets.p = f64::NAN;
        assert!(offsets.validate().is_err());
    }

    #[test]
    fn test_port_offset_mapping() {
        assert_eq!(PortKey::Single.offset_key(), OffsetKey::I);
        assert_eq!(PortKey::Out.offset_key(), OffsetKey::Out);
        assert!(!PortKey::Out.is_output());
    }
}
