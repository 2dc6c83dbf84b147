//! Parameter snapshots
//!
//! Gantree: L2_Synthesis → ParameterStore
//!
//! The logical value of every tracked attribute of one channel, captured
//! before each synthesis pass and compared against the previous capture.

use crate::validation;
use mixcal_core::channel::ControlChannel;
use mixcal_core::error::MixcalResult;
use mixcal_core::pulse::PulseDefinition;
use mixcal_core::types::{MixerOffsets, PortMap};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Attributes
// ============================================================================

/// Tracked channel attribute
///
/// Variant order is application order: ports are bound before offsets
/// are written to them.
/// Gantree: Attribute // 속성 열거형
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Attribute {
    /// LO frequency read through the oscillator handle
    LoFrequency,
    /// Intermediate frequency
    IntermediateFrequency,
    /// Port wiring
    Ports,
    /// Mixer offsets
    Offsets,
    /// Named operations
    Operations,
    /// Readout time of flight
    TimeOfFlight,
    /// Readout smearing
    Smearing,
    /// Free-form attribute without a transform
    Custom(String),
}

impl Attribute {
    /// Attribute name as reported in logs and warnings
    pub fn name(&self) -> &str {
        match self {
            Attribute::LoFrequency => "lo_frequency",
            Attribute::IntermediateFrequency => "intermediate_frequency",
            Attribute::Ports => "ports",
            Attribute::Offsets => "offsets",
            Attribute::Operations => "operations",
            Attribute::TimeOfFlight => "time_of_flight",
            Attribute::Smearing => "smearing",
            Attribute::Custom(name) => name,
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Logical value of an attribute
#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    /// Frequency (Hz)
    Frequency(i64),
    /// Port wiring
    Ports(PortMap),
    /// Mixer offsets
    Offsets(MixerOffsets),
    /// Operations by name
    Operations(BTreeMap<String, PulseDefinition>),
    /// Duration (ns)
    Duration(i64),
    /// Free-form value
    Custom(serde_json::Value),
}

// ============================================================================
// Parameter Snapshot
// ============================================================================

/// Attribute values of one channel
/// Gantree: ParameterSnapshot // 파라미터 스냅샷
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSnapshot {
    values: BTreeMap<Attribute, AttributeValue>,
}

impl ParameterSnapshot {
    /// Capture every tracked attribute of a channel
    ///
    /// The LO frequency is the only value read from an instrument.
    /// Gantree: capture(channel) -> MixcalResult<Self> // 스냅샷 캡처
    pub fn capture(channel: &ControlChannel) -> MixcalResult<Self> {
        let lo = channel.oscillator().frequency()?;
        validation::validate_finite(&format!("{} lo_frequency", channel.name()), lo)?;
        channel.mixer_offsets().validate()?;

        let mut values = BTreeMap::new();
        values.insert(
            Attribute::LoFrequency,
            AttributeValue::Frequency(lo.round() as i64),
        );
        values.insert(
            Attribute::IntermediateFrequency,
            AttributeValue::Frequency(channel.intermediate_frequency()),
        );
        values.insert(Attribute::Ports, AttributeValue::Ports(channel.ports().clone()));
        values.insert(
            Attribute::Offsets,
            AttributeValue::Offsets(*channel.mixer_offsets()),
        );
        values.insert(
            Attribute::Operations,
            AttributeValue::Operations(channel.operations().clone()),
        );

        if channel.is_readout() {
            values.insert(
                Attribute::TimeOfFlight,
                AttributeValue::Duration(channel.time_of_flight()),
            );
            values.insert(
                Attribute::Smearing,
                AttributeValue::Duration(channel.smearing()),
            );
        }

        for (key, value) in channel.attributes() {
            values.insert(
                Attribute::Custom(key.clone()),
                AttributeValue::Custom(value.clone()),
            );
        }

        Ok(Self { values })
    }

    /// Value of an attribute
    pub fn get(&self, attribute: &Attribute) -> Option<&AttributeValue> {
        self.values.get(attribute)
    }

    /// Tracked attributes in application order
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.values.keys()
    }

    /// Attributes whose value differs from `previous`, in application order
    ///
    /// Attributes dropped since `previous` count as changed.
    pub fn changed_since(&self, previous: &ParameterSnapshot) -> Vec<Attribute> {
        let mut changed: Vec<Attribute> = self
            .values
            .iter()
            .filter(|(attr, value)| previous.values.get(*attr) != Some(*value))
            .map(|(attr, _)| attr.clone())
            .collect();

        changed.extend(
            previous
                .values
                .keys()
                .filter(|attr| !self.values.contains_key(*attr))
                .cloned(),
        );
        changed.sort();
        changed
    }

    // ========================================================================
    // Typed Accessors
    // ========================================================================

    /// LO frequency (Hz)
    pub fn lo_frequency(&self) -> Option<i64> {
        match self.get(&Attribute::LoFrequency) {
            Some(AttributeValue::Frequency(f)) => Some(*f),
            _ => None,
        }
    }

    /// Port wiring
    pub fn ports(&self) -> Option<&PortMap> {
        match self.get(&Attribute::Ports) {
            Some(AttributeValue::Ports(ports)) => Some(ports),
            _ => None,
        }
    }

    /// Mixer offsets
    pub fn offsets(&self) -> Option<&MixerOffsets> {
        match self.get(&Attribute::Offsets) {
            Some(AttributeValue::Offsets(offsets)) => Some(offsets),
            _ => None,
        }
    }

    /// Operations
    pub fn operations(&self) -> Option<&BTreeMap<String, PulseDefinition>> {
        match self.get(&Attribute::Operations) {
            Some(AttributeValue::Operations(ops)) => Some(ops),
            _ => None,
        }
    }

    /// Number of tracked attributes
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if nothing is tracked
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// Tests
// ============================================================================
