//! Configuration synthesizer
//!
//! Gantree: L2_Synthesis → Synthesizer
//!
//! Owns the configuration document and the per-channel snapshots. Each
//! build diffs the current snapshot of a channel against the committed one
//! and runs only the transforms of changed attributes. All transforms of a
//! build run against a working copy, which replaces the committed state
//! only when every transform succeeded.

use crate::document::ConfigDocument;
use crate::snapshot::{Attribute, ParameterSnapshot};
use crate::transforms::{self, TransformInput};
use mixcal_core::channel::ControlChannel;
use mixcal_core::error::{MixcalError, MixcalResult, Warning};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

// ============================================================================
// Build Report
// ============================================================================

/// What one build did
/// Gantree: BuildReport // 빌드 보고서
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BuildReport {
    /// (channel, attribute) of every transform invoked, in order
    pub invoked: Vec<(String, String)>,
    /// Channels registered by this build
    pub registered: Vec<String>,
    /// Non-fatal conditions
    pub warnings: Vec<Warning>,
}

impl BuildReport {
    /// Check if no transform ran
    pub fn is_noop(&self) -> bool {
        self.invoked.is_empty()
    }

    /// Attributes invoked for a channel
    pub fn invoked_for(&self, channel: &str) -> Vec<&str> {
        self.invoked
            .iter()
            .filter(|(ch, _)| ch == channel)
            .map(|(_, attr)| attr.as_str())
            .collect()
    }
}

impl fmt::Display for BuildReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Build: {} transforms, {} registered, {} warnings",
            self.invoked.len(),
            self.registered.len(),
            self.warnings.len()
        )
    }
}

// ============================================================================
// Synthesizer
// ============================================================================

/// Diff-based configuration synthesizer
/// Gantree: Synthesizer // 설정 합성기
#[derive(Debug, Clone, Default)]
pub struct Synthesizer {
    document: ConfigDocument,
    snapshots: BTreeMap<String, ParameterSnapshot>,
    last_report: BuildReport,
}

/// Uncommitted state of one build
struct WorkingCopy {
    document: ConfigDocument,
    snapshots: BTreeMap<String, ParameterSnapshot>,
    report: BuildReport,
}

impl Synthesizer {
    /// Create a synthesizer with an empty document
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// Committed document
    pub fn document(&self) -> &ConfigDocument {
        &self.document
    }

    /// Report of the last successful build
    pub fn last_report(&self) -> &BuildReport {
        &self.last_report
    }

    /// Check if a channel has been built
    pub fn is_registered(&self, channel: &str) -> bool {
        self.snapshots.contains_key(channel)
    }

    /// Committed snapshot of a channel
    pub fn snapshot(&self, channel: &str) -> Option<&ParameterSnapshot> {
        self.snapshots.get(channel)
    }

    /// Registered channel names
    pub fn channel_names(&self) -> impl Iterator<Item = &str> {
        self.snapshots.keys().map(String::as_str)
    }

    // ========================================================================
    // Build
    // ========================================================================

    /// Synthesize the document for `channels`
    ///
    /// The first build initializes the document; channels first seen on any
    /// build are registered and fully built; known channels only get the
    /// transforms of changed attributes.
    /// Gantree: build(channels) -> MixcalResult<&ConfigDocument> // 문서 합성
    pub fn build(&mut self, channels: &[ControlChannel]) -> MixcalResult<&ConfigDocument> {
        let mut names = BTreeSet::new();
        for channel in channels {
            if !names.insert(channel.name()) {
                log::error!("Channel names must be unique, found duplicate '{}'", channel.name());
                return Err(MixcalError::DuplicateChannel(channel.name().to_string()));
            }
        }

        let mut work = self.working_copy();
        if !work.document.is_initialized() {
            log::info!("Initializing config document");
            work.document.initialize();
        }

        for channel in channels {
            Self::build_into(&mut work, channel)?;
        }

        self.commit(work);
        Ok(&self.document)
    }

    /// Rebuild one registered channel
    /// Gantree: build_channel(channel) -> MixcalResult<&ConfigDocument> // 단일 채널
    pub fn build_channel(&mut self, channel: &ControlChannel) -> MixcalResult<&ConfigDocument> {
        if !self.is_registered(channel.name()) {
            return Err(MixcalError::UnknownChannel(channel.name().to_string()));
        }

        let mut work = self.working_copy();
        Self::build_into(&mut work, channel)?;
        self.commit(work);
        Ok(&self.document)
    }

    fn working_copy(&self) -> WorkingCopy {
        WorkingCopy {
            document: self.document.clone(),
            snapshots: self.snapshots.clone(),
            report: BuildReport::default(),
        }
    }

    fn commit(&mut self, work: WorkingCopy) {
        log::info!("{}", work.report);
        self.document = work.document;
        self.snapshots = work.snapshots;
        self.last_report = work.report;
    }

    fn build_into(work: &mut WorkingCopy, channel: &ControlChannel) -> MixcalResult<()> {
        let name = channel.name();
        let current = ParameterSnapshot::capture(channel)?;
        let previous = work.snapshots.get(name);

        let attributes: Vec<Attribute> = match previous {
            Some(previous) => current.changed_since(previous),
            None => {
                transforms::register(channel, &mut work.document);
                work.report.registered.push(name.to_string());
                current.attributes().cloned().collect()
            }
        };

        if !attributes.is_empty() {
            log::info!("Building '{}': {} changed attributes", name, attributes.len());
        }

        let input = TransformInput {
            channel,
            current: &current,
            previous,
        };

        for attribute in &attributes {
            match transforms::lookup(attribute) {
                Some(transform) => {
                    transform(&input, &mut work.document, &mut work.report.warnings)?;
                    work.report
                        .invoked
                        .push((name.to_string(), attribute.name().to_string()));
                }
                None if previous.is_some() => {
                    log::warn!("Unrecognized attribute '{}' on '{}' ignored", attribute, name);
                    work.report.warnings.push(Warning::UnrecognizedAttribute {
                        channel: name.to_string(),
                        attribute: attribute.name().to_string(),
                    });
                }
                None => {}
            }
        }

        work.snapshots.insert(name.to_string(), current);
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::fixtures::{qubit, readout};
    use mixcal_core::pulse::PulseDefinition;
    use mixcal_core::types::OffsetKey;

    #[test]
    fn test_first_build_registers() {
        let (channel, _) = qubit();
        let mut synth = Synthesizer::new();
        synth.build(std::slice::from_ref(&channel)).unwrap();

        assert!(synth.is_registered("QUBIT"));
        assert_eq!(synth.last_report().registered, vec!["QUBIT".to_string()]);
        assert_eq!(synth.document().version, 1);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let (a, _) = qubit();
        let b = a.clone();
        let mut synth = Synthesizer::new();
        let err = synth.build(&[a, b]).unwrap_err();
        assert!(matches!(err, MixcalError::DuplicateChannel(_)));
        assert!(!synth.document().is_initialized());
    }

    #[test]
    fn test_build_channel_unknown() {
        let (channel, _) = qubit();
        let mut synth = Synthesizer::new();
        let err = synth.build_channel(&channel).unwrap_err();
        assert!(matches!(err, MixcalError::UnknownChannel(_)));
    }

    #[test]
    fn test_failed_build_leaves_state() {
        let (mut channel, _) = qubit();
        let mut synth = Synthesizer::new();
        synth.build(std::slice::from_ref(&channel)).unwrap();
        let before = synth.document().clone();

        // valid IF change is discarded together with the failing offset
        channel.set_intermediate_frequency(-60_000_000);
        channel.set_offset(OffsetKey::I, 0.7);
        assert!(synth.build(std::slice::from_ref(&channel)).is_err());
        assert_eq!(synth.document(), &before);

        // retry after fixing succeeds and applies both
        channel.set_offset(OffsetKey::I, 0.01);
        synth.build(std::slice::from_ref(&channel)).unwrap();
        assert_eq!(synth.document().output_offset(1), Some(0.01));
        assert_eq!(
            synth.document().element("QUBIT").unwrap().intermediate_frequency,
            -60_000_000
        );
    }

    #[test]
    fn test_late_channel_fully_built() {
        let (q, _) = qubit();
        let (rr, _) = readout();
        let mut synth = Synthesizer::new();
        synth.build(std::slice::from_ref(&q)).unwrap();
        synth.build(&[q, rr]).unwrap();

        let report = synth.last_report();
        assert_eq!(report.registered, vec!["RR".to_string()]);
        assert!(report.invoked_for("QUBIT").is_empty());
        assert!(report.invoked_for("RR").contains(&"operations"));
        assert!(synth.document().pulse("RR", "readout_pulse").is_some());
    }

    #[test]
    fn test_custom_attribute_warns() {
        let (mut channel, _) = qubit();
        channel.set_attribute("t1", serde_json::json!(35e-6));
        let mut synth = Synthesizer::new();
        synth.build(std::slice::from_ref(&channel)).unwrap();
        assert!(synth.last_report().warnings.is_empty());

        channel.set_attribute("t1", serde_json::json!(40e-6));
        synth.build(std::slice::from_ref(&channel)).unwrap();
        let report = synth.last_report();
        assert!(report.is_noop());
        assert!(matches!(
            report.warnings[0],
            Warning::UnrecognizedAttribute { .. }
        ));
    }

    #[test]
    fn test_pulse_kind_change_rejected() {
        let (mut channel, _) = qubit();
        let mut synth = Synthesizer::new();
        synth.build(std::slice::from_ref(&channel)).unwrap();

        channel.set_operation("constant_pulse", PulseDefinition::constant_readout(1000, 1.0));
        let err = synth.build(std::slice::from_ref(&channel)).unwrap_err();
        assert!(matches!(err, MixcalError::PulseKindChanged { .. }));
    }
}
