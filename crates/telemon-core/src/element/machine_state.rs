use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use telemon_ingest::Value;

use crate::element::style::paint;
use crate::element::{ElementError, Render, TextStyle, arg, integer, invalid};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineStateConfig {
    /// Names of bits 0, 1, 2, … (least significant first).
    pub states: Vec<String>,
    pub style: Option<TextStyle>,
}

/// A 32-bit status word shown as its binary digits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MachineState {
    config: MachineStateConfig,
    bits: u32,
}

impl MachineState {
    pub fn new(config: MachineStateConfig) -> Self {
        Self { config, bits: 0 }
    }

    pub fn bits(&self) -> u32 {
        self.bits
    }

    /// Fixed-width binary string, most significant bit first.
    pub fn bit_string(&self) -> String {
        format!("{:032b}", self.bits)
    }

    /// State name → bit, in declared order. Names past bit 31 read `false`.
    pub fn as_map(&self) -> IndexMap<String, bool> {
        self.config
            .states
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let set = u32::try_from(i)
                    .ok()
                    .and_then(|shift| self.bits.checked_shr(shift))
                    .is_some_and(|v| v & 1 == 1);
                (name.clone(), set)
            })
            .collect()
    }
}

impl Render for MachineState {
    /// Negative inputs are taken as their 32-bit two's-complement pattern.
    #[allow(clippy::cast_sign_loss, clippy::as_conversions)]
    fn update(&mut self, args: &[Value]) -> Result<(), ElementError> {
        let value = arg(args, 0)?;
        let raw = integer(args, 0, "bits")?;
        self.bits = u32::try_from(raw)
            .ok()
            .or_else(|| i32::try_from(raw).ok().map(|v| v as u32))
            .ok_or_else(|| invalid("bits", value, "a 32-bit word"))?;
        Ok(())
    }

    fn display(&self) -> String {
        paint(self.config.style.as_ref(), &self.bit_string())
    }

    fn height(&self) -> usize {
        1
    }
}
