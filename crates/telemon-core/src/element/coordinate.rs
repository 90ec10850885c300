use serde::{Deserialize, Serialize};
use telemon_ingest::Value;

use crate::element::style::paint;
use crate::element::{ElementError, Render, TextStyle, arg, invalid};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinateTextConfig {
    pub preamble: String,
    pub units: String,
    pub style: Option<TextStyle>,
}

/// `preamble X: +1.0000 mm Y: -2.5000 mm Z: +0.0000 mm`
///
/// Update arguments are `x [y [z [units]]]`; axes not given keep their
/// previous value.
#[derive(Debug, Clone, PartialEq)]
pub struct CoordinateText {
    config: CoordinateTextConfig,
    xyz: [f64; 3],
}

impl CoordinateText {
    pub fn new(config: CoordinateTextConfig) -> Self {
        Self {
            config,
            xyz: [0.0; 3],
        }
    }

    pub fn position(&self) -> [f64; 3] {
        self.xyz
    }
}

impl Render for CoordinateText {
    fn update(&mut self, args: &[Value]) -> Result<(), ElementError> {
        arg(args, 0)?;
        let mut next = self.xyz;
        for (axis, value) in next.iter_mut().zip(args) {
            *axis = value
                .as_f64()
                .filter(|f| f.is_finite())
                .ok_or_else(|| invalid("coordinate", value, "a number"))?;
        }
        self.xyz = next;
        if let Some(units) = args.get(3) {
            self.config.units = units.to_string();
        }
        Ok(())
    }

    fn display(&self) -> String {
        let [x, y, z] = self.xyz;
        let u = &self.config.units;
        let text = format!(
            "{} X: {x:+.4} {u} Y: {y:+.4} {u} Z: {z:+.4} {u}",
            self.config.preamble
        );
        paint(self.config.style.as_ref(), &text)
    }

    fn height(&self) -> usize {
        1
    }
}
