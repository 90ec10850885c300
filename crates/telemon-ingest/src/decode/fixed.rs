//! Fixed-width binary records described by a struct-format string.
//!
//! The layout syntax follows the familiar `struct` module notation: an
//! optional byte-order prefix, then field codes each with an optional
//! repeat count.
//!
//! | prefix | order |      | code | field |
//! |---|---|---|---|---|
//! | `<` | little | | `x` | pad byte (no value) |
//! | `>` `!` | big | | `b` `B` | i8 / u8 |
//! | `=` `@` | native | | `?` | bool |
//! | | | | `h` `H` | i16 / u16 |
//! | | | | `i` `I` `l` `L` | i32 / u32 |
//! | | | | `q` `Q` | i64 / u64 |
//! | | | | `f` `d` | f32 / f64 |
//!
//! Fields are packed without alignment padding.

use crate::decode::Decoder;
use crate::error::Error;
use crate::value::{DecodedUpdate, Value};

/// Largest record a layout may describe, in bytes.
pub const MAX_RECORD_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

impl ByteOrder {
    const NATIVE: Self = if cfg!(target_endian = "big") {
        Self::Big
    } else {
        Self::Little
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Pad,
    I8,
    U8,
    Bool,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl Field {
    fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'x' => Self::Pad,
            'b' => Self::I8,
            'B' => Self::U8,
            '?' => Self::Bool,
            'h' => Self::I16,
            'H' => Self::U16,
            'i' | 'l' => Self::I32,
            'I' | 'L' => Self::U32,
            'q' => Self::I64,
            'Q' => Self::U64,
            'f' => Self::F32,
            'd' => Self::F64,
            _ => return None,
        })
    }

    fn size(self) -> usize {
        match self {
            Self::Pad | Self::I8 | Self::U8 | Self::Bool => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    fn read(self, chunk: &[u8], order: ByteOrder) -> Option<Value> {
        macro_rules! num {
            ($t:ty) => {{
                let bytes = chunk.try_into().ok()?;
                match order {
                    ByteOrder::Little => <$t>::from_le_bytes(bytes),
                    ByteOrder::Big => <$t>::from_be_bytes(bytes),
                }
            }};
        }

        Some(match self {
            Self::Pad => return None,
            Self::Bool => Value::Bool(chunk.first().is_some_and(|b| *b != 0)),
            Self::I8 => Value::Int(i64::from(num!(i8))),
            Self::U8 => Value::Int(i64::from(num!(u8))),
            Self::I16 => Value::Int(i64::from(num!(i16))),
            Self::U16 => Value::Int(i64::from(num!(u16))),
            Self::I32 => Value::Int(i64::from(num!(i32))),
            Self::U32 => Value::Int(i64::from(num!(u32))),
            Self::I64 => Value::Int(num!(i64)),
            Self::U64 => {
                let v = num!(u64);
                i64::try_from(v).map_or(Value::Float(v as f64), Value::Int)
            }
            Self::F32 => Value::Float(f64::from(num!(f32))),
            Self::F64 => Value::Float(num!(f64)),
        })
    }
}

/// Binary record decoder; values are zipped against `keys` like
/// [`OrderedKeyDecoder`](super::OrderedKeyDecoder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedFormatDecoder {
    layout: String,
    order: ByteOrder,
    fields: Vec<Field>,
    size: usize,
    keys: Vec<String>,
}

impl FixedFormatDecoder {
    pub fn new<I, S>(layout: &str, keys: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let (order, fields) = parse_layout(layout)?;
        let size = fields.iter().map(|f| f.size()).sum();
        Ok(Self {
            layout: layout.to_owned(),
            order,
            fields,
            size,
            keys: keys.into_iter().map(Into::into).collect(),
        })
    }

    /// Exact payload length this layout accepts.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn layout(&self) -> &str {
        &self.layout
    }
}

impl Decoder for FixedFormatDecoder {
    fn decode(&self, payload: &[u8]) -> Result<DecodedUpdate, Error> {
        if payload.len() != self.size {
            return Err(Error::decode(format!(
                "layout {:?} expects {} bytes, got {}",
                self.layout,
                self.size,
                payload.len()
            )));
        }

        let mut values = Vec::with_capacity(self.fields.len());
        let mut offset = 0;
        for field in &self.fields {
            let end = offset + field.size();
            if *field != Field::Pad {
                let value = payload
                    .get(offset..end)
                    .and_then(|chunk| field.read(chunk, self.order))
                    .ok_or_else(|| Error::decode(format!("short field at offset {offset}")))?;
                values.push(value);
            }
            offset = end;
        }

        Ok(self
            .keys
            .iter()
            .zip(values)
            .map(|(key, value)| (key.clone(), vec![value]))
            .collect())
    }
}

fn parse_layout(layout: &str) -> Result<(ByteOrder, Vec<Field>), Error> {
    let mut chars = layout.trim().chars().peekable();
    let order = match chars.peek().copied() {
        Some('<') => Some(ByteOrder::Little),
        Some('>' | '!') => Some(ByteOrder::Big),
        Some('=' | '@') => Some(ByteOrder::NATIVE),
        _ => None,
    };
    if order.is_some() {
        chars.next();
    }
    let fields = parse_fields(chars)?;
    Ok((order.unwrap_or(ByteOrder::NATIVE), fields))
}

fn parse_fields(chars: impl Iterator<Item = char>) -> Result<Vec<Field>, Error> {
    let too_large =
        || Error::InvalidConfig(format!("layout describes more than {MAX_RECORD_SIZE} bytes"));
    let mut fields = Vec::new();
    let mut size = 0_usize;
    let mut count: Option<usize> = None;

    for c in chars {
        if c.is_whitespace() {
            continue;
        }
        if let Some(digit) = c.to_digit(10) {
            let digit = usize::try_from(digit).unwrap_or_default();
            let next = count
                .unwrap_or(0)
                .checked_mul(10)
                .and_then(|n| n.checked_add(digit))
                .filter(|n| *n <= MAX_RECORD_SIZE)
                .ok_or_else(too_large)?;
            count = Some(next);
            continue;
        }
        let field = Field::from_code(c)
            .ok_or_else(|| Error::InvalidConfig(format!("unknown layout code {c:?}")))?;
        let repeat = count.take().unwrap_or(1);
        size = field
            .size()
            .checked_mul(repeat)
            .and_then(|bytes| size.checked_add(bytes))
            .filter(|total| *total <= MAX_RECORD_SIZE)
            .ok_or_else(too_large)?;
        fields.extend(std::iter::repeat_n(field, repeat));
    }

    if count.is_some() {
        return Err(Error::InvalidConfig("layout ends with a dangling repeat count".into()));
    }
    if fields.iter().all(|f| *f == Field::Pad) {
        return Err(Error::InvalidConfig("layout has no value fields".into()));
    }
    Ok(fields)
}
