use crate::decode::{Decoder, utf8};
use crate::error::Error;
use crate::value::{DecodedUpdate, Value};

/// Delimited text zipped positionally against a declared key list.
///
/// Surplus fields are dropped, missing trailing fields stay unassigned,
/// and values are left as text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedKeyDecoder {
    keys: Vec<String>,
    separator: String,
}

impl OrderedKeyDecoder {
    pub fn new<I, S>(keys: I, separator: impl Into<String>) -> Result<Self, Error>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let separator = separator.into();
        if separator.is_empty() {
            return Err(Error::InvalidConfig("separator must not be empty".into()));
        }
        Ok(Self {
            keys: keys.into_iter().map(Into::into).collect(),
            separator,
        })
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }
}

impl Decoder for OrderedKeyDecoder {
    fn decode(&self, payload: &[u8]) -> Result<DecodedUpdate, Error> {
        let text = utf8(payload)?.trim();
        Ok(self
            .keys
            .iter()
            .zip(text.split(self.separator.as_str()))
            .map(|(key, field)| (key.clone(), vec![Value::from(field)]))
            .collect())
    }
}
