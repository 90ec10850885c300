use crate::decode::{Decoder, utf8};
use crate::error::Error;
use crate::value::{DecodedUpdate, Value};

/// Free-text dispatch messages: `"<id> <value...>[, <id> <value...>]"`.
///
/// Empty segments are skipped; values stay textual. The same id may
/// appear in several segments of one message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommandDecoder;

impl Decoder for CommandDecoder {
    fn decode(&self, payload: &[u8]) -> Result<DecodedUpdate, Error> {
        let text = utf8(payload)?;
        let mut update = DecodedUpdate::new();
        for segment in text.split(',') {
            let mut words = segment.split_whitespace();
            let Some(id) = words.next() else {
                continue;
            };
            update.push(id, words.map(Value::from).collect());
        }
        Ok(update)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn splits_segments_and_words() {
        let update = CommandDecoder
            .decode(b"speed 42, grid temp motor 71.5 ,, status running")
            .unwrap();

        assert_eq!(update.ids().collect::<Vec<_>>(), vec!["speed", "grid", "status"]);
        assert_eq!(
            update.get("grid").unwrap(),
            &[Value::from("temp"), Value::from("motor"), Value::from("71.5")]
        );
    }

    #[test]
    fn bare_id_has_no_values() {
        let update = CommandDecoder.decode(b"ping").unwrap();
        assert_eq!(update.get("ping").unwrap(), &[] as &[Value]);
    }

    #[test]
    fn repeated_ids_are_kept() {
        let update = CommandDecoder.decode(b"t a x 1, t b x 2").unwrap();
        assert_eq!(update.len(), 2);
    }
}
