use std::borrow::Cow;
use std::collections::BTreeMap;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize};

use crate::field::Field;
use crate::value::FieldValue;

/// One decoded beacon.
///
/// Known protocol fields are keyed by [`Field`], everything else by its raw
/// name. Immutable once built: the only way in is the builder or one of the
/// wire decoders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeaconRecord {
    known: BTreeMap<Field, FieldValue>,
    unknown: BTreeMap<String, FieldValue>,
}

impl BeaconRecord {
    pub fn builder() -> BeaconRecordBuilder {
        BeaconRecordBuilder::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<FieldValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        let mut record = Self::default();
        for (k, v) in pairs {
            record.insert(k.into(), v.into());
        }
        record
    }

    /// Decode `a=1&b=2` (Transport A query string or Transport B body).
    ///
    /// Never fails: bad escapes and invalid UTF-8 keep the raw text, pairs
    /// without `=` decode to an empty value, empty keys are skipped and a
    /// repeated key keeps its last value.
    pub fn from_query_string(qs: &str) -> Self {
        let mut record = Self::default();
        for pair in qs.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = decode_component(raw_key);
            if key.is_empty() {
                tracing::debug!(pair = %pair, "skipping beacon pair with empty key");
                continue;
            }
            record.insert(key, FieldValue::Text(decode_component(raw_value)));
        }
        record
    }

    /// Decode a URL-encoded POST body.
    pub fn from_form_body(body: &[u8]) -> Self {
        Self::from_query_string(&String::from_utf8_lossy(body))
    }

    /// Decode the query part of a beacon URL. A URL without `?` yields an
    /// empty record.
    pub fn from_url(url: &str) -> Self {
        match url.split_once('?') {
            Some((_, query)) => {
                let query = query.split_once('#').map_or(query, |(q, _)| q);
                Self::from_query_string(query)
            }
            None => Self::default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        match Field::from_name(name) {
            Some(field) => self.known.get(&field),
            None => self.unknown.get(name),
        }
    }

    pub fn get_field(&self, field: Field) -> Option<&FieldValue> {
        self.known.get(&field)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn has_field(&self, field: Field) -> bool {
        self.known.contains_key(&field)
    }

    /// Early beacons carry the `early` marker.
    pub fn is_early(&self) -> bool {
        self.has_field(Field::Early)
    }

    pub fn unknown(&self) -> &BTreeMap<String, FieldValue> {
        &self.unknown
    }

    /// All fields: known ones in taxonomy order, then unknown ones by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.known
            .iter()
            .map(|(f, v)| (f.name(), v))
            .chain(self.unknown.iter().map(|(k, v)| (k.as_str(), v)))
    }

    pub fn len(&self) -> usize {
        self.known.len() + self.unknown.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty() && self.unknown.is_empty()
    }

    fn insert(&mut self, name: String, value: FieldValue) {
        match Field::from_name(&name) {
            Some(field) => {
                self.known.insert(field, value);
            }
            None => {
                self.unknown.insert(name, value);
            }
        }
    }
}

/// Builds records for fixtures and event payloads.
#[derive(Debug, Default)]
pub struct BeaconRecordBuilder {
    record: BeaconRecord,
}

impl BeaconRecordBuilder {
    pub fn set(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.record.insert(name.into(), value.into());
        self
    }

    pub fn field(self, field: Field, value: impl Into<FieldValue>) -> Self {
        self.set(field.name(), value)
    }

    pub fn build(self) -> BeaconRecord {
        self.record
    }
}

impl Serialize for BeaconRecord {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (k, v) in self.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for BeaconRecord {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = BTreeMap::<String, FieldValue>::deserialize(deserializer)?;
        Ok(Self::from_pairs(raw))
    }
}

fn decode_component(raw: &str) -> String {
    let spaced: Cow<'_, str> = if raw.contains('+') {
        Cow::Owned(raw.replace('+', " "))
    } else {
        Cow::Borrowed(raw)
    };
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(e) => {
            tracing::debug!(
                component = %raw,
                error = %e,
                "beacon component is not UTF-8, keeping raw text"
            );
            spaced.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_query_string_into_known_and_unknown() {
        let r = BeaconRecord::from_query_string("pid=p1&rt.sl=2&u=http%3A%2F%2Fa.b%2F%3Fx%3D1&custom=a+b");
        assert_eq!(r.get_field(Field::Pid), Some(&FieldValue::from("p1")));
        assert_eq!(r.get("rt.sl"), Some(&FieldValue::from("2")));
        assert_eq!(r.get("u"), Some(&FieldValue::from("http://a.b/?x=1")));
        assert_eq!(r.get("custom"), Some(&FieldValue::from("a b")));
        assert_eq!(r.unknown().len(), 1);
        assert_eq!(r.len(), 4);
    }

    #[test]
    fn malformed_pairs_degrade() {
        let r = BeaconRecord::from_query_string("early&=x&&t_done=%zz&pid=a&pid=b&bad=%FF");
        assert_eq!(r.get("early"), Some(&FieldValue::from("")));
        assert!(r.is_early());
        assert_eq!(r.get("t_done"), Some(&FieldValue::from("%zz")));
        assert_eq!(r.get("pid"), Some(&FieldValue::from("b")));
        assert_eq!(r.get("bad"), Some(&FieldValue::from("%FF")));
        assert_eq!(r.len(), 4);
    }

    #[test]
    fn decodes_url_and_body() {
        let r = BeaconRecord::from_url("/beacon?h.t=1700&pid=x#frag");
        assert_eq!(r.get("h.t"), Some(&FieldValue::from("1700")));
        assert_eq!(r.get("pid"), Some(&FieldValue::from("x")));
        assert!(BeaconRecord::from_url("/beacon").is_empty());

        let r = BeaconRecord::from_form_body(b"t_other=custom_a%7C2%2Cb%7C3");
        assert_eq!(r.get("t_other"), Some(&FieldValue::from("custom_a|2,b|3")));
    }

    #[test]
    fn json_shape_is_flat() {
        let r = BeaconRecord::builder()
            .set("pid", "p1")
            .field(Field::TDone, 120)
            .set("x.custom", true)
            .build();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json, serde_json::json!({"pid": "p1", "t_done": 120, "x.custom": true}));

        let back: BeaconRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, r);
    }
}
