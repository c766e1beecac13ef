//! AMI block representation
//!
//! A block is one manager message: consecutive `Key: Value` lines closed
//! by an empty line. Responses, events and actions all share this shape.

use std::fmt;

/// One parsed AMI message.
///
/// Fields keep wire order. Lookups are case-insensitive because field
/// casing drifts between Asterisk releases (`Uniqueid` vs `UniqueID`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawBlock {
    fields: Vec<(String, String)>,
}

impl RawBlock {
    /// Create a new empty block
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    /// Parse a block from its text form, without the terminating empty line.
    ///
    /// Lines without a colon are skipped. Both `\r\n` and `\n` line endings
    /// are accepted.
    pub fn parse(raw: &str) -> Self {
        let mut block = Self::new();

        for line in raw.lines() {
            if let Some((key, value)) = line.split_once(':') {
                let key = key.trim();
                if key.is_empty() {
                    continue;
                }
                block.insert(key, value.trim());
            }
        }

        block
    }

    /// Insert a field. A repeated key replaces the earlier value in place.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();

        match self
            .fields
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(slot) => slot.1 = value,
            None => self.fields.push((key, value)),
        }
    }

    /// Builder-style [`insert`](Self::insert).
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Get a field value by name
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// First present, non-empty value among `names`.
    pub fn get_any(&self, names: &[&str]) -> Option<&str> {
        names
            .iter()
            .filter_map(|name| self.get(name))
            .find(|v| !v.is_empty())
    }

    /// Iterate fields in wire order
    pub fn fields(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    // Common AMI fields

    /// `Event` field of unsolicited events
    pub fn event_name(&self) -> Option<&str> {
        self.get("Event")
    }

    /// `Response` field of action replies
    pub fn response(&self) -> Option<&str> {
        self.get("Response")
    }

    pub fn action_id(&self) -> Option<&str> {
        self.get("ActionID")
    }

    pub fn message(&self) -> Option<&str> {
        self.get("Message")
    }

    /// Call identifier of the channel the block refers to
    pub fn unique_id(&self) -> Option<&str> {
        self.get_any(&["Uniqueid", "Uniqueid1"])
    }

    pub fn is_event(&self, name: &str) -> bool {
        self.event_name()
            .map_or(false, |n| n.eq_ignore_ascii_case(name))
    }

    /// Check if this is a successful action reply
    pub fn is_success(&self) -> bool {
        self.response()
            .map_or(false, |r| r.eq_ignore_ascii_case("Success"))
    }

    /// Check if this is a failed action reply
    pub fn is_error(&self) -> bool {
        self.response()
            .map_or(false, |r| r.eq_ignore_ascii_case("Error"))
    }
}

impl fmt::Display for RawBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RawBlock {{")?;

        if let Some(event) = self.event_name() {
            write!(f, " Event: {}", event)?;
        } else if let Some(response) = self.response() {
            write!(f, " Response: {}", response)?;
        }

        if let Some(id) = self.unique_id() {
            write!(f, ", Uniqueid: {}", id)?;
        }

        write!(f, ", Fields: {} }}", self.fields.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_block() {
        let block = RawBlock::parse("");
        assert!(block.is_empty());
    }

    #[test]
    fn test_parse_simple_event() {
        let block = RawBlock::parse("Event: Dial\r\nUniqueid: 111.22\r\n");

        assert_eq!(block.event_name(), Some("Dial"));
        assert_eq!(block.unique_id(), Some("111.22"));
        assert_eq!(block.len(), 2);
    }

    #[test]
    fn test_value_keeps_inner_colons() {
        let block = RawBlock::parse("Channel: SIP/3868-00000001\nAppData: a:b:c\n");
        assert_eq!(block.get("AppData"), Some("a:b:c"));
    }

    #[test]
    fn test_malformed_lines_skipped() {
        let block = RawBlock::parse("Asterisk Call Manager/5.0.1\nResponse: Success\n: orphan\n");

        assert_eq!(block.len(), 1);
        assert!(block.is_success());
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let block = RawBlock::parse("UniqueID: 42.1\n");
        assert_eq!(block.get("Uniqueid"), Some("42.1"));
        assert_eq!(block.unique_id(), Some("42.1"));
    }

    #[test]
    fn test_repeated_key_replaces_in_place() {
        let block = RawBlock::new()
            .with("Event", "DTMF")
            .with("Digit", "1")
            .with("digit", "2");

        let fields: Vec<_> = block.fields().collect();
        assert_eq!(fields, vec![("Event", "DTMF"), ("Digit", "2")]);
    }

    #[test]
    fn test_get_any_skips_empty() {
        let block = RawBlock::new().with("Dest", "").with("Exten", "3459");
        assert_eq!(block.get_any(&["Dest", "Exten"]), Some("3459"));
    }

    #[test]
    fn test_is_error() {
        let block = RawBlock::new()
            .with("Response", "Error")
            .with("Message", "Authentication failed");
        assert!(block.is_error());
        assert!(!block.is_success());
        assert_eq!(block.message(), Some("Authentication failed"));
    }
}
