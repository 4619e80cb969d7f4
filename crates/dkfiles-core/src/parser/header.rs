const EVENT_TYPE_PREFIX: &str = "# EventType:";
const DESCRIPTOR_PREFIX: &str = "# Descriptor:";
const NICKNAME_PREFIX: &str = "# NickName:";

/// Bookkeeping comment lines at the top of a decay file.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DecHeader {
    pub event_type: Option<String>,
    pub descriptor: Option<String>,
    pub nickname: Option<String>,
}

impl DecHeader {
    fn is_complete(&self) -> bool {
        self.event_type.is_some() && self.descriptor.is_some() && self.nickname.is_some()
    }
}

/// First occurrence of each header field wins.
pub fn read_header(source: &str) -> DecHeader {
    let mut header = DecHeader::default();

    for line in source.lines() {
        let line = line.trim();
        if let Some(value) = header_value(line, EVENT_TYPE_PREFIX) {
            header.event_type.get_or_insert(value);
        } else if let Some(value) = header_value(line, DESCRIPTOR_PREFIX) {
            header.descriptor.get_or_insert(value);
        } else if let Some(value) = header_value(line, NICKNAME_PREFIX) {
            header.nickname.get_or_insert(value);
        }

        if header.is_complete() {
            break;
        }
    }

    header
}

fn header_value(line: &str, prefix: &str) -> Option<String> {
    let value = line.strip_prefix(prefix)?.trim();
    (!value.is_empty()).then(|| value.to_string())
}
