use crate::config::Credentials;
use crate::output::OutputMessage;
use crate::parser::{ArraySink, ObjectSink, ParseResult, Span, Walker};
use crate::trie::FieldTrie;

/// Fields sampled out of every inner order object, in reply order.
const ORDER_FIELDS: [&str; FIELD_COUNT] = ["ordId", "side", "px", "sz", "state", "uTime"];

/// Keys the sampled fields are re-emitted under, pre-quoted.
const REPLY_KEYS: [&str; FIELD_COUNT] = [
    r#""orderId""#,
    r#""side""#,
    r#""price""#,
    r#""volume""#,
    r#""state""#,
    r#""uTime""#,
];

const ENVELOPE_FIELDS: [&str; 1] = ["data"];

pub const FIELD_COUNT: usize = 6;

const ORD_ID: usize = 0;
const STATE: usize = 4;

/// Committed records kept per inbound message; later commits are dropped.
pub const MAX_RECORDS: usize = 16;

/// Field samples of one inner order object: a span per field id plus a
/// presence mask. Spans index into the message the records were extracted
/// from and are only meaningful next to that message's bytes.
#[derive(Clone, Copy)]
pub struct OrderRecord {
    begin: [usize; FIELD_COUNT],
    end: [usize; FIELD_COUNT],
    mask: u8,
}

impl OrderRecord {
    fn empty() -> OrderRecord {
        OrderRecord {
            begin: [0; FIELD_COUNT],
            end: [0; FIELD_COUNT],
            mask: 0,
        }
    }

    fn reset(&mut self) {
        self.mask = 0;
    }

    fn set(&mut self, field_id: usize, value: Span) {
        self.begin[field_id] = value.begin;
        self.end[field_id] = value.end;
        self.mask |= 1 << field_id;
    }

    pub fn mask(&self) -> u8 {
        self.mask
    }

    pub fn field<'a>(&self, doc: &'a [u8], field_id: usize) -> Option<&'a [u8]> {
        if self.mask >> field_id & 1 == 0 {
            return None;
        }
        Some(&doc[self.begin[field_id]..self.end[field_id]])
    }

    /// Numeric id used for duplicate suppression: the decimal value of the
    /// `ordId` bytes, shifted into a separate namespace when the order state
    /// starts with `c` (cancelled), so live and cancelled events for the same
    /// order occupy different ring slots.
    pub fn order_id(&self, doc: &[u8]) -> u64 {
        if self.mask >> ORD_ID & 1 == 0 {
            return 0;
        }
        let mut id: u64 = 0;
        for &byte in &doc[self.begin[ORD_ID]..self.end[ORD_ID]] {
            id = id.wrapping_mul(10).wrapping_add(byte.wrapping_sub(b'0') as u64);
        }
        // The state value is a raw quoted span, so its second byte is the
        // first letter of the state name.
        if self.mask >> STATE & 1 == 1
            && self.end[STATE] - self.begin[STATE] >= 2
            && doc[self.begin[STATE] + 1] == b'c'
        {
            id = id.wrapping_mul(10);
        }
        id
    }
}

/// Fixed-capacity set of committed records plus one working slot.
pub struct RecordSet {
    records: [OrderRecord; MAX_RECORDS + 1],
    committed: usize,
}

impl RecordSet {
    pub fn new() -> RecordSet {
        RecordSet {
            records: [OrderRecord::empty(); MAX_RECORDS + 1],
            committed: 0,
        }
    }

    pub fn clear(&mut self) {
        self.committed = 0;
        self.records[0].reset();
    }

    pub fn len(&self) -> usize {
        self.committed
    }

    pub fn is_empty(&self) -> bool {
        self.committed == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &OrderRecord> + '_ {
        self.records[..self.committed].iter()
    }

    fn current(&mut self) -> &mut OrderRecord {
        &mut self.records[self.committed]
    }

    /// Commits the working record if it captured anything, then starts a
    /// fresh one. A full set drops the record instead.
    fn finish_current(&mut self) {
        if self.records[self.committed].mask != 0 && self.committed < MAX_RECORDS {
            self.committed += 1;
        }
        self.records[self.committed].reset();
    }
}

impl Default for RecordSet {
    fn default() -> Self {
        Self::new()
    }
}

/// Innermost callback layer: samples the registered fields of one order
/// object into the working record.
struct OrderObjectSink<'t, 'r> {
    ids: &'t FieldTrie,
    records: &'r mut RecordSet,
}

impl ObjectSink for OrderObjectSink<'_, '_> {
    fn id_map(&self) -> &FieldTrie {
        self.ids
    }

    fn value_for_field(&mut self, field_id: i32, mut value: Span) {
        if field_id < 0 {
            return;
        }
        // ordId always arrives quoted; the outer quotes are trimmed here so
        // the reply can emit it as a bare number.
        if field_id as usize == ORD_ID {
            value.begin += 1;
            value.end -= 1;
        }
        self.records.current().set(field_id as usize, value);
    }

    fn will_parse_object(&mut self, _field_id: i32) -> Option<&mut dyn ObjectSink> {
        None
    }

    fn will_parse_array(&mut self, _field_id: i32) -> Option<&mut dyn ArraySink> {
        None
    }

    fn object_finished(&mut self) {
        self.records.finish_current();
    }
}

/// Middle layer: every element of the `data` array is an order object.
struct OrdersArraySink<'t, 'r> {
    object: OrderObjectSink<'t, 'r>,
}

impl ArraySink for OrdersArraySink<'_, '_> {
    fn will_parse_object(&mut self) -> Option<&mut dyn ObjectSink> {
        Some(&mut self.object)
    }

    fn will_parse_array(&mut self) -> Option<&mut dyn ArraySink> {
        None
    }

    fn next_value(&mut self, _value: Span) {}

    fn array_finished(&mut self) {}
}

/// Outermost layer: only the `data` key of the venue envelope is descended
/// into, everything else is walked blind.
struct EnvelopeSink<'t, 'r> {
    ids: &'t FieldTrie,
    orders: OrdersArraySink<'t, 'r>,
}

impl ObjectSink for EnvelopeSink<'_, '_> {
    fn id_map(&self) -> &FieldTrie {
        self.ids
    }

    fn value_for_field(&mut self, _field_id: i32, _value: Span) {}

    fn will_parse_object(&mut self, _field_id: i32) -> Option<&mut dyn ObjectSink> {
        None
    }

    fn will_parse_array(&mut self, field_id: i32) -> Option<&mut dyn ArraySink> {
        if field_id == 0 {
            Some(&mut self.orders)
        } else {
            None
        }
    }

    fn object_finished(&mut self) {}
}

/// Field extraction and reply assembly for the venue's order envelope.
///
/// Built once and shared read-only across all connection workers; the tries
/// inside are immutable after construction.
pub struct Pipeline {
    envelope_ids: FieldTrie,
    order_ids: FieldTrie,
    unknown_ids: FieldTrie,
    reply_suffix: String,
}

impl Pipeline {
    pub fn new(credentials: &Credentials) -> Pipeline {
        Pipeline {
            envelope_ids: FieldTrie::new(&ENVELOPE_FIELDS),
            order_ids: FieldTrie::new(&ORDER_FIELDS),
            unknown_ids: FieldTrie::new(&[]),
            reply_suffix: format!(
                r#","apiKey":"{}","sign":"{}"}}"#,
                credentials.api_key, credentials.sign
            ),
        }
    }

    /// Walks one normalized message and collects order records. Spans inside
    /// `records` index into `doc`.
    pub fn extract(&self, doc: &[u8], records: &mut RecordSet) -> ParseResult {
        records.clear();
        let mut envelope = EnvelopeSink {
            ids: &self.envelope_ids,
            orders: OrdersArraySink {
                object: OrderObjectSink {
                    ids: &self.order_ids,
                    records,
                },
            },
        };
        Walker::new(doc, &self.unknown_ids).parse_object(Some(&mut envelope))
    }

    /// Assembles one reply payload in place in `out`: the present fields in
    /// id order, re-keyed, raw bytes passed through, then the credential
    /// suffix. Returns false (leaving `out` untouched) if the reply would not
    /// fit.
    pub fn write_reply(&self, doc: &[u8], record: &OrderRecord, out: &mut OutputMessage) -> bool {
        let mut needed = self.reply_suffix.len();
        for field_id in 0..FIELD_COUNT {
            if let Some(raw) = record.field(doc, field_id) {
                needed += 2 + REPLY_KEYS[field_id].len() + raw.len();
            }
        }
        if needed > out.remaining() {
            return false;
        }
        let mut prefix = b'{';
        for field_id in 0..FIELD_COUNT {
            if let Some(raw) = record.field(doc, field_id) {
                out.push(prefix);
                prefix = b',';
                out.push_str(REPLY_KEYS[field_id]);
                out.push(b':');
                out.push_slice(raw);
            }
        }
        out.push_str(&self.reply_suffix);
        true
    }
}
