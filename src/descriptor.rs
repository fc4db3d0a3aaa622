//! Message descriptors: the shared header, the payload carrier, and the
//! three discipline-specific descriptors (spec §3.4).

use crate::error::{IocError, IocResult};
use crate::ids::{CmdId, EvtId};
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Payloads up to this size live inline with zero heap allocation; larger
/// payloads spill to an owned heap buffer. See `SPEC_FULL.md` §3 for why
/// 64 was chosen (it mirrors the original's embedded-array sizing).
pub const INLINE_PAYLOAD_CAP: usize = 64;

/// Header carried by every message, for debug/trace purposes only (spec
/// §3.4). `seq` is monotonically increasing per link per direction.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MsgHeader {
    pub seq: u64,
    pub timestamp_us: u64,
}

impl MsgHeader {
    pub fn new(seq: u64) -> Self {
        let timestamp_us = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_micros() as u64)
            .unwrap_or(0);
        MsgHeader { seq, timestamp_us }
    }
}

/// A tagged sum type carrying either a small inline buffer or an owned
/// heap buffer — the design note in `spec.md` §9 ("Union-with-tag
/// payload carrier") made concrete: the storage arm is an explicit enum
/// variant, never a "which size is zero" convention.
#[derive(Debug, Clone)]
pub enum PayloadCarrier {
    Inline { buf: [u8; INLINE_PAYLOAD_CAP], len: u8 },
    Heap(Vec<u8>),
}

// Hand-written impls stand in for `#[derive(Serialize, Deserialize)]`:
// serde's built-in array support only covers a fixed set of lengths, which
// does not include `INLINE_PAYLOAD_CAP` (64). The inline buffer is encoded
// as a byte sequence instead, keeping both arms' wire shape equivalent to
// what the derive would have produced for a `Vec<u8>`-backed field.
impl Serialize for PayloadCarrier {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeTupleVariant;
        match self {
            PayloadCarrier::Inline { buf, len } => {
                let mut tv = serializer.serialize_tuple_variant("PayloadCarrier", 0, "Inline", 2)?;
                tv.serialize_field(&buf.as_slice())?;
                tv.serialize_field(len)?;
                tv.end()
            }
            PayloadCarrier::Heap(v) => {
                let mut tv = serializer.serialize_tuple_variant("PayloadCarrier", 1, "Heap", 1)?;
                tv.serialize_field(v)?;
                tv.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for PayloadCarrier {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use serde::de::{EnumAccess, Error, VariantAccess, Visitor};
        use std::fmt;

        enum Field {
            Inline,
            Heap,
        }

        struct FieldVisitor;
        impl<'de> Visitor<'de> for FieldVisitor {
            type Value = Field;
            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("`Inline` or `Heap`")
            }
            fn visit_u64<E: Error>(self, v: u64) -> Result<Field, E> {
                match v {
                    0 => Ok(Field::Inline),
                    1 => Ok(Field::Heap),
                    _ => Err(Error::invalid_value(serde::de::Unexpected::Unsigned(v), &self)),
                }
            }
            fn visit_str<E: Error>(self, v: &str) -> Result<Field, E> {
                match v {
                    "Inline" => Ok(Field::Inline),
                    "Heap" => Ok(Field::Heap),
                    _ => Err(Error::unknown_variant(v, &["Inline", "Heap"])),
                }
            }
        }
        impl<'de> Deserialize<'de> for Field {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                deserializer.deserialize_identifier(FieldVisitor)
            }
        }

        struct PayloadCarrierVisitor;
        impl<'de> Visitor<'de> for PayloadCarrierVisitor {
            type Value = PayloadCarrier;
            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("enum PayloadCarrier")
            }
            fn visit_enum<A>(self, data: A) -> Result<PayloadCarrier, A::Error>
            where
                A: EnumAccess<'de>,
            {
                match data.variant()? {
                    (Field::Inline, variant) => {
                        let (buf_vec, len): (Vec<u8>, u8) = variant.tuple_variant(
                            2,
                            InlineFieldsVisitor,
                        )?;
                        if buf_vec.len() != INLINE_PAYLOAD_CAP {
                            return Err(A::Error::custom("invalid inline buffer length"));
                        }
                        let mut buf = [0u8; INLINE_PAYLOAD_CAP];
                        buf.copy_from_slice(&buf_vec);
                        Ok(PayloadCarrier::Inline { buf, len })
                    }
                    (Field::Heap, variant) => {
                        let v: Vec<u8> = variant.newtype_variant()?;
                        Ok(PayloadCarrier::Heap(v))
                    }
                }
            }
        }

        struct InlineFieldsVisitor;
        impl<'de> Visitor<'de> for InlineFieldsVisitor {
            type Value = (Vec<u8>, u8);
            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("tuple of (buf, len)")
            }
            fn visit_seq<A>(self, mut seq: A) -> Result<(Vec<u8>, u8), A::Error>
            where
                A: serde::de::SeqAccess<'de>,
            {
                let buf: Vec<u8> = seq
                    .next_element()?
                    .ok_or_else(|| Error::invalid_length(0, &self))?;
                let len: u8 = seq
                    .next_element()?
                    .ok_or_else(|| Error::invalid_length(1, &self))?;
                Ok((buf, len))
            }
        }

        deserializer.deserialize_enum("PayloadCarrier", &["Inline", "Heap"], PayloadCarrierVisitor)
    }
}

impl Default for PayloadCarrier {
    fn default() -> Self {
        PayloadCarrier::Inline {
            buf: [0u8; INLINE_PAYLOAD_CAP],
            len: 0,
        }
    }
}

impl PayloadCarrier {
    /// Copy `bytes` into the carrier, choosing the storage arm by size.
    /// The caller's slice is never retained by reference (spec §3.4:
    /// "Setter copies caller bytes in").
    pub fn set(&mut self, bytes: &[u8]) {
        if bytes.len() <= INLINE_PAYLOAD_CAP {
            let mut buf = [0u8; INLINE_PAYLOAD_CAP];
            buf[..bytes.len()].copy_from_slice(bytes);
            *self = PayloadCarrier::Inline {
                buf,
                len: bytes.len() as u8,
            };
        } else {
            *self = PayloadCarrier::Heap(bytes.to_vec());
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut carrier = PayloadCarrier::default();
        carrier.set(bytes);
        carrier
    }

    /// Borrowed view of the payload; the reader does not need to know
    /// which storage arm is active.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            PayloadCarrier::Inline { buf, len } => &buf[..*len as usize],
            PayloadCarrier::Heap(v) => v.as_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// EvtDesc = header + EvtID + one opaque 64-bit value slot. Events are
/// intentionally narrow — no payload (spec §3.4).
#[derive(Debug, Clone)]
pub struct EvtDesc {
    pub header: MsgHeader,
    pub evt_id: EvtId,
    pub value: u64,
}

impl EvtDesc {
    pub fn new(evt_id: EvtId) -> Self {
        EvtDesc {
            header: MsgHeader::new(0),
            evt_id,
            value: 0,
        }
    }

    pub fn with_value(mut self, value: u64) -> Self {
        self.value = value;
        self
    }
}

/// Command execution status, set by the executor side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmdStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Timeout,
}

/// CmdDesc = header + CmdID + input/output payload + status + result +
/// timeout + optional user context (spec §3.4).
#[derive(Debug, Clone)]
pub struct CmdDesc {
    pub header: MsgHeader,
    pub cmd_id: CmdId,
    pub status: CmdStatus,
    pub result: Option<IocError>,
    pub in_payload: PayloadCarrier,
    pub out_payload: PayloadCarrier,
    /// 0 means "no descriptor-level timeout"; the per-call `Options`
    /// timeout takes precedence over this when both are set (spec §4.8
    /// step 3).
    pub timeout_ms: u64,
}

impl CmdDesc {
    pub fn new(cmd_id: CmdId) -> Self {
        CmdDesc {
            header: MsgHeader::new(0),
            cmd_id,
            status: CmdStatus::Pending,
            result: None,
            in_payload: PayloadCarrier::default(),
            out_payload: PayloadCarrier::default(),
            timeout_ms: 0,
        }
    }

    pub fn with_input(mut self, bytes: &[u8]) -> Self {
        self.in_payload.set(bytes);
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    pub fn set_output(&mut self, bytes: &[u8]) {
        self.out_payload.set(bytes);
    }

    pub fn complete_success(&mut self, out: &[u8]) {
        self.set_output(out);
        self.status = CmdStatus::Success;
        self.result = None;
    }

    pub fn complete_failed(&mut self, err: IocError) {
        self.status = CmdStatus::Failed;
        self.result = Some(err);
    }
}

/// Data-stream status, reported on the descriptor used by `recv_dat`'s
/// polling path and the callback path alike (spec §3.4, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DatStatus {
    StreamReady,
    Sending,
    Receiving,
    StreamClosed,
    StreamError,
}

/// DatDesc = header + stream status + result + payload (spec §3.4).
#[derive(Debug, Clone)]
pub struct DatDesc {
    pub header: MsgHeader,
    pub status: DatStatus,
    pub result: Option<IocError>,
    pub payload: PayloadCarrier,
}

impl DatDesc {
    pub fn new(bytes: &[u8]) -> Self {
        DatDesc {
            header: MsgHeader::new(0),
            status: DatStatus::StreamReady,
            result: None,
            payload: PayloadCarrier::from_bytes(bytes),
        }
    }
}

/// Wire-format structs exchanged by the TCP transport. These are the
/// only types that ever touch `bincode`; the in-process FIFO transport
/// moves `EvtDesc`/`CmdDesc`/`DatDesc` directly through channels with no
/// serialization (spec §4.3's "zero-copy message hand-off").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEvt {
    pub header: MsgHeader,
    pub evt_id: u64,
    pub value: u64,
}

impl From<&EvtDesc> for WireEvt {
    fn from(d: &EvtDesc) -> Self {
        WireEvt {
            header: d.header,
            evt_id: d.evt_id.packed(),
            value: d.value,
        }
    }
}

impl From<WireEvt> for EvtDesc {
    fn from(w: WireEvt) -> Self {
        EvtDesc {
            header: w.header,
            evt_id: EvtId::from_packed(w.evt_id),
            value: w.value,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireCmd {
    pub header: MsgHeader,
    pub cmd_id: u64,
    pub status: CmdStatus,
    pub result_is_err: bool,
    pub in_payload: Vec<u8>,
    pub out_payload: Vec<u8>,
    pub timeout_ms: u64,
}

impl From<&CmdDesc> for WireCmd {
    fn from(d: &CmdDesc) -> Self {
        WireCmd {
            header: d.header,
            cmd_id: d.cmd_id.packed(),
            status: d.status,
            result_is_err: d.result.is_some(),
            in_payload: d.in_payload.as_slice().to_vec(),
            out_payload: d.out_payload.as_slice().to_vec(),
            timeout_ms: d.timeout_ms,
        }
    }
}

impl From<WireCmd> for CmdDesc {
    fn from(w: WireCmd) -> Self {
        let mut d = CmdDesc::new(CmdId::from_packed(w.cmd_id));
        d.header = w.header;
        d.status = w.status;
        d.in_payload.set(&w.in_payload);
        d.out_payload.set(&w.out_payload);
        d.timeout_ms = w.timeout_ms;
        if w.result_is_err {
            d.result = Some(IocError::CmdExecFailed);
        }
        d
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireDat {
    pub header: MsgHeader,
    pub status: DatStatus,
    pub payload: Vec<u8>,
}

impl From<&DatDesc> for WireDat {
    fn from(d: &DatDesc) -> Self {
        WireDat {
            header: d.header,
            status: d.status,
            payload: d.payload.as_slice().to_vec(),
        }
    }
}

impl From<WireDat> for DatDesc {
    fn from(w: WireDat) -> Self {
        DatDesc {
            header: w.header,
            status: w.status,
            result: None,
            payload: PayloadCarrier::from_bytes(&w.payload),
        }
    }
}

pub fn encode<T: Serialize>(value: &T) -> IocResult<Vec<u8>> {
    bincode::serialize(value).map_err(IocError::from)
}

pub fn decode<T: for<'de> Deserialize<'de>>(bytes: &[u8]) -> IocResult<T> {
    bincode::deserialize(bytes).map_err(IocError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_round_trip_inline_and_heap() {
        for len in [0usize, 1, 63, 64, 65, 1024, 1 << 20] {
            let data: Vec<u8> = (0..len).map(|i| (i % 256) as u8).collect();
            let carrier = PayloadCarrier::from_bytes(&data);
            assert_eq!(carrier.as_slice(), data.as_slice());
            match &carrier {
                PayloadCarrier::Inline { .. } => assert!(len <= INLINE_PAYLOAD_CAP),
                PayloadCarrier::Heap(_) => assert!(len > INLINE_PAYLOAD_CAP),
            }
        }
    }

    #[test]
    fn wire_cmd_round_trips_through_bincode() {
        let mut d = CmdDesc::new(CmdId::new(1, 2)).with_input(b"PING").with_timeout_ms(500);
        d.complete_success(b"PONG");
        let wire = WireCmd::from(&d);
        let bytes = encode(&wire).unwrap();
        let back: WireCmd = decode(&bytes).unwrap();
        let desc: CmdDesc = back.into();
        assert_eq!(desc.out_payload.as_slice(), b"PONG");
        assert_eq!(desc.cmd_id, d.cmd_id);
    }
}
