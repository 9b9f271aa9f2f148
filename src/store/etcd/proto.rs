//! Wire-format etcd v3 messages.
//!
//! Hand-written `prost::Message` implementations for the subset of
//! `etcdserverpb` the backend speaks, so no proto codegen is needed at build
//! time. Fields the backend never reads are skipped on decode.

use prost::bytes::{Buf, BufMut};
use prost::encoding::{self, DecodeContext, WireType};
use prost::{DecodeError, Message};

/// `Compare.CompareResult.EQUAL`.
pub const COMPARE_EQUAL: i32 = 0;

/// `Compare.CompareTarget.CREATE`.
pub const COMPARE_TARGET_CREATE: i32 = 1;

// ============================================================================
// ResponseHeader
// ============================================================================

/// etcdserverpb.ResponseHeader.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct ResponseHeader {
    pub cluster_id: u64, // 1
    pub member_id: u64,  // 2
    pub revision: i64,   // 3
    pub raft_term: u64,  // 4
}

impl Message for ResponseHeader {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        if self.cluster_id != 0 {
            encoding::uint64::encode(1, &self.cluster_id, buf);
        }
        if self.member_id != 0 {
            encoding::uint64::encode(2, &self.member_id, buf);
        }
        if self.revision != 0 {
            encoding::int64::encode(3, &self.revision, buf);
        }
        if self.raft_term != 0 {
            encoding::uint64::encode(4, &self.raft_term, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        match tag {
            1 => encoding::uint64::merge(wire_type, &mut self.cluster_id, buf, ctx),
            2 => encoding::uint64::merge(wire_type, &mut self.member_id, buf, ctx),
            3 => encoding::int64::merge(wire_type, &mut self.revision, buf, ctx),
            4 => encoding::uint64::merge(wire_type, &mut self.raft_term, buf, ctx),
            _ => encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if self.cluster_id != 0 {
            len += encoding::uint64::encoded_len(1, &self.cluster_id);
        }
        if self.member_id != 0 {
            len += encoding::uint64::encoded_len(2, &self.member_id);
        }
        if self.revision != 0 {
            len += encoding::int64::encoded_len(3, &self.revision);
        }
        if self.raft_term != 0 {
            len += encoding::uint64::encoded_len(4, &self.raft_term);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Merge an optional header submessage.
fn merge_header(
    header: &mut Option<ResponseHeader>,
    wire_type: WireType,
    buf: &mut impl Buf,
    ctx: DecodeContext,
) -> Result<(), DecodeError> {
    let mut value = header.take().unwrap_or_default();
    encoding::message::merge(wire_type, &mut value, buf, ctx)?;
    *header = Some(value);
    Ok(())
}

// ============================================================================
// KeyValue
// ============================================================================

/// mvccpb.KeyValue, reduced to the fields the backend inspects.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct KeyValue {
    pub key: Vec<u8>,         // 1
    pub create_revision: i64, // 2
    pub mod_revision: i64,    // 3
    pub version: i64,         // 4
    pub value: Vec<u8>,       // 5
}

impl Message for KeyValue {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        if !self.key.is_empty() {
            encoding::bytes::encode(1, &self.key, buf);
        }
        if self.create_revision != 0 {
            encoding::int64::encode(2, &self.create_revision, buf);
        }
        if self.mod_revision != 0 {
            encoding::int64::encode(3, &self.mod_revision, buf);
        }
        if self.version != 0 {
            encoding::int64::encode(4, &self.version, buf);
        }
        if !self.value.is_empty() {
            encoding::bytes::encode(5, &self.value, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        match tag {
            1 => encoding::bytes::merge(wire_type, &mut self.key, buf, ctx),
            2 => encoding::int64::merge(wire_type, &mut self.create_revision, buf, ctx),
            3 => encoding::int64::merge(wire_type, &mut self.mod_revision, buf, ctx),
            4 => encoding::int64::merge(wire_type, &mut self.version, buf, ctx),
            5 => encoding::bytes::merge(wire_type, &mut self.value, buf, ctx),
            _ => encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if !self.key.is_empty() {
            len += encoding::bytes::encoded_len(1, &self.key);
        }
        if self.create_revision != 0 {
            len += encoding::int64::encoded_len(2, &self.create_revision);
        }
        if self.mod_revision != 0 {
            len += encoding::int64::encoded_len(3, &self.mod_revision);
        }
        if self.version != 0 {
            len += encoding::int64::encoded_len(4, &self.version);
        }
        if !self.value.is_empty() {
            len += encoding::bytes::encoded_len(5, &self.value);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Range
// ============================================================================

/// etcdserverpb.RangeRequest, reduced to key selection and projection.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct RangeRequest {
    pub key: Vec<u8>,       // 1
    pub range_end: Vec<u8>, // 2
    pub limit: i64,         // 3
    pub keys_only: bool,    // 8
    pub count_only: bool,   // 9
}

impl Message for RangeRequest {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        if !self.key.is_empty() {
            encoding::bytes::encode(1, &self.key, buf);
        }
        if !self.range_end.is_empty() {
            encoding::bytes::encode(2, &self.range_end, buf);
        }
        if self.limit != 0 {
            encoding::int64::encode(3, &self.limit, buf);
        }
        if self.keys_only {
            encoding::bool::encode(8, &self.keys_only, buf);
        }
        if self.count_only {
            encoding::bool::encode(9, &self.count_only, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        match tag {
            1 => encoding::bytes::merge(wire_type, &mut self.key, buf, ctx),
            2 => encoding::bytes::merge(wire_type, &mut self.range_end, buf, ctx),
            3 => encoding::int64::merge(wire_type, &mut self.limit, buf, ctx),
            8 => encoding::bool::merge(wire_type, &mut self.keys_only, buf, ctx),
            9 => encoding::bool::merge(wire_type, &mut self.count_only, buf, ctx),
            _ => encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if !self.key.is_empty() {
            len += encoding::bytes::encoded_len(1, &self.key);
        }
        if !self.range_end.is_empty() {
            len += encoding::bytes::encoded_len(2, &self.range_end);
        }
        if self.limit != 0 {
            len += encoding::int64::encoded_len(3, &self.limit);
        }
        if self.keys_only {
            len += encoding::bool::encoded_len(8, &self.keys_only);
        }
        if self.count_only {
            len += encoding::bool::encoded_len(9, &self.count_only);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// etcdserverpb.RangeResponse.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct RangeResponse {
    pub header: Option<ResponseHeader>, // 1
    pub kvs: Vec<KeyValue>,             // 2
    pub more: bool,                     // 3
    pub count: i64,                     // 4
}

impl Message for RangeResponse {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        if let Some(ref header) = self.header {
            encoding::message::encode(1, header, buf);
        }
        for kv in &self.kvs {
            encoding::message::encode(2, kv, buf);
        }
        if self.more {
            encoding::bool::encode(3, &self.more, buf);
        }
        if self.count != 0 {
            encoding::int64::encode(4, &self.count, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        match tag {
            1 => merge_header(&mut self.header, wire_type, buf, ctx),
            2 => encoding::message::merge_repeated(wire_type, &mut self.kvs, buf, ctx),
            3 => encoding::bool::merge(wire_type, &mut self.more, buf, ctx),
            4 => encoding::int64::merge(wire_type, &mut self.count, buf, ctx),
            _ => encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if let Some(ref header) = self.header {
            len += encoding::message::encoded_len(1, header);
        }
        len += encoding::message::encoded_len_repeated(2, &self.kvs);
        if self.more {
            len += encoding::bool::encoded_len(3, &self.more);
        }
        if self.count != 0 {
            len += encoding::int64::encoded_len(4, &self.count);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Put
// ============================================================================

/// etcdserverpb.PutRequest without lease handling.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct PutRequest {
    pub key: Vec<u8>,   // 1
    pub value: Vec<u8>, // 2
}

impl Message for PutRequest {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        if !self.key.is_empty() {
            encoding::bytes::encode(1, &self.key, buf);
        }
        if !self.value.is_empty() {
            encoding::bytes::encode(2, &self.value, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        match tag {
            1 => encoding::bytes::merge(wire_type, &mut self.key, buf, ctx),
            2 => encoding::bytes::merge(wire_type, &mut self.value, buf, ctx),
            _ => encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if !self.key.is_empty() {
            len += encoding::bytes::encoded_len(1, &self.key);
        }
        if !self.value.is_empty() {
            len += encoding::bytes::encoded_len(2, &self.value);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// DeleteRange
// ============================================================================

/// etcdserverpb.DeleteRangeRequest.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct DeleteRangeRequest {
    pub key: Vec<u8>,       // 1
    pub range_end: Vec<u8>, // 2
}

impl Message for DeleteRangeRequest {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        if !self.key.is_empty() {
            encoding::bytes::encode(1, &self.key, buf);
        }
        if !self.range_end.is_empty() {
            encoding::bytes::encode(2, &self.range_end, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        match tag {
            1 => encoding::bytes::merge(wire_type, &mut self.key, buf, ctx),
            2 => encoding::bytes::merge(wire_type, &mut self.range_end, buf, ctx),
            _ => encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if !self.key.is_empty() {
            len += encoding::bytes::encoded_len(1, &self.key);
        }
        if !self.range_end.is_empty() {
            len += encoding::bytes::encoded_len(2, &self.range_end);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// etcdserverpb.DeleteRangeResponse without previous values.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct DeleteRangeResponse {
    pub header: Option<ResponseHeader>, // 1
    pub deleted: i64,                   // 2
}

impl Message for DeleteRangeResponse {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        if let Some(ref header) = self.header {
            encoding::message::encode(1, header, buf);
        }
        if self.deleted != 0 {
            encoding::int64::encode(2, &self.deleted, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        match tag {
            1 => merge_header(&mut self.header, wire_type, buf, ctx),
            2 => encoding::int64::merge(wire_type, &mut self.deleted, buf, ctx),
            _ => encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if let Some(ref header) = self.header {
            len += encoding::message::encoded_len(1, header);
        }
        if self.deleted != 0 {
            len += encoding::int64::encoded_len(2, &self.deleted);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

// ============================================================================
// Txn
// ============================================================================

/// etcdserverpb.Compare restricted to revision targets.
///
/// `create_revision` sits in the `target_union` oneof, so when present it is
/// written even if zero: "create revision equals 0" is how etcd spells "key
/// does not exist".
#[derive(Clone, Default, Debug, PartialEq)]
pub struct Compare {
    pub result: i32,                  // 1
    pub target: i32,                  // 2
    pub key: Vec<u8>,                 // 3
    pub create_revision: Option<i64>, // 5 (oneof target_union)
}

impl Compare {
    /// `create_revision(key) == 0`, i.e. the key is absent.
    pub fn key_absent(key: Vec<u8>) -> Self {
        Self {
            result: COMPARE_EQUAL,
            target: COMPARE_TARGET_CREATE,
            key,
            create_revision: Some(0),
        }
    }
}

impl Message for Compare {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        if self.result != 0 {
            encoding::int32::encode(1, &self.result, buf);
        }
        if self.target != 0 {
            encoding::int32::encode(2, &self.target, buf);
        }
        if !self.key.is_empty() {
            encoding::bytes::encode(3, &self.key, buf);
        }
        if let Some(ref rev) = self.create_revision {
            encoding::int64::encode(5, rev, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        match tag {
            1 => encoding::int32::merge(wire_type, &mut self.result, buf, ctx),
            2 => encoding::int32::merge(wire_type, &mut self.target, buf, ctx),
            3 => encoding::bytes::merge(wire_type, &mut self.key, buf, ctx),
            5 => {
                let rev = self.create_revision.get_or_insert(0);
                encoding::int64::merge(wire_type, rev, buf, ctx)
            }
            _ => encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if self.result != 0 {
            len += encoding::int32::encoded_len(1, &self.result);
        }
        if self.target != 0 {
            len += encoding::int32::encoded_len(2, &self.target);
        }
        if !self.key.is_empty() {
            len += encoding::bytes::encoded_len(3, &self.key);
        }
        if let Some(ref rev) = self.create_revision {
            len += encoding::int64::encoded_len(5, rev);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// etcdserverpb.RequestOp (oneof request).
#[derive(Clone, Debug, PartialEq)]
pub enum RequestOp {
    Range(RangeRequest),             // 1
    Put(PutRequest),                 // 2
    DeleteRange(DeleteRangeRequest), // 3
}

impl Default for RequestOp {
    fn default() -> Self {
        Self::Range(RangeRequest::default())
    }
}

impl Message for RequestOp {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        match self {
            Self::Range(req) => encoding::message::encode(1, req, buf),
            Self::Put(req) => encoding::message::encode(2, req, buf),
            Self::DeleteRange(req) => encoding::message::encode(3, req, buf),
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        match tag {
            1 => {
                let mut req = RangeRequest::default();
                encoding::message::merge(wire_type, &mut req, buf, ctx)?;
                *self = Self::Range(req);
                Ok(())
            }
            2 => {
                let mut req = PutRequest::default();
                encoding::message::merge(wire_type, &mut req, buf, ctx)?;
                *self = Self::Put(req);
                Ok(())
            }
            3 => {
                let mut req = DeleteRangeRequest::default();
                encoding::message::merge(wire_type, &mut req, buf, ctx)?;
                *self = Self::DeleteRange(req);
                Ok(())
            }
            _ => encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        match self {
            Self::Range(req) => encoding::message::encoded_len(1, req),
            Self::Put(req) => encoding::message::encoded_len(2, req),
            Self::DeleteRange(req) => encoding::message::encoded_len(3, req),
        }
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// etcdserverpb.TxnRequest.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct TxnRequest {
    pub compare: Vec<Compare>,   // 1
    pub success: Vec<RequestOp>, // 2
    pub failure: Vec<RequestOp>, // 3
}

impl Message for TxnRequest {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        encoding::message::encode_repeated(1, &self.compare, buf);
        encoding::message::encode_repeated(2, &self.success, buf);
        encoding::message::encode_repeated(3, &self.failure, buf);
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        match tag {
            1 => encoding::message::merge_repeated(wire_type, &mut self.compare, buf, ctx),
            2 => encoding::message::merge_repeated(wire_type, &mut self.success, buf, ctx),
            3 => encoding::message::merge_repeated(wire_type, &mut self.failure, buf, ctx),
            _ => encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        encoding::message::encoded_len_repeated(1, &self.compare)
            + encoding::message::encoded_len_repeated(2, &self.success)
            + encoding::message::encoded_len_repeated(3, &self.failure)
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// etcdserverpb.TxnResponse; per-operation responses are skipped.
#[derive(Clone, Default, Debug, PartialEq)]
pub struct TxnResponse {
    pub header: Option<ResponseHeader>, // 1
    pub succeeded: bool,                // 2
}

impl Message for TxnResponse {
    fn encode_raw(&self, buf: &mut impl BufMut) {
        if let Some(ref header) = self.header {
            encoding::message::encode(1, header, buf);
        }
        if self.succeeded {
            encoding::bool::encode(2, &self.succeeded, buf);
        }
    }

    fn merge_field(
        &mut self,
        tag: u32,
        wire_type: WireType,
        buf: &mut impl Buf,
        ctx: DecodeContext,
    ) -> Result<(), DecodeError> {
        match tag {
            1 => merge_header(&mut self.header, wire_type, buf, ctx),
            2 => encoding::bool::merge(wire_type, &mut self.succeeded, buf, ctx),
            _ => encoding::skip_field(wire_type, tag, buf, ctx),
        }
    }

    fn encoded_len(&self) -> usize {
        let mut len = 0;
        if let Some(ref header) = self.header {
            len += encoding::message::encoded_len(1, header);
        }
        if self.succeeded {
            len += encoding::bool::encoded_len(2, &self.succeeded);
        }
        len
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_absent_compare_writes_zero_revision() {
        let cmp = Compare::key_absent(b"/k".to_vec());
        let encoded = cmp.encode_to_vec();
        // result and target: EQUAL is the default and omitted; CREATE is not.
        // field 2 varint 1, field 3 bytes "/k", field 5 varint 0
        assert_eq!(encoded, vec![0x10, 0x01, 0x1a, 0x02, b'/', b'k', 0x28, 0x00]);

        let decoded = Compare::decode(&encoded[..]).unwrap();
        assert_eq!(decoded, cmp);
    }

    #[test]
    fn txn_request_roundtrip() {
        let req = TxnRequest {
            compare: vec![Compare::key_absent(b"/k".to_vec())],
            success: vec![RequestOp::Put(PutRequest {
                key: b"/k".to_vec(),
                value: Vec::new(),
            })],
            failure: vec![],
        };
        let decoded = TxnRequest::decode(&req.encode_to_vec()[..]).unwrap();
        assert_eq!(decoded, req);
    }

    #[test]
    fn txn_response_ignores_operation_responses() {
        // header { revision: 7 }, succeeded: true, responses: [<opaque>]
        let bytes = vec![0x0a, 0x02, 0x18, 0x07, 0x10, 0x01, 0x1a, 0x02, 0x0a, 0x00];
        let resp = TxnResponse::decode(&bytes[..]).unwrap();
        assert!(resp.succeeded);
        assert_eq!(resp.header.unwrap().revision, 7);
    }

    #[test]
    fn range_response_collects_keys() {
        let resp = RangeResponse {
            header: Some(ResponseHeader {
                revision: 3,
                ..Default::default()
            }),
            kvs: vec![
                KeyValue {
                    key: b"/d/".to_vec(),
                    ..Default::default()
                },
                KeyValue {
                    key: b"/d/10.0.0.1".to_vec(),
                    create_revision: 2,
                    ..Default::default()
                },
            ],
            more: false,
            count: 2,
        };
        let decoded = RangeResponse::decode(&resp.encode_to_vec()[..]).unwrap();
        assert_eq!(decoded.kvs.len(), 2);
        assert_eq!(decoded.kvs[1].key, b"/d/10.0.0.1");
    }
}
