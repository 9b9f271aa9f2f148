//! etcd v3 gRPC backend.
//!
//! The four store primitives map onto three etcd RPCs:
//!
//! | Primitive       | RPC                                             |
//! |-----------------|-------------------------------------------------|
//! | `create`        | `Txn` if `create_revision(key) == 0` then `Put` |
//! | `delete`        | `DeleteRange` on the single key                 |
//! | `list_children` | paged `Range` over the `dir/` prefix, keys only |
//! | `create_dir`    | `create` of the `dir/` marker                   |

use super::proto;
use crate::core::config::StoreConfig;
use crate::store::backend::{dir_prefix, leaf_child, prefix_range_end, KvBackend, KvError, KvResult};
use async_trait::async_trait;
use prost::Message;
use tonic::client::Grpc;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};

const RANGE_PATH: &str = "/etcdserverpb.KV/Range";
const DELETE_RANGE_PATH: &str = "/etcdserverpb.KV/DeleteRange";
const TXN_PATH: &str = "/etcdserverpb.KV/Txn";

/// Keys fetched per `Range` page when listing a directory.
///
/// Keeps each response far below tonic's default 4 MiB decode limit even for
/// pools with tens of thousands of assignments.
pub const LIST_PAGE_SIZE: i64 = 1000;

/// etcd v3 backend over a lazily connected, load-balanced channel.
#[derive(Debug, Clone)]
pub struct EtcdBackend {
    channel: Channel,
    endpoints: Vec<String>,
}

impl EtcdBackend {
    /// Build a backend for the configured endpoints.
    ///
    /// No connection is attempted here; the first RPC connects, and an
    /// unreachable cluster surfaces as `KvError::Unavailable` from it. Must be
    /// called from within a tokio runtime.
    ///
    /// Only the connect phase carries a transport timeout. Request deadlines
    /// belong to the caller so that expiry is reported as a store timeout.
    pub fn connect(config: &StoreConfig) -> KvResult<Self> {
        let urls: Vec<String> = config.endpoints.iter().map(|e| endpoint_url(e)).collect();
        let mut endpoints = Vec::with_capacity(urls.len());
        for url in &urls {
            let endpoint = Endpoint::from_shared(url.clone())
                .map_err(|e| KvError::Internal(format!("invalid endpoint {}: {}", url, e)))?
                .connect_timeout(config.connect_timeout());
            endpoints.push(endpoint);
        }

        let channel = match endpoints.len() {
            0 => return Err(KvError::Internal("no etcd endpoints configured".to_string())),
            1 => endpoints.remove(0).connect_lazy(),
            _ => Channel::balance_list(endpoints.into_iter()),
        };

        tracing::debug!(endpoints = ?urls, "etcd channel configured");
        Ok(Self {
            channel,
            endpoints: urls,
        })
    }

    /// Endpoint URLs this backend balances over.
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    async fn unary<Req, Resp>(&self, path: &'static str, req: Req) -> KvResult<Resp>
    where
        Req: Message + Send + Sync + 'static,
        Resp: Message + Default + Send + Sync + 'static,
    {
        let mut grpc = Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| KvError::Unavailable(format!("{}: {}", path, e)))?;

        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let response = grpc
            .unary(
                tonic::Request::new(req),
                PathAndQuery::from_static(path),
                codec,
            )
            .await
            .map_err(status_to_kv_error)?;
        Ok(response.into_inner())
    }
}

#[async_trait]
impl KvBackend for EtcdBackend {
    async fn create(&self, key: &str, value: &[u8]) -> KvResult<()> {
        let resp: proto::TxnResponse = self.unary(TXN_PATH, create_txn(key, value)).await?;
        if resp.succeeded {
            Ok(())
        } else {
            Err(KvError::AlreadyExists)
        }
    }

    async fn delete(&self, key: &str) -> KvResult<()> {
        let resp: proto::DeleteRangeResponse =
            self.unary(DELETE_RANGE_PATH, delete_request(key)).await?;
        if resp.deleted > 0 {
            Ok(())
        } else {
            Err(KvError::NotFound)
        }
    }

    async fn list_children(&self, dir: &str) -> KvResult<Vec<String>> {
        let prefix = dir_prefix(dir);
        let mut request = list_request(&prefix);
        let mut children = Vec::new();
        let mut found = false;
        let mut pages = 0u32;
        loop {
            let resp: proto::RangeResponse = self.unary(RANGE_PATH, request.clone()).await?;
            pages += 1;
            found |= !resp.kvs.is_empty();
            children.extend(children_of(&prefix, &resp.kvs));
            match next_page(&request, &resp) {
                Some(next) => request = next,
                None => break,
            }
        }
        if !found {
            return Err(KvError::NotFound);
        }
        if pages > 1 {
            tracing::trace!(dir, pages, children = children.len(), "paged directory listing");
        }
        Ok(children)
    }

    async fn create_dir(&self, dir: &str) -> KvResult<()> {
        match self.create(&dir_prefix(dir), b"").await {
            Ok(()) | Err(KvError::AlreadyExists) => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &'static str {
        "etcd"
    }
}

/// Normalize a configured endpoint to a URL; bare `host:port` means plaintext.
pub fn endpoint_url(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

/// Create-if-absent transaction for a single key.
pub fn create_txn(key: &str, value: &[u8]) -> proto::TxnRequest {
    proto::TxnRequest {
        compare: vec![proto::Compare::key_absent(key.as_bytes().to_vec())],
        success: vec![proto::RequestOp::Put(proto::PutRequest {
            key: key.as_bytes().to_vec(),
            value: value.to_vec(),
        })],
        failure: Vec::new(),
    }
}

/// Single-key delete.
pub fn delete_request(key: &str) -> proto::DeleteRangeRequest {
    proto::DeleteRangeRequest {
        key: key.as_bytes().to_vec(),
        range_end: Vec::new(),
    }
}

/// First page of a keys-only range over everything under `prefix`.
pub fn list_request(prefix: &str) -> proto::RangeRequest {
    proto::RangeRequest {
        key: prefix.as_bytes().to_vec(),
        range_end: prefix_range_end(prefix.as_bytes()),
        limit: LIST_PAGE_SIZE,
        keys_only: true,
        ..Default::default()
    }
}

/// Request for the page after `resp`, or `None` once the range is drained.
///
/// The next page starts just past the last key returned and keeps the same
/// range end.
pub fn next_page(
    request: &proto::RangeRequest,
    resp: &proto::RangeResponse,
) -> Option<proto::RangeRequest> {
    if !resp.more {
        return None;
    }
    let last = resp.kvs.last()?;
    let mut key = last.key.clone();
    key.push(0);
    Some(proto::RangeRequest {
        key,
        ..request.clone()
    })
}

fn children_of(prefix: &str, kvs: &[proto::KeyValue]) -> Vec<String> {
    kvs.iter()
        .filter_map(|kv| {
            let key = std::str::from_utf8(&kv.key).ok()?;
            leaf_child(prefix, key).map(str::to_string)
        })
        .collect()
}

/// Map a gRPC status onto the backend error taxonomy.
pub fn status_to_kv_error(status: Status) -> KvError {
    let message = status.message().to_string();
    match status.code() {
        Code::Unavailable | Code::Cancelled | Code::Aborted => KvError::Unavailable(message),
        Code::DeadlineExceeded => KvError::Timeout(message),
        Code::PermissionDenied | Code::Unauthenticated => KvError::PermissionDenied(message),
        _ if is_transport_failure(&status) => KvError::Unavailable(message),
        code => KvError::Internal(format!("{:?}: {}", code, message)),
    }
}

fn is_transport_failure(status: &Status) -> bool {
    use std::error::Error as _;
    status
        .source()
        .is_some_and(|source| source.downcast_ref::<tonic::transport::Error>().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_endpoints_become_plaintext_urls() {
        assert_eq!(endpoint_url("10.0.0.9:2379"), "http://10.0.0.9:2379");
        assert_eq!(endpoint_url(" https://etcd:2379 "), "https://etcd:2379");
    }

    #[test]
    fn create_txn_guards_on_absence() {
        let txn = create_txn("/ns/10.0.0.1", b"");
        assert_eq!(txn.compare.len(), 1);
        assert_eq!(txn.compare[0].target, proto::COMPARE_TARGET_CREATE);
        assert_eq!(txn.compare[0].create_revision, Some(0));
        assert!(txn.failure.is_empty());
        match &txn.success[..] {
            [proto::RequestOp::Put(put)] => {
                assert_eq!(put.key, b"/ns/10.0.0.1");
                assert!(put.value.is_empty());
            }
            other => panic!("unexpected success ops: {:?}", other),
        }
    }

    #[test]
    fn list_request_covers_prefix_only() {
        let req = list_request("/ns/pool/");
        assert_eq!(req.key, b"/ns/pool/");
        assert_eq!(req.range_end, b"/ns/pool0");
        assert_eq!(req.limit, LIST_PAGE_SIZE);
        assert!(req.keys_only);
    }

    fn page(keys: &[&str], more: bool) -> proto::RangeResponse {
        proto::RangeResponse {
            kvs: keys
                .iter()
                .map(|k| proto::KeyValue {
                    key: k.as_bytes().to_vec(),
                    ..Default::default()
                })
                .collect(),
            more,
            count: keys.len() as i64,
            ..Default::default()
        }
    }

    #[test]
    fn next_page_resumes_after_last_key() {
        let first = list_request("/ns/pool/");
        let resp = page(&["/ns/pool/", "/ns/pool/10.0.0.1", "/ns/pool/10.0.0.2"], true);
        let next = next_page(&first, &resp).unwrap();
        assert_eq!(next.key, b"/ns/pool/10.0.0.2\0");
        assert_eq!(next.range_end, first.range_end);
        assert_eq!(next.limit, LIST_PAGE_SIZE);
        assert!(next.keys_only);
    }

    #[test]
    fn last_page_ends_listing() {
        let first = list_request("/ns/pool/");
        assert!(next_page(&first, &page(&["/ns/pool/10.0.0.1"], false)).is_none());
        // `more` without keys cannot advance.
        assert!(next_page(&first, &page(&[], true)).is_none());
    }

    #[test]
    fn full_page_fits_default_decode_limit() {
        let namespace = "/calico/v1/ipam/v6/assignment/fd00:dead:beef:cafe::-64/";
        let kvs = (0..LIST_PAGE_SIZE)
            .map(|i| proto::KeyValue {
                key: format!("{}fd00:dead:beef:cafe:ffff:ffff:ffff:{:x}", namespace, i).into_bytes(),
                create_revision: i64::MAX,
                mod_revision: i64::MAX,
                version: 1,
                value: Vec::new(),
            })
            .collect();
        let resp = proto::RangeResponse {
            header: Some(proto::ResponseHeader::default()),
            kvs,
            more: true,
            count: 65_534,
        };
        assert!(resp.encoded_len() < 4 * 1024 * 1024 / 16);
    }

    #[test]
    fn children_skip_marker() {
        let kvs = vec![
            proto::KeyValue {
                key: b"/ns/pool/".to_vec(),
                ..Default::default()
            },
            proto::KeyValue {
                key: b"/ns/pool/10.0.0.2".to_vec(),
                ..Default::default()
            },
        ];
        assert_eq!(children_of("/ns/pool/", &kvs), vec!["10.0.0.2".to_string()]);
    }

    #[test]
    fn status_mapping() {
        assert_eq!(
            status_to_kv_error(Status::unavailable("no leader")),
            KvError::Unavailable("no leader".to_string())
        );
        assert_eq!(
            status_to_kv_error(Status::deadline_exceeded("slow")),
            KvError::Timeout("slow".to_string())
        );
        assert_eq!(
            status_to_kv_error(Status::permission_denied("role")),
            KvError::PermissionDenied("role".to_string())
        );
        assert!(matches!(
            status_to_kv_error(Status::invalid_argument("bad key")),
            KvError::Internal(_)
        ));
    }
}
