//! 전송 세션 캐시
//!
//! 피어 주소별로 마지막 전송의 세그먼트 목록을 보관한다.
//! 재전송 요청은 이 캐시에서 조회하며, 같은 피어의 새 GET은
//! 기존 항목을 통째로 덮어쓴다.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;

use crate::segment::Segment;

/// 캐시된 전송 1건
#[derive(Debug)]
pub struct CachedTransfer {
    /// 시퀀스 순서대로 정렬된 세그먼트
    pub segments: Vec<Segment>,

    /// 캐시 시각
    pub cached_at: Instant,
}

impl CachedTransfer {
    pub fn new(segments: Vec<Segment>) -> Self {
        Self {
            segments,
            cached_at: Instant::now(),
        }
    }
}

/// 피어 주소 키의 전송 캐시
///
/// 키 단위 락만 잡으므로 서로 다른 피어의 조회는 경합하지 않는다.
#[derive(Debug, Default)]
pub struct SessionCache {
    entries: DashMap<SocketAddr, Arc<CachedTransfer>>,
}

impl SessionCache {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// 피어의 전송 기록 저장 (기존 항목 대체)
    pub fn put(&self, peer: SocketAddr, segments: Vec<Segment>) {
        self.entries
            .insert(peer, Arc::new(CachedTransfer::new(segments)));
    }

    /// 피어의 마지막 전송 조회
    pub fn get(&self, peer: &SocketAddr) -> Option<Arc<CachedTransfer>> {
        self.entries.get(peer).map(|entry| Arc::clone(&entry))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn segment(sequence: u32, byte: u8) -> Segment {
        Segment {
            sequence,
            payload: Bytes::from(vec![byte; 4]),
            is_last: false,
        }
    }

    #[test]
    fn test_put_overwrites_previous_transfer() {
        let cache = SessionCache::new();
        let peer: SocketAddr = "127.0.0.1:5000".parse().unwrap();

        cache.put(peer, vec![segment(0, 0xaa), segment(1, 0xaa)]);
        cache.put(peer, vec![segment(0, 0xbb)]);

        let cached = cache.get(&peer).unwrap();
        assert_eq!(cached.segments.len(), 1);
        assert_eq!(cached.segments[0].payload.as_ref(), &[0xbb; 4]);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_peers_are_independent() {
        let cache = SessionCache::new();
        let a: SocketAddr = "127.0.0.1:5000".parse().unwrap();
        let b: SocketAddr = "127.0.0.1:5001".parse().unwrap();

        cache.put(a, vec![segment(0, 1)]);
        cache.put(b, vec![segment(0, 2), segment(1, 2)]);

        assert_eq!(cache.get(&a).unwrap().segments.len(), 1);
        assert_eq!(cache.get(&b).unwrap().segments.len(), 2);
        assert!(cache.get(&"127.0.0.1:5002".parse().unwrap()).is_none());
    }
}
