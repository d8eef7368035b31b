//! 패킷 코덱
//!
//! 와이어 형식: 시퀀스 번호(4B big-endian) + 페이로드 MD5(16B) + 종료 플래그(1B) + 페이로드.
//! 헤더는 21바이트 고정이며 다이제스트는 페이로드만 대상으로 한다.

use bytes::Bytes;
use md5::{Digest, Md5};

use crate::segment::{Segment, SequenceNumber};
use crate::{Error, Result};

/// 시퀀스 번호 필드 길이 (바이트)
pub const SEQ_LEN: usize = 4;

/// 다이제스트 필드 길이 (바이트)
pub const DIGEST_LEN: usize = 16;

/// 종료 플래그 필드 길이 (바이트)
pub const FLAG_LEN: usize = 1;

/// 고정 헤더 길이 (바이트)
pub const HEADER_LEN: usize = SEQ_LEN + DIGEST_LEN + FLAG_LEN;

/// 페이로드 MD5 다이제스트 계산 (헤더 제외)
pub fn payload_digest(payload: &[u8]) -> [u8; DIGEST_LEN] {
    Md5::digest(payload).into()
}

/// 패킷 (세그먼트의 와이어 형식)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// 시퀀스 번호
    pub sequence: SequenceNumber,

    /// 송신측이 선언한 페이로드 다이제스트
    pub digest: [u8; DIGEST_LEN],

    /// 종료 플래그
    pub is_last: bool,

    /// 페이로드
    pub payload: Bytes,
}

impl Packet {
    /// 세그먼트로부터 패킷 생성 (다이제스트 재계산)
    pub fn from_segment(segment: &Segment) -> Self {
        Self {
            sequence: segment.sequence,
            digest: payload_digest(&segment.payload),
            is_last: segment.is_last,
            payload: segment.payload.clone(),
        }
    }

    /// 패킷을 바이트로 직렬화
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_LEN + self.payload.len());
        buf.extend_from_slice(&self.sequence.to_be_bytes());
        buf.extend_from_slice(&self.digest);
        buf.push(self.is_last as u8);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// 바이트에서 패킷 역직렬화
    ///
    /// 21바이트 헤더 경계만 자른다. 다이제스트 검증은
    /// [`Packet::verify_digest`]로 별도 수행하고, 불일치 패킷은
    /// 호출측이 폐기한 뒤 계속 진행한다.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(Error::TruncatedPacket { len: bytes.len() });
        }

        let sequence = u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let mut digest = [0u8; DIGEST_LEN];
        digest.copy_from_slice(&bytes[SEQ_LEN..SEQ_LEN + DIGEST_LEN]);
        let is_last = bytes[SEQ_LEN + DIGEST_LEN] == 1;
        let payload = Bytes::copy_from_slice(&bytes[HEADER_LEN..]);

        Ok(Self {
            sequence,
            digest,
            is_last,
            payload,
        })
    }

    /// 선언 다이제스트와 페이로드 재계산 다이제스트 비교
    pub fn verify_digest(&self) -> bool {
        payload_digest(&self.payload) == self.digest
    }
}
