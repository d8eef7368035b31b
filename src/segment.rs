//! 세그먼트 정의와 분할
//!
//! - Segment: 파일을 페이로드 용량 단위로 자른 순서 있는 조각
//! - Segmenter: 바이트 소스를 세그먼트 목록으로 분할 (응답자측)

use std::path::Path;

use bytes::Bytes;

use crate::{Error, Result};

/// 시퀀스 번호 (32비트, 전송 내 인덱스)
pub type SequenceNumber = u32;

/// 세그먼트 (전송 단위)
///
/// 생성 후 불변. 한 전송에서 마지막 세그먼트만 `is_last`가 참이다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// 시퀀스 번호 (0부터 연속, 갭 없음)
    pub sequence: SequenceNumber,

    /// 페이로드
    pub payload: Bytes,

    /// 전송 종료 표시
    pub is_last: bool,
}

/// 세그먼트 분할기
pub struct Segmenter {
    payload_capacity: usize,
}

impl Segmenter {
    /// 새 분할기 생성
    ///
    /// `payload_capacity`는 0보다 커야 한다.
    pub fn new(payload_capacity: usize) -> Self {
        Self { payload_capacity }
    }

    /// 데이터를 세그먼트들로 분할
    ///
    /// 빈 입력은 종료 신호 전달을 위해 빈 세그먼트 1개가 된다.
    pub fn split(&self, data: &[u8]) -> Vec<Segment> {
        if data.is_empty() {
            return vec![Segment {
                sequence: 0,
                payload: Bytes::new(),
                is_last: true,
            }];
        }

        let total = (data.len() + self.payload_capacity - 1) / self.payload_capacity;

        data.chunks(self.payload_capacity)
            .enumerate()
            .map(|(idx, chunk)| Segment {
                sequence: idx as SequenceNumber,
                payload: Bytes::copy_from_slice(chunk),
                is_last: idx + 1 == total,
            })
            .collect()
    }

    /// 파일을 읽어 세그먼트들로 분할
    pub async fn split_file(&self, path: &Path) -> Result<Vec<Segment>> {
        let data = tokio::fs::read(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                Error::Io(e)
            }
        })?;
        Ok(self.split(&data))
    }
}
