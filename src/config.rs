//! 프로토콜 설정

use crate::packet::HEADER_LEN;
use crate::segment::SequenceNumber;
use crate::DEFAULT_DATAGRAM_SIZE;

/// 종료 플래그를 한 번도 못 본 경우의 전체 세그먼트 수 추정 정책
///
/// 원 설계 변형마다 추정식이 달라 (마지막 수신 +1 vs +2) 정책으로 분리.
/// 둘 다 추정일 뿐이며, 종료 플래그 관측 시에는 사용되지 않는다.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountFallback {
    /// 가장 큰 수신 시퀀스 + 1
    HighestPlusOne,

    /// 가장 큰 수신 시퀀스 + 2
    HighestPlusTwo,
}

impl CountFallback {
    /// 추정 전체 세그먼트 수 계산
    pub fn estimate(&self, highest_seen: SequenceNumber) -> u32 {
        match self {
            CountFallback::HighestPlusOne => highest_seen.saturating_add(1),
            CountFallback::HighestPlusTwo => highest_seen.saturating_add(2),
        }
    }
}

/// SIFT 프로토콜 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 데이터그램 크기 (바이트)
    ///
    /// 헤더 21바이트보다 커야 하며, 페이로드 용량은 `datagram_size - 21`.
    pub datagram_size: usize,

    /// 수신 유휴 타임아웃 (밀리초)
    ///
    /// 기본 수신 단계와 재전송 수신 단계 모두에 적용된다.
    pub recv_timeout_ms: u64,

    /// 재전송 요청 재시도 상한
    pub retry_limit: u32,

    /// 세그먼트 전송 간격 (마이크로초)
    ///
    /// 0이면 최대 속도로 전송. 혼잡 제어가 아니라 로컬 버퍼 과부하 방지용.
    pub send_interval_us: u64,

    /// 종료 플래그 미관측 시 전체 수 추정 정책
    pub count_fallback: CountFallback,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            datagram_size: DEFAULT_DATAGRAM_SIZE, // 1024
            recv_timeout_ms: 2000,                // 2초
            retry_limit: 3,
            send_interval_us: 100,                // 0.1ms
            count_fallback: CountFallback::HighestPlusOne,
        }
    }
}

impl Config {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 패킷당 페이로드 용량 (바이트)
    pub fn payload_capacity(&self) -> usize {
        self.datagram_size - HEADER_LEN
    }

    /// 주어진 크기의 데이터가 몇 개의 세그먼트로 나뉘는지 계산
    ///
    /// 빈 데이터도 종료 신호를 위해 세그먼트 1개를 차지한다.
    pub fn segment_count(&self, data_len: usize) -> usize {
        if data_len == 0 {
            return 1;
        }
        let capacity = self.payload_capacity();
        (data_len + capacity - 1) / capacity
    }

    /// 불안정한 네트워크용 설정
    pub fn lossy_network() -> Self {
        Self {
            datagram_size: DEFAULT_DATAGRAM_SIZE,
            recv_timeout_ms: 4000,                // 여유 있는 타임아웃
            retry_limit: 5,
            send_interval_us: 500,                // 버스트 완화
            count_fallback: CountFallback::HighestPlusOne,
        }
    }

    /// 루프백 테스트용 설정 (짧은 타임아웃)
    pub fn local_test() -> Self {
        Self {
            datagram_size: DEFAULT_DATAGRAM_SIZE,
            recv_timeout_ms: 200,
            retry_limit: 3,
            send_interval_us: 0,                  // 최대 속도
            count_fallback: CountFallback::HighestPlusOne,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_capacity() {
        let config = Config::default();
        assert_eq!(config.payload_capacity(), 1003);
    }

    #[test]
    fn test_segment_count() {
        let config = Config::default();
        assert_eq!(config.segment_count(0), 1);
        assert_eq!(config.segment_count(1), 1);
        assert_eq!(config.segment_count(1003), 1);
        assert_eq!(config.segment_count(1004), 2);
        assert_eq!(config.segment_count(5000), 5);
    }

    #[test]
    fn test_count_fallback() {
        assert_eq!(CountFallback::HighestPlusOne.estimate(4), 5);
        assert_eq!(CountFallback::HighestPlusTwo.estimate(4), 6);
        assert_eq!(CountFallback::HighestPlusOne.estimate(u32::MAX), u32::MAX);
    }
}
