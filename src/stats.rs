//! 전송 통계

use std::time::{Duration, Instant};

/// 전송 통계 카운터
///
/// 송신측과 수신측이 같은 구조를 공유하고 각자 해당 항목만 올린다.
#[derive(Debug, Clone)]
pub struct TransferStats {
    /// 시작 시간
    pub start_time: Instant,

    /// 송신 세그먼트 수 (재전송 포함)
    pub segments_sent: u64,

    /// 수신 확정 세그먼트 수
    pub segments_received: u64,

    /// 송신 바이트 (헤더 포함)
    pub bytes_sent: u64,

    /// 수신 바이트 (헤더 포함)
    pub bytes_received: u64,

    /// 재전송으로 내보낸 세그먼트 수
    pub retransmits_served: u64,

    /// 보낸 재전송 요청 수
    pub retransmit_requests: u64,

    /// 다이제스트 불일치로 폐기한 패킷 수
    pub corrupt_discarded: u64,

    /// 중복 시퀀스로 폐기한 패킷 수
    pub duplicate_discarded: u64,

    /// 손실 주입기가 버린 패킷 수
    pub simulated_drops: u64,

    /// 캐시에 세션이 없던 재전송 요청 수
    pub stale_retransmits: u64,

    /// 파싱에 실패한 요청 수
    pub malformed_requests: u64,
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            segments_sent: 0,
            segments_received: 0,
            bytes_sent: 0,
            bytes_received: 0,
            retransmits_served: 0,
            retransmit_requests: 0,
            corrupt_discarded: 0,
            duplicate_discarded: 0,
            simulated_drops: 0,
            stale_retransmits: 0,
            malformed_requests: 0,
        }
    }

    /// 경과 시간
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// 수신 처리율 (bytes/sec)
    pub fn throughput_bps(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed == 0.0 {
            return 0.0;
        }
        self.bytes_received as f64 / elapsed
    }

    /// 통계 요약 문자열
    pub fn summary(&self) -> String {
        format!(
            "Elapsed: {:.2}s | Sent: {} seg / {} B | Received: {} seg / {} B | Retransmits: {} served, {} requested | Discarded: {} corrupt, {} dup | Drops(sim): {}",
            self.elapsed().as_secs_f64(),
            self.segments_sent,
            self.bytes_sent,
            self.segments_received,
            self.bytes_received,
            self.retransmits_served,
            self.retransmit_requests,
            self.corrupt_discarded,
            self.duplicate_discarded,
            self.simulated_drops,
        )
    }
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}
