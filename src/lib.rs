//! # SIFT (Segmented Integrity-checked File Transfer)
//!
//! UDP 기반 선택적 재전송 파일 전송 프로토콜
//!
//! ## 핵심 특징
//! - **고정 헤더**: 시퀀스 번호(4B, big-endian) + MD5 다이제스트(16B) + 종료 플래그(1B)
//! - **무결성 검증**: 페이로드 다이제스트 불일치 패킷은 조용히 폐기
//! - **타임아웃 기반 갭 감지**: 수신 타임아웃 후 누락 시퀀스 계산
//! - **선택적 재전송**: 누락 세그먼트만 RETRANSMIT 요청으로 재수신
//! - **피어별 세션 캐시**: 최근 전송 세그먼트 보관, 새 요청 시 통째로 덮어쓰기
//! - **주입식 손실 시뮬레이션**: 시드 가능한 확률 소스 (재현 가능한 테스트)

pub mod config;
pub mod error;
pub mod message;
pub mod packet;
pub mod receiver;
pub mod segment;
pub mod sender;
pub mod session;
pub mod stats;

pub use config::{Config, CountFallback};
pub use error::{Error, Result};
pub use message::{RemoteTarget, Request};
pub use packet::Packet;
pub use receiver::{LossInjector, Receiver, TransferReport};
pub use segment::{Segment, Segmenter, SequenceNumber};
pub use sender::Sender;
pub use session::SessionCache;
pub use stats::TransferStats;

/// 기본 데이터그램 크기 (바이트)
///
/// 헤더 21바이트를 제외한 나머지가 페이로드 용량이 된다.
pub const DEFAULT_DATAGRAM_SIZE: usize = 1024;
