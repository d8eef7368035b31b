//! 에러 타입 정의

use thiserror::Error;

/// SIFT 프로토콜 에러 타입
///
/// 다이제스트 불일치는 여기 없음: 수신측에서 폐기 후 계속하는 로컬 복구
/// 대상이므로 [`crate::packet::Packet::verify_digest`]의 bool 결과로 처리한다.
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),

    #[error("파일 없음: {path}")]
    FileNotFound { path: String },

    #[error("패킷이 너무 짧음: {len} bytes")]
    TruncatedPacket { len: usize },

    #[error("유효하지 않은 대상: {input} ({reason})")]
    InvalidTarget { input: String, reason: String },

    #[error("서버 에러 응답: {message}")]
    RemoteError { message: String },

    #[error("수신된 데이터 없음")]
    NothingReceived,
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, Error>;
