//! 제어 메시지 정의
//!
//! 요청과 오류 응답은 UTF-8 텍스트 데이터그램 (데이터 패킷만 바이너리).
//! `GET /<파일명>`, `RETRANSMIT:<n1>,<n2>,...`, `ERROR: <사유>` 세 가지.

use std::fmt;
use std::str::FromStr;

use crate::segment::SequenceNumber;
use crate::{Error, Result};

/// 재전송 요청 접두사
const RETRANSMIT_PREFIX: &str = "RETRANSMIT:";

/// 오류 응답 접두사
const ERROR_PREFIX: &str = "ERROR:";

/// 수신측 → 송신측 요청
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// 파일 전송 요청
    Get {
        /// 요청 파일명 (선행/후행 `/` 제거 후)
        filename: String,
    },

    /// 누락 세그먼트 재전송 요청
    Retransmit {
        /// 요청 순서 그대로의 시퀀스 번호 목록
        sequences: Vec<SequenceNumber>,
    },
}

impl Request {
    /// 수신 데이터그램 파싱
    ///
    /// UTF-8이 아니거나 형식에 맞지 않으면 `None`.
    /// RETRANSMIT 목록에 숫자가 아닌 토큰이 하나라도 있으면
    /// 요청 전체를 버린다 (빈 토큰은 건너뜀).
    pub fn parse(datagram: &[u8]) -> Option<Request> {
        let text = std::str::from_utf8(datagram).ok()?;

        if let Some(rest) = text.strip_prefix("GET ") {
            let filename = rest
                .split_whitespace()
                .next()?
                .trim_matches('/')
                .to_string();
            if filename.is_empty() {
                return None;
            }
            return Some(Request::Get { filename });
        }

        if let Some(list) = text.strip_prefix(RETRANSMIT_PREFIX) {
            let mut sequences = Vec::new();
            for token in list.trim().split(',') {
                let token = token.trim();
                if token.is_empty() {
                    continue;
                }
                sequences.push(token.parse::<SequenceNumber>().ok()?);
            }
            return Some(Request::Retransmit { sequences });
        }

        None
    }

    /// 요청을 와이어 텍스트로 인코딩
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Request::Get { filename } => format!("GET /{}", filename).into_bytes(),
            Request::Retransmit { sequences } => {
                let joined = sequences
                    .iter()
                    .map(|seq| seq.to_string())
                    .collect::<Vec<_>>()
                    .join(",");
                format!("{}{}", RETRANSMIT_PREFIX, joined).into_bytes()
            }
        }
    }
}

/// 오류 응답 인코딩 (`ERROR: <사유>`)
pub fn error_reply(reason: &str) -> Vec<u8> {
    format!("{} {}", ERROR_PREFIX, reason).into_bytes()
}

/// 데이터그램이 오류 응답이면 사유 추출
///
/// 접두사 일치는 바이트 단위로 판단하므로 잘린 패킷과 혼동되지 않는다.
pub fn parse_error_reply(datagram: &[u8]) -> Option<String> {
    if !datagram.starts_with(ERROR_PREFIX.as_bytes()) {
        return None;
    }
    let reason = String::from_utf8_lossy(&datagram[ERROR_PREFIX.len()..]);
    Some(reason.trim_start().to_string())
}

/// 전송 대상 지정 (`<호스트>:<포트>/<파일명>`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteTarget {
    /// 호스트명 또는 IP
    pub host: String,

    /// UDP 포트
    pub port: u16,

    /// 요청 파일명
    pub filename: String,
}

impl RemoteTarget {
    /// `호스트:포트` 형식의 주소 문자열
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for RemoteTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}/{}", self.host, self.port, self.filename)
    }
}

impl FromStr for RemoteTarget {
    type Err = Error;

    fn from_str(input: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidTarget {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        let (addr, filename) = input
            .split_once('/')
            .ok_or_else(|| invalid("파일명 구분자 '/' 없음"))?;
        let (host, port) = addr
            .split_once(':')
            .ok_or_else(|| invalid("포트 구분자 ':' 없음"))?;

        if host.is_empty() {
            return Err(invalid("호스트가 비어 있음"));
        }
        let port = port
            .parse::<u16>()
            .map_err(|_| invalid("포트가 숫자가 아님"))?;
        let filename = filename.trim_matches('/');
        if filename.is_empty() {
            return Err(invalid("파일명이 비어 있음"));
        }

        Ok(RemoteTarget {
            host: host.to_string(),
            port,
            filename: filename.to_string(),
        })
    }
}
